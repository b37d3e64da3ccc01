//! Optimistic field state machine.
//!
//! A field is `Settled(value)` until a mutation begins, then
//! `Pending { value, previous }` until the response for that mutation
//! arrives. Success settles on the server's value, failure on `previous`.
//!
//! Every mutation carries a [`Token`]. Only the response to the most recent
//! token may change what is displayed. A successful response to an older
//! token still advances the confirmed baseline, so a later rollback returns
//! to the newest value the server is known to hold.

/// Sequence number of one mutation. Tokens are never reused within a
/// [`TokenSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

#[derive(Debug, Default)]
pub struct TokenSource {
    last: u64,
}

impl TokenSource {
    pub fn next(&mut self) -> Token {
        self.last += 1;
        Token(self.last)
    }

    /// The most recently issued token, or the zero token if none was issued.
    pub fn last(&self) -> Token {
        Token(self.last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldState<T> {
    Settled(T),
    Pending { value: T, previous: T },
}

/// What a response did to the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The latest mutation succeeded; the field shows the server's value.
    Confirmed,
    /// The latest mutation failed; the field is back at the confirmed value.
    RolledBack,
    /// A newer mutation (or a reset) superseded this response.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    confirmed: T,
    floor: Token,
    pending: Option<(T, Token)>,
}

impl<T: Clone> Optimistic<T> {
    pub fn settled(value: T) -> Self {
        Self {
            confirmed: value,
            floor: Token(0),
            pending: None,
        }
    }

    /// What the viewer should see right now.
    pub fn value(&self) -> &T {
        match &self.pending {
            Some((value, _)) => value,
            None => &self.confirmed,
        }
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn state(&self) -> FieldState<T> {
        match &self.pending {
            Some((value, _)) => FieldState::Pending {
                value: value.clone(),
                previous: self.confirmed.clone(),
            },
            None => FieldState::Settled(self.confirmed.clone()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Show `value` immediately. `token` must come from the same source as
    /// every other token applied to this field.
    pub fn begin(&mut self, value: T, token: Token) {
        self.pending = Some((value, token));
    }

    pub fn confirm(&mut self, token: Token, server: T) -> Resolution {
        if token <= self.floor {
            return Resolution::Stale;
        }
        self.confirmed = server;
        self.floor = token;
        match self.pending {
            Some((_, latest)) if latest == token => {
                self.pending = None;
                Resolution::Confirmed
            }
            _ => Resolution::Stale,
        }
    }

    pub fn fail(&mut self, token: Token) -> Resolution {
        match self.pending {
            Some((_, latest)) if latest == token => {
                self.pending = None;
                Resolution::RolledBack
            }
            _ => Resolution::Stale,
        }
    }

    /// Replace the confirmed value with a fresh server snapshot, leaving any
    /// pending mutation in place.
    pub fn rebase(&mut self, server: T) {
        self.confirmed = server;
    }

    /// Drop any pending mutation and ignore every response at or before
    /// `fence`.
    pub fn reset(&mut self, value: T, fence: Token) {
        self.confirmed = value;
        self.pending = None;
        if fence > self.floor {
            self.floor = fence;
        }
    }
}
