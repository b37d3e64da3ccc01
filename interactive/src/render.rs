//! Plain-text output for each command.

use atlas_client::{ListView, PostView};
use atlas_shared::{Comment, Post, TopCauses, Vote};

pub fn vote_label(vote: Vote) -> &'static str {
    match vote {
        Vote::Up => "up",
        Vote::Down => "down",
        Vote::Neutral => "none",
    }
}

fn marker(post: &Post) -> &'static str {
    match (post.user_vote, post.saved) {
        (Vote::Up, true) => "^*",
        (Vote::Up, false) => "^ ",
        (Vote::Down, true) => "v*",
        (Vote::Down, false) => "v ",
        (Vote::Neutral, true) => " *",
        (Vote::Neutral, false) => "  ",
    }
}

pub fn post_line(post: &Post) {
    println!(
        "{:>5} {} #{:<5} {} ({} {}, {} / {}) [{} comments]",
        post.votes,
        marker(post),
        post.id,
        post.title,
        post.product,
        post.year,
        post.cause,
        post.severity,
        post.comment_count
    );
}

pub fn post_list(view: &ListView) {
    if view.posts.is_empty() {
        println!("no posts");
        return;
    }
    for post in &view.posts {
        post_line(post);
    }
    println!("{} of {} shown", view.posts.len(), view.total);
}

pub fn post_detail(view: &PostView) {
    let post = view.snapshot();
    println!("#{} {}", post.id, post.title);
    println!("{} {} | {} | cause {} | severity {}", post.product, post.year, post.category, post.cause, post.severity);
    if !post.tags.is_empty() {
        println!("tags: {}", post.tags.join(", "));
    }
    println!(
        "{} votes (yours: {}){}",
        post.votes,
        vote_label(post.user_vote),
        if post.saved { ", saved" } else { "" }
    );
    println!();
    println!("{}", post.summary);
    if let Some(body) = &view.body {
        println!();
        println!("{body}");
    }
}

pub fn comments(comments: &[Comment]) {
    if comments.is_empty() {
        println!("no comments");
        return;
    }
    for c in comments {
        println!("[{}] {}: {}", c.created_at, short_id(&c.user_id), c.content);
    }
}

pub fn top_causes(top: &TopCauses) {
    for item in &top.items {
        println!("{:>3}% {:>4}  {}", item.percent, item.count, item.cause);
    }
    println!("{} posts", top.total);
}

fn short_id(user_id: &str) -> &str {
    user_id.get(..8).unwrap_or(user_id)
}
