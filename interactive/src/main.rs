mod render;

use std::process::ExitCode;

use anyhow::Context;
use atlas_client::feed::ALL;
use atlas_client::{AppState, ClientConfig, Direction, FeedQuery, FileStore, Identity, Sort};
use atlas_shared::CreatePost;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "atlas", author, version, about = "Browse, vote on and discuss Failure Atlas postmortems")]
struct Cli {
    /// Base URL of the store, overriding config and ATLAS_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List posts
    Posts {
        /// Search text
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value = ALL)]
        cause: String,
        #[arg(long, default_value = ALL)]
        severity: String,
        /// hot, new or top
        #[arg(long, default_value_t = Sort::Hot)]
        sort: Sort,
    },
    /// Show one post in full
    Show { id: i64 },
    /// Publish a new post
    New {
        #[arg(long)]
        title: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        category: String,
        #[arg(long)]
        cause: String,
        #[arg(long)]
        severity: String,
        #[arg(long)]
        summary: String,
        /// Repeat for several tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Press an arrow. Pressing the arrow you already chose clears your vote.
    Vote { id: i64, arrow: Arrow },
    /// Add a post to your saved list
    Save { id: i64 },
    /// Remove a post from your saved list
    Unsave { id: i64 },
    /// List a post's comments
    Comments { id: i64 },
    /// Comment on a post
    Comment { id: i64, text: String },
    /// Most common root causes
    TopCauses,
    /// Your saved posts
    Saved,
    /// Print your viewer id
    Whoami,
    /// Use an existing viewer id
    Adopt { user_id: String },
    /// Forget your viewer id
    SignOut,
    /// Check the store is up
    Health,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Arrow {
    Up,
    Down,
}

impl From<Arrow> for Direction {
    fn from(arrow: Arrow) -> Self {
        match arrow {
            Arrow::Up => Direction::Up,
            Arrow::Down => Direction::Down,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("atlas_client=info,atlas_interactive=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load().context("loading configuration")?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        config.timeout_seconds = secs;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let identity_file = config.identity_file();
    debug!(api = %config.api_base_url, identity = %identity_file.display(), "configured");
    let identity = Identity::new(FileStore::new(identity_file));
    let app = AppState::new(&config, identity)?;

    match cli.command {
        Command::Posts {
            q,
            cause,
            severity,
            sort,
        } => {
            app.set_query(FeedQuery {
                q: q.unwrap_or_default(),
                cause,
                severity,
                sort,
            });
            let view = app.load_feed().await?;
            render::post_list(&view);
        }
        Command::Show { id } => {
            let view = app.open_post(id).await?;
            render::post_detail(&view);
        }
        Command::New {
            title,
            product,
            year,
            category,
            cause,
            severity,
            summary,
            tags,
        } => {
            let post = app
                .create_post(CreatePost {
                    title,
                    product,
                    year,
                    category,
                    cause,
                    severity,
                    summary,
                    tags: (!tags.is_empty()).then_some(tags),
                })
                .await?;
            println!("created post {}", post.id);
            render::post_line(&post);
        }
        Command::Vote { id, arrow } => {
            app.open_post(id).await?;
            let tally = app.toggle_vote(id, arrow.into()).await?;
            println!("post {id}: {} votes, yours {}", tally.votes, render::vote_label(tally.user_vote));
        }
        Command::Save { id } => {
            app.open_post(id).await?;
            app.set_saved(id, true).await?;
            println!("saved post {id}");
        }
        Command::Unsave { id } => {
            app.open_post(id).await?;
            app.set_saved(id, false).await?;
            println!("removed post {id} from saved");
        }
        Command::Comments { id } => {
            let comments = app.load_comments(id).await?;
            render::comments(&comments);
        }
        Command::Comment { id, text } => {
            app.open_post(id).await?;
            let comment = app.add_comment(id, &text).await?;
            println!("added comment {} to post {id}", comment.id);
        }
        Command::TopCauses => {
            let top = app.api().top_causes().await?;
            render::top_causes(&top);
        }
        Command::Saved => {
            let view = app.load_saved().await?;
            render::post_list(&view);
        }
        Command::Whoami => match app.api().identity().current()? {
            Some(id) => println!("{id}"),
            None => println!("no viewer id yet, one is issued on your first vote, save or comment"),
        },
        Command::Adopt { user_id } => {
            let id = app.api().identity().adopt(&user_id)?;
            println!("now acting as {id}");
        }
        Command::SignOut => {
            app.sign_out()?;
            println!("signed out");
        }
        Command::Health => {
            let health = app.api().health().await?;
            println!("{} is {}", app.api().base_url(), health.status);
        }
    }
    Ok(())
}
