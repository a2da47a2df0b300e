use std::path::PathBuf;

use clap::{Parser, Subcommand};
use microblog_cli::cli::{resolve_config, run_command, CliCommand, PostAction};
use microblog_cli::tracing_setup::init_tracing;
use microblog_core::{FeedFilter, FeedScope, FeedSort};

#[derive(Parser)]
#[command(name = "microblog-cli")]
#[command(about = "Command-line client for the microblog feed")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file (apiBaseUrl, pushUrl, authToken, ...)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the timeline
    Timeline {
        /// all, following, local or federated
        #[arg(long, default_value = "all")]
        filter: FeedFilter,
        /// latest, popular or trending
        #[arg(long, default_value = "latest")]
        sort: FeedSort,
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Toggle the like on a post
    Like {
        post_id: String,
        /// Pages to search for the post
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Repost a post
    Repost {
        post_id: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Undo a repost
    Unrepost {
        post_id: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// List notifications
    Notifications,

    /// Print the unread notification count
    Unread,

    /// Mark a notification as read
    MarkRead {
        /// Notification ID
        notification_id: String,
    },

    /// Mark all notifications as read
    MarkAllRead,

    /// Stay connected and print push events as JSON lines until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: Failed to initialise logging: {}", e);
    }

    let command = match cli.command {
        Some(Commands::Timeline {
            filter,
            sort,
            pages,
        }) => CliCommand::Timeline {
            scope: FeedScope::new(filter, sort),
            pages,
        },
        Some(Commands::Like { post_id, pages }) => CliCommand::Engage {
            action: PostAction::Like,
            post_id,
            pages,
        },
        Some(Commands::Repost { post_id, pages }) => CliCommand::Engage {
            action: PostAction::Repost,
            post_id,
            pages,
        },
        Some(Commands::Unrepost { post_id, pages }) => CliCommand::Engage {
            action: PostAction::Unrepost,
            post_id,
            pages,
        },
        Some(Commands::Notifications) => CliCommand::Notifications,
        Some(Commands::Unread) => CliCommand::Unread,
        Some(Commands::MarkRead { notification_id }) => CliCommand::MarkRead { notification_id },
        Some(Commands::MarkAllRead) => CliCommand::MarkAllRead,
        Some(Commands::Watch) => CliCommand::Watch,
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(command, config, cli.pretty).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
