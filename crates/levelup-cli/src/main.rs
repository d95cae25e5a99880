//! LevelUp CLI - gamified personal goals from the terminal.
//!
//! Log in, work through the onboarding questionnaire, then complete daily
//! and weekly goals to earn XP. `levelup offline` manages the cache that
//! keeps the web app usable without a network.

mod app;
mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use levelup_core::models::Cadence;
use levelup_core::Config;

use app::App;
use commands::templates::NewGoalArgs;

/// File name prefix for the daily log files
const LOG_FILE_PREFIX: &str = "levelup.log";

/// Longest snooze accepted by `offline dismiss --days`
const MAX_SNOOZE_DAYS: i64 = 3650;

#[derive(Parser, Debug)]
#[command(name = "levelup", version, about = "Gamified goals and XP, from the terminal")]
struct Args {
    /// Backend base URL (overrides config and LEVELUP_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Language for questions and quotes (e.g. fr, en)
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Create an account
    Register {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the current session
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Answer the onboarding questionnaire
    Onboarding {
        /// JSON array of {question_id, value} instead of prompting
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// XP, priorities, today's quote and goals
    Dashboard,
    /// List goals
    Goals {
        #[arg(long)]
        archived: bool,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Complete a goal and earn its XP
    Complete { goal_id: i64 },
    /// Archive a goal
    Archive { goal_id: i64 },
    /// Restore an archived goal
    Unarchive { goal_id: i64 },
    /// Change a goal's cadence (daily or weekly)
    Schedule { goal_id: i64, cadence: Cadence },
    /// Delete a goal for good
    Delete {
        goal_id: i64,
        #[arg(long)]
        yes: bool,
    },
    /// Browse the goal template catalog
    Templates {
        /// Category id or name
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Adopt a template as a new goal
    Adopt {
        template_id: i64,
        /// Defaults to the template's own frequency
        #[arg(long)]
        cadence: Option<Cadence>,
    },
    /// Write your own goal
    CreateGoal {
        title: String,
        #[arg(long, default_value = "daily")]
        cadence: Cadence,
        #[arg(long, default_value_t = 10)]
        xp: i64,
        #[arg(long)]
        description: Option<String>,
        /// Category id or name
        #[arg(long)]
        category: Option<String>,
    },
    /// Profile statistics, optionally updating username or email
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show or reorder category priorities
    Priorities {
        /// Category ids, highest priority first
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<i64>>,
    },
    /// Today's quote
    Quote,
    /// Check that the backend is reachable
    Ping,
    /// Offline cache for the web app
    Offline {
        #[command(subcommand)]
        command: OfflineCommand,
    },
}

#[derive(Subcommand, Debug)]
enum OfflineCommand {
    /// Pre-cache the offline page and manifest
    Install,
    /// Fetch a path through the offline cache
    Fetch {
        path: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show cache regions and entries
    Status,
    /// Delete cache regions other than the current version
    Prune,
    /// Stop suggesting the offline install
    Dismiss {
        /// Snooze for this many days instead of dismissing
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_SNOOZE_DAYS))]
        days: Option<i64>,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by RUST_LOG (default "warn"). When
/// LEVELUP_LOG_DIR is set they are also written to a daily log file there;
/// the returned guard must live until exit so the file gets flushed.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os("LEVELUP_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(api_base) = args.api_base {
        config.api_base = api_base;
    }
    if let Some(lang) = args.lang {
        config.language = lang;
    }
    debug!(api_base = %config.api_base, lang = %config.language, "Configuration loaded");

    let mut app = App::new(config)?;
    let result = run(&mut app, args.command).await;

    if let Err(e) = &result {
        if app.handle_unauthorized(e) {
            info!("Session rejected by the backend");
            eprintln!("Your session has expired. Run `levelup login` again.");
        }
    }
    result
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    use commands::{account, goals, offline, onboarding, profile, templates};

    match command {
        Command::Login { email, remember } => account::login(app, email, remember).await,
        Command::Register { username, email } => account::register(app, username, email).await,
        Command::Logout => account::logout(app),
        Command::Whoami => account::whoami(app).await,
        Command::Onboarding { answers } => onboarding::run(app, answers.as_deref()).await,
        Command::Dashboard => goals::dashboard(app).await,
        Command::Goals { archived, filter } => goals::list(app, archived, filter).await,
        Command::Complete { goal_id } => goals::complete(app, goal_id).await,
        Command::Archive { goal_id } => goals::archive(app, goal_id).await,
        Command::Unarchive { goal_id } => goals::unarchive(app, goal_id).await,
        Command::Schedule { goal_id, cadence } => goals::schedule(app, goal_id, cadence).await,
        Command::Delete { goal_id, yes } => goals::delete(app, goal_id, yes).await,
        Command::Templates { category, filter } => templates::list(app, category, filter).await,
        Command::Adopt {
            template_id,
            cadence,
        } => templates::adopt(app, template_id, cadence).await,
        Command::CreateGoal {
            title,
            cadence,
            xp,
            description,
            category,
        } => {
            let args = NewGoalArgs {
                title,
                cadence,
                xp,
                description,
                category,
            };
            templates::create_goal(app, args).await
        }
        Command::Profile { username, email } => profile::show(app, username, email).await,
        Command::Priorities { order } => profile::priorities(app, order).await,
        Command::Quote => profile::quote(app).await,
        Command::Ping => account::ping(app).await,
        Command::Offline { command } => match command {
            OfflineCommand::Install => offline::install(app).await,
            OfflineCommand::Fetch { path, output } => offline::fetch(app, &path, output.as_deref()).await,
            OfflineCommand::Status => offline::status(app).await,
            OfflineCommand::Prune => offline::prune(app).await,
            OfflineCommand::Dismiss { days } => offline::dismiss(app, days),
        },
    }
}
