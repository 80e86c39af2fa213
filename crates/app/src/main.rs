use std::error::Error;

use services::{AppServices, Clock, TrackerSettings};
use tracing_subscriber::EnvFilter;

mod config;
mod take;

use config::{AppConfig, ArgsError, Command, parse_args, print_usage};

const HISTORY_LIMIT: u32 = 50;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let (command, config) = parse_args(AppConfig::from_env(), argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let db_url = normalize_sqlite_url(&config.db_url);
    prepare_sqlite_file(&db_url)?;
    let settings = TrackerSettings {
        auto_advance: config.auto_advance,
    };
    let services = AppServices::new_sqlite(&db_url, Clock::system(), settings).await?;
    tracing::debug!(%db_url, user_id = %config.user_id, ?command, "services ready");

    match command {
        Command::Quizzes => {
            let quizzes = services.catalog().list().await?;
            if quizzes.is_empty() {
                println!("No quizzes yet. Seed some with `cargo run -p storage --bin seed`.");
            }
            for quiz in quizzes {
                let limit = match quiz.time_limit_minutes {
                    0 => "untimed".to_string(),
                    minutes => format!("{minutes} min"),
                };
                println!(
                    "{:>4}  {}  ({} questions, {limit}, {} reveal)",
                    quiz.id, quiz.title, quiz.question_count, quiz.reveal_policy
                );
            }
        }
        Command::Take { quiz_id } => {
            let tracker = services.quiz_loop().open(quiz_id, config.user_id);
            take::run(tracker).await?;
        }
        Command::Restart { quiz_id } => {
            let mut tracker = services.quiz_loop().open(quiz_id, config.user_id);
            tracker.restart().await?;
            println!("Quiz {quiz_id} restarted for user {}.", config.user_id);
        }
        Command::Results { all } => {
            let history = services.history();
            let rows = if all {
                history.list_all(HISTORY_LIMIT).await?
            } else {
                history.list_for_user(config.user_id, HISTORY_LIMIT).await?
            };
            if rows.is_empty() {
                println!("No results yet.");
            }
            for row in rows {
                let user = if all {
                    format!("user {}  ", row.user_id)
                } else {
                    String::new()
                };
                println!(
                    "{}  {user}{}  {}/{} ({}%, {})  {}",
                    row.completed_at.format("%Y-%m-%d %H:%M"),
                    row.quiz_title,
                    row.score,
                    row.max_score,
                    row.percentage,
                    row.grade.label(),
                    row.id
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
