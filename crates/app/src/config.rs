use std::fmt;

use quiz_core::model::{QuizId, UserId};

pub const DEFAULT_DB_URL: &str = "sqlite:quiz.sqlite3";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingQuiz { command: &'static str },
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingQuiz { command } => write!(f, "{command} requires --quiz <id>"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quizzes,
    Take { quiz_id: QuizId },
    Restart { quiz_id: QuizId },
    Results { all: bool },
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub user_id: UserId,
    pub auto_advance: bool,
}

impl AppConfig {
    /// Defaults overridden by `QUIZ_*` environment variables.
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_url = lookup("QUIZ_DB_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.into());
        let user_id = lookup("QUIZ_USER_ID")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let auto_advance = lookup("QUIZ_AUTO_ADVANCE").is_some_and(|value| parse_flag(&value));
        Self {
            db_url,
            user_id,
            auto_advance,
        }
    }
}

/// Parse `<command> [options]` on top of an environment-derived config.
///
/// # Errors
///
/// Returns `ArgsError` for unknown commands, unknown flags or bad values.
pub fn parse_args(
    mut config: AppConfig,
    args: impl IntoIterator<Item = String>,
) -> Result<(Command, AppConfig), ArgsError> {
    let mut args = args.into_iter();
    let name = args.next().unwrap_or_else(|| "quizzes".into());

    let mut quiz_id: Option<QuizId> = None;
    let mut all = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                config.db_url = value;
            }
            "--user" => {
                let value = require_value(&mut args, "--user")?;
                config.user_id = UserId::new(parse_id("--user", value)?);
            }
            "--quiz" => {
                let value = require_value(&mut args, "--quiz")?;
                quiz_id = Some(QuizId::new(parse_id("--quiz", value)?));
            }
            "--auto-advance" => config.auto_advance = true,
            "--all" => all = true,
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    let command = match name.as_str() {
        "quizzes" => Command::Quizzes,
        "take" => Command::Take {
            quiz_id: quiz_id.ok_or(ArgsError::MissingQuiz { command: "take" })?,
        },
        "restart" => Command::Restart {
            quiz_id: quiz_id.ok_or(ArgsError::MissingQuiz { command: "restart" })?,
        },
        "results" => Command::Results { all },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };
    Ok((command, config))
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quizzes                 [options]");
    eprintln!("  cargo run -p app -- take    --quiz <id>     [options]");
    eprintln!("  cargo run -p app -- restart --quiz <id>     [options]");
    eprintln!("  cargo run -p app -- results [--all]         [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --user <id>           Acting user id (default: 1)");
    eprintln!("  --auto-advance        Jump to the next question after answering");
    eprintln!();
    eprintln!("Environment (same as flags, also read from .env):");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_AUTO_ADVANCE, RUST_LOG");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    fn defaults() -> AppConfig {
        AppConfig::from_lookup(|_| None)
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let config = AppConfig::from_lookup(|key| match key {
            "QUIZ_DB_URL" => Some("sqlite:other.sqlite3".into()),
            "QUIZ_USER_ID" => Some("42".into()),
            "QUIZ_AUTO_ADVANCE" => Some("true".into()),
            _ => None,
        });
        assert_eq!(config.db_url, "sqlite:other.sqlite3");
        assert_eq!(config.user_id, UserId::new(42));
        assert!(config.auto_advance);

        let fallback = AppConfig::from_lookup(|key| (key == "QUIZ_USER_ID").then(|| "abc".into()));
        assert_eq!(fallback.user_id, UserId::new(1));
        assert_eq!(fallback.db_url, DEFAULT_DB_URL);
    }

    #[test]
    fn flags_override_environment() {
        let (command, config) = parse_args(
            defaults(),
            args(&["take", "--quiz", "3", "--user", "9", "--auto-advance"]),
        )
        .unwrap();
        assert_eq!(
            command,
            Command::Take {
                quiz_id: QuizId::new(3)
            }
        );
        assert_eq!(config.user_id, UserId::new(9));
        assert!(config.auto_advance);
    }

    #[test]
    fn no_arguments_lists_quizzes() {
        let (command, _) = parse_args(defaults(), Vec::new()).unwrap();
        assert_eq!(command, Command::Quizzes);
    }

    #[test]
    fn invalid_input_is_reported() {
        assert!(matches!(
            parse_args(defaults(), args(&["take"])),
            Err(ArgsError::MissingQuiz { command: "take" })
        ));
        assert!(matches!(
            parse_args(defaults(), args(&["results", "--quiz"])),
            Err(ArgsError::MissingValue { flag: "--quiz" })
        ));
        assert!(matches!(
            parse_args(defaults(), args(&["results", "--user", "x"])),
            Err(ArgsError::InvalidId { flag: "--user", .. })
        ));
        assert!(matches!(
            parse_args(defaults(), args(&["grade"])),
            Err(ArgsError::UnknownCommand(_))
        ));
    }
}
