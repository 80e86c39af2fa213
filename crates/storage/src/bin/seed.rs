use std::fmt;

use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerId, AnswerOption, Question, QuestionId, Quiz, QuizError, QuizId, RevealPolicy,
};
use storage::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:quiz.sqlite3?mode=rwc".into());
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, now })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:quiz.sqlite3?mode=rwc)");
    eprintln!("  --now <rfc3339>           Fixed creation time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL");
}

type Sample<'a> = (&'a str, &'a [(&'a str, &'a [(&'a str, bool)])]);

const PYTHON: Sample<'static> = (
    "Python programming",
    &[
        (
            "What is Python?",
            &[
                ("A programming language", true),
                ("A kind of snake", false),
                ("An operating system", false),
            ],
        ),
        (
            "Which type stores whole numbers in Python?",
            &[("int", true), ("float", false), ("str", false), ("bool", false)],
        ),
        (
            "Which function writes to the console?",
            &[
                ("print()", true),
                ("console.log()", false),
                ("write()", false),
                ("output()", false),
            ],
        ),
    ],
);

const JAVASCRIPT: Sample<'static> = (
    "JavaScript basics",
    &[
        (
            "Which operator compares both value and type?",
            &[("===", true), ("==", false), ("=", false), ("!=", false)],
        ),
        (
            "Which function writes to the console in JavaScript?",
            &[
                ("console.log()", true),
                ("print()", false),
                ("System.out.println()", false),
                ("echo", false),
            ],
        ),
        (
            "What does DOM stand for?",
            &[
                ("Document Object Model", true),
                ("Data Object Model", false),
                ("Document Orient Model", false),
                ("Digital Object Model", false),
            ],
        ),
    ],
);

const ALGORITHMS: Sample<'static> = (
    "Algorithms and data structures",
    &[
        (
            "Average lookup complexity of a hash table?",
            &[("O(1)", true), ("O(n)", false), ("O(log n)", false), ("O(n log n)", false)],
        ),
        (
            "Which sort is O(n^2) in the worst case?",
            &[
                ("Bubble sort", true),
                ("Merge sort", false),
                ("Heap sort", false),
                ("Radix sort", false),
            ],
        ),
        (
            "Which structure is LIFO?",
            &[("Stack", true), ("Queue", false), ("Linked list", false), ("Graph", false)],
        ),
    ],
);

/// Build a sample quiz with ids derived from its position so reseeding is idempotent.
fn build_sample(
    quiz_number: u64,
    sample: Sample<'_>,
    now: DateTime<Utc>,
) -> Result<Quiz, QuizError> {
    let (title, questions) = sample;
    let mut built = Vec::with_capacity(questions.len());
    for (q_pos, (text, answers)) in (1_u64..).zip(questions.iter()) {
        let question_id = quiz_number * 100 + q_pos;
        let options = (1_u64..)
            .zip(answers.iter())
            .map(|(a_pos, (answer, correct))| {
                AnswerOption::new(AnswerId::new(question_id * 10 + a_pos), *answer, *correct)
            })
            .collect();
        built.push(Question::new(QuestionId::new(question_id), *text, options)?);
    }
    Ok(Quiz::new(QuizId::new(quiz_number), title, built, now)?.with_author("admin"))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let quizzes = [
        build_sample(1, PYTHON, now)?,
        build_sample(2, JAVASCRIPT, now)?
            .with_time_limit(5)
            .with_reveal_policy(RevealPolicy::Deferred),
        build_sample(3, ALGORITHMS, now)?.with_time_limit(2),
    ];
    for quiz in &quizzes {
        storage.quizzes.upsert_quiz(quiz).await?;
    }

    println!("Seeded {} quizzes into {}", quizzes.len(), args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
