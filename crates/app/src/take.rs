use std::error::Error;

use quiz_core::model::{Grade, ScoreReport, SessionStatus, TickOutcome};
use services::{FinalizeOutcome, QuestionView, QuizSessionTracker, SessionError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

enum Choice {
    Answer(usize),
    Finish,
    Quit,
}

async fn prompt(input: &mut Input, options: usize) -> Result<Choice, Box<dyn Error>> {
    loop {
        println!("Pick 1-{options}, (f)inish or (q)uit:");
        let Some(line) = input.next_line().await? else {
            return Ok(Choice::Quit);
        };
        match line.trim() {
            "q" | "quit" => return Ok(Choice::Quit),
            "f" | "finish" => return Ok(Choice::Finish),
            raw => match raw.parse::<usize>() {
                Ok(n) if (1..=options).contains(&n) => return Ok(Choice::Answer(n - 1)),
                _ => println!("Not an option: {raw}"),
            },
        }
    }
}

/// `true` once the countdown has run out.
fn out_of_time(tracker: &mut QuizSessionTracker) -> Result<bool, SessionError> {
    if tracker.status().is_terminal() {
        return Ok(true);
    }
    if tracker.remaining_seconds().is_none() {
        return Ok(false);
    }
    Ok(!matches!(tracker.tick_now()?, TickOutcome::Running { .. }))
}

fn print_question(view: &QuestionView, remaining_seconds: Option<u64>) {
    println!();
    println!(
        "{} - question {}/{}",
        view.quiz_title,
        view.question_index + 1,
        view.total_questions
    );
    if let Some(seconds) = remaining_seconds {
        println!("Time left: {:02}:{:02}", seconds / 60, seconds % 60);
    }
    println!("{}", view.text);
    for (n, choice) in (1..).zip(&view.answers) {
        let chosen = view
            .prior
            .is_some_and(|prior| prior.answer_id == choice.id);
        let marker = if chosen { "*" } else { " " };
        println!("  {marker}{n}. {}", choice.text);
    }
}

fn print_report(report: &ScoreReport) {
    println!();
    for detail in report.details() {
        let mark = if detail.is_correct { "+" } else { "-" };
        println!(
            "{mark} {}. {}",
            detail.question_index + 1,
            detail.question_text
        );
        println!("    your answer: {}", detail.user_answer_text);
        if let Some(correct) = &detail.correct_answer_text {
            println!("    correct:     {correct}");
        }
    }
    let grade: Grade = report.grade();
    println!(
        "Score {}/{} ({}%), grade {} ({})",
        report.score(),
        report.max_score(),
        report.percentage(),
        grade.mark(),
        grade.label()
    );
}

async fn finish(tracker: &mut QuizSessionTracker, input: &mut Input) -> Result<(), Box<dyn Error>> {
    let mut outcome: FinalizeOutcome = tracker.finalize().await?;
    print_report(&outcome.report);

    while let Some(err) = outcome.save_error.take() {
        println!("Result not saved: {err}. Retry? [y/N]");
        let retry = input
            .next_line()
            .await?
            .is_some_and(|line| line.trim().eq_ignore_ascii_case("y"));
        if !retry {
            return Ok(());
        }
        outcome = tracker.finalize().await?;
    }
    if let Some(result_id) = outcome.result_id {
        println!("Saved as result {result_id}.");
    }
    Ok(())
}

/// Run one quiz interactively on stdin/stdout.
///
/// # Errors
///
/// Returns tracker or I/O failures; quitting midway keeps the stored session for later,
/// including a finished attempt whose result still has to be saved.
pub async fn run(mut tracker: QuizSessionTracker) -> Result<(), Box<dyn Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut index = 0;

    if tracker.resume().await? == SessionStatus::Completed {
        println!("This attempt is already finished but its result was not saved.");
        return finish(&mut tracker, &mut input).await;
    }

    loop {
        if out_of_time(&mut tracker)? {
            println!("Time is up.");
            return finish(&mut tracker, &mut input).await;
        }

        let view = tracker.load_question(index).await?;
        if out_of_time(&mut tracker)? {
            println!("Time is up.");
            return finish(&mut tracker, &mut input).await;
        }
        print_question(&view, tracker.remaining_seconds());

        if view.is_answered() {
            println!("Already answered.");
        } else {
            let choice = prompt(&mut input, view.answers.len()).await?;
            if out_of_time(&mut tracker)? {
                println!("Time is up; that answer came too late.");
                return finish(&mut tracker, &mut input).await;
            }
            match choice {
                Choice::Quit => {
                    println!("Progress kept; run `take` again to continue.");
                    return Ok(());
                }
                Choice::Finish => return finish(&mut tracker, &mut input).await,
                Choice::Answer(n) => {
                    let feedback = tracker.answer_current(view.answers[n].id).await?;
                    match feedback.is_correct {
                        Some(true) => println!("Correct."),
                        Some(false) => println!(
                            "Wrong. Correct answer: {}",
                            feedback.correct_answer_text.unwrap_or_default()
                        ),
                        None => println!("Answer recorded."),
                    }
                    if let Some(next) = feedback.next_index {
                        index = next;
                        continue;
                    }
                }
            }
        }

        match tracker.advance() {
            Ok(next) => index = next,
            Err(SessionError::SequenceExhausted { .. }) => {
                return finish(&mut tracker, &mut input).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
