//! # Interactive Example
//!
//! Joins a quiz game and reads every answer from standard input: type the
//! answer number (1 to 4) and press Enter when a question is shown.
//!
//! ## Running
//!
//! ```sh
//! QUIZ_PIN=123456 QUIZ_TOKEN=<decoded token> QUIZ_NAME=Ana cargo run --example interactive
//! ```

use quizwire_client::{
    PlayMode, QuizClient, QuizConfig, QuizEvent, ReqwestTransport, ResolvedSession,
    StaticTokenResolver,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_NAME: &str = "RustPlayer";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let pin: u32 = std::env::var("QUIZ_PIN")?.parse()?;
    let token = std::env::var("QUIZ_TOKEN")?;
    let name = std::env::var("QUIZ_NAME").unwrap_or_else(|_| DEFAULT_NAME.to_string());

    let resolver = StaticTokenResolver::new(pin, ResolvedSession::new(token));
    let config = QuizConfig::new(pin, name).with_mode(PlayMode::Interactive);
    let (mut client, mut events) =
        QuizClient::start(ReqwestTransport::new()?, &resolver, config).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    QuizEvent::Joined { .. } => println!("You're in! Waiting for the first question."),
                    QuizEvent::QuestionReady { question_number, answer_count } => {
                        println!("Question {question_number}: answer 1-{answer_count}");
                    }
                    QuizEvent::AnswerSubmitted { accepted: false, .. } => {
                        println!("The server did not take that answer.");
                    }
                    QuizEvent::Feedback { message } => println!("{message}"),
                    QuizEvent::QuestionResult(report) => {
                        println!(
                            "{} {} points. Total {}, rank {}. Next up: {} ({}).",
                            if report.is_correct { "Correct!" } else { "Wrong." },
                            report.points,
                            report.total_score,
                            report.rank,
                            report.nemesis_name,
                            report.nemesis_points,
                        );
                    }
                    QuizEvent::Disconnected { reason } => {
                        println!("Left the game: {reason}");
                        break;
                    }
                    _ => {}
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else {
                    client.shutdown().await;
                    break;
                };
                match line.trim().parse::<usize>() {
                    Ok(choice) if choice >= 1 => {
                        if let Err(e) = client.answer(choice - 1).await {
                            println!("{e}");
                        }
                    }
                    _ => println!("Type the answer number, e.g. 1"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                client.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
