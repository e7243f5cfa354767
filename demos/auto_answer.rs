//! # Auto-answer Example
//!
//! Joins a quiz game and answers every question at random until the game
//! ends, the host kicks the player, or Ctrl+C is pressed.
//!
//! The session token for the game pin must be obtained beforehand.
//!
//! ## Running
//!
//! ```sh
//! QUIZ_PIN=123456 QUIZ_TOKEN=<decoded token> cargo run --example auto_answer
//!
//! # Pick a name and see every request:
//! QUIZ_NAME=Robo RUST_LOG=quizwire_client=debug cargo run --example auto_answer
//! ```

use quizwire_client::{
    PlayMode, QuizClient, QuizConfig, QuizEvent, ReqwestTransport, ResolvedSession,
    StaticTokenResolver,
};

/// Default player name when `QUIZ_NAME` is not set.
const DEFAULT_NAME: &str = "RustPlayer";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let pin: u32 = std::env::var("QUIZ_PIN")?.parse()?;
    let token = std::env::var("QUIZ_TOKEN")?;
    let name = std::env::var("QUIZ_NAME").unwrap_or_else(|_| DEFAULT_NAME.to_string());

    let resolver = StaticTokenResolver::new(pin, ResolvedSession::new(token));
    let config = QuizConfig::new(pin, name).with_mode(PlayMode::AutoAnswer);

    // ── Join ────────────────────────────────────────────────────────
    let transport = ReqwestTransport::new()?;
    let (mut client, mut events) = QuizClient::start(transport, &resolver, config).await?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    QuizEvent::Joined { game_pin, username } => {
                        tracing::info!("Joined game {game_pin} as {username}");
                    }
                    QuizEvent::QuestionUpcoming => tracing::info!("Get ready…"),
                    QuizEvent::QuestionReady { question_number, answer_count } => {
                        tracing::info!("Question {question_number} ({answer_count} answers)");
                    }
                    QuizEvent::AnswerSubmitted { slot, accepted, .. } => {
                        tracing::info!("Answered {slot} (accepted: {accepted})");
                    }
                    QuizEvent::Feedback { message } => tracing::info!("{message}"),
                    QuizEvent::QuestionResult(report) => {
                        tracing::info!(
                            "{} +{} points, total {}, rank {}, behind {} ({})",
                            if report.is_correct { "Correct!" } else { "Wrong." },
                            report.points,
                            report.total_score,
                            report.rank,
                            report.nemesis_name,
                            report.nemesis_points,
                        );
                    }
                    QuizEvent::Kicked => tracing::warn!("Kicked by the host"),
                    QuizEvent::GameEnded { player_count: Some(players), .. } => {
                        tracing::info!("Game over ({players} players)");
                    }
                    QuizEvent::GameEnded { .. } => tracing::info!("Game over"),
                    QuizEvent::Disconnected { reason } => {
                        tracing::info!("Disconnected: {reason}");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, leaving the game");
                client.shutdown().await;
                break;
            }
        }
    }

    Ok(())
}
