//! Events emitted to the caller while a game is running.
//!
//! The poll loop sends one [`QuizEvent`] per meaningful server push on the
//! channel returned by [`QuizClient::start`](crate::QuizClient::start).
//! [`QuizEvent::Disconnected`] is always the last event.

use std::fmt;

use crate::protocol::ResultPayload;

/// Nemesis name reported when nobody is ranked above the player.
pub const NO_NEMESIS: &str = "no one";

/// Score and ranking after a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    /// Whether the submitted answer was correct.
    pub is_correct: bool,
    /// Points earned on this question.
    pub points: i64,
    /// Total score so far.
    pub total_score: i64,
    /// Current rank (1 = leader).
    pub rank: u32,
    /// The player ranked immediately above, or [`NO_NEMESIS`].
    pub nemesis_name: String,
    /// The nemesis' total score. For the leader this is the points of this
    /// question.
    pub nemesis_points: i64,
}

impl From<ResultPayload> for ScoreReport {
    fn from(payload: ResultPayload) -> Self {
        let (nemesis_name, nemesis_points) = match payload.nemesis {
            Some(nemesis) => (nemesis.name, nemesis.total_score),
            None => (NO_NEMESIS.to_string(), payload.points),
        };
        Self {
            is_correct: payload.is_correct,
            points: payload.points,
            total_score: payload.total_score,
            rank: payload.rank,
            nemesis_name,
            nemesis_points,
        }
    }
}

/// Why the poll loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The host removed the player.
    Kicked,
    /// The game finished.
    GameEnded,
    /// [`QuizClient::shutdown`](crate::QuizClient::shutdown) was called.
    Shutdown,
    /// The session was never activated (strict login rejected, or deactivated
    /// before the first poll).
    Inactive,
    /// Too many consecutive transport failures.
    TransportFailed(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Kicked => f.write_str("kicked from the game"),
            EndReason::GameEnded => f.write_str("game over"),
            EndReason::Shutdown => f.write_str("client shut down"),
            EndReason::Inactive => f.write_str("session not active"),
            EndReason::TransportFailed(reason) => write!(f, "transport failed: {reason}"),
        }
    }
}

/// An event from a running game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    /// Login completed and polling started.
    Joined {
        game_pin: u32,
        username: String,
    },
    /// A question is about to start.
    QuestionUpcoming,
    /// A question is live.
    ///
    /// In interactive mode the loop now waits for
    /// [`QuizClient::answer`](crate::QuizClient::answer).
    QuestionReady {
        /// 1-based question number.
        question_number: u32,
        /// Number of answers (2 to 4). Valid slots are `0..answer_count`.
        answer_count: usize,
    },
    /// An answer was sent to the server.
    AnswerSubmitted {
        question_number: u32,
        slot: usize,
        /// `false` when the server rejected the answer or the request failed.
        accepted: bool,
    },
    /// A free-form message from the game.
    Feedback { message: String },
    /// The result of the last question.
    QuestionResult(ScoreReport),
    /// The player was kicked. Followed by [`QuizEvent::Disconnected`].
    Kicked,
    /// The game finished. Followed by [`QuizEvent::Disconnected`].
    ///
    /// Either field is `None` when the server's message did not carry it.
    GameEnded {
        quiz_id: Option<String>,
        player_count: Option<u32>,
    },
    /// The session was disconnected. Always the last event.
    Disconnected { reason: EndReason },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::protocol::NemesisPayload;

    #[test]
    fn null_nemesis_reports_no_one_with_question_points() {
        let report = ScoreReport::from(ResultPayload {
            is_correct: true,
            points: 987,
            total_score: 3012,
            rank: 1,
            nemesis: None,
        });
        assert_eq!(report.nemesis_name, "no one");
        assert_eq!(report.nemesis_points, 987);
        assert_eq!(report.total_score, 3012);
    }

    #[test]
    fn nemesis_is_copied() {
        let report = ScoreReport::from(ResultPayload {
            is_correct: false,
            points: 0,
            total_score: 500,
            rank: 3,
            nemesis: Some(NemesisPayload {
                name: "carol".into(),
                total_score: 800,
            }),
        });
        assert!(!report.is_correct);
        assert_eq!(report.nemesis_name, "carol");
        assert_eq!(report.nemesis_points, 800);
        assert_eq!(report.rank, 3);
    }

    #[test]
    fn end_reason_display() {
        assert_eq!(EndReason::Shutdown.to_string(), "client shut down");
        assert_eq!(
            EndReason::TransportFailed("boom".into()).to_string(),
            "transport failed: boom"
        );
    }
}
