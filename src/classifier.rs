//! Classification of long-poll responses.
//!
//! The game server multiplexes every push type onto the same long-poll
//! response without a type discriminator. A push is recognized by the marker
//! keys its content carries, tested against the raw response text in a fixed
//! precedence order (see [`RULES`]). Order matters: a live question and its
//! countdown both mention `answerMap`, and only the absence of `timeLeft`
//! tells them apart.

use crate::error::{QuizError, Result};
use crate::protocol::{
    decode_content, FeedbackPayload, GameEndPayload, QuestionPayload, ResponseEnvelope,
    ResultPayload,
};

/// The kind of a server push, before its payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    /// The player was removed from the game.
    Kicked,
    /// A question is live and accepts answers now.
    QuestionReady,
    /// A question is about to start (countdown).
    QuestionUpcoming,
    /// A free-form message for the player.
    Feedback,
    /// The outcome of the last question.
    QuestionResult,
    /// The game is over.
    GameEnded,
    /// An ordinary keep-alive connect response.
    Idle,
}

/// A classification rule: `kind` applies when `matches` holds for the raw text.
pub struct Rule {
    pub kind: PushKind,
    pub matches: fn(&str) -> bool,
}

/// Classification rules, evaluated top to bottom. The first match wins;
/// nothing matching means [`PushKind::Idle`].
pub const RULES: &[Rule] = &[
    Rule {
        kind: PushKind::Kicked,
        matches: is_kick,
    },
    Rule {
        kind: PushKind::QuestionReady,
        matches: is_live_question,
    },
    Rule {
        kind: PushKind::QuestionUpcoming,
        matches: has_answer_map,
    },
    Rule {
        kind: PushKind::Feedback,
        matches: is_feedback,
    },
    Rule {
        kind: PushKind::QuestionResult,
        matches: is_result,
    },
    Rule {
        kind: PushKind::GameEnded,
        matches: is_game_end,
    },
];

fn is_kick(raw: &str) -> bool {
    raw.contains("kick")
}

fn is_live_question(raw: &str) -> bool {
    has_answer_map(raw) && !raw.contains("timeLeft")
}

fn has_answer_map(raw: &str) -> bool {
    raw.contains("answerMap")
}

fn is_feedback(raw: &str) -> bool {
    raw.contains("primaryMessage")
}

fn is_result(raw: &str) -> bool {
    raw.contains("isCorrect")
}

fn is_game_end(raw: &str) -> bool {
    raw.contains("quizId")
}

/// Determine the kind of a raw response without decoding anything.
pub fn classify_kind(raw: &str) -> PushKind {
    RULES
        .iter()
        .find(|rule| (rule.matches)(raw))
        .map_or(PushKind::Idle, |rule| rule.kind)
}

/// A classified server push with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPush {
    Kicked,
    QuestionReady(QuestionPayload),
    QuestionUpcoming,
    Feedback(FeedbackPayload),
    QuestionResult(ResultPayload),
    /// The payload is `None` when the content could not be decoded; the
    /// marker alone ends the game.
    GameEnded(Option<GameEndPayload>),
    Idle,
}

impl ServerPush {
    /// The kind of this push.
    pub fn kind(&self) -> PushKind {
        match self {
            ServerPush::Kicked => PushKind::Kicked,
            ServerPush::QuestionReady(_) => PushKind::QuestionReady,
            ServerPush::QuestionUpcoming => PushKind::QuestionUpcoming,
            ServerPush::Feedback(_) => PushKind::Feedback,
            ServerPush::QuestionResult(_) => PushKind::QuestionResult,
            ServerPush::GameEnded(_) => PushKind::GameEnded,
            ServerPush::Idle => PushKind::Idle,
        }
    }
}

/// Classify a raw long-poll response body and decode its payload.
///
/// Payload-carrying pushes read the string-encoded `data.content` of the
/// first array element (see [`decode_content`]).
///
/// # Errors
///
/// Returns [`QuizError::Protocol`] when a question, feedback or result push
/// has no decodable content. Kicks and game ends are terminal on their marker
/// alone and never fail.
pub fn classify(raw: &str) -> Result<ServerPush> {
    let push = match classify_kind(raw) {
        PushKind::Kicked => ServerPush::Kicked,
        PushKind::QuestionUpcoming => ServerPush::QuestionUpcoming,
        PushKind::Idle => ServerPush::Idle,
        PushKind::QuestionReady => ServerPush::QuestionReady(first_content(raw)?),
        PushKind::Feedback => ServerPush::Feedback(first_content(raw)?),
        PushKind::QuestionResult => ServerPush::QuestionResult(first_content(raw)?),
        PushKind::GameEnded => ServerPush::GameEnded(first_content(raw).ok()),
    };
    Ok(push)
}

fn first_content<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    let envelope = ResponseEnvelope::parse(raw)?;
    let content = envelope
        .first()
        .and_then(|message| message.content())
        .ok_or_else(|| QuizError::Protocol("first message carries no data.content".into()))?;
    decode_content(content)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    /// Wrap a content document the way the server does: a JSON string inside
    /// `data.content` of the first element, followed by a connect reply.
    fn push(content: &serde_json::Value) -> String {
        serde_json::json!([
            { "channel": "/service/player", "data": { "content": content.to_string() } },
            { "channel": "/meta/connect", "successful": true },
        ])
        .to_string()
    }

    #[test]
    fn precedence_order() {
        assert_eq!(classify_kind(r#"[{"kickCode":1,"answerMap":{}}]"#), PushKind::Kicked);
        assert_eq!(classify_kind(r#"answerMap"#), PushKind::QuestionReady);
        assert_eq!(classify_kind(r#"answerMap timeLeft"#), PushKind::QuestionUpcoming);
        assert_eq!(
            classify_kind(r#"primaryMessage isCorrect quizId"#),
            PushKind::Feedback
        );
        assert_eq!(classify_kind(r#"isCorrect quizId"#), PushKind::QuestionResult);
        assert_eq!(classify_kind(r#"quizId"#), PushKind::GameEnded);
        assert_eq!(
            classify_kind(r#"[{"channel":"/meta/connect","successful":true}]"#),
            PushKind::Idle
        );
    }

    #[test]
    fn answer_map_without_time_left_is_never_upcoming() {
        let bodies = [
            r#"answerMap"#,
            r#"[{"data":{"content":"{\"answerMap\":{}}"}}]"#,
            r#"answerMap isCorrect quizId primaryMessage"#,
            r#"timeleft answerMap"#,
        ];
        for body in bodies {
            assert_eq!(classify_kind(body), PushKind::QuestionReady, "{body}");
        }
    }

    #[test]
    fn question_ready_scenario() {
        let raw = r#"[{"data":{"content":"{\"questionIndex\":2,\"answerMap\":{\"0\":\"5\",\"1\":\"9\"}}"}}]"#;
        let push = classify(raw).unwrap();
        let ServerPush::QuestionReady(question) = &push else {
            panic!("expected QuestionReady, got {push:?}");
        };
        assert_eq!(question.question_index, 2);
        assert_eq!(question.answer_map.len(), 2);
        assert_eq!(question.answer_map.answer_id(1), Some(9));
    }

    #[test]
    fn double_escaped_content_is_decoded() {
        // After JSON decoding the content still holds `\"` sequences.
        let raw = r#"[{"data":{"content":"{\\\"questionIndex\\\":0,\\\"answerMap\\\":{\\\"0\\\":1,\\\"1\\\":2,\\\"2\\\":3}}"}}]"#;
        let push = classify(raw).unwrap();
        let ServerPush::QuestionReady(question) = &push else {
            panic!("expected QuestionReady, got {push:?}");
        };
        assert_eq!(question.question_index, 0);
        assert_eq!(question.answer_map.len(), 3);
    }

    #[test]
    fn upcoming_question_has_no_payload() {
        let raw = push(&serde_json::json!({
            "questionIndex": 0, "answerMap": {"0": 0, "1": 1}, "timeLeft": 5000
        }));
        assert_eq!(classify(&raw).unwrap(), ServerPush::QuestionUpcoming);
    }

    #[test]
    fn result_with_null_nemesis() {
        let raw = push(&serde_json::json!({
            "isCorrect": true, "points": 950, "totalScore": 2900, "rank": 1, "nemesis": null
        }));
        let ServerPush::QuestionResult(result) = classify(&raw).unwrap() else {
            panic!("expected QuestionResult");
        };
        assert!(result.is_correct);
        assert_eq!(result.points, 950);
        assert_eq!(result.total_score, 2900);
        assert_eq!(result.rank, 1);
        assert!(result.nemesis.is_none());
    }

    #[test]
    fn feedback_and_game_end() {
        let raw = push(&serde_json::json!({ "primaryMessage": "Get ready!" }));
        assert_eq!(
            classify(&raw).unwrap(),
            ServerPush::Feedback(FeedbackPayload {
                primary_message: "Get ready!".into()
            })
        );

        let raw = push(&serde_json::json!({ "quizId": "abc-123", "playerCount": 17 }));
        assert_eq!(
            classify(&raw).unwrap(),
            ServerPush::GameEnded(Some(GameEndPayload {
                quiz_id: "abc-123".into(),
                player_count: Some(17)
            }))
        );
    }

    #[test]
    fn game_end_marker_survives_an_incomplete_payload() {
        let raw = push(&serde_json::json!({ "quizId": "q-1" }));
        assert_eq!(
            classify(&raw).unwrap(),
            ServerPush::GameEnded(Some(GameEndPayload {
                quiz_id: "q-1".into(),
                player_count: None
            }))
        );

        let raw = r#"[{"data":{"content":"{\"quizId\": "}}]"#;
        assert_eq!(classify(raw).unwrap(), ServerPush::GameEnded(None));
        assert_eq!(classify("quizId <not json>").unwrap(), ServerPush::GameEnded(None));
    }

    #[test]
    fn kick_needs_no_valid_json() {
        assert_eq!(classify("kicked!!! <not json>").unwrap(), ServerPush::Kicked);
    }

    #[test]
    fn malformed_payload_is_a_protocol_error() {
        // Marker present but the body is not an array.
        assert!(matches!(classify("answerMap"), Err(QuizError::Protocol(_))));
        // Marker present but no data.content on the first element.
        assert!(matches!(
            classify(r#"[{"channel":"/meta/connect","answerMap":1}]"#),
            Err(QuizError::Protocol(_))
        ));
        // Content present but missing required fields.
        let raw = push(&serde_json::json!({ "isCorrect": true }));
        assert!(matches!(classify(&raw), Err(QuizError::Protocol(_))));
    }

    #[test]
    fn kind_of_decoded_push_matches_raw_kind() {
        let raw = push(&serde_json::json!({ "quizId": "q", "playerCount": 2 }));
        assert_eq!(classify(&raw).unwrap().kind(), classify_kind(&raw));
        assert_eq!(classify("[]").unwrap().kind(), PushKind::Idle);
    }
}
