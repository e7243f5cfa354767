#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for quizwire-client integration tests.
//!
//! Provides a scripted HTTP [`MockTransport`] and helpers for building the
//! response bodies the game server sends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use quizwire_client::{HttpResponse, QuizError, Transport};
use serde_json::{json, Value};

// ── MockTransport ───────────────────────────────────────────────────

/// One request the client sent.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub url: String,
    pub cookie: Option<String>,
    pub body: Value,
}

impl SentRequest {
    pub fn channel(&self) -> &str {
        self.body["channel"].as_str().unwrap_or_default()
    }
}

pub type Sent = Arc<StdMutex<Vec<SentRequest>>>;

/// Replays scripted responses in order and records every request.
///
/// Once the script is exhausted every request is answered, after a short
/// delay, with an idle connect reply, like a server with nothing to say.
pub struct MockTransport {
    responses: VecDeque<Result<HttpResponse, QuizError>>,
    pub sent: Sent,
}

impl MockTransport {
    pub fn new(responses: Vec<Result<HttpResponse, QuizError>>) -> (Self, Sent) {
        let sent = Sent::default();
        let transport = Self {
            responses: VecDeque::from(responses),
            sent: Arc::clone(&sent),
        };
        (transport, sent)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, QuizError> {
        let cookie = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
            .map(|(_, value)| (*value).to_string());
        self.sent.lock().unwrap().push(SentRequest {
            url: url.to_string(),
            cookie,
            body: serde_json::from_str(&body).unwrap(),
        });

        match self.responses.pop_front() {
            Some(response) => response,
            None => {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok(idle_response())
            }
        }
    }
}

/// Channels of every recorded request, in order.
pub fn channels(sent: &Sent) -> Vec<String> {
    sent.lock()
        .unwrap()
        .iter()
        .map(|request| request.channel().to_string())
        .collect()
}

/// Number of recorded requests on `channel`.
pub fn count(sent: &Sent, channel: &str) -> usize {
    sent.lock()
        .unwrap()
        .iter()
        .filter(|request| request.channel() == channel)
        .count()
}

// ── Responses ───────────────────────────────────────────────────────

pub const CLIENT_ID: &str = "3k9xv0qz1j";
pub const COOKIE: &str = "BAYEUX_BROWSER=4bd1-x7q2";

pub fn handshake_response() -> Result<HttpResponse, QuizError> {
    Ok(HttpResponse::ok(
        json!([{
            "channel": "/meta/handshake",
            "successful": true,
            "version": "1.0",
            "clientId": CLIENT_ID,
        }])
        .to_string(),
    )
    .with_header("Set-Cookie", format!("{COOKIE}; Path=/; Secure; HttpOnly")))
}

pub fn ok_response() -> Result<HttpResponse, QuizError> {
    Ok(HttpResponse::ok(r#"[{"successful":true}]"#))
}

pub fn rejected_response() -> Result<HttpResponse, QuizError> {
    Ok(HttpResponse::ok(
        r#"[{"successful":false,"error":"402::Unknown client"}]"#,
    ))
}

pub fn transport_error() -> Result<HttpResponse, QuizError> {
    Err(QuizError::Transport("connection reset by peer".into()))
}

pub fn idle_response() -> HttpResponse {
    HttpResponse::ok(r#"[{"channel":"/meta/connect","successful":true}]"#)
}

/// Responses for handshake, unsubscribe, bootstrap connect and the three
/// subscriptions.
pub fn bootstrap_script() -> Vec<Result<HttpResponse, QuizError>> {
    vec![
        handshake_response(),
        ok_response(),
        ok_response(),
        ok_response(),
        ok_response(),
        ok_response(),
    ]
}

/// Bootstrap followed by an accepted login and login connect.
pub fn joined_script() -> Vec<Result<HttpResponse, QuizError>> {
    let mut script = bootstrap_script();
    script.push(ok_response());
    script.push(ok_response());
    script
}

/// A long-poll response carrying `content` the way the server encodes it:
/// a JSON document inside the `data.content` string of the first element.
pub fn push(content: &Value) -> Result<HttpResponse, QuizError> {
    Ok(HttpResponse::ok(
        json!([
            { "channel": "/service/player", "data": { "id": 2, "content": content.to_string() } },
            { "channel": "/meta/connect", "successful": true },
        ])
        .to_string(),
    ))
}

pub fn question(index: u32, answer_ids: &[i64]) -> Result<HttpResponse, QuizError> {
    let map: serde_json::Map<String, Value> = answer_ids
        .iter()
        .enumerate()
        .map(|(slot, id)| (slot.to_string(), json!(id)))
        .collect();
    push(&json!({ "questionIndex": index, "answerMap": map }))
}

pub fn upcoming_question(index: u32) -> Result<HttpResponse, QuizError> {
    push(&json!({
        "questionIndex": index,
        "answerMap": { "0": 0, "1": 1, "2": 2, "3": 3 },
        "timeLeft": 4000,
    }))
}

pub fn result(points: i64, total: i64, rank: u32, nemesis: Option<(&str, i64)>) -> Result<HttpResponse, QuizError> {
    let nemesis = nemesis.map_or(Value::Null, |(name, score)| {
        json!({ "name": name, "totalScore": score })
    });
    push(&json!({
        "isCorrect": points > 0,
        "points": points,
        "totalScore": total,
        "rank": rank,
        "nemesis": nemesis,
    }))
}

pub fn feedback(message: &str) -> Result<HttpResponse, QuizError> {
    push(&json!({ "primaryMessage": message }))
}

pub fn game_over(quiz_id: &str, player_count: u32) -> Result<HttpResponse, QuizError> {
    push(&json!({ "quizId": quiz_id, "playerCount": player_count }))
}

pub fn kick() -> Result<HttpResponse, QuizError> {
    push(&json!({ "kickCode": 1 }))
}
