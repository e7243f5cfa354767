//! Wire types for the quiz Bayeux/CometD protocol.
//!
//! Every request type here serializes to exactly the JSON the game server
//! expects. A few quirks are reproduced on purpose:
//!
//! - The handshake carries `advice` and `supportedConnectionTypes` as JSON
//!   documents *encoded as strings*, not as nested objects.
//! - Controller payloads (`data.content`) are JSON documents encoded as
//!   strings. The server escapes the quotes inside them, so
//!   [`decode_content`] strips every backslash before parsing.
//! - Responses are always a JSON array; whether the first or the last element
//!   carries the relevant `successful` flag depends on the [`Stage`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{QuizError, Result};
use crate::stage::Stage;

// ── Channels ────────────────────────────────────────────────────────

/// `/meta/handshake`
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// `/meta/connect`
pub const META_CONNECT: &str = "/meta/connect";
/// `/meta/subscribe`
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// `/meta/unsubscribe`
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";
/// `/meta/disconnect`
pub const META_DISCONNECT: &str = "/meta/disconnect";

/// Protocol version announced in the handshake.
pub const BAYEUX_VERSION: &str = "1.0";
/// The only connection type this client supports.
pub const CONNECTION_TYPE_LONG_POLLING: &str = "long-polling";
/// Long-poll timeout advertised to the server, in milliseconds.
pub const ADVICE_TIMEOUT_MS: u64 = 60_000;
/// Reconnect interval advertised to the server, in milliseconds.
pub const ADVICE_INTERVAL_MS: u64 = 0;

/// The service channels a player subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// `/service/status`
    #[serde(rename = "/service/status")]
    Status,
    /// `/service/player`
    #[serde(rename = "/service/player")]
    Player,
    /// `/service/controller`, also used to publish login and answers.
    #[serde(rename = "/service/controller")]
    Controller,
}

impl Channel {
    /// Subscription order used during bootstrap.
    pub const SUBSCRIPTIONS: [Channel; 3] = [Channel::Status, Channel::Player, Channel::Controller];

    /// Returns the channel path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Status => "/service/status",
            Channel::Player => "/service/player",
            Channel::Controller => "/service/controller",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Endpoints ───────────────────────────────────────────────────────

/// URL suffix appended to `{base}/cometd/{pin}/{token}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// No suffix: subscriptions and controller messages.
    Base,
    /// `/handshake`
    Handshake,
    /// `/connect`
    Connect,
    /// `/disconnect`
    Disconnect,
}

impl Endpoint {
    /// Build the request URL for this endpoint.
    pub fn url(&self, base_url: &str, game_pin: u32, token: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Endpoint::Base => format!("{base}/cometd/{game_pin}/{token}"),
            Endpoint::Handshake => format!("{base}/cometd/{game_pin}/{token}/handshake"),
            Endpoint::Connect => format!("{base}/cometd/{game_pin}/{token}/connect"),
            Endpoint::Disconnect => format!("{base}/cometd/{game_pin}/{token}/disconnect"),
        }
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Long-poll advice sent during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub timeout: u64,
    pub interval: u64,
}

impl Default for Advice {
    fn default() -> Self {
        Self {
            timeout: ADVICE_TIMEOUT_MS,
            interval: ADVICE_INTERVAL_MS,
        }
    }
}

/// `/meta/handshake` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    /// JSON-encoded [`Advice`].
    pub advice: String,
    pub version: String,
    pub minimum_version: String,
    pub channel: String,
    /// JSON-encoded array of connection types.
    pub supported_connection_types: String,
}

impl HandshakeRequest {
    /// Build the handshake with the default advice and `long-polling` only.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Serialization`] if an embedded document cannot be
    /// encoded.
    pub fn new() -> Result<Self> {
        Ok(Self {
            advice: serde_json::to_string(&Advice::default())?,
            version: BAYEUX_VERSION.to_string(),
            minimum_version: BAYEUX_VERSION.to_string(),
            channel: META_HANDSHAKE.to_string(),
            supported_connection_types: serde_json::to_string(&[CONNECTION_TYPE_LONG_POLLING])?,
        })
    }
}

/// `/meta/subscribe` and `/meta/unsubscribe` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub channel: String,
    pub client_id: String,
    pub subscription: Channel,
}

impl SubscriptionRequest {
    pub fn subscribe(client_id: &str, subscription: Channel) -> Self {
        Self {
            channel: META_SUBSCRIBE.to_string(),
            client_id: client_id.to_string(),
            subscription,
        }
    }

    pub fn unsubscribe(client_id: &str, subscription: Channel) -> Self {
        Self {
            channel: META_UNSUBSCRIBE.to_string(),
            client_id: client_id.to_string(),
            subscription,
        }
    }
}

/// `/meta/connect` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub channel: String,
    pub client_id: String,
    pub connection_type: String,
}

impl ConnectRequest {
    pub fn new(client_id: &str) -> Self {
        Self {
            channel: META_CONNECT.to_string(),
            client_id: client_id.to_string(),
            connection_type: CONNECTION_TYPE_LONG_POLLING.to_string(),
        }
    }
}

/// `/meta/disconnect` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub channel: String,
    pub client_id: String,
}

impl DisconnectRequest {
    pub fn new(client_id: &str) -> Self {
        Self {
            channel: META_DISCONNECT.to_string(),
            client_id: client_id.to_string(),
        }
    }
}

/// A message published on `/service/controller`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRequest {
    pub channel: Channel,
    pub client_id: String,
    pub data: ControllerData,
}

impl ControllerRequest {
    pub fn new(client_id: &str, data: ControllerData) -> Self {
        Self {
            channel: Channel::Controller,
            client_id: client_id.to_string(),
            data,
        }
    }
}

/// Payload of a [`ControllerRequest`], tagged by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerData {
    /// Join the game under a nickname.
    #[serde(rename = "login")]
    Login {
        gameid: u32,
        host: String,
        name: String,
    },
    /// A game message; `content` is a JSON document encoded as a string.
    #[serde(rename = "message")]
    Message {
        id: u32,
        gameid: u32,
        host: String,
        content: String,
    },
}

/// `data.id` of an answer message.
pub const ANSWER_MESSAGE_ID: u32 = 6;

/// Inner content of an answer message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerContent {
    /// The server-side answer identifier taken from the question's answer map.
    pub choice: i64,
    pub meta: AnswerMeta,
}

/// Client metadata attached to every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMeta {
    /// Reported input lag in milliseconds.
    pub lag: u32,
    pub device: DeviceInfo,
}

/// Device description attached to every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen: ScreenSize,
}

/// Reported screen dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Build the full answer envelope for `choice`.
///
/// # Errors
///
/// Returns [`QuizError::Serialization`] if the inner content cannot be encoded.
pub fn answer_request(
    client_id: &str,
    game_pin: u32,
    host: &str,
    choice: i64,
    meta: &AnswerMeta,
) -> Result<ControllerRequest> {
    let content = serde_json::to_string(&AnswerContent {
        choice,
        meta: meta.clone(),
    })?;
    Ok(ControllerRequest::new(
        client_id,
        ControllerData::Message {
            id: ANSWER_MESSAGE_ID,
            gameid: game_pin,
            host: host.to_string(),
            content,
        },
    ))
}

// ── Responses ───────────────────────────────────────────────────────

/// One element of a response array. Every field is optional because the
/// server mixes meta replies and service pushes in the same array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BayeuxMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl BayeuxMessage {
    /// The string-encoded `data.content` document, if present.
    pub fn content(&self) -> Option<&str> {
        self.data.as_ref()?.get("content")?.as_str()
    }
}

/// A decoded response: the raw body plus its parsed array.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    body: String,
    messages: Vec<BayeuxMessage>,
}

impl ResponseEnvelope {
    /// Parse a response body.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] if the body is not a non-empty JSON
    /// array of objects.
    pub fn parse(body: impl Into<String>) -> Result<Self> {
        let body = body.into();
        let messages: Vec<BayeuxMessage> = serde_json::from_str(&body)
            .map_err(|e| QuizError::Protocol(format!("response is not a message array: {e}")))?;
        if messages.is_empty() {
            return Err(QuizError::Protocol("response array is empty".into()));
        }
        Ok(Self { body, messages })
    }

    /// The raw response text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// All elements of the response array.
    pub fn messages(&self) -> &[BayeuxMessage] {
        &self.messages
    }

    /// The first element.
    pub fn first(&self) -> Option<&BayeuxMessage> {
        self.messages.first()
    }

    /// The last element.
    pub fn last(&self) -> Option<&BayeuxMessage> {
        self.messages.last()
    }

    /// The `successful` flag relevant to `stage`. A missing flag counts as
    /// a rejection.
    pub fn successful(&self, stage: Stage) -> bool {
        let element = if stage.reads_last_element() {
            self.last()
        } else {
            self.first()
        };
        element.and_then(|m| m.successful).unwrap_or(false)
    }

    /// Turn a reported failure into [`QuizError::ServerRejected`].
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::ServerRejected`] when [`successful`](Self::successful)
    /// is `false` for `stage`.
    pub fn ensure_successful(&self, stage: Stage) -> Result<()> {
        if self.successful(stage) {
            Ok(())
        } else {
            Err(QuizError::ServerRejected {
                stage,
                body: self.body.clone(),
            })
        }
    }
}

// ── Nested content ──────────────────────────────────────────────────

/// Decode a string-encoded `content` document.
///
/// The server inserts backslashes before structural characters inside the
/// string, so every backslash is removed before parsing. Content values never
/// legitimately contain backslashes.
///
/// # Errors
///
/// Returns [`QuizError::Protocol`] if the unescaped text is not valid JSON
/// for `T`.
pub fn decode_content<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let unescaped: String = raw.chars().filter(|c| *c != '\\').collect();
    serde_json::from_str(&unescaped)
        .map_err(|e| QuizError::Protocol(format!("malformed content payload: {e}")))
}

/// Server-side answer identifiers keyed by displayed slot (`"0"`..`"3"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, serde_json::Value>);

impl AnswerMap {
    /// Number of answers the question offers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the question offers no answers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The server-side identifier for displayed slot `slot`.
    ///
    /// Identifiers arrive either as JSON numbers or as numeric strings.
    pub fn answer_id(&self, slot: usize) -> Option<i64> {
        match self.0.get(&slot.to_string())? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromIterator<(usize, i64)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (usize, i64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(slot, id)| (slot.to_string(), serde_json::Value::from(id)))
                .collect(),
        )
    }
}

/// `content` of a live question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question_index: u32,
    pub answer_map: AnswerMap,
}

/// `content` of a per-question result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub is_correct: bool,
    pub points: i64,
    pub total_score: i64,
    pub rank: u32,
    #[serde(default)]
    pub nemesis: Option<NemesisPayload>,
}

/// The player ranked immediately above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NemesisPayload {
    pub name: String,
    pub total_score: i64,
}

/// `content` of a free-form feedback message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    pub primary_message: String,
}

/// `content` of the end-of-game message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPayload {
    pub quiz_id: String,
    #[serde(default)]
    pub player_count: Option<u32>,
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

    #[test]
    fn endpoint_urls() {
        let base = "https://kahoot.it/";
        assert_eq!(
            Endpoint::Base.url(base, 123456, "tok"),
            "https://kahoot.it/cometd/123456/tok"
        );
        assert_eq!(
            Endpoint::Handshake.url(base, 123456, "tok"),
            "https://kahoot.it/cometd/123456/tok/handshake"
        );
        assert_eq!(
            Endpoint::Connect.url(base, 1, "t"),
            "https://kahoot.it/cometd/1/t/connect"
        );
        assert_eq!(
            Endpoint::Disconnect.url("http://localhost:8080", 1, "t"),
            "http://localhost:8080/cometd/1/t/disconnect"
        );
    }

    #[test]
    fn handshake_embeds_documents_as_strings() {
        let json = serde_json::to_value(HandshakeRequest::new().unwrap()).unwrap();
        assert_eq!(json["channel"], "/meta/handshake");
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["minimumVersion"], "1.0");
        assert_eq!(json["advice"], r#"{"timeout":60000,"interval":0}"#);
        assert_eq!(json["supportedConnectionTypes"], r#"["long-polling"]"#);
    }

    #[test]
    fn subscription_request_shape() {
        let json =
            serde_json::to_value(SubscriptionRequest::subscribe("cid", Channel::Player)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channel": "/meta/subscribe",
                "clientId": "cid",
                "subscription": "/service/player",
            })
        );
        let json =
            serde_json::to_value(SubscriptionRequest::unsubscribe("cid", Channel::Controller))
                .unwrap();
        assert_eq!(json["channel"], "/meta/unsubscribe");
        assert_eq!(json["subscription"], "/service/controller");
    }

    #[test]
    fn connect_and_disconnect_shapes() {
        let json = serde_json::to_value(ConnectRequest::new("cid")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channel": "/meta/connect",
                "clientId": "cid",
                "connectionType": "long-polling",
            })
        );
        let json = serde_json::to_value(DisconnectRequest::new("cid")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "channel": "/meta/disconnect", "clientId": "cid" })
        );
    }

    #[test]
    fn login_request_shape() {
        let request = ControllerRequest::new(
            "cid",
            ControllerData::Login {
                gameid: 42,
                host: "kahoot.it".into(),
                name: "alice".into(),
            },
        );
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channel": "/service/controller",
                "clientId": "cid",
                "data": {
                    "type": "login",
                    "gameid": 42,
                    "host": "kahoot.it",
                    "name": "alice",
                },
            })
        );
    }

    fn sample_meta() -> AnswerMeta {
        AnswerMeta {
            lag: 22,
            device: DeviceInfo {
                user_agent: "agent/1.0".into(),
                screen: ScreenSize {
                    width: 1337,
                    height: 1337,
                },
            },
        }
    }

    #[test]
    fn answer_request_nests_content_as_string() {
        let request = answer_request("cid", 42, "kahoot.it", 7, &sample_meta()).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["channel"], "/service/controller");
        assert_eq!(json["data"]["id"], 6);
        assert_eq!(json["data"]["type"], "message");
        assert_eq!(json["data"]["gameid"], 42);
        assert_eq!(json["data"]["host"], "kahoot.it");

        let content = json["data"]["content"].as_str().unwrap();
        let inner: serde_json::Value = serde_json::from_str(content).unwrap();
        assert_eq!(inner["choice"], 7);
        assert_eq!(inner["meta"]["lag"], 22);
        assert_eq!(inner["meta"]["device"]["userAgent"], "agent/1.0");
        assert_eq!(inner["meta"]["device"]["screen"]["width"], 1337);
        assert_eq!(inner["meta"]["device"]["screen"]["height"], 1337);
    }

    #[test]
    fn decode_content_strips_backslashes() {
        let raw = r#"{\"questionIndex\":2,\"answerMap\":{\"0\":\"5\",\"1\":\"9\"}}"#;
        let payload: QuestionPayload = decode_content(raw).unwrap();
        assert_eq!(payload.question_index, 2);
        assert_eq!(payload.answer_map.len(), 2);
        assert_eq!(payload.answer_map.answer_id(0), Some(5));
        assert_eq!(payload.answer_map.answer_id(1), Some(9));
        assert_eq!(payload.answer_map.answer_id(2), None);
    }

    #[test]
    fn decode_content_rejects_garbage() {
        let err = decode_content::<QuestionPayload>("{not json").unwrap_err();
        assert!(matches!(err, QuizError::Protocol(_)));
    }

    #[test]
    fn answer_map_accepts_numbers_and_strings() {
        let map: AnswerMap =
            serde_json::from_str(r#"{"0": 3, "1": "4", "2": " 5 ", "3": true}"#).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.answer_id(0), Some(3));
        assert_eq!(map.answer_id(1), Some(4));
        assert_eq!(map.answer_id(2), Some(5));
        assert_eq!(map.answer_id(3), None);
    }

    #[test]
    fn result_payload_null_and_missing_nemesis() {
        let with_null: ResultPayload = serde_json::from_str(
            r#"{"isCorrect":true,"points":900,"totalScore":1800,"rank":1,"nemesis":null}"#,
        )
        .unwrap();
        assert!(with_null.nemesis.is_none());

        let missing: ResultPayload =
            serde_json::from_str(r#"{"isCorrect":false,"points":0,"totalScore":0,"rank":5}"#)
                .unwrap();
        assert!(missing.nemesis.is_none());

        let present: ResultPayload = serde_json::from_str(
            r#"{"isCorrect":false,"points":0,"totalScore":10,"rank":2,
                "nemesis":{"name":"bob","totalScore":20,"isGhost":false}}"#,
        )
        .unwrap();
        assert_eq!(
            present.nemesis,
            Some(NemesisPayload {
                name: "bob".into(),
                total_score: 20
            })
        );
    }

    #[test]
    fn envelope_rejects_non_arrays_and_empty_arrays() {
        assert!(matches!(
            ResponseEnvelope::parse("{}"),
            Err(QuizError::Protocol(_))
        ));
        assert!(matches!(
            ResponseEnvelope::parse("[]"),
            Err(QuizError::Protocol(_))
        ));
        assert!(matches!(
            ResponseEnvelope::parse("<html>"),
            Err(QuizError::Protocol(_))
        ));
    }

    #[test]
    fn envelope_success_reads_first_or_last_element() {
        let envelope = ResponseEnvelope::parse(
            r#"[{"channel":"/meta/subscribe","successful":true},
                {"channel":"/service/controller","successful":false}]"#,
        )
        .unwrap();
        assert!(envelope.successful(Stage::Subscribe(Channel::Status)));
        assert!(!envelope.successful(Stage::Login));
        assert!(envelope.ensure_successful(Stage::Handshake).is_ok());
        let err = envelope.ensure_successful(Stage::Answer).unwrap_err();
        match err {
            QuizError::ServerRejected { stage, body } => {
                assert_eq!(stage, Stage::Answer);
                assert!(body.contains("/service/controller"));
            }
            other => panic!("expected ServerRejected, got {other:?}"),
        }
    }

    #[test]
    fn envelope_missing_successful_counts_as_rejection() {
        let envelope = ResponseEnvelope::parse(r#"[{"channel":"/meta/connect"}]"#).unwrap();
        assert!(!envelope.successful(Stage::Connect));
        assert!(!envelope.successful(Stage::BootstrapConnect));
    }

    #[test]
    fn message_content_accessor() {
        let envelope =
            ResponseEnvelope::parse(r#"[{"data":{"content":"{\"a\":1}","type":"message"}}]"#)
                .unwrap();
        assert_eq!(envelope.first().unwrap().content(), Some(r#"{"a":1}"#));
        let envelope = ResponseEnvelope::parse(r#"[{"data":{"content":5}}]"#).unwrap();
        assert_eq!(envelope.first().unwrap().content(), None);
    }
}
