//! Bayeux session: protocol identity and the fixed request sequence.
//!
//! A [`BayeuxSession`] owns the transport and everything the server assigned
//! to this client ([`GameIdentity`]). It knows how to build and send every
//! request of the join/play/leave sequence but holds no player state; the
//! poll loop decides what to do with the answers.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{QuizError, Result};
use crate::protocol::{
    answer_request, AnswerMeta, Channel, ConnectRequest, ControllerData, ControllerRequest,
    DisconnectRequest, Endpoint, HandshakeRequest, ResponseEnvelope, SubscriptionRequest,
};
use crate::stage::Stage;
use crate::transport::Transport;

/// Identity assigned by the server during the handshake.
///
/// Every request after the handshake presents `session_cookie` and, where the
/// message has one, `client_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdentity {
    pub game_pin: u32,
    pub decoded_token: String,
    pub client_id: String,
    /// `Set-Cookie` value of the handshake response, without attributes.
    pub session_cookie: String,
}

/// Where and how to reach the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    /// Scheme and authority, e.g. `https://kahoot.it`.
    pub base_url: String,
    /// Value of the `host` field in controller messages.
    pub host: String,
}

impl Default for ServerTarget {
    fn default() -> Self {
        Self {
            base_url: crate::client::DEFAULT_BASE_URL.to_string(),
            host: crate::client::DEFAULT_HOST.to_string(),
        }
    }
}

/// One client's view of one game on the server.
pub struct BayeuxSession<T> {
    transport: T,
    target: ServerTarget,
    game_pin: u32,
    decoded_token: String,
    answer_meta: AnswerMeta,
    identity: Option<GameIdentity>,
}

impl<T: Transport> BayeuxSession<T> {
    /// Create a session that has not shaken hands yet.
    pub fn new(
        transport: T,
        target: ServerTarget,
        game_pin: u32,
        decoded_token: impl Into<String>,
        answer_meta: AnswerMeta,
    ) -> Self {
        Self {
            transport,
            target,
            game_pin,
            decoded_token: decoded_token.into(),
            answer_meta,
            identity: None,
        }
    }

    /// The identity assigned by the handshake, if it has happened and the
    /// session has not been disconnected.
    pub fn identity(&self) -> Option<&GameIdentity> {
        self.identity.as_ref()
    }

    /// The game pin this session targets.
    pub fn game_pin(&self) -> u32 {
        self.game_pin
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    /// Perform the handshake and store the assigned identity.
    ///
    /// A response flagged `successful: false` is logged but still accepted
    /// when it carries a `clientId` and a session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] if the response array is empty, has no
    /// `clientId`, or no session cookie came back, and any transport error.
    pub async fn handshake(&mut self) -> Result<&GameIdentity> {
        let url = Endpoint::Handshake.url(&self.target.base_url, self.game_pin, &self.decoded_token);
        let body = serde_json::to_string(&HandshakeRequest::new()?)?;
        debug!(stage = %Stage::Handshake, url = %url, "sending request");

        let response = self.transport.post(&url, &[], body).await?;
        trace!(stage = %Stage::Handshake, body = %response.body, "response");

        // When the server sets several cookies the last one wins.
        let session_cookie = response
            .headers_named("set-cookie")
            .filter_map(strip_cookie_attributes)
            .last()
            .ok_or_else(|| QuizError::Protocol("handshake response set no session cookie".into()))?;

        let envelope = ResponseEnvelope::parse(response.body)?;
        let client_id = envelope
            .first()
            .and_then(|message| message.client_id.clone())
            .ok_or_else(|| QuizError::Protocol("handshake response has no clientId".into()))?;

        if !envelope.successful(Stage::Handshake) {
            warn!(stage = %Stage::Handshake, body = %envelope.body(), "server rejected request");
        }

        debug!(client_id = %client_id, "handshake complete");
        Ok(self.identity.insert(GameIdentity {
            game_pin: self.game_pin,
            decoded_token: self.decoded_token.clone(),
            client_id,
            session_cookie,
        }))
    }

    /// Send `/meta/unsubscribe` for `channel`. Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] before the handshake and any transport error.
    pub async fn unsubscribe(&mut self, channel: Channel) -> Result<bool> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = SubscriptionRequest::unsubscribe(&client_id, channel);
        let envelope = self
            .request(Stage::Unsubscribe(channel), Endpoint::Base, &request)
            .await?;
        Ok(verdict(Stage::Unsubscribe(channel), &envelope))
    }

    /// Send `/meta/subscribe` for `channel`. Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] before the handshake and any transport error.
    pub async fn subscribe(&mut self, channel: Channel) -> Result<bool> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = SubscriptionRequest::subscribe(&client_id, channel);
        let envelope = self
            .request(Stage::Subscribe(channel), Endpoint::Base, &request)
            .await?;
        Ok(verdict(Stage::Subscribe(channel), &envelope))
    }

    /// Run the full bootstrap: handshake, clear the controller subscription,
    /// open the first long poll, then subscribe to every service channel.
    ///
    /// Only the handshake is fatal. Every later stage is attempted even when
    /// an earlier one was rejected or failed; such failures are logged.
    ///
    /// # Errors
    ///
    /// Returns any error of [`handshake`](Self::handshake).
    pub async fn initialize(&mut self) -> Result<&GameIdentity> {
        self.handshake().await?;

        let stage = Stage::Unsubscribe(Channel::Controller);
        if let Err(e) = self.unsubscribe(Channel::Controller).await {
            warn!(stage = %stage, error = %e, "bootstrap stage failed, continuing");
        }

        let stage = Stage::BootstrapConnect;
        match self.connect_stage(stage).await {
            Ok(envelope) => {
                verdict(stage, &envelope);
            }
            Err(e) => warn!(stage = %stage, error = %e, "bootstrap stage failed, continuing"),
        }

        for channel in Channel::SUBSCRIPTIONS {
            if let Err(e) = self.subscribe(channel).await {
                warn!(stage = %Stage::Subscribe(channel), error = %e, "bootstrap stage failed, continuing");
            }
        }

        self.require_identity()
    }

    // ── Game messages ───────────────────────────────────────────────

    /// Log in under `username` and complete the login with one connect.
    ///
    /// Both requests are always sent; the connect goes out even if the login
    /// failed. Each failure is logged.
    ///
    /// # Errors
    ///
    /// Returns the first failure: [`QuizError::ServerRejected`] when the server
    /// refused the login or its connect, a transport error, or
    /// [`QuizError::Protocol`] before the handshake.
    pub async fn login(&mut self, username: &str) -> Result<()> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = ControllerRequest::new(
            &client_id,
            ControllerData::Login {
                gameid: self.game_pin,
                host: self.target.host.clone(),
                name: username.to_string(),
            },
        );

        let login = self
            .request(Stage::Login, Endpoint::Base, &request)
            .await
            .and_then(|envelope| envelope.ensure_successful(Stage::Login));
        if let Err(e) = &login {
            log_failure(Stage::Login, e);
        }

        let connect = self
            .connect_stage(Stage::LoginConnect)
            .await
            .and_then(|envelope| envelope.ensure_successful(Stage::LoginConnect));
        if let Err(e) = &connect {
            log_failure(Stage::LoginConnect, e);
        }

        login.and(connect)
    }

    /// Issue one long-poll `/meta/connect`. The server holds the request open
    /// until it has something to deliver or the advertised timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] before the handshake or when the body
    /// is not a message array, and any transport error.
    pub async fn connect(&mut self) -> Result<ResponseEnvelope> {
        self.connect_stage(Stage::Connect).await
    }

    /// Submit `choice`, the server-side answer identifier taken from the
    /// question's answer map. Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] before the handshake and any transport error.
    pub async fn submit_answer(&mut self, choice: i64) -> Result<bool> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = answer_request(
            &client_id,
            self.game_pin,
            &self.target.host,
            choice,
            &self.answer_meta,
        )?;
        let envelope = self.request(Stage::Answer, Endpoint::Base, &request).await?;
        Ok(verdict(Stage::Answer, &envelope))
    }

    /// Send `/meta/disconnect` and forget the identity, whatever the outcome.
    /// Returns the server's verdict.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Protocol`] before the handshake or after a previous
    /// disconnect, and any transport error (the identity is dropped anyway).
    pub async fn disconnect(&mut self) -> Result<bool> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = DisconnectRequest::new(&client_id);
        let result = self
            .request(Stage::Disconnect, Endpoint::Disconnect, &request)
            .await;
        self.identity = None;
        Ok(verdict(Stage::Disconnect, &result?))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn require_identity(&self) -> Result<&GameIdentity> {
        self.identity
            .as_ref()
            .ok_or_else(|| QuizError::Protocol("no active session; handshake first".into()))
    }

    async fn connect_stage(&mut self, stage: Stage) -> Result<ResponseEnvelope> {
        let client_id = self.require_identity()?.client_id.clone();
        let request = ConnectRequest::new(&client_id);
        self.request(stage, Endpoint::Connect, &request).await
    }

    /// POST `body` to `endpoint` with the session cookie and parse the reply.
    async fn request(
        &mut self,
        stage: Stage,
        endpoint: Endpoint,
        body: &impl Serialize,
    ) -> Result<ResponseEnvelope> {
        let cookie = self.require_identity()?.session_cookie.clone();
        let url = endpoint.url(&self.target.base_url, self.game_pin, &self.decoded_token);
        let body = serde_json::to_string(body)?;
        debug!(stage = %stage, url = %url, "sending request");

        let response = self
            .transport
            .post(&url, &[("Cookie", cookie.as_str())], body)
            .await?;
        trace!(stage = %stage, body = %response.body, "response");
        ResponseEnvelope::parse(response.body)
    }
}

impl<T> std::fmt::Debug for BayeuxSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayeuxSession")
            .field("game_pin", &self.game_pin)
            .field("target", &self.target)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Read the verdict for `stage`, logging the raw body on rejection.
fn verdict(stage: Stage, envelope: &ResponseEnvelope) -> bool {
    let accepted = envelope.successful(stage);
    if !accepted {
        warn!(stage = %stage, body = %envelope.body(), "server rejected request");
    }
    accepted
}

fn log_failure(stage: Stage, error: &QuizError) {
    match error {
        QuizError::ServerRejected { body, .. } => {
            warn!(stage = %stage, body = %body, "server rejected request");
        }
        other => warn!(stage = %stage, error = %other, "request failed"),
    }
}

/// `name=value; Path=/; Secure` → `name=value`. Empty values yield `None`.
fn strip_cookie_attributes(header: &str) -> Option<String> {
    let cookie = header.split(';').next().unwrap_or_default().trim();
    (!cookie.is_empty()).then(|| cookie.to_string())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{DeviceInfo, ScreenSize};
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    // ── Mock transport ──────────────────────────────────────────────

    /// A recorded request: `(url, cookie header, body)`.
    type Sent = Arc<StdMutex<Vec<(String, Option<String>, serde_json::Value)>>>;

    /// Replays scripted responses in order and records every request.
    struct MockTransport {
        responses: VecDeque<Result<HttpResponse>>,
        sent: Sent,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<HttpResponse>>) -> (Self, Sent) {
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
        ) -> Result<HttpResponse> {
            let cookie = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
                .map(|(_, value)| value.to_string());
            self.sent.lock().unwrap().push((
                url.to_string(),
                cookie,
                serde_json::from_str(&body).unwrap(),
            ));
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(QuizError::Transport("no scripted response".into())))
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn meta() -> AnswerMeta {
        AnswerMeta {
            lag: 22,
            device: DeviceInfo {
                user_agent: "test-agent".into(),
                screen: ScreenSize {
                    width: 1337,
                    height: 1337,
                },
            },
        }
    }

    fn session(responses: Vec<Result<HttpResponse>>) -> (BayeuxSession<MockTransport>, Sent) {
        let (transport, sent) = MockTransport::new(responses);
        let target = ServerTarget {
            base_url: "https://quiz.test".into(),
            host: "quiz.test".into(),
        };
        (BayeuxSession::new(transport, target, 4242, "tok", meta()), sent)
    }

    fn handshake_ok() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(
            r#"[{"channel":"/meta/handshake","successful":true,"clientId":"cid-1"}]"#,
        )
        .with_header("Set-Cookie", "BAYEUX_BROWSER=c00kie; Path=/; Secure"))
    }

    fn ok_first() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(r#"[{"successful":true}]"#))
    }

    fn rejected() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(r#"[{"successful":false,"error":"403::denied"}]"#))
    }

    // ── Handshake ───────────────────────────────────────────────────

    #[tokio::test]
    async fn handshake_extracts_client_id_and_cookie() {
        let (mut session, sent) = session(vec![handshake_ok()]);
        let identity = session.handshake().await.unwrap().clone();
        assert_eq!(identity.client_id, "cid-1");
        assert_eq!(identity.session_cookie, "BAYEUX_BROWSER=c00kie");
        assert_eq!(identity.game_pin, 4242);
        assert_eq!(identity.decoded_token, "tok");

        let sent = sent.lock().unwrap();
        let (url, cookie, body) = &sent[0];
        assert_eq!(url, "https://quiz.test/cometd/4242/tok/handshake");
        assert!(cookie.is_none());
        assert_eq!(body["channel"], "/meta/handshake");
        assert_eq!(body["supportedConnectionTypes"], r#"["long-polling"]"#);
    }

    #[tokio::test]
    async fn handshake_uses_last_cookie_header() {
        let response = HttpResponse::ok(r#"[{"successful":true,"clientId":"c"}]"#)
            .with_header("Set-Cookie", "stale=1; Path=/")
            .with_header("Set-Cookie", "fresh=2; HttpOnly");
        let (mut session, _sent) = session(vec![Ok(response)]);
        let identity = session.handshake().await.unwrap();
        assert_eq!(identity.session_cookie, "fresh=2");
    }

    #[tokio::test]
    async fn handshake_fails_without_cookie() {
        let response = HttpResponse::ok(r#"[{"successful":true,"clientId":"c"}]"#);
        let (mut session, _sent) = session(vec![Ok(response)]);
        let err = session.handshake().await.unwrap_err();
        assert!(matches!(err, QuizError::Protocol(_)));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn handshake_fails_without_client_id() {
        let response =
            HttpResponse::ok(r#"[{"successful":true}]"#).with_header("Set-Cookie", "a=b");
        let (mut session, _sent) = session(vec![Ok(response)]);
        assert!(matches!(
            session.handshake().await,
            Err(QuizError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn handshake_fails_on_empty_array() {
        let response = HttpResponse::ok("[]").with_header("Set-Cookie", "a=b");
        let (mut session, _sent) = session(vec![Ok(response)]);
        assert!(matches!(
            session.handshake().await,
            Err(QuizError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn rejected_handshake_with_identity_is_kept() {
        let response = HttpResponse::ok(
            r#"[{"channel":"/meta/handshake","successful":false,"clientId":"cid-9"}]"#,
        )
        .with_header("Set-Cookie", "BAYEUX_BROWSER=late; Path=/");
        let (mut session, sent) = session(vec![Ok(response), ok_first()]);

        let identity = session.handshake().await.unwrap().clone();
        assert_eq!(identity.client_id, "cid-9");
        assert_eq!(identity.session_cookie, "BAYEUX_BROWSER=late");

        assert!(session.subscribe(Channel::Player).await.unwrap());
        let sent = sent.lock().unwrap();
        let (_, cookie, body) = &sent[1];
        assert_eq!(cookie.as_deref(), Some("BAYEUX_BROWSER=late"));
        assert_eq!(body["clientId"], "cid-9");
    }

    #[tokio::test]
    async fn handshake_propagates_transport_errors() {
        let (mut session, _sent) = session(vec![Err(QuizError::Transport("refused".into()))]);
        let err = session.handshake().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn requests_before_handshake_are_protocol_errors() {
        let (mut session, sent) = session(vec![]);
        assert!(matches!(
            session.subscribe(Channel::Status).await,
            Err(QuizError::Protocol(_))
        ));
        assert!(matches!(session.connect().await, Err(QuizError::Protocol(_))));
        assert!(matches!(
            session.submit_answer(1).await,
            Err(QuizError::Protocol(_))
        ));
        assert!(matches!(session.login("x").await, Err(QuizError::Protocol(_))));
        assert!(sent.lock().unwrap().is_empty());
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    #[tokio::test]
    async fn initialize_runs_every_stage_in_order() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            ok_first(),
            ok_first(),
            ok_first(),
            ok_first(),
            ok_first(),
        ]);
        session.initialize().await.unwrap();

        let sent = sent.lock().unwrap();
        let stages: Vec<(String, String)> = sent
            .iter()
            .map(|(url, _, body)| {
                (
                    url.rsplit('/').next().unwrap().to_string(),
                    format!(
                        "{} {}",
                        body["channel"].as_str().unwrap(),
                        body["subscription"].as_str().unwrap_or("")
                    ),
                )
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                ("handshake".into(), "/meta/handshake ".into()),
                ("tok".into(), "/meta/unsubscribe /service/controller".into()),
                ("connect".into(), "/meta/connect ".into()),
                ("tok".into(), "/meta/subscribe /service/status".into()),
                ("tok".into(), "/meta/subscribe /service/player".into()),
                ("tok".into(), "/meta/subscribe /service/controller".into()),
            ]
        );
        for (_, cookie, body) in sent.iter().skip(1) {
            assert_eq!(cookie.as_deref(), Some("BAYEUX_BROWSER=c00kie"));
            assert_eq!(body["clientId"], "cid-1");
        }
    }

    #[tokio::test]
    async fn initialize_continues_past_rejections_and_transport_errors() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            rejected(),
            Err(QuizError::Transport("reset".into())),
            rejected(),
            Ok(HttpResponse::ok("not json")),
            ok_first(),
        ]);
        let identity = session.initialize().await.unwrap();
        assert_eq!(identity.client_id, "cid-1");
        assert_eq!(sent.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn initialize_aborts_when_handshake_fails() {
        let (mut session, sent) = session(vec![Ok(HttpResponse::ok("[]"))]);
        assert!(session.initialize().await.is_err());
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribe_reports_the_first_element() {
        let (mut session, _sent) = session(vec![
            handshake_ok(),
            Ok(HttpResponse::ok(r#"[{"successful":true},{"successful":false}]"#)),
            Ok(HttpResponse::ok(r#"[{"successful":false},{"successful":true}]"#)),
        ]);
        session.handshake().await.unwrap();
        assert!(session.subscribe(Channel::Status).await.unwrap());
        assert!(!session.subscribe(Channel::Player).await.unwrap());
    }

    // ── Login ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn login_sends_controller_message_then_connect() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            Ok(HttpResponse::ok(r#"[{"successful":false},{"successful":true}]"#)),
            Ok(HttpResponse::ok(r#"[{"successful":true}]"#)),
        ]);
        session.handshake().await.unwrap();
        session.login("alice").await.unwrap();

        let sent = sent.lock().unwrap();
        let (url, _, body) = &sent[1];
        assert_eq!(url, "https://quiz.test/cometd/4242/tok");
        assert_eq!(body["channel"], "/service/controller");
        assert_eq!(body["data"]["type"], "login");
        assert_eq!(body["data"]["name"], "alice");
        assert_eq!(body["data"]["gameid"], 4242);
        assert_eq!(body["data"]["host"], "quiz.test");
        let (url, _, body) = &sent[2];
        assert_eq!(url, "https://quiz.test/cometd/4242/tok/connect");
        assert_eq!(body["channel"], "/meta/connect");
        assert_eq!(body["connectionType"], "long-polling");
    }

    #[tokio::test]
    async fn login_reports_rejection_but_still_connects() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            Ok(HttpResponse::ok(r#"[{"successful":true},{"successful":false}]"#)),
            Ok(HttpResponse::ok(r#"[{"successful":true}]"#)),
        ]);
        session.handshake().await.unwrap();
        let err = session.login("alice").await.unwrap_err();
        let QuizError::ServerRejected { stage, body } = err else {
            panic!("expected ServerRejected, got {err:?}");
        };
        assert_eq!(stage, Stage::Login);
        assert!(body.contains(r#""successful":false"#));
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn login_reports_rejected_connect() {
        let (mut session, _sent) = session(vec![
            handshake_ok(),
            Ok(HttpResponse::ok(r#"[{"successful":true}]"#)),
            Ok(HttpResponse::ok(r#"[{"successful":true},{"successful":false}]"#)),
        ]);
        session.handshake().await.unwrap();
        assert!(matches!(
            session.login("alice").await,
            Err(QuizError::ServerRejected {
                stage: Stage::LoginConnect,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn login_survives_transport_error() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            Err(QuizError::Transport("reset".into())),
            Ok(HttpResponse::ok(r#"[{"successful":true}]"#)),
        ]);
        session.handshake().await.unwrap();
        assert!(session.login("alice").await.unwrap_err().is_transport());
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    // ── Answers ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn submit_answer_reads_the_last_element() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            Ok(HttpResponse::ok(r#"[{"successful":false},{"successful":true}]"#)),
        ]);
        session.handshake().await.unwrap();
        assert!(session.submit_answer(9).await.unwrap());

        let sent = sent.lock().unwrap();
        let (_, _, body) = &sent[1];
        assert_eq!(body["data"]["id"], 6);
        assert_eq!(body["data"]["type"], "message");
        assert_eq!(body["data"]["gameid"], 4242);
        // Decode the way the server does: strip escapes, then parse.
        let content: crate::protocol::AnswerContent =
            crate::protocol::decode_content(body["data"]["content"].as_str().unwrap()).unwrap();
        assert_eq!(content.choice, 9);
        assert_eq!(content.meta, meta());
    }

    // ── Disconnect ──────────────────────────────────────────────────

    #[tokio::test]
    async fn disconnect_forgets_identity_even_on_failure() {
        let (mut session, sent) = session(vec![
            handshake_ok(),
            Err(QuizError::Transport("reset".into())),
        ]);
        session.handshake().await.unwrap();
        assert!(session.disconnect().await.is_err());
        assert!(session.identity().is_none());
        assert!(matches!(
            session.disconnect().await,
            Err(QuizError::Protocol(_))
        ));

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, "https://quiz.test/cometd/4242/tok/disconnect");
        assert_eq!(sent[1].2["channel"], "/meta/disconnect");
    }

    #[test]
    fn cookie_attributes_are_stripped_at_first_delimiter() {
        assert_eq!(
            strip_cookie_attributes("k=v; Path=/; Expires=x").as_deref(),
            Some("k=v")
        );
        assert_eq!(strip_cookie_attributes("k=v").as_deref(), Some("k=v"));
        assert_eq!(strip_cookie_attributes(" ; Path=/"), None);
    }
}
