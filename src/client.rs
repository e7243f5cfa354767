//! Async client that joins and plays one quiz game.
//!
//! [`QuizClient::start`] resolves the game pin, performs the Bayeux bootstrap
//! and the login, then spawns a background poll loop. It returns a thin handle
//! together with a bounded event channel
//! ([`tokio::sync::mpsc::Receiver<QuizEvent>`]).
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = ReqwestTransport::new()?;
//! let resolver = StaticTokenResolver::new(123456, ResolvedSession::new(token));
//! let config = QuizConfig::new(123456, "Alice").with_mode(PlayMode::Interactive);
//! let (client, mut events) = QuizClient::start(transport, &resolver, config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         QuizEvent::QuestionReady { answer_count, .. } => client.answer(0).await?,
//!         QuizEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::error::{QuizError, Result};
use crate::event::QuizEvent;
use crate::player::{AnswerSource, ChannelAnswers, PlayMode, RandomAnswers};
use crate::poll_loop::{emit_event, PollLoop, ShutdownSignal};
use crate::protocol::{AnswerMeta, DeviceInfo, ScreenSize};
use crate::resolver::SessionTokenResolver;
use crate::session::{BayeuxSession, ServerTarget};
use crate::state::{Scoreboard, SessionState};
use crate::transport::Transport;

/// Default game server.
pub const DEFAULT_BASE_URL: &str = "https://kahoot.it";

/// Default `host` field of controller messages.
pub const DEFAULT_HOST: &str = "kahoot.it";

/// Default pause between two long polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown. Longer than one long poll so the
/// loop can finish an in-flight connect and disconnect.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(65);

/// Default input lag reported with every answer, in milliseconds.
pub const DEFAULT_ANSWER_LAG_MS: u32 = 22;

/// Default screen size reported with every answer.
pub const DEFAULT_SCREEN: ScreenSize = ScreenSize {
    width: 1337,
    height: 1337,
};

/// Default user agent reported with every answer.
pub const DEFAULT_DEVICE_USER_AGENT: &str =
    concat!("quizwire-client/", env!("CARGO_PKG_VERSION"));

// ── Configuration ───────────────────────────────────────────────────

/// What to do when the server does not confirm the login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginPolicy {
    /// Log the rejection and play anyway. The server is known to report
    /// failures for logins that went through.
    #[default]
    Optimistic,
    /// Disconnect and fail [`QuizClient::start`].
    Strict,
}

/// Configuration for a [`QuizClient`].
///
/// The game pin and username are required; everything else has a default.
///
/// # Example
///
/// ```
/// use quizwire_client::{PlayMode, QuizConfig};
/// use std::time::Duration;
///
/// let config = QuizConfig::new(123456, "Alice")
///     .with_mode(PlayMode::Interactive)
///     .with_poll_interval(Duration::from_millis(100));
/// assert_eq!(config.game_pin, 123456);
/// assert_eq!(config.base_url, "https://kahoot.it");
/// ```
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// The game to join.
    pub game_pin: u32,
    /// Display name in the game.
    pub username: String,
    /// How answers are chosen. Defaults to [`PlayMode::AutoAnswer`].
    pub mode: PlayMode,
    /// Scheme and authority of the game server.
    pub base_url: String,
    /// `host` field of controller messages.
    pub host: String,
    /// Pause between two long polls.
    ///
    /// Defaults to **50 ms**.
    pub poll_interval: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped with a warning.
    /// [`QuizEvent::Disconnected`] is always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`QuizClient::shutdown`] waits for the poll loop to finish
    /// its current long poll and disconnect before aborting it.
    ///
    /// Defaults to **65 seconds**.
    pub shutdown_timeout: Duration,
    /// Reaction to transport failures while polling.
    pub retry: RetryPolicy,
    pub login_policy: LoginPolicy,
    /// Client metadata attached to every answer.
    pub answer_meta: AnswerMeta,
    /// Seed for [`PlayMode::AutoAnswer`]. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl QuizConfig {
    /// Create a configuration for joining `game_pin` as `username`.
    pub fn new(game_pin: u32, username: impl Into<String>) -> Self {
        Self {
            game_pin,
            username: username.into(),
            mode: PlayMode::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            retry: RetryPolicy::default(),
            login_policy: LoginPolicy::default(),
            answer_meta: AnswerMeta {
                lag: DEFAULT_ANSWER_LAG_MS,
                device: DeviceInfo {
                    user_agent: DEFAULT_DEVICE_USER_AGENT.to_string(),
                    screen: DEFAULT_SCREEN,
                },
            },
            rng_seed: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: PlayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Point the client at another server. Trailing slashes are removed.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown. A zero timeout aborts the
    /// poll loop immediately, without disconnecting.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_login_policy(mut self, login_policy: LoginPolicy) -> Self {
        self.login_policy = login_policy;
        self
    }

    #[must_use]
    pub fn with_answer_meta(mut self, answer_meta: AnswerMeta) -> Self {
        self.answer_meta = answer_meta;
        self
    }

    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running game session.
///
/// Created via [`QuizClient::start`]. The background poll loop owns the
/// protocol session; the handle only shares the player-visible state and, in
/// interactive mode, a channel to deliver answers.
pub struct QuizClient {
    game_pin: u32,
    username: String,
    mode: PlayMode,
    join_id: Uuid,
    state: Arc<SessionState>,
    /// Sender half of the answer channel. `None` in auto-answer mode.
    choices: Option<mpsc::UnboundedSender<usize>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl QuizClient {
    /// Join the game and start playing.
    ///
    /// Resolves the pin with `resolver`, runs the bootstrap and the login on
    /// the caller's task, then spawns the poll loop. The first event is
    /// [`QuizEvent::Joined`]; the last is [`QuizEvent::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Resolution`] if the pin cannot be resolved, any
    /// handshake failure, and, under [`LoginPolicy::Strict`], the login
    /// failure.
    pub async fn start<T, R>(
        transport: T,
        resolver: &R,
        config: QuizConfig,
    ) -> Result<(Self, mpsc::Receiver<QuizEvent>)>
    where
        T: Transport,
        R: SessionTokenResolver + ?Sized,
    {
        let join_id = Uuid::new_v4();
        let span = info_span!("quiz", join_id = %join_id, game_pin = config.game_pin);
        Self::join(transport, resolver, config, join_id, span.clone())
            .instrument(span)
            .await
    }

    async fn join<T, R>(
        transport: T,
        resolver: &R,
        config: QuizConfig,
        join_id: Uuid,
        span: tracing::Span,
    ) -> Result<(Self, mpsc::Receiver<QuizEvent>)>
    where
        T: Transport,
        R: SessionTokenResolver + ?Sized,
    {
        let resolved = resolver.resolve(config.game_pin).await?;
        debug!(
            team = resolved.is_team_game,
            two_factor = resolved.is_two_factor,
            "game pin resolved"
        );

        let target = ServerTarget {
            base_url: config.base_url.clone(),
            host: config.host.clone(),
        };
        let mut session = BayeuxSession::new(
            transport,
            target,
            config.game_pin,
            resolved.decoded_token,
            config.answer_meta,
        );
        session.initialize().await?;

        if let Err(e) = session.login(&config.username).await {
            match config.login_policy {
                LoginPolicy::Optimistic => {
                    warn!(error = %e, "login not confirmed by the server, playing anyway");
                }
                LoginPolicy::Strict => {
                    if let Err(disconnect_err) = session.disconnect().await {
                        debug!(error = %disconnect_err, "disconnect after failed login failed");
                    }
                    return Err(e);
                }
            }
        }

        let state = Arc::new(SessionState::new(
            resolved.is_team_game,
            resolved.is_two_factor,
        ));
        state.activate();
        info!(username = %config.username, "joined game");

        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<QuizEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        emit_event(
            &event_tx,
            QuizEvent::Joined {
                game_pin: config.game_pin,
                username: config.username.clone(),
            },
        );

        let (choices, answers) = match config.mode {
            PlayMode::Interactive => {
                let (tx, rx) = mpsc::unbounded_channel();
                let answers: Box<dyn AnswerSource> = Box::new(ChannelAnswers::new(rx));
                (Some(tx), answers)
            }
            PlayMode::AutoAnswer => {
                let random = config
                    .rng_seed
                    .map_or_else(RandomAnswers::new, RandomAnswers::seeded);
                let answers: Box<dyn AnswerSource> = Box::new(random);
                (None, answers)
            }
        };

        let poll_loop = PollLoop {
            session,
            answers,
            state: Arc::clone(&state),
            events: event_tx,
            shutdown: ShutdownSignal::new(shutdown_rx),
            poll_interval: config.poll_interval,
            retry: config.retry,
        };
        let task = tokio::spawn(poll_loop.run().instrument(span));

        let client = Self {
            game_pin: config.game_pin,
            username: config.username,
            mode: config.mode,
            join_id,
            state,
            choices,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };
        Ok((client, event_rx))
    }

    // ── Playing ─────────────────────────────────────────────────────

    /// Answer the current question with `slot` (0-based).
    ///
    /// Only valid in [`PlayMode::Interactive`], after
    /// [`QuizEvent::QuestionReady`]. Choices made before the question was
    /// announced are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::NotActive`] once the session has ended,
    /// [`QuizError::NotInteractive`] in auto-answer mode and
    /// [`QuizError::InvalidAnswer`] if the current question has no such slot.
    pub async fn answer(&self, slot: usize) -> Result<()> {
        if !self.state.is_active() {
            return Err(QuizError::NotActive);
        }
        let choices = self.choices.as_ref().ok_or(QuizError::NotInteractive)?;
        let count = self.state.read(|board| board.answer_count).await;
        if count > 0 && slot >= count {
            return Err(QuizError::InvalidAnswer { slot, count });
        }
        choices.send(slot).map_err(|_| QuizError::NotActive)
    }

    /// Slot of the last acknowledged answer, or `-1` once the session has
    /// ended. Consumes the acknowledgement without waiting for one.
    pub fn last_answer(&self) -> i32 {
        self.state.last_answer()
    }

    /// Wait for the next acknowledged answer and return its slot, or `-1` if
    /// the session ends first.
    pub async fn last_answer_blocking(&self) -> i32 {
        self.state.last_answer_blocking().await
    }

    /// Shut down the client, disconnecting from the game.
    ///
    /// The poll loop stops before its next long poll (or while waiting for an
    /// interactive answer) and sends the disconnect. If it does not finish
    /// within the configured timeout it is aborted. The event receiver yields
    /// `None` afterwards.
    pub async fn shutdown(&mut self) {
        debug!(join_id = %self.join_id, "shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("poll loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("poll loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("poll loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.deactivate();
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the game is being played.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn game_pin(&self) -> u32 {
        self.game_pin
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Identifier of this join attempt, also recorded on every log line.
    pub fn join_id(&self) -> Uuid {
        self.join_id
    }

    pub fn is_team_game(&self) -> bool {
        self.state.is_team_game()
    }

    pub fn two_factor_auth(&self) -> bool {
        self.state.two_factor_auth()
    }

    /// Snapshot of the score and the current question.
    pub async fn scoreboard(&self) -> Scoreboard {
        self.state.scoreboard().await
    }

    /// 1-based number of the current question, 0 before the first one.
    pub async fn question_number(&self) -> u32 {
        self.state.read(|board| board.question_number).await
    }

    /// Whether the current question has a third answer.
    pub async fn slot2_valid(&self) -> bool {
        self.state.read(|board| board.slot2_valid).await
    }

    /// Whether the current question has a fourth answer.
    pub async fn slot3_valid(&self) -> bool {
        self.state.read(|board| board.slot3_valid).await
    }

    /// Points earned on the last question.
    pub async fn last_score(&self) -> i64 {
        self.state.read(|board| board.last_score).await
    }

    pub async fn total_score(&self) -> i64 {
        self.state.read(|board| board.total_score).await
    }

    pub async fn rank(&self) -> u32 {
        self.state.read(|board| board.rank).await
    }

    /// Name of the player ranked immediately above, or `"no one"`.
    pub async fn nemesis(&self) -> String {
        self.state.read(|board| board.nemesis_name.clone()).await
    }

    pub async fn nemesis_points(&self) -> i64 {
        self.state.read(|board| board.nemesis_points).await
    }
}

impl std::fmt::Debug for QuizClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizClient")
            .field("game_pin", &self.game_pin)
            .field("username", &self.username)
            .field("mode", &self.mode)
            .field("join_id", &self.join_id)
            .field("active", &self.is_active())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for QuizClient {
    fn drop(&mut self) {
        // No executor to drive a graceful disconnect here.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::resolver::{ResolvedSession, StaticTokenResolver};
    use crate::stage::Stage;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Scripted responses; keep-alives once the script runs out.
    struct MockTransport {
        responses: VecDeque<Result<HttpResponse>>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<HttpResponse>>) -> (Self, Arc<StdMutex<Vec<String>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
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
            _url: &str,
            _headers: &[(&str, &str)],
            body: String,
        ) -> Result<HttpResponse> {
            let channel = serde_json::from_str::<serde_json::Value>(&body).unwrap()["channel"]
                .as_str()
                .unwrap()
                .to_string();
            self.sent.lock().unwrap().push(channel);
            match self.responses.pop_front() {
                Some(response) => response,
                None => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(HttpResponse::ok(r#"[{"successful":true}]"#))
                }
            }
        }
    }

    fn handshake() -> Result<HttpResponse> {
        Ok(
            HttpResponse::ok(r#"[{"successful":true,"clientId":"cid"}]"#)
                .with_header("set-cookie", "session=abc; Path=/"),
        )
    }

    fn ok() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(r#"[{"successful":true}]"#))
    }

    fn rejected() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(r#"[{"successful":false}]"#))
    }

    /// Handshake, unsubscribe, bootstrap connect, three subscribes.
    fn bootstrap() -> Vec<Result<HttpResponse>> {
        vec![handshake(), ok(), ok(), ok(), ok(), ok()]
    }

    fn resolver() -> StaticTokenResolver {
        StaticTokenResolver::new(1234, ResolvedSession::new("tok").with_team_game(true))
    }

    // ── Configuration ───────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = QuizConfig::new(1234, "alice");
        assert_eq!(config.game_pin, 1234);
        assert_eq!(config.username, "alice");
        assert_eq!(config.mode, PlayMode::AutoAnswer);
        assert_eq!(config.base_url, "https://kahoot.it");
        assert_eq!(config.host, "kahoot.it");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(65));
        assert_eq!(config.login_policy, LoginPolicy::Optimistic);
        assert_eq!(config.answer_meta.lag, 22);
        assert_eq!(config.answer_meta.device.screen.width, 1337);
        assert_eq!(config.answer_meta.device.screen.height, 1337);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn config_builder_methods() {
        let config = QuizConfig::new(1, "bob")
            .with_mode(PlayMode::Interactive)
            .with_base_url("http://localhost:8080/")
            .with_host("localhost")
            .with_poll_interval(Duration::from_millis(5))
            .with_event_channel_capacity(0)
            .with_shutdown_timeout(Duration::from_secs(1))
            .with_login_policy(LoginPolicy::Strict)
            .with_retry_policy(RetryPolicy::unbounded())
            .with_rng_seed(9);
        assert_eq!(config.mode, PlayMode::Interactive);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.login_policy, LoginPolicy::Strict);
        assert!(config.retry.max_consecutive_failures.is_none());
        assert_eq!(config.rng_seed, Some(9));
    }

    // ── Start ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_emits_joined_and_exposes_resolved_flags() {
        let mut script = bootstrap();
        script.extend([ok(), ok()]);
        let (transport, sent) = MockTransport::new(script);
        let config = QuizConfig::new(1234, "alice").with_poll_interval(Duration::from_millis(1));
        let (mut client, mut events) = QuizClient::start(transport, &resolver(), config)
            .await
            .unwrap();

        assert_eq!(
            events.recv().await,
            Some(QuizEvent::Joined {
                game_pin: 1234,
                username: "alice".into()
            })
        );
        assert!(client.is_active());
        assert!(client.is_team_game());
        assert!(!client.two_factor_auth());
        assert_eq!(client.question_number().await, 0);
        assert_eq!(client.nemesis().await, "no one");

        client.shutdown().await;
        assert!(!client.is_active());
        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent[..8], [
            "/meta/handshake",
            "/meta/unsubscribe",
            "/meta/connect",
            "/meta/subscribe",
            "/meta/subscribe",
            "/meta/subscribe",
            "/service/controller",
            "/meta/connect",
        ]);
        assert_eq!(sent.last().map(String::as_str), Some("/meta/disconnect"));
    }

    #[tokio::test]
    async fn unknown_pin_fails_before_any_request() {
        let (transport, sent) = MockTransport::new(vec![]);
        let err = QuizClient::start(transport, &resolver(), QuizConfig::new(9999, "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Resolution { pin: 9999, .. }));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_login_rejection_fails_start() {
        let mut script = bootstrap();
        script.extend([rejected(), ok(), ok()]);
        let (transport, sent) = MockTransport::new(script);
        let config = QuizConfig::new(1234, "alice").with_login_policy(LoginPolicy::Strict);
        let err = QuizClient::start(transport, &resolver(), config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::ServerRejected {
                stage: Stage::Login,
                ..
            }
        ));
        assert_eq!(
            sent.lock().unwrap().last().map(String::as_str),
            Some("/meta/disconnect")
        );
    }

    #[tokio::test]
    async fn answer_requires_interactive_mode() {
        let (transport, _sent) = MockTransport::new(bootstrap());
        let (mut client, _events) =
            QuizClient::start(transport, &resolver(), QuizConfig::new(1234, "alice"))
                .await
                .unwrap();
        assert!(matches!(
            client.answer(0).await,
            Err(QuizError::NotInteractive)
        ));
        client.shutdown().await;
        assert!(matches!(client.answer(0).await, Err(QuizError::NotActive)));
    }

    #[tokio::test]
    async fn debug_output_names_the_game() {
        let (transport, _sent) = MockTransport::new(bootstrap());
        let (client, _events) =
            QuizClient::start(transport, &resolver(), QuizConfig::new(1234, "alice"))
                .await
                .unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("QuizClient"));
        assert!(debug.contains("1234"));
        assert!(debug.contains("alice"));
    }

    #[tokio::test]
    async fn zero_shutdown_timeout_aborts_the_loop() {
        let (transport, _sent) = MockTransport::new(bootstrap());
        let config = QuizConfig::new(1234, "alice").with_shutdown_timeout(Duration::ZERO);
        let (mut client, mut events) = QuizClient::start(transport, &resolver(), config)
            .await
            .unwrap();
        client.shutdown().await;
        assert!(!client.is_active());
        // Joined was queued before the loop started; nothing else is guaranteed.
        assert!(matches!(events.recv().await, Some(QuizEvent::Joined { .. })));
    }
}
