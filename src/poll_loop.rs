//! The long-poll loop that plays one game.
//!
//! The loop owns the [`BayeuxSession`] once login has completed. Each cycle
//! issues one `/meta/connect`, classifies the response and reacts to it:
//! answering live questions, recording results and forwarding events. It
//! ends on a kick, the end of the game, a shutdown request or too many
//! consecutive transport failures, and always disconnects on the way out.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, RetryDecision, RetryPolicy};
use crate::classifier::{classify, ServerPush};
use crate::event::{EndReason, QuizEvent, ScoreReport};
use crate::player::AnswerSource;
use crate::protocol::QuestionPayload;
use crate::session::BayeuxSession;
use crate::stage::Stage;
use crate::state::SessionState;
use crate::transport::Transport;

// ── Shutdown signal ─────────────────────────────────────────────────

/// Fused view of the shutdown oneshot.
///
/// A dropped sender counts as a shutdown request.
pub(crate) struct ShutdownSignal {
    rx: oneshot::Receiver<()>,
    fired: bool,
}

impl ShutdownSignal {
    pub(crate) fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, fired: false }
    }

    /// Non-blocking check.
    pub(crate) fn requested(&mut self) -> bool {
        if !self.fired {
            match self.rx.try_recv() {
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => self.fired = true,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.fired
    }

    /// Resolve once shutdown has been requested.
    pub(crate) async fn wait(&mut self) {
        if !self.fired {
            let _ = (&mut self.rx).await;
            self.fired = true;
        }
    }
}

// ── Poll loop ───────────────────────────────────────────────────────

/// Everything the poll loop needs, moved into the background task.
pub(crate) struct PollLoop<T> {
    pub(crate) session: BayeuxSession<T>,
    pub(crate) answers: Box<dyn AnswerSource>,
    pub(crate) state: Arc<SessionState>,
    pub(crate) events: mpsc::Sender<QuizEvent>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) poll_interval: Duration,
    pub(crate) retry: RetryPolicy,
}

impl<T: Transport> PollLoop<T> {
    /// Poll until the game is over, then disconnect and emit
    /// [`QuizEvent::Disconnected`].
    pub(crate) async fn run(mut self) {
        debug!("poll loop started");
        let reason = self.poll().await;
        info!(reason = %reason, "poll loop finished");

        self.state.deactivate();
        match self.session.disconnect().await {
            Ok(true) => debug!("disconnected"),
            // The rejection itself has been logged by the session.
            Ok(false) => {}
            Err(e) => warn!(error = %e, "disconnect failed"),
        }
        emit_disconnected(&self.events, reason).await;
    }

    async fn poll(&mut self) -> EndReason {
        let mut backoff = Backoff::new(self.retry);
        let mut jitter = StdRng::from_entropy();

        loop {
            if self.shutdown.requested() {
                return EndReason::Shutdown;
            }
            if !self.state.is_active() {
                return EndReason::Inactive;
            }

            match self.session.connect().await {
                Ok(envelope) => {
                    backoff.reset();
                    if !envelope.successful(Stage::Connect) {
                        warn!(stage = %Stage::Connect, body = %envelope.body(), "server rejected request");
                    }
                    if let Some(reason) = self.dispatch(envelope.body()).await {
                        return reason;
                    }
                }
                Err(e) if e.is_transport() => {
                    let decision = backoff.on_failure(&mut jitter);
                    match decision {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                error = %e,
                                failures = backoff.consecutive_failures(),
                                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                "long poll failed, retrying"
                            );
                            if self.pause(delay).await {
                                return EndReason::Shutdown;
                            }
                            continue;
                        }
                        RetryDecision::GiveUp => {
                            error!(
                                error = %e,
                                failures = backoff.consecutive_failures(),
                                "too many consecutive long-poll failures"
                            );
                            return EndReason::TransportFailed(e.to_string());
                        }
                    }
                }
                Err(e) => {
                    backoff.reset();
                    warn!(error = %e, "unreadable long-poll response");
                }
            }

            if self.pause(self.poll_interval).await {
                return EndReason::Shutdown;
            }
        }
    }

    /// Sleep for `delay`. Returns `true` if shutdown was requested meanwhile.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => false,
            () = self.shutdown.wait() => true,
        }
    }

    /// React to one long-poll response. `Some` ends the loop.
    async fn dispatch(&mut self, raw: &str) -> Option<EndReason> {
        let push = match classify(raw) {
            Ok(push) => push,
            Err(e) => {
                warn!(error = %e, body = %raw, "could not decode server push");
                return None;
            }
        };
        debug!(kind = ?push.kind(), "server push");

        match push {
            ServerPush::Kicked => {
                self.state.deactivate();
                info!("kicked from the game");
                emit_event(&self.events, QuizEvent::Kicked);
                Some(EndReason::Kicked)
            }
            ServerPush::QuestionReady(question) => self.answer_question(question).await,
            ServerPush::QuestionUpcoming => {
                emit_event(&self.events, QuizEvent::QuestionUpcoming);
                None
            }
            ServerPush::Feedback(feedback) => {
                emit_event(
                    &self.events,
                    QuizEvent::Feedback {
                        message: feedback.primary_message,
                    },
                );
                None
            }
            ServerPush::QuestionResult(result) => {
                let report = ScoreReport::from(result);
                self.state.record_result(&report).await;
                info!(
                    correct = report.is_correct,
                    points = report.points,
                    total = report.total_score,
                    rank = report.rank,
                    nemesis = %report.nemesis_name,
                    "question result"
                );
                emit_event(&self.events, QuizEvent::QuestionResult(report));
                None
            }
            ServerPush::GameEnded(end) => {
                self.state.deactivate();
                let (quiz_id, player_count) = match end {
                    Some(end) => (Some(end.quiz_id), end.player_count),
                    None => {
                        warn!(body = %raw, "game over with an unreadable payload");
                        (None, None)
                    }
                };
                info!(quiz_id = ?quiz_id, players = ?player_count, "game over");
                emit_event(
                    &self.events,
                    QuizEvent::GameEnded {
                        quiz_id,
                        player_count,
                    },
                );
                Some(EndReason::GameEnded)
            }
            ServerPush::Idle => None,
        }
    }

    async fn answer_question(&mut self, question: QuestionPayload) -> Option<EndReason> {
        let question_number = question.question_index.saturating_add(1);
        let answer_count = question.answer_map.len();
        self.state.begin_question(question_number, answer_count).await;
        self.answers.discard_pending();
        emit_event(
            &self.events,
            QuizEvent::QuestionReady {
                question_number,
                answer_count,
            },
        );

        let chosen = tokio::select! {
            slot = self.answers.choose(question_number, answer_count) => slot,
            () = self.shutdown.wait() => return Some(EndReason::Shutdown),
        };
        let Some(slot) = chosen else {
            debug!(question_number, "no answer chosen");
            return None;
        };
        if slot >= answer_count {
            warn!(slot, answer_count, "answer slot out of range, not submitting");
            return None;
        }
        let Some(choice) = question.answer_map.answer_id(slot) else {
            warn!(slot, "answer map has no identifier for slot, not submitting");
            return None;
        };

        let accepted = match self.session.submit_answer(choice).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "answer submission failed");
                false
            }
        };
        self.state.acknowledge_answer(slot);
        info!(question_number, slot, accepted, "answer submitted");
        emit_event(
            &self.events,
            QuizEvent::AnswerSubmitted {
                question_number,
                slot,
                accepted,
            },
        );
        None
    }
}

// ── Event helpers ───────────────────────────────────────────────────

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid stalling the poll loop.
pub(crate) fn emit_event(events: &mpsc::Sender<QuizEvent>, event: QuizEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(event = ?dropped, "event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit [`QuizEvent::Disconnected`]. Waits for channel capacity because it is
/// always the last event and must not be dropped.
async fn emit_disconnected(events: &mpsc::Sender<QuizEvent>, reason: EndReason) {
    if events
        .send(QuizEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
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
    use crate::error::{QuizError, Result};
    use crate::player::RandomAnswers;
    use crate::protocol::{AnswerMeta, DeviceInfo, ScreenSize};
    use crate::session::ServerTarget;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    type Sent = Arc<StdMutex<Vec<(String, serde_json::Value)>>>;

    struct MockTransport {
        responses: VecDeque<Result<HttpResponse>>,
        sent: Sent,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(
            &mut self,
            url: &str,
            _headers: &[(&str, &str)],
            body: String,
        ) -> Result<HttpResponse> {
            self.sent
                .lock()
                .unwrap()
                .push((url.to_string(), serde_json::from_str(&body).unwrap()));
            match self.responses.pop_front() {
                Some(response) => response,
                // Past the script the server only has keep-alives.
                None => Ok(HttpResponse::ok(r#"[{"channel":"/meta/connect","successful":true}]"#)),
            }
        }
    }

    /// Always answers with a fixed slot.
    struct FixedAnswer(usize);

    #[async_trait]
    impl AnswerSource for FixedAnswer {
        async fn choose(&mut self, _question_number: u32, _answer_count: usize) -> Option<usize> {
            Some(self.0)
        }
    }

    fn push(content: serde_json::Value) -> Result<HttpResponse> {
        Ok(HttpResponse::ok(
            serde_json::json!([
                { "channel": "/service/player", "data": { "content": content.to_string() } },
                { "channel": "/meta/connect", "successful": true },
            ])
            .to_string(),
        ))
    }

    fn ok() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(r#"[{"successful":true}]"#))
    }

    struct Harness {
        sent: Sent,
        state: Arc<SessionState>,
        events: mpsc::Receiver<QuizEvent>,
        shutdown: Option<oneshot::Sender<()>>,
        poll_loop: Option<PollLoop<MockTransport>>,
    }

    /// Build a loop with a handshaken session whose later responses are
    /// `script` followed by keep-alives.
    async fn harness(script: Vec<Result<HttpResponse>>, answers: Box<dyn AnswerSource>) -> Harness {
        let sent = Sent::default();
        let mut responses = VecDeque::from(script);
        responses.push_front(Ok(HttpResponse::ok(
            r#"[{"successful":true,"clientId":"cid"}]"#,
        )
        .with_header("set-cookie", "k=v")));
        let transport = MockTransport {
            responses,
            sent: Arc::clone(&sent),
        };
        let meta = AnswerMeta {
            lag: 22,
            device: DeviceInfo {
                user_agent: "ua".into(),
                screen: ScreenSize {
                    width: 1337,
                    height: 1337,
                },
            },
        };
        let mut session = BayeuxSession::new(transport, ServerTarget::default(), 99, "tok", meta);
        session.handshake().await.unwrap();
        sent.lock().unwrap().clear();

        let state = Arc::new(SessionState::new(false, false));
        state.activate();
        let (events_tx, events) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let poll_loop = PollLoop {
            session,
            answers,
            state: Arc::clone(&state),
            events: events_tx,
            shutdown: ShutdownSignal::new(shutdown_rx),
            poll_interval: Duration::from_millis(1),
            retry: RetryPolicy::default()
                .with_delays(Duration::from_millis(1), Duration::from_millis(2))
                .with_max_consecutive_failures(Some(2)),
        };
        Harness {
            sent,
            state,
            events,
            shutdown: Some(shutdown_tx),
            poll_loop: Some(poll_loop),
        }
    }

    async fn drain(events: &mut mpsc::Receiver<QuizEvent>) -> Vec<QuizEvent> {
        let mut all = Vec::new();
        while let Some(event) = events.recv().await {
            all.push(event);
        }
        all
    }

    fn channels(sent: &Sent) -> Vec<String> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body["channel"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn kick_ends_the_loop_with_one_disconnect() {
        let mut h = harness(
            vec![Ok(HttpResponse::ok(
                r#"[{"data":{"content":"{\"kickCode\":1}"}}]"#,
            ))],
            Box::new(RandomAnswers::seeded(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;

        assert_eq!(channels(&h.sent), ["/meta/connect", "/meta/disconnect"]);
        assert_eq!(
            drain(&mut h.events).await,
            [
                QuizEvent::Kicked,
                QuizEvent::Disconnected {
                    reason: EndReason::Kicked
                }
            ]
        );
        assert!(!h.state.is_active());
    }

    #[tokio::test]
    async fn question_is_answered_with_the_mapped_identifier() {
        let mut h = harness(
            vec![
                push(serde_json::json!({"questionIndex": 0, "answerMap": {"0": 17, "1": 23}})),
                ok(),
                push(serde_json::json!({"quizId": "q", "playerCount": 3})),
            ],
            Box::new(FixedAnswer(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;

        let sent = h.sent.lock().unwrap().clone();
        let answer = &sent[1].1;
        assert_eq!(answer["channel"], "/service/controller");
        let content: crate::protocol::AnswerContent =
            crate::protocol::decode_content(answer["data"]["content"].as_str().unwrap()).unwrap();
        assert_eq!(content.choice, 23);

        let events = drain(&mut h.events).await;
        assert_eq!(
            events[..2],
            [
                QuizEvent::QuestionReady {
                    question_number: 1,
                    answer_count: 2
                },
                QuizEvent::AnswerSubmitted {
                    question_number: 1,
                    slot: 1,
                    accepted: true
                },
            ]
        );
        assert_eq!(h.state.last_answer(), crate::state::NO_ANSWER);
    }

    #[tokio::test]
    async fn game_end_marker_is_terminal_without_a_full_payload() {
        let mut h = harness(
            vec![push(serde_json::json!({"quizId": "q-1"}))],
            Box::new(RandomAnswers::seeded(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;

        assert_eq!(channels(&h.sent), ["/meta/connect", "/meta/disconnect"]);
        assert_eq!(
            drain(&mut h.events).await,
            [
                QuizEvent::GameEnded {
                    quiz_id: Some("q-1".into()),
                    player_count: None
                },
                QuizEvent::Disconnected {
                    reason: EndReason::GameEnded
                },
            ]
        );
        assert!(!h.state.is_active());
    }

    #[tokio::test]
    async fn out_of_range_slot_is_not_submitted() {
        let mut h = harness(
            vec![
                push(serde_json::json!({"questionIndex": 4, "answerMap": {"0": 1, "1": 2}})),
                push(serde_json::json!({"quizId": "q", "playerCount": 1})),
            ],
            Box::new(FixedAnswer(3)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;

        assert_eq!(
            channels(&h.sent),
            ["/meta/connect", "/meta/connect", "/meta/disconnect"]
        );
        let events = drain(&mut h.events).await;
        assert!(!events
            .iter()
            .any(|e| matches!(e, QuizEvent::AnswerSubmitted { .. })));
    }

    #[tokio::test]
    async fn malformed_payload_is_skipped() {
        let mut h = harness(
            vec![
                push(serde_json::json!({"isCorrect": "garbage"})),
                push(serde_json::json!({"quizId": "q", "playerCount": 1})),
            ],
            Box::new(RandomAnswers::seeded(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;
        let events = drain(&mut h.events).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], QuizEvent::GameEnded { .. }));
    }

    #[tokio::test]
    async fn transport_failures_beyond_the_bound_end_the_loop() {
        let failure = || Err(QuizError::Transport("connection reset".into()));
        let mut h = harness(
            vec![failure(), failure(), failure()],
            Box::new(RandomAnswers::seeded(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;

        assert_eq!(
            channels(&h.sent),
            [
                "/meta/connect",
                "/meta/connect",
                "/meta/connect",
                "/meta/disconnect"
            ]
        );
        let events = drain(&mut h.events).await;
        assert!(matches!(
            events.last(),
            Some(QuizEvent::Disconnected {
                reason: EndReason::TransportFailed(_)
            })
        ));
    }

    #[tokio::test]
    async fn success_resets_the_failure_count() {
        let failure = || Err(QuizError::Transport("connection reset".into()));
        let mut h = harness(
            vec![
                failure(),
                failure(),
                ok(),
                failure(),
                failure(),
                push(serde_json::json!({"quizId": "q", "playerCount": 1})),
            ],
            Box::new(RandomAnswers::seeded(1)),
        )
        .await;
        h.poll_loop.take().unwrap().run().await;
        let events = drain(&mut h.events).await;
        assert_eq!(
            events.last(),
            Some(&QuizEvent::Disconnected {
                reason: EndReason::GameEnded
            })
        );
    }

    #[tokio::test]
    async fn shutdown_interrupts_an_interactive_wait() {
        let (_choices, rx) = mpsc::unbounded_channel();
        let mut h = harness(
            vec![push(
                serde_json::json!({"questionIndex": 0, "answerMap": {"0": 1, "1": 2}}),
            )],
            Box::new(crate::player::ChannelAnswers::new(rx)),
        )
        .await;
        let task = tokio::spawn(h.poll_loop.take().unwrap().run());

        assert!(matches!(
            h.events.recv().await,
            Some(QuizEvent::QuestionReady { .. })
        ));
        h.shutdown.take().unwrap().send(()).unwrap();
        task.await.unwrap();

        assert_eq!(
            h.events.recv().await,
            Some(QuizEvent::Disconnected {
                reason: EndReason::Shutdown
            })
        );
        assert_eq!(channels(&h.sent), ["/meta/connect", "/meta/disconnect"]);
    }

    #[tokio::test]
    async fn inactive_session_exits_before_polling() {
        let mut h = harness(vec![], Box::new(RandomAnswers::seeded(1))).await;
        h.state.deactivate();
        h.poll_loop.take().unwrap().run().await;
        assert_eq!(channels(&h.sent), ["/meta/disconnect"]);
        assert_eq!(
            drain(&mut h.events).await,
            [QuizEvent::Disconnected {
                reason: EndReason::Inactive
            }]
        );
    }

    #[tokio::test]
    async fn shutdown_signal_fuses() {
        let (tx, rx) = oneshot::channel();
        let mut signal = ShutdownSignal::new(rx);
        assert!(!signal.requested());
        tx.send(()).unwrap();
        assert!(signal.requested());
        assert!(signal.requested());
        signal.wait().await;
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut signal = ShutdownSignal::new(rx);
        drop(tx);
        assert!(signal.requested());
    }
}
