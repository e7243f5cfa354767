#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style client tests for quizwire-client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script the game
//! server and verify that `QuizClient` joins, plays and leaves correctly:
//! request sequence, state transitions and event delivery.

mod common;

use std::time::Duration;

use quizwire_client::protocol::AnswerContent;
use serde_json::json;
use quizwire_client::{
    decode_content, EndReason, HttpResponse, LoginPolicy, PlayMode, QuizClient, QuizConfig,
    QuizError, QuizEvent, ResolvedSession, RetryPolicy, Stage, StaticTokenResolver, NO_ANSWER,
};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use common::{
    bootstrap_script, channels, count, feedback, game_over, handshake_response, joined_script,
    kick, ok_response, push, question, rejected_response, result, transport_error, upcoming_question,
    MockTransport, Sent, CLIENT_ID, COOKIE,
};

const PIN: u32 = 482_913;
const TOKEN: &str = "f3e1a9c07b";

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn resolver() -> StaticTokenResolver {
    StaticTokenResolver::new(PIN, ResolvedSession::new(TOKEN))
}

fn config() -> QuizConfig {
    QuizConfig::new(PIN, "tester")
        .with_poll_interval(Duration::from_millis(1))
        .with_rng_seed(7)
        .with_shutdown_timeout(Duration::from_secs(5))
}

/// Start a client against `script` (which must cover the bootstrap).
async fn start(
    script: Vec<Result<HttpResponse, QuizError>>,
    config: QuizConfig,
) -> (QuizClient, mpsc::Receiver<QuizEvent>, Sent) {
    let (transport, sent) = MockTransport::new(script);
    let (client, events) = QuizClient::start(transport, &resolver(), config)
        .await
        .expect("client should start");
    (client, events, sent)
}

/// `joined_script()` followed by `pushes`.
fn game(pushes: Vec<Result<HttpResponse, QuizError>>) -> Vec<Result<HttpResponse, QuizError>> {
    let mut script = joined_script();
    script.extend(pushes);
    script
}

/// Collect every event up to and including `Disconnected`.
async fn collect_until_disconnected(events: &mut mpsc::Receiver<QuizEvent>) -> Vec<QuizEvent> {
    let mut all = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for events")
    {
        let last = matches!(event, QuizEvent::Disconnected { .. });
        all.push(event);
        if last {
            break;
        }
    }
    all
}

/// Wait for the first event matching `pred`.
async fn wait_for(
    events: &mut mpsc::Receiver<QuizEvent>,
    pred: impl Fn(&QuizEvent) -> bool,
) -> QuizEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

/// Decoded answer contents of every submission, in order.
fn submitted_choices(sent: &Sent) -> Vec<i64> {
    sent.lock()
        .unwrap()
        .iter()
        .filter(|request| request.body["data"]["type"] == "message")
        .map(|request| {
            let content: AnswerContent =
                decode_content(request.body["data"]["content"].as_str().unwrap()).unwrap();
            content.choice
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════
// Join sequence
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_sequence_and_session_headers() {
    let (mut client, mut events, sent) = start(joined_script(), config()).await;
    assert_eq!(
        events.recv().await,
        Some(QuizEvent::Joined {
            game_pin: PIN,
            username: "tester".into()
        })
    );
    client.shutdown().await;

    let sent = sent.lock().unwrap().clone();
    let base = format!("https://kahoot.it/cometd/{PIN}/{TOKEN}");
    let expected = [
        (format!("{base}/handshake"), "/meta/handshake"),
        (base.clone(), "/meta/unsubscribe"),
        (format!("{base}/connect"), "/meta/connect"),
        (base.clone(), "/meta/subscribe"),
        (base.clone(), "/meta/subscribe"),
        (base.clone(), "/meta/subscribe"),
        (base.clone(), "/service/controller"),
        (format!("{base}/connect"), "/meta/connect"),
    ];
    for (request, (url, channel)) in sent.iter().zip(expected.iter()) {
        assert_eq!(&request.url, url);
        assert_eq!(request.channel(), *channel);
    }

    assert!(sent[0].cookie.is_none());
    for request in &sent[1..] {
        assert_eq!(request.cookie.as_deref(), Some(COOKIE));
        assert_eq!(request.body["clientId"], CLIENT_ID);
    }
    let subscriptions: Vec<_> = sent[3..6]
        .iter()
        .map(|r| r.body["subscription"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        subscriptions,
        ["/service/status", "/service/player", "/service/controller"]
    );
    assert_eq!(sent[6].body["data"]["type"], "login");
    assert_eq!(sent[6].body["data"]["name"], "tester");
    assert_eq!(sent[6].body["data"]["gameid"], PIN);
    assert_eq!(sent.last().unwrap().url, format!("{base}/disconnect"));
}

#[tokio::test]
async fn handshake_without_client_id_fails_start() {
    let script = vec![Ok(
        HttpResponse::ok(r#"[{"successful":true}]"#).with_header("Set-Cookie", "a=b")
    )];
    let (transport, sent) = MockTransport::new(script);
    let err = assert_err!(QuizClient::start(transport, &resolver(), config()).await);
    assert!(matches!(err, QuizError::Protocol(_)));
    assert_eq!(channels(&sent), ["/meta/handshake"]);
}

#[tokio::test]
async fn handshake_transport_failure_fails_start() {
    let (transport, _sent) = MockTransport::new(vec![transport_error()]);
    let err = assert_err!(QuizClient::start(transport, &resolver(), config()).await);
    assert!(err.is_transport());
}

#[tokio::test]
async fn bootstrap_continues_past_rejection_and_transport_error() {
    let script = vec![
        handshake_response(),
        rejected_response(),
        transport_error(),
        rejected_response(),
        ok_response(),
        transport_error(),
        ok_response(),
        ok_response(),
    ];
    let (mut client, _events, sent) = start(script, config()).await;
    assert!(client.is_active());
    client.shutdown().await;

    assert_eq!(
        channels(&sent)[..8],
        [
            "/meta/handshake",
            "/meta/unsubscribe",
            "/meta/connect",
            "/meta/subscribe",
            "/meta/subscribe",
            "/meta/subscribe",
            "/service/controller",
            "/meta/connect",
        ]
    );
}

#[tokio::test]
async fn optimistic_login_plays_despite_rejection() {
    let mut script = bootstrap_script();
    script.extend([rejected_response(), rejected_response(), game_over("q", 2)]);
    let (_client, mut events, _sent) = start(script, config()).await;

    let all = collect_until_disconnected(&mut events).await;
    assert!(matches!(all[0], QuizEvent::Joined { .. }));
    assert_eq!(
        all.last(),
        Some(&QuizEvent::Disconnected {
            reason: EndReason::GameEnded
        })
    );
}

#[tokio::test]
async fn strict_login_rejection_fails_start_and_disconnects() {
    let mut script = bootstrap_script();
    script.extend([ok_response(), rejected_response(), ok_response()]);
    let (transport, sent) = MockTransport::new(script);
    let config = config().with_login_policy(LoginPolicy::Strict);
    let err = assert_err!(QuizClient::start(transport, &resolver(), config).await);
    assert!(matches!(
        err,
        QuizError::ServerRejected {
            stage: Stage::LoginConnect,
            ..
        }
    ));
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
}

#[tokio::test]
async fn resolved_flags_are_exposed() {
    let resolver = StaticTokenResolver::new(
        PIN,
        ResolvedSession::new(TOKEN)
            .with_team_game(true)
            .with_two_factor(true),
    );
    let (transport, _sent) = MockTransport::new(joined_script());
    let (mut client, _events) = assert_ok!(QuizClient::start(transport, &resolver, config()).await);
    assert!(client.is_team_game());
    assert!(client.two_factor_auth());
    assert_eq!(client.game_pin(), PIN);
    assert_eq!(client.username(), "tester");
    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Game end
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn kick_ends_the_game_with_exactly_one_disconnect() {
    let (client, mut events, sent) = start(game(vec![kick()]), config()).await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all,
        [
            QuizEvent::Joined {
                game_pin: PIN,
                username: "tester".into()
            },
            QuizEvent::Kicked,
            QuizEvent::Disconnected {
                reason: EndReason::Kicked
            },
        ]
    );
    assert!(!client.is_active());
    assert_eq!(events.recv().await, None);

    let channels = channels(&sent);
    assert_eq!(channels.last().map(String::as_str), Some("/meta/disconnect"));
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
    // Bootstrap, login and the poll that delivered the kick; nothing after.
    assert_eq!(count(&sent, "/meta/connect"), 3);
}

#[tokio::test]
async fn game_end_reports_quiz_and_disconnects_once() {
    let (client, mut events, sent) = start(
        game(vec![ok_response(), game_over("a1b2c3", 27)]),
        config(),
    )
    .await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all[all.len() - 2..],
        [
            QuizEvent::GameEnded {
                quiz_id: Some("a1b2c3".into()),
                player_count: Some(27)
            },
            QuizEvent::Disconnected {
                reason: EndReason::GameEnded
            },
        ]
    );
    assert!(!client.is_active());
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
    assert_eq!(count(&sent, "/meta/connect"), 4);
}

#[tokio::test]
async fn game_end_without_player_count_still_ends_the_session() {
    let (client, mut events, sent) = start(
        game(vec![push(&json!({ "quizId": "q-1" }))]),
        config(),
    )
    .await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all[all.len() - 2..],
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
    assert!(!client.is_active());
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
    assert_eq!(count(&sent, "/meta/connect"), 3);
}

#[tokio::test]
async fn unreadable_game_end_still_ends_the_session() {
    let broken = Ok(HttpResponse::ok(
        r#"[{"data":{"content":"{\"quizId\": "}},{"successful":true}]"#,
    ));
    let (client, mut events, sent) = start(game(vec![broken]), config()).await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all[all.len() - 2..],
        [
            QuizEvent::GameEnded {
                quiz_id: None,
                player_count: None
            },
            QuizEvent::Disconnected {
                reason: EndReason::GameEnded
            },
        ]
    );
    assert!(!client.is_active());
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
}

#[tokio::test]
async fn shutdown_disconnects_and_emits_disconnected_last() {
    let (mut client, mut events, sent) = start(joined_script(), config()).await;
    client.shutdown().await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all.last(),
        Some(&QuizEvent::Disconnected {
            reason: EndReason::Shutdown
        })
    );
    assert_eq!(events.recv().await, None);
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
    assert!(!client.is_active());
}

#[tokio::test]
async fn repeated_transport_failures_end_the_game() {
    let retry = RetryPolicy::default()
        .with_max_consecutive_failures(Some(3))
        .with_delays(Duration::from_millis(1), Duration::from_millis(4));
    let script = game(vec![
        transport_error(),
        transport_error(),
        transport_error(),
        transport_error(),
    ]);
    let (_client, mut events, sent) = start(script, config().with_retry_policy(retry)).await;

    let all = collect_until_disconnected(&mut events).await;
    assert!(matches!(
        all.last(),
        Some(QuizEvent::Disconnected {
            reason: EndReason::TransportFailed(_)
        })
    ));
    // Bootstrap + login connects, then four failed polls.
    assert_eq!(count(&sent, "/meta/connect"), 6);
    assert_eq!(count(&sent, "/meta/disconnect"), 1);
}

#[tokio::test]
async fn a_successful_poll_resets_the_failure_count() {
    let retry = RetryPolicy::default()
        .with_max_consecutive_failures(Some(2))
        .with_delays(Duration::from_millis(1), Duration::from_millis(2));
    let script = game(vec![
        transport_error(),
        transport_error(),
        ok_response(),
        transport_error(),
        transport_error(),
        game_over("q", 1),
    ]);
    let (_client, mut events, _sent) = start(script, config().with_retry_policy(retry)).await;

    let all = collect_until_disconnected(&mut events).await;
    assert_eq!(
        all.last(),
        Some(&QuizEvent::Disconnected {
            reason: EndReason::GameEnded
        })
    );
}

// ════════════════════════════════════════════════════════════════════
// Questions and results
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn two_answer_question_is_answered_automatically() {
    let (client, mut events, sent) = start(game(vec![question(0, &[41, 97])]), config()).await;

    let ready = wait_for(&mut events, |e| matches!(e, QuizEvent::QuestionReady { .. })).await;
    assert_eq!(
        ready,
        QuizEvent::QuestionReady {
            question_number: 1,
            answer_count: 2
        }
    );
    let QuizEvent::AnswerSubmitted {
        question_number,
        slot,
        accepted,
    } = wait_for(&mut events, |e| matches!(e, QuizEvent::AnswerSubmitted { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(question_number, 1);
    assert!(slot < 2);
    assert!(accepted);

    assert_eq!(client.question_number().await, 1);
    assert!(!client.slot2_valid().await);
    assert!(!client.slot3_valid().await);
    assert_eq!(submitted_choices(&sent), [[41_i64, 97][slot]]);
}

#[tokio::test]
async fn automatic_answers_stay_within_the_answer_map() {
    // Every question is followed by the reply to its answer submission.
    let pushes = vec![
        question(0, &[1, 2, 3, 4]),
        ok_response(),
        question(1, &[5, 6, 7]),
        ok_response(),
        question(2, &[8, 9]),
        ok_response(),
        question(3, &[10, 11, 12, 13]),
        ok_response(),
        question(4, &[14, 15]),
        ok_response(),
        game_over("q", 1),
    ];
    let (_client, mut events, sent) = start(game(pushes), config()).await;
    let all = collect_until_disconnected(&mut events).await;

    let submitted: Vec<(u32, usize)> = all
        .iter()
        .filter_map(|e| match e {
            QuizEvent::AnswerSubmitted {
                question_number,
                slot,
                ..
            } => Some((*question_number, *slot)),
            _ => None,
        })
        .collect();
    let counts = [4, 3, 2, 4, 2];
    assert_eq!(submitted.len(), counts.len());
    assert_eq!(
        all.last(),
        Some(&QuizEvent::Disconnected {
            reason: EndReason::GameEnded
        })
    );
    for ((number, slot), count) in submitted.iter().zip(counts) {
        assert!(*slot < count, "question {number}: slot {slot} of {count}");
    }

    let maps: [&[i64]; 5] = [&[1, 2, 3, 4], &[5, 6, 7], &[8, 9], &[10, 11, 12, 13], &[14, 15]];
    let choices = submitted_choices(&sent);
    for (i, ((_, slot), map)) in submitted.iter().zip(maps).enumerate() {
        assert_eq!(choices[i], map[*slot]);
    }
}

#[tokio::test]
async fn slot_validity_follows_the_answer_count() {
    let (client, mut events, _sent) = start(game(vec![question(2, &[1, 2, 3])]), config()).await;
    wait_for(&mut events, |e| matches!(e, QuizEvent::AnswerSubmitted { .. })).await;
    let board = client.scoreboard().await;
    assert_eq!(board.question_number, 3);
    assert_eq!(board.answer_count, 3);
    assert!(board.slot2_valid);
    assert!(!board.slot3_valid);
}

#[tokio::test]
async fn upcoming_question_is_not_answered() {
    let (_client, mut events, sent) = start(
        game(vec![upcoming_question(0), game_over("q", 1)]),
        config(),
    )
    .await;
    let all = collect_until_disconnected(&mut events).await;
    assert!(all.contains(&QuizEvent::QuestionUpcoming));
    assert!(!all
        .iter()
        .any(|e| matches!(e, QuizEvent::QuestionReady { .. })));
    assert!(submitted_choices(&sent).is_empty());
}

#[tokio::test]
async fn result_without_nemesis_reports_no_one() {
    let (client, mut events, _sent) =
        start(game(vec![result(987, 3012, 1, None)]), config()).await;

    let QuizEvent::QuestionResult(report) =
        wait_for(&mut events, |e| matches!(e, QuizEvent::QuestionResult(_))).await
    else {
        unreachable!()
    };
    assert!(report.is_correct);
    assert_eq!(report.points, 987);
    assert_eq!(report.total_score, 3012);
    assert_eq!(report.rank, 1);
    assert_eq!(report.nemesis_name, "no one");
    assert_eq!(report.nemesis_points, 987);

    assert_eq!(client.last_score().await, 987);
    assert_eq!(client.total_score().await, 3012);
    assert_eq!(client.rank().await, 1);
    assert_eq!(client.nemesis().await, "no one");
    assert_eq!(client.nemesis_points().await, 987);
}

#[tokio::test]
async fn result_with_nemesis_updates_the_scoreboard() {
    let (client, mut events, _sent) = start(
        game(vec![result(0, 1200, 4, Some(("marta", 1450)))]),
        config(),
    )
    .await;
    wait_for(&mut events, |e| matches!(e, QuizEvent::QuestionResult(_))).await;
    let board = client.scoreboard().await;
    assert_eq!(board.last_score, 0);
    assert_eq!(board.total_score, 1200);
    assert_eq!(board.rank, 4);
    assert_eq!(board.nemesis_name, "marta");
    assert_eq!(board.nemesis_points, 1450);
}

#[tokio::test]
async fn feedback_is_forwarded() {
    let (_client, mut events, _sent) =
        start(game(vec![feedback("You're on fire!")]), config()).await;
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, QuizEvent::Feedback { .. })).await,
        QuizEvent::Feedback {
            message: "You're on fire!".into()
        }
    );
}

#[tokio::test]
async fn malformed_push_does_not_stop_the_game() {
    let broken = Ok(HttpResponse::ok(
        r#"[{"data":{"content":"{\"isCorrect\": tru"}}]"#,
    ));
    let (_client, mut events, _sent) = start(
        game(vec![broken, feedback("still here"), game_over("q", 1)]),
        config(),
    )
    .await;
    let all = collect_until_disconnected(&mut events).await;
    assert!(all.contains(&QuizEvent::Feedback {
        message: "still here".into()
    }));
    assert_eq!(
        all.last(),
        Some(&QuizEvent::Disconnected {
            reason: EndReason::GameEnded
        })
    );
}

#[tokio::test]
async fn failed_submission_is_still_acknowledged() {
    let (client, mut events, _sent) = start(
        game(vec![question(0, &[1, 2]), transport_error()]),
        config(),
    )
    .await;
    let QuizEvent::AnswerSubmitted { slot, accepted, .. } =
        wait_for(&mut events, |e| matches!(e, QuizEvent::AnswerSubmitted { .. })).await
    else {
        unreachable!()
    };
    assert!(!accepted);
    assert_eq!(client.last_answer(), i32::try_from(slot).unwrap());
}

// ════════════════════════════════════════════════════════════════════
// Answer accessors
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn last_answer_is_idempotent() {
    let (client, mut events, _sent) = start(game(vec![question(0, &[1, 2, 3, 4])]), config()).await;
    assert_eq!(client.last_answer(), NO_ANSWER);

    let QuizEvent::AnswerSubmitted { slot, .. } =
        wait_for(&mut events, |e| matches!(e, QuizEvent::AnswerSubmitted { .. })).await
    else {
        unreachable!()
    };
    let slot = i32::try_from(slot).unwrap();
    assert_eq!(client.last_answer(), slot);
    assert_eq!(client.last_answer(), slot);
}

#[tokio::test]
async fn last_answer_is_reset_once_the_game_ends() {
    let (client, mut events, _sent) = start(
        game(vec![question(0, &[1, 2]), ok_response(), game_over("q", 1)]),
        config(),
    )
    .await;
    collect_until_disconnected(&mut events).await;
    assert_eq!(client.last_answer(), NO_ANSWER);
}

#[tokio::test]
async fn blocking_accessor_returns_no_answer_when_the_game_ends() {
    let mut pushes: Vec<_> = (0..20).map(|_| ok_response()).collect();
    pushes.push(game_over("q", 1));
    let (client, _events, _sent) = start(game(pushes), config()).await;
    let slot = tokio::time::timeout(Duration::from_secs(5), client.last_answer_blocking())
        .await
        .expect("accessor should return when the game ends");
    assert_eq!(slot, NO_ANSWER);
}

// ════════════════════════════════════════════════════════════════════
// Interactive play
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn interactive_choice_is_forwarded() {
    let config = config().with_mode(PlayMode::Interactive);
    let (client, mut events, sent) = start(game(vec![question(0, &[11, 22, 33])]), config).await;
    assert_eq!(client.mode(), PlayMode::Interactive);

    wait_for(&mut events, |e| matches!(e, QuizEvent::QuestionReady { .. })).await;
    assert_ok!(client.answer(2).await);
    assert_eq!(client.last_answer_blocking().await, 2);

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, QuizEvent::AnswerSubmitted { .. })).await,
        QuizEvent::AnswerSubmitted {
            question_number: 1,
            slot: 2,
            accepted: true
        }
    );
    assert_eq!(submitted_choices(&sent), [33]);
}

#[tokio::test]
async fn interactive_out_of_range_choice_is_not_submitted() {
    let config = config().with_mode(PlayMode::Interactive);
    let (client, mut events, sent) = start(game(vec![question(0, &[11, 22, 33])]), config).await;

    wait_for(&mut events, |e| matches!(e, QuizEvent::QuestionReady { .. })).await;
    let err = assert_err!(client.answer(3).await);
    assert!(matches!(err, QuizError::InvalidAnswer { slot: 3, count: 3 }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(submitted_choices(&sent).is_empty());
}

#[tokio::test]
async fn answers_are_rejected_in_auto_mode_and_after_the_game() {
    let (client, mut events, _sent) = start(game(vec![game_over("q", 1)]), config()).await;
    assert!(matches!(
        client.answer(0).await,
        Err(QuizError::NotInteractive | QuizError::NotActive)
    ));
    collect_until_disconnected(&mut events).await;
    assert!(matches!(client.answer(0).await, Err(QuizError::NotActive)));
}
