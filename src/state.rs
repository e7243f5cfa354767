//! Player-visible state shared between the client handle and the poll loop.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::event::{ScoreReport, NO_NEMESIS};

/// Slot reported by the answer accessors when there is nothing to report.
pub const NO_ANSWER: i32 = -1;

/// Snapshot of the player's standing and the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    /// 1-based number of the current question, 0 before the first one.
    pub question_number: u32,
    /// Number of answers the current question offers.
    pub answer_count: usize,
    /// Whether the third answer slot (index 2) exists.
    pub slot2_valid: bool,
    /// Whether the fourth answer slot (index 3) exists.
    pub slot3_valid: bool,
    /// Points earned on the last question.
    pub last_score: i64,
    pub total_score: i64,
    pub rank: u32,
    pub nemesis_name: String,
    pub nemesis_points: i64,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self {
            question_number: 0,
            answer_count: 0,
            slot2_valid: false,
            slot3_valid: false,
            last_score: 0,
            total_score: 0,
            rank: 0,
            nemesis_name: NO_NEMESIS.to_string(),
            nemesis_points: 0,
        }
    }
}

/// Which of the optional answer slots a question with `answer_count` answers
/// offers: `(slot2_valid, slot3_valid)`.
pub fn slot_validity(answer_count: usize) -> (bool, bool) {
    (answer_count >= 3, answer_count >= 4)
}

/// Shared state. Written by the poll loop, read through the client handle.
pub(crate) struct SessionState {
    active: AtomicBool,
    /// Set once the session has been deactivated; `active` never comes back.
    ended: AtomicBool,
    is_team_game: bool,
    two_factor_auth: bool,
    last_answer_slot: AtomicI32,
    answer_acknowledged: AtomicBool,
    answer_ready: Notify,
    scoreboard: Mutex<Scoreboard>,
}

impl SessionState {
    pub(crate) fn new(is_team_game: bool, two_factor_auth: bool) -> Self {
        Self {
            active: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            is_team_game,
            two_factor_auth,
            last_answer_slot: AtomicI32::new(NO_ANSWER),
            answer_acknowledged: AtomicBool::new(false),
            answer_ready: Notify::new(),
            scoreboard: Mutex::new(Scoreboard::default()),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the session active, unless it has already ended.
    pub(crate) fn activate(&self) {
        if !self.ended.load(Ordering::Acquire) {
            self.active.store(true, Ordering::Release);
        }
    }

    /// Mark the session inactive for good and release anyone waiting for an
    /// answer.
    pub(crate) fn deactivate(&self) {
        self.ended.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.answer_ready.notify_waiters();
    }

    pub(crate) fn is_team_game(&self) -> bool {
        self.is_team_game
    }

    pub(crate) fn two_factor_auth(&self) -> bool {
        self.two_factor_auth
    }

    // ── Answers ─────────────────────────────────────────────────────

    /// Record the submitted slot, then mark it acknowledged.
    pub(crate) fn acknowledge_answer(&self, slot: usize) {
        let slot = i32::try_from(slot).unwrap_or(NO_ANSWER);
        self.last_answer_slot.store(slot, Ordering::Release);
        self.answer_acknowledged.store(true, Ordering::Release);
        self.answer_ready.notify_waiters();
    }

    /// Consume the acknowledgement without waiting. Returns the last slot
    /// while the session is active, [`NO_ANSWER`] otherwise.
    pub(crate) fn last_answer(&self) -> i32 {
        self.answer_acknowledged.store(false, Ordering::Release);
        if self.is_active() {
            self.last_answer_slot.load(Ordering::Acquire)
        } else {
            NO_ANSWER
        }
    }

    /// Wait until an answer is acknowledged, consume the acknowledgement and
    /// return its slot. Returns [`NO_ANSWER`] if the session ends first.
    pub(crate) async fn last_answer_blocking(&self) -> i32 {
        loop {
            let notified = self.answer_ready.notified();
            tokio::pin!(notified);
            // Register before checking so a notification between the check
            // and the await is not lost.
            notified.as_mut().enable();

            if self.answer_acknowledged.swap(false, Ordering::AcqRel) {
                return self.last_answer_slot.load(Ordering::Acquire);
            }
            if self.ended.load(Ordering::Acquire) {
                return NO_ANSWER;
            }
            notified.await;
        }
    }

    // ── Scoreboard ──────────────────────────────────────────────────

    /// Start a new question.
    pub(crate) async fn begin_question(&self, question_number: u32, answer_count: usize) {
        let (slot2_valid, slot3_valid) = slot_validity(answer_count);
        let mut board = self.scoreboard.lock().await;
        board.question_number = question_number;
        board.answer_count = answer_count;
        board.slot2_valid = slot2_valid;
        board.slot3_valid = slot3_valid;
    }

    pub(crate) async fn record_result(&self, report: &ScoreReport) {
        let mut board = self.scoreboard.lock().await;
        board.last_score = report.points;
        board.total_score = report.total_score;
        board.rank = report.rank;
        board.nemesis_name.clone_from(&report.nemesis_name);
        board.nemesis_points = report.nemesis_points;
    }

    pub(crate) async fn scoreboard(&self) -> Scoreboard {
        self.scoreboard.lock().await.clone()
    }

    /// Read one value off the scoreboard.
    pub(crate) async fn read<R>(&self, f: impl FnOnce(&Scoreboard) -> R) -> R {
        f(&*self.scoreboard.lock().await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn slot_validity_table() {
        assert_eq!(slot_validity(0), (false, false));
        assert_eq!(slot_validity(2), (false, false));
        assert_eq!(slot_validity(3), (true, false));
        assert_eq!(slot_validity(4), (true, true));
        assert_eq!(slot_validity(6), (true, true));
    }

    #[test]
    fn active_never_returns_after_deactivation() {
        let state = SessionState::new(false, false);
        assert!(!state.is_active());
        state.activate();
        assert!(state.is_active());
        state.deactivate();
        state.activate();
        assert!(!state.is_active());
    }

    #[test]
    fn last_answer_is_idempotent() {
        let state = SessionState::new(false, false);
        state.activate();
        assert_eq!(state.last_answer(), NO_ANSWER);
        state.acknowledge_answer(2);
        assert_eq!(state.last_answer(), 2);
        assert_eq!(state.last_answer(), 2);
        state.deactivate();
        assert_eq!(state.last_answer(), NO_ANSWER);
    }

    #[tokio::test]
    async fn blocking_accessor_consumes_acknowledgement_once() {
        let state = SessionState::new(false, false);
        state.activate();
        state.acknowledge_answer(1);
        assert_eq!(state.last_answer_blocking().await, 1);

        // The acknowledgement is consumed: the next call waits.
        let pending =
            tokio::time::timeout(Duration::from_millis(20), state.last_answer_blocking()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn blocking_accessor_wakes_on_acknowledgement() {
        let state = Arc::new(SessionState::new(false, false));
        state.activate();
        let waiter = tokio::spawn({
            let state = Arc::clone(&state);
            async move { state.last_answer_blocking().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.acknowledge_answer(3);
        assert_eq!(waiter.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn blocking_accessor_returns_no_answer_when_session_ends() {
        let state = Arc::new(SessionState::new(false, false));
        state.activate();
        let waiter = tokio::spawn({
            let state = Arc::clone(&state);
            async move { state.last_answer_blocking().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.deactivate();
        assert_eq!(waiter.await.unwrap(), NO_ANSWER);
    }

    #[tokio::test]
    async fn scoreboard_tracks_questions_and_results() {
        let state = SessionState::new(true, false);
        assert!(state.is_team_game());
        assert!(!state.two_factor_auth());
        assert_eq!(state.scoreboard().await.nemesis_name, "no one");

        state.begin_question(3, 3).await;
        state
            .record_result(&ScoreReport {
                is_correct: true,
                points: 900,
                total_score: 2500,
                rank: 2,
                nemesis_name: "dave".into(),
                nemesis_points: 2600,
            })
            .await;
        let board = state.scoreboard().await;
        assert_eq!(board.question_number, 3);
        assert_eq!(board.answer_count, 3);
        assert!(board.slot2_valid);
        assert!(!board.slot3_valid);
        assert_eq!(board.last_score, 900);
        assert_eq!(board.total_score, 2500);
        assert_eq!(board.rank, 2);
        assert_eq!(board.nemesis_name, "dave");
        assert_eq!(board.nemesis_points, 2600);
    }
}
