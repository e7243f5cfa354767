//! Answer selection for the two play modes.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

/// How answers are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// The caller picks every answer through [`QuizClient::answer`](crate::QuizClient::answer).
    Interactive,
    /// A uniformly random slot is picked for every question.
    #[default]
    AutoAnswer,
}

/// Picks the answer slot for a live question.
#[async_trait]
pub trait AnswerSource: Send {
    /// Choose a slot for question `question_number`, which offers
    /// `answer_count` answers. `None` skips the question.
    async fn choose(&mut self, question_number: u32, answer_count: usize) -> Option<usize>;

    /// Drop choices made before the current question was announced.
    fn discard_pending(&mut self) {}
}

/// Answers chosen by the caller and delivered over a channel.
#[derive(Debug)]
pub struct ChannelAnswers {
    choices: mpsc::UnboundedReceiver<usize>,
}

impl ChannelAnswers {
    pub fn new(choices: mpsc::UnboundedReceiver<usize>) -> Self {
        Self { choices }
    }
}

#[async_trait]
impl AnswerSource for ChannelAnswers {
    async fn choose(&mut self, _question_number: u32, _answer_count: usize) -> Option<usize> {
        self.choices.recv().await
    }

    fn discard_pending(&mut self) {
        while let Ok(stale) = self.choices.try_recv() {
            tracing::debug!(slot = stale, "discarding answer chosen before the question");
        }
    }
}

/// Uniformly random answers.
#[derive(Debug)]
pub struct RandomAnswers {
    rng: StdRng,
}

impl RandomAnswers {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomAnswers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerSource for RandomAnswers {
    async fn choose(&mut self, _question_number: u32, answer_count: usize) -> Option<usize> {
        (answer_count > 0).then(|| self.rng.gen_range(0..answer_count))
    }
}
