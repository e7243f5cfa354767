//! Resolution of a game pin into a session token.
//!
//! Looking up a pin and decoding the session token it returns is done by an
//! external service. This crate only needs the result, described by
//! [`ResolvedSession`], and reaches the service through the
//! [`SessionTokenResolver`] trait.

use async_trait::async_trait;

use crate::error::{QuizError, Result};

/// Decoded session token and game metadata for one game pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    /// The decoded session token used in every request path.
    pub decoded_token: String,
    /// Whether the game is played in teams.
    pub is_team_game: bool,
    /// Whether the game requires two-factor authentication.
    pub is_two_factor: bool,
}

impl ResolvedSession {
    /// A classic (non-team, no two-factor) game with the given token.
    pub fn new(decoded_token: impl Into<String>) -> Self {
        Self {
            decoded_token: decoded_token.into(),
            is_team_game: false,
            is_two_factor: false,
        }
    }

    #[must_use]
    pub fn with_team_game(mut self, is_team_game: bool) -> Self {
        self.is_team_game = is_team_game;
        self
    }

    #[must_use]
    pub fn with_two_factor(mut self, is_two_factor: bool) -> Self {
        self.is_two_factor = is_two_factor;
        self
    }
}

/// Turns a game pin into a [`ResolvedSession`].
#[async_trait]
pub trait SessionTokenResolver: Send + Sync {
    /// Resolve `game_pin`.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Resolution`] if the pin is invalid or unknown.
    async fn resolve(&self, game_pin: u32) -> Result<ResolvedSession>;
}

/// A resolver that hands back a token obtained elsewhere.
///
/// Useful when the token was resolved out of band, and in tests.
#[derive(Debug, Clone)]
pub struct StaticTokenResolver {
    game_pin: u32,
    session: ResolvedSession,
}

impl StaticTokenResolver {
    /// Resolve `game_pin` (and only that pin) to `session`.
    pub fn new(game_pin: u32, session: ResolvedSession) -> Self {
        Self { game_pin, session }
    }
}

#[async_trait]
impl SessionTokenResolver for StaticTokenResolver {
    async fn resolve(&self, game_pin: u32) -> Result<ResolvedSession> {
        if game_pin != self.game_pin {
            return Err(QuizError::Resolution {
                pin: game_pin,
                reason: format!("no token known for pin {game_pin}"),
            });
        }
        Ok(self.session.clone())
    }
}
