//! # quizwire-client
//!
//! Async Rust client that joins and plays a live quiz game over the game
//! server's Bayeux (CometD) long-polling protocol.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any HTTP stack
//! - **reqwest built-in**: default `transport-reqwest` feature provides [`ReqwestTransport`]
//! - **Event-driven**: receive typed [`QuizEvent`]s via a channel
//! - **Two play modes**: answer by hand ([`PlayMode::Interactive`]) or let the
//!   client pick at random ([`PlayMode::AutoAnswer`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quizwire_client::{
//!     QuizClient, QuizConfig, QuizEvent, ReqwestTransport, ResolvedSession,
//!     StaticTokenResolver,
//! };
//!
//! let resolver = StaticTokenResolver::new(123456, ResolvedSession::new(token));
//! let config = QuizConfig::new(123456, "Alice");
//! let (_client, mut events) =
//!     QuizClient::start(ReqwestTransport::new()?, &resolver, config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod backoff;
pub mod classifier;
pub mod client;
pub mod error;
pub mod event;
pub mod player;
mod poll_loop;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod stage;
mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use backoff::RetryPolicy;
pub use classifier::{classify, classify_kind, PushKind, ServerPush};
pub use client::{LoginPolicy, QuizClient, QuizConfig};
pub use error::{QuizError, Result};
pub use event::{EndReason, QuizEvent, ScoreReport};
pub use player::{AnswerSource, PlayMode};
pub use protocol::decode_content;
pub use resolver::{ResolvedSession, SessionTokenResolver, StaticTokenResolver};
pub use stage::Stage;
pub use state::{slot_validity, Scoreboard, NO_ANSWER};
pub use transport::{HttpResponse, Transport};
#[cfg(feature = "transport-reqwest")]
pub use transports::ReqwestTransport;
