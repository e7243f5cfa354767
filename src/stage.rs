//! Protocol stages of a quiz session.
//!
//! Every request the client issues belongs to exactly one [`Stage`]. Stages
//! are carried by [`QuizError::ServerRejected`](crate::QuizError::ServerRejected)
//! and by log records so that a rejected response can be traced back to the
//! request that produced it.

use std::fmt;

use crate::protocol::Channel;

/// A single request in the fixed join/play/leave sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `/meta/handshake`, assigns the client id and session cookie.
    Handshake,
    /// `/meta/unsubscribe` issued during bootstrap.
    Unsubscribe(Channel),
    /// The `/meta/connect` issued during bootstrap, before subscribing.
    BootstrapConnect,
    /// `/meta/subscribe` for one service channel.
    Subscribe(Channel),
    /// The `login` controller message.
    Login,
    /// The `/meta/connect` that completes the login.
    LoginConnect,
    /// A regular long-poll `/meta/connect`.
    Connect,
    /// An answer submission on `/service/controller`.
    Answer,
    /// `/meta/disconnect`.
    Disconnect,
}

impl Stage {
    /// Returns a human-readable description of this stage.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Handshake => "negotiating the session with the game server",
            Stage::Unsubscribe(_) => "clearing a stale server-side subscription",
            Stage::BootstrapConnect => "opening the first long-poll connection",
            Stage::Subscribe(Channel::Status) => "subscribing to game status updates",
            Stage::Subscribe(Channel::Player) => "subscribing to player updates",
            Stage::Subscribe(Channel::Controller) => "subscribing to the game controller",
            Stage::Login => "logging in to the game",
            Stage::LoginConnect => "completing the login long-poll",
            Stage::Connect => "polling the game server",
            Stage::Answer => "submitting an answer",
            Stage::Disconnect => "leaving the game",
        }
    }

    /// Returns `true` for stages whose `successful` flag is read from the
    /// **last** element of the response array.
    ///
    /// Bootstrap stages (handshake, subscriptions, the bootstrap connect) and
    /// disconnect read the first element instead.
    pub fn reads_last_element(&self) -> bool {
        matches!(
            self,
            Stage::Login | Stage::LoginConnect | Stage::Connect | Stage::Answer
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Handshake => f.write_str("handshake"),
            Stage::Unsubscribe(channel) => write!(f, "unsubscribe {channel}"),
            Stage::BootstrapConnect => f.write_str("bootstrap connect"),
            Stage::Subscribe(channel) => write!(f, "subscribe {channel}"),
            Stage::Login => f.write_str("login"),
            Stage::LoginConnect => f.write_str("login connect"),
            Stage::Connect => f.write_str("connect"),
            Stage::Answer => f.write_str("answer"),
            Stage::Disconnect => f.write_str("disconnect"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_channel() {
        assert_eq!(
            Stage::Subscribe(Channel::Status).to_string(),
            "subscribe /service/status"
        );
        assert_eq!(
            Stage::Unsubscribe(Channel::Controller).to_string(),
            "unsubscribe /service/controller"
        );
        assert_eq!(Stage::LoginConnect.to_string(), "login connect");
    }

    #[test]
    fn success_element_asymmetry() {
        for stage in [
            Stage::Handshake,
            Stage::Unsubscribe(Channel::Controller),
            Stage::BootstrapConnect,
            Stage::Subscribe(Channel::Player),
            Stage::Disconnect,
        ] {
            assert!(!stage.reads_last_element(), "{stage} should read the first element");
        }
        for stage in [Stage::Login, Stage::LoginConnect, Stage::Connect, Stage::Answer] {
            assert!(stage.reads_last_element(), "{stage} should read the last element");
        }
    }

    #[test]
    fn descriptions_are_not_empty() {
        let all = [
            Stage::Handshake,
            Stage::Unsubscribe(Channel::Controller),
            Stage::BootstrapConnect,
            Stage::Subscribe(Channel::Status),
            Stage::Subscribe(Channel::Player),
            Stage::Subscribe(Channel::Controller),
            Stage::Login,
            Stage::LoginConnect,
            Stage::Connect,
            Stage::Answer,
            Stage::Disconnect,
        ];
        for stage in all {
            assert!(!stage.description().is_empty());
        }
    }
}
