//! Transport implementations for the quiz long-polling protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport) implementations
//! behind feature gates. Enable the corresponding Cargo feature to pull in
//! a transport:
//!
//! | Feature             | Transport            |
//! |---------------------|----------------------|
//! | `transport-reqwest` | [`ReqwestTransport`] |

#[cfg(feature = "transport-reqwest")]
pub mod http;

#[cfg(feature = "transport-reqwest")]
pub use http::ReqwestTransport;
