//! # agent-handshake
//!
//! Orchestrates the connection handshake between two identity agents through
//! their admin HTTP APIs.
//!
//! ## Flow
//!
//! ```text
//!   Orchestrator                 Inviter                    Invitee
//!        │ create-invitation ──────▶│                          │
//!        │◀──── invitation, id ─────│                          │
//!        │ receive-invitation(invitation) ────────────────────▶│
//!        │◀─────────────────────────────────────────── id ─────│
//!        │ accept-invitation(id) ─────────────────────────────▶│
//!        │                          │◀──── request (async) ────│
//!        │ list connections (poll) ▶│                          │
//!        │ accept-request(id) ─────▶│                          │
//! ```
//!
//! ## Modules
//! - `agent`: `AgentApi` trait and the reqwest-backed `AgentClient`
//! - `handshake`: `Orchestrator`, run state machine, poll policy, correlation
//! - `config`: environment-driven configuration
//! - `error`: `HandshakeError` taxonomy

pub mod agent;
pub mod config;
pub mod error;
pub mod handshake;

pub use agent::{AgentApi, AgentClient, AgentError};
pub use config::Config;
pub use error::{HandshakeError, Step};
pub use handshake::{HandshakeOptions, HandshakeOutcome, HandshakeState, Orchestrator, PollPolicy};
