//! Orchestrator run state (not the agents' connection states).
//!
//! # State Machine
//! ```text
//! Start -> InvitationCreated -> InvitationReceived -> InviteeAccepted
//!       -> RequestObserved -> Finalized
//! ```
//! Strictly forward, one step at a time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::HandshakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Start,
    InvitationCreated,
    InvitationReceived,
    InviteeAccepted,
    RequestObserved,
    Finalized,
}

impl HandshakeState {
    /// The only state reachable from `self`, or `None` once finalized.
    pub fn next(self) -> Option<HandshakeState> {
        match self {
            HandshakeState::Start => Some(HandshakeState::InvitationCreated),
            HandshakeState::InvitationCreated => Some(HandshakeState::InvitationReceived),
            HandshakeState::InvitationReceived => Some(HandshakeState::InviteeAccepted),
            HandshakeState::InviteeAccepted => Some(HandshakeState::RequestObserved),
            HandshakeState::RequestObserved => Some(HandshakeState::Finalized),
            HandshakeState::Finalized => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == HandshakeState::Finalized
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Start => "start",
            HandshakeState::InvitationCreated => "invitation_created",
            HandshakeState::InvitationReceived => "invitation_received",
            HandshakeState::InviteeAccepted => "invitee_accepted",
            HandshakeState::RequestObserved => "request_observed",
            HandshakeState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: HandshakeState,
    pub to: HandshakeState,
    pub at: DateTime<Utc>,
}

/// Progress of one handshake run.
///
/// # Invariants
/// - `transitions` is contiguous: each entry's `from` is the previous entry's `to`
/// - `state` equals the last transition's `to` (or `Start` when empty)
#[derive(Debug, Clone)]
pub struct HandshakeRun {
    state: HandshakeState,
    started_at: DateTime<Utc>,
    transitions: Vec<Transition>,
}

impl HandshakeRun {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Start,
            started_at: Utc::now(),
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Move to `to`.
    ///
    /// # Errors
    /// `InvalidTransition` unless `to == self.state().next()`.
    pub fn advance_to(&mut self, to: HandshakeState) -> Result<(), HandshakeError> {
        if self.state.next() != Some(to) {
            return Err(HandshakeError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.transitions.push(Transition {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }
}

impl Default for HandshakeRun {
    fn default() -> Self {
        Self::new()
    }
}
