//! Handshake error taxonomy.
//!
//! Every failure aborts the run. The variants separate "agent is down"
//! (`AgentUnreachable`) from "agent answered but refused" (`AgentRequestFailed`)
//! and from "agent never saw the peer's request" (`ConnectionRequestTimeout`).

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::agent::AgentError;
use crate::handshake::HandshakeState;

/// One of the five orchestrated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CreateInvitation,
    ReceiveInvitation,
    AcceptInvitation,
    PollForIncomingRequest,
    AcceptRequest,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::CreateInvitation => "create-invitation",
            Step::ReceiveInvitation => "receive-invitation",
            Step::AcceptInvitation => "accept-invitation",
            Step::PollForIncomingRequest => "poll-for-incoming-request",
            Step::AcceptRequest => "accept-request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("{step}: agent at {endpoint} unreachable: {message}")]
    AgentUnreachable {
        step: Step,
        endpoint: String,
        message: String,
    },

    #[error("{step}: agent at {endpoint} returned HTTP {status}: {body}")]
    AgentRequestFailed {
        step: Step,
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{step}: malformed response from {endpoint}: {message}")]
    MalformedResponse {
        step: Step,
        endpoint: String,
        message: String,
    },

    #[error(
        "no connection in state '{target_state}' at {endpoint} after {polls} polls ({waited:?})"
    )]
    ConnectionRequestTimeout {
        endpoint: String,
        target_state: String,
        polls: u32,
        waited: Duration,
    },

    #[error("handshake did not finish within {limit:?} (reached {reached})")]
    RunTimeout {
        limit: Duration,
        reached: HandshakeState,
    },

    #[error("handshake cancelled (reached {reached})")]
    Cancelled { reached: HandshakeState },

    #[error("invalid handshake transition from {from} to {to}")]
    InvalidTransition {
        from: HandshakeState,
        to: HandshakeState,
    },
}

impl HandshakeError {
    /// Attach the failing step to an agent-level error.
    pub fn from_agent(step: Step, err: AgentError) -> Self {
        match err {
            AgentError::Unreachable { endpoint, message } => HandshakeError::AgentUnreachable {
                step,
                endpoint,
                message,
            },
            AgentError::RequestFailed {
                endpoint,
                status,
                body,
            } => HandshakeError::AgentRequestFailed {
                step,
                endpoint,
                status,
                body,
            },
            AgentError::MalformedResponse { endpoint, message } => {
                HandshakeError::MalformedResponse {
                    step,
                    endpoint,
                    message,
                }
            }
        }
    }

    /// The operation that failed, if the failure belongs to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            HandshakeError::AgentUnreachable { step, .. }
            | HandshakeError::AgentRequestFailed { step, .. }
            | HandshakeError::MalformedResponse { step, .. } => Some(*step),
            HandshakeError::ConnectionRequestTimeout { .. } => Some(Step::PollForIncomingRequest),
            HandshakeError::RunTimeout { .. }
            | HandshakeError::Cancelled { .. }
            | HandshakeError::InvalidTransition { .. } => None,
        }
    }
}
