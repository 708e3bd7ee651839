//! Agent admin API: the subset of the connection-management endpoints the
//! orchestrator consumes.
//!
//! Agents are external services. `AgentApi` is the seam the orchestrator talks
//! through; `AgentClient` is the HTTP implementation.

mod client;
mod types;

pub use client::AgentClient;
pub use types::{
    ConnectionFilter, ConnectionId, ConnectionRecord, CreatedInvitation, Invitation,
    InvitationOptions, InviteeSide, InviterSide,
};

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to a single agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection refused, DNS failure, request timeout, ...
    #[error("agent at {endpoint} unreachable: {message}")]
    Unreachable { endpoint: String, message: String },

    /// The agent answered with a non-success status.
    #[error("agent at {endpoint} returned {status}: {body}")]
    RequestFailed {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The agent answered 2xx but the body is missing an expected field.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },
}

impl AgentError {
    pub fn endpoint(&self) -> &str {
        match self {
            AgentError::Unreachable { endpoint, .. }
            | AgentError::RequestFailed { endpoint, .. }
            | AgentError::MalformedResponse { endpoint, .. } => endpoint,
        }
    }
}

/// Connection-management operations exposed by one agent.
///
/// Connection ids passed in and returned are local to this agent.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Base URL of the agent's admin API.
    fn endpoint(&self) -> &str;

    /// `POST /connections/create-invitation`
    async fn create_invitation(
        &self,
        options: &InvitationOptions,
    ) -> Result<CreatedInvitation, AgentError>;

    /// `POST /connections/receive-invitation` with the invitation as body.
    async fn receive_invitation(
        &self,
        invitation: &Invitation,
        options: &InvitationOptions,
    ) -> Result<String, AgentError>;

    /// `POST /connections/{id}/accept-invitation`
    async fn accept_invitation(
        &self,
        connection_id: &str,
        my_label: Option<&str>,
    ) -> Result<(), AgentError>;

    /// `GET /connections`
    async fn list_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Vec<ConnectionRecord>, AgentError>;

    /// `POST /connections/{id}/accept-request`
    async fn accept_request(&self, connection_id: &str) -> Result<(), AgentError>;
}
