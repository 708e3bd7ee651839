//! Connection handshake orchestration.
//!
//! Drives an inviter and an invitee agent through
//! create-invitation → receive-invitation → accept-invitation →
//! (poll inviter until the request arrives) → accept-request.
//!
//! Each step consumes the previous step's output, so the run is strictly
//! sequential. The only wait is step 4: the invitee's connection request
//! reaches the inviter on the agents' own schedule, so the inviter's
//! connection list is polled with backoff until a correlated record shows up.

mod correlate;
mod poll;
mod state;

pub use correlate::{select_request, Correlation, CorrelationPolicy};
pub use poll::PollPolicy;
pub use state::{HandshakeRun, HandshakeState, Transition};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::agent::{
    AgentApi, AgentClient, AgentError, ConnectionFilter, ConnectionId, Invitation,
    InvitationOptions, InviteeSide, InviterSide,
};
use crate::config::Config;
use crate::error::{HandshakeError, Step};

/// Agent state that means "the peer's connection request has arrived".
pub const DEFAULT_TARGET_STATE: &str = "request";

/// Per-run behaviour of the orchestrator.
#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    /// Alias set on both records; filters the listing and, under
    /// `LastMatch`, correlates the inviter record
    pub alias: Option<String>,
    /// Label the invitee presents when accepting
    pub my_label: Option<String>,
    pub target_state: String,
    pub correlation: CorrelationPolicy,
    pub poll: PollPolicy,
    /// Limit for the whole run, including the poll
    pub run_timeout: Duration,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            alias: None,
            my_label: None,
            target_state: DEFAULT_TARGET_STATE.to_string(),
            correlation: CorrelationPolicy::Strict,
            poll: PollPolicy::default(),
            run_timeout: Duration::from_secs(120),
        }
    }
}

/// Result of a completed handshake.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeOutcome {
    pub inviter_connection_id: ConnectionId<InviterSide>,
    pub invitee_connection_id: ConnectionId<InviteeSide>,
    pub final_state: HandshakeState,
    pub transitions: Vec<Transition>,
    /// Snapshots of the inviter's connection list taken in step 4
    pub polls: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of step 4.
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    pub connection_id: ConnectionId<InviterSide>,
    pub polls: u32,
}

pub struct Orchestrator {
    inviter: Arc<dyn AgentApi>,
    invitee: Arc<dyn AgentApi>,
    options: HandshakeOptions,
}

impl Orchestrator {
    pub fn new(
        inviter: Arc<dyn AgentApi>,
        invitee: Arc<dyn AgentApi>,
        options: HandshakeOptions,
    ) -> Self {
        Self {
            inviter,
            invitee,
            options,
        }
    }

    /// Build HTTP clients for both agents from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let inviter = AgentClient::new(
            config.inviter.base_url.clone(),
            config.inviter.api_key.clone(),
            config.request_timeout,
        )?;
        let invitee = AgentClient::new(
            config.invitee.base_url.clone(),
            config.invitee.api_key.clone(),
            config.request_timeout,
        )?;
        Ok(Self::new(
            Arc::new(inviter),
            Arc::new(invitee),
            config.handshake.clone(),
        ))
    }

    pub fn options(&self) -> &HandshakeOptions {
        &self.options
    }

    /// Run the full handshake.
    ///
    /// Firing `cancel` or exceeding `run_timeout` drops whatever call is in
    /// flight and fails with `Cancelled` / `RunTimeout`, carrying the last
    /// state reached.
    pub async fn run(&self, cancel: CancellationToken) -> Result<HandshakeOutcome, HandshakeError> {
        let mut run = HandshakeRun::new();
        let limit = self.options.run_timeout;

        let finished = {
            let pipeline = tokio::time::timeout(limit, self.execute(&mut run));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = pipeline => Some(result),
            }
        };

        match finished {
            Some(Ok(result)) => result,
            Some(Err(_elapsed)) => {
                tracing::warn!(reached = %run.state(), ?limit, "Handshake timed out");
                Err(HandshakeError::RunTimeout {
                    limit,
                    reached: run.state(),
                })
            }
            None => {
                tracing::warn!(reached = %run.state(), "Handshake cancelled");
                Err(HandshakeError::Cancelled {
                    reached: run.state(),
                })
            }
        }
    }

    async fn execute(&self, run: &mut HandshakeRun) -> Result<HandshakeOutcome, HandshakeError> {
        tracing::info!(
            inviter = self.inviter.endpoint(),
            invitee = self.invitee.endpoint(),
            alias = self.options.alias.as_deref().unwrap_or(""),
            "Starting connection handshake"
        );

        let (invitation, created_id) = self.create_invitation().await?;
        run.advance_to(HandshakeState::InvitationCreated)?;

        let invitee_id = self.receive_invitation(&invitation).await?;
        run.advance_to(HandshakeState::InvitationReceived)?;

        self.accept_invitation(&invitee_id).await?;
        run.advance_to(HandshakeState::InviteeAccepted)?;

        let correlation = Correlation {
            connection_id: created_id,
            alias: self.options.alias.clone(),
        };
        let observed = self.poll_for_incoming_request(&correlation).await?;
        run.advance_to(HandshakeState::RequestObserved)?;

        self.accept_request(&observed.connection_id).await?;
        run.advance_to(HandshakeState::Finalized)?;

        tracing::info!(
            inviter_connection_id = %observed.connection_id,
            invitee_connection_id = %invitee_id,
            polls = observed.polls,
            "Connection handshake finalized"
        );

        Ok(HandshakeOutcome {
            inviter_connection_id: observed.connection_id,
            invitee_connection_id: invitee_id,
            final_state: run.state(),
            transitions: run.transitions().to_vec(),
            polls: observed.polls,
            started_at: run.started_at(),
            finished_at: Utc::now(),
        })
    }

    fn invitation_options(&self) -> InvitationOptions {
        InvitationOptions {
            alias: self.options.alias.clone(),
            auto_accept: false,
        }
    }

    /// Step 1: ask the inviter for a fresh invitation.
    pub async fn create_invitation(
        &self,
    ) -> Result<(Invitation, ConnectionId<InviterSide>), HandshakeError> {
        let created = self
            .inviter
            .create_invitation(&self.invitation_options())
            .await
            .map_err(|e| fail(Step::CreateInvitation, e))?;

        tracing::info!(
            step = %Step::CreateInvitation,
            connection_id = %created.connection_id,
            "Invitation created"
        );
        Ok((created.invitation, ConnectionId::new(created.connection_id)))
    }

    /// Step 2: hand the invitation, untouched, to the invitee.
    pub async fn receive_invitation(
        &self,
        invitation: &Invitation,
    ) -> Result<ConnectionId<InviteeSide>, HandshakeError> {
        let connection_id = self
            .invitee
            .receive_invitation(invitation, &self.invitation_options())
            .await
            .map_err(|e| fail(Step::ReceiveInvitation, e))?;

        tracing::info!(
            step = %Step::ReceiveInvitation,
            connection_id = %connection_id,
            "Invitation received by invitee"
        );
        Ok(ConnectionId::new(connection_id))
    }

    /// Step 3: invitee accepts; its agent then sends the request to the inviter.
    pub async fn accept_invitation(
        &self,
        connection_id: &ConnectionId<InviteeSide>,
    ) -> Result<(), HandshakeError> {
        self.invitee
            .accept_invitation(connection_id.as_str(), self.options.my_label.as_deref())
            .await
            .map_err(|e| fail(Step::AcceptInvitation, e))?;

        tracing::info!(
            step = %Step::AcceptInvitation,
            connection_id = %connection_id,
            "Invitation accepted by invitee"
        );
        Ok(())
    }

    /// Step 4: poll the inviter until a record tied to this run reaches the
    /// target state, or the poll budget runs out.
    ///
    /// List-call failures are not retried; only "not there yet" is.
    pub async fn poll_for_incoming_request(
        &self,
        correlation: &Correlation,
    ) -> Result<ObservedRequest, HandshakeError> {
        let policy = &self.options.poll;
        let target = self.options.target_state.as_str();
        let filter = ConnectionFilter {
            alias: self.options.alias.clone(),
        };
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            let records = self
                .inviter
                .list_connections(&filter)
                .await
                .map_err(|e| fail(Step::PollForIncomingRequest, e))?;
            polls += 1;

            if let Some(record) =
                select_request(&records, target, correlation, self.options.correlation)
            {
                tracing::info!(
                    step = %Step::PollForIncomingRequest,
                    connection_id = %record.connection_id,
                    polls,
                    "Connection request observed"
                );
                return Ok(ObservedRequest {
                    connection_id: ConnectionId::new(record.connection_id.clone()),
                    polls,
                });
            }

            let waited = started.elapsed();
            let Some(delay) = policy.next_delay(polls - 1, waited) else {
                tracing::warn!(
                    step = %Step::PollForIncomingRequest,
                    target_state = target,
                    polls,
                    ?waited,
                    "Connection request never arrived"
                );
                return Err(HandshakeError::ConnectionRequestTimeout {
                    endpoint: self.inviter.endpoint().to_string(),
                    target_state: target.to_string(),
                    polls,
                    waited,
                });
            };

            tracing::debug!(
                attempt = polls,
                records = records.len(),
                delay_ms = delay.as_millis() as u64,
                "No matching connection yet"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Step 5: inviter accepts the request it received.
    pub async fn accept_request(
        &self,
        connection_id: &ConnectionId<InviterSide>,
    ) -> Result<(), HandshakeError> {
        self.inviter
            .accept_request(connection_id.as_str())
            .await
            .map_err(|e| fail(Step::AcceptRequest, e))?;

        tracing::info!(
            step = %Step::AcceptRequest,
            connection_id = %connection_id,
            "Connection request accepted by inviter"
        );
        Ok(())
    }
}

fn fail(step: Step, err: AgentError) -> HandshakeError {
    tracing::warn!(step = %step, endpoint = err.endpoint(), error = %err, "Handshake step failed");
    HandshakeError::from_agent(step, err)
}
