//! Wire types for the agent connection admin API.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

/// Marker for identifiers issued by the inviter agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviterSide {}

/// Marker for identifiers issued by the invitee agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InviteeSide {}

/// Connection identifier local to one agent.
///
/// The `Side` parameter records which agent issued the id, so an inviter id
/// cannot be handed to an invitee call (and vice versa) without an explicit
/// conversion through the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId<Side> {
    value: String,
    _side: PhantomData<Side>,
}

impl<Side> ConnectionId<Side> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _side: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<Side> fmt::Display for ConnectionId<Side> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<Side> Serialize for ConnectionId<Side> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<Side> PartialEq<str> for ConnectionId<Side> {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl<Side> PartialEq<&str> for ConnectionId<Side> {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

/// Invitation payload produced by the inviter.
///
/// Kept as the exact JSON text the inviter returned and written back out
/// unchanged when handed to the invitee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Invitation(Box<RawValue>);

impl Invitation {
    /// Wrap raw JSON text. Fails if the text is not valid JSON.
    pub fn from_json(text: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(text.into()).map(Self)
    }

    pub(crate) fn from_raw(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    /// The raw JSON text, byte-for-byte as received.
    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for Invitation {
    fn eq(&self, other: &Self) -> bool {
        self.as_json() == other.as_json()
    }
}

/// One agent's view of a single handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub connection_id: String,
    pub state: String,
    /// RFC 0023 state name (`request-received`, ...), reported alongside the legacy `state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc23_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ConnectionRecord {
    /// Minimal record, mostly for tests and mocks.
    pub fn new(connection_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            state: state.into(),
            rfc23_state: None,
            alias: None,
            invitation_key: None,
            their_label: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// True when either the legacy or the RFC 0023 state equals `target`.
    pub fn is_in_state(&self, target: &str) -> bool {
        self.state == target || self.rfc23_state.as_deref() == Some(target)
    }
}

/// Query options shared by create-invitation and receive-invitation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationOptions {
    pub alias: Option<String>,
    /// Whether the agent should progress the handshake on its own.
    /// The orchestrator drives every step, so this is normally `false`.
    pub auto_accept: bool,
}

/// Server-side filter for list-connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFilter {
    pub alias: Option<String>,
}

/// Result of create-invitation.
#[derive(Debug, Clone)]
pub struct CreatedInvitation {
    /// Inviter-local id of the record created for this invitation
    pub connection_id: String,
    pub invitation: Invitation,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateInvitationResponse {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub invitation: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectionIdResponse {
    #[serde(default)]
    pub connection_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectionListResponse {
    pub results: Vec<ConnectionRecord>,
}
