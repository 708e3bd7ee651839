//! HTTP client for an agent's admin API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{ConnectionIdResponse, ConnectionListResponse, CreateInvitationResponse};
use super::{
    AgentApi, AgentError, ConnectionFilter, ConnectionRecord, CreatedInvitation, Invitation,
    InvitationOptions,
};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AgentClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::Unreachable {
                endpoint: base_url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            base_url,
            client,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, Option<&str>)]) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        let mut sep = '?';
        for (name, value) in query {
            if let Some(value) = value {
                url.push(sep);
                url.push_str(name);
                url.push('=');
                url.push_str(&urlencoding::encode(value));
                sep = '&';
            }
        }
        url
    }

    fn connection_path(connection_id: &str, action: &str) -> String {
        format!(
            "/connections/{}/{}",
            urlencoding::encode(connection_id),
            action
        )
    }

    /// Send a request and return the body text of a 2xx response.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<String, AgentError> {
        let builder = match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| AgentError::Unreachable {
            endpoint: self.base_url.clone(),
            message: format!("{} request failed: {}", what, e),
        })?;

        let status = resp.status();
        if !status.is_success() {
            // The status is the error; a body we cannot read just stays empty.
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::RequestFailed {
                endpoint: self.base_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        resp.text().await.map_err(|e| AgentError::Unreachable {
            endpoint: self.base_url.clone(),
            message: format!("{} response body could not be read: {}", what, e),
        })
    }

    fn parse<T: DeserializeOwned>(&self, text: &str, what: &str) -> Result<T, AgentError> {
        serde_json::from_str(text).map_err(|e| AgentError::MalformedResponse {
            endpoint: self.base_url.clone(),
            message: format!("failed to parse {} response: {} ({})", what, e, text),
        })
    }

    fn require_id(&self, id: Option<String>, what: &str) -> Result<String, AgentError> {
        match id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(AgentError::MalformedResponse {
                endpoint: self.base_url.clone(),
                message: format!("{} response has no connection_id", what),
            }),
        }
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[async_trait]
impl AgentApi for AgentClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn create_invitation(
        &self,
        options: &InvitationOptions,
    ) -> Result<CreatedInvitation, AgentError> {
        let url = self.url(
            "/connections/create-invitation",
            &[
                ("alias", options.alias.as_deref()),
                ("auto_accept", Some(bool_param(options.auto_accept))),
            ],
        );
        let text = self
            .send(self.client.post(&url), "create-invitation")
            .await?;

        let resp: CreateInvitationResponse = self.parse(&text, "create-invitation")?;
        let connection_id = self.require_id(resp.connection_id, "create-invitation")?;
        let invitation = resp.invitation.map(Invitation::from_raw).ok_or_else(|| {
            AgentError::MalformedResponse {
                endpoint: self.base_url.clone(),
                message: "create-invitation response has no invitation".to_string(),
            }
        })?;

        Ok(CreatedInvitation {
            connection_id,
            invitation,
        })
    }

    async fn receive_invitation(
        &self,
        invitation: &Invitation,
        options: &InvitationOptions,
    ) -> Result<String, AgentError> {
        let url = self.url(
            "/connections/receive-invitation",
            &[
                ("alias", options.alias.as_deref()),
                ("auto_accept", Some(bool_param(options.auto_accept))),
            ],
        );
        // Body is the invitation text as received, not a re-encoded value.
        let builder = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(invitation.as_json().to_string());
        let text = self.send(builder, "receive-invitation").await?;

        let resp: ConnectionIdResponse = self.parse(&text, "receive-invitation")?;
        self.require_id(resp.connection_id, "receive-invitation")
    }

    async fn accept_invitation(
        &self,
        connection_id: &str,
        my_label: Option<&str>,
    ) -> Result<(), AgentError> {
        let url = self.url(
            &Self::connection_path(connection_id, "accept-invitation"),
            &[("my_label", my_label)],
        );
        self.send(self.client.post(&url).json(&json!({})), "accept-invitation")
            .await?;
        Ok(())
    }

    async fn list_connections(
        &self,
        filter: &ConnectionFilter,
    ) -> Result<Vec<ConnectionRecord>, AgentError> {
        let url = self.url("/connections", &[("alias", filter.alias.as_deref())]);
        let text = self.send(self.client.get(&url), "list-connections").await?;

        let resp: ConnectionListResponse = self.parse(&text, "list-connections")?;
        Ok(resp.results)
    }

    async fn accept_request(&self, connection_id: &str) -> Result<(), AgentError> {
        let url = self.url(&Self::connection_path(connection_id, "accept-request"), &[]);
        self.send(self.client.post(&url).json(&json!({})), "accept-request")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> AgentClient {
        AgentClient::new(base, None, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        assert_eq!(client("http://localhost:8021//").base_url(), "http://localhost:8021");
    }

    #[test]
    fn query_skips_unset_params_and_encodes_values() {
        let c = client("http://agent:8021");
        assert_eq!(c.url("/connections", &[("alias", None)]), "http://agent:8021/connections");
        assert_eq!(
            c.url(
                "/connections/create-invitation",
                &[("alias", Some("bob & co")), ("auto_accept", Some("false"))]
            ),
            "http://agent:8021/connections/create-invitation?alias=bob%20%26%20co&auto_accept=false"
        );
    }

    #[test]
    fn connection_ids_are_path_encoded() {
        assert_eq!(
            AgentClient::connection_path("a/b c", "accept-request"),
            "/connections/a%2Fb%20c/accept-request"
        );
    }

    #[test]
    fn debug_output_hides_api_key() {
        let c = AgentClient::new("http://agent", Some("secret".into()), Duration::from_secs(1))
            .expect("client");
        let rendered = format!("{:?}", c);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn missing_connection_id_is_malformed() {
        let c = client("http://agent");
        let err = c.require_id(None, "receive-invitation").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse { .. }));
        let err = c.require_id(Some(String::new()), "receive-invitation").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse { .. }));
    }
}
