//! Approval authorities for elevation requests.
//!
//! The broker asks an [`ApprovalAuthority`] whether an elevation may be
//! granted. The answer may take a while (a human approver), so
//! [`ApprovalAuthority::decide`] is async and the broker bounds it with a
//! timeout.
//!
//! | Authority | Use |
//! |-----------|-----|
//! | [`HttpApprovalAuthority`] | Production: POST to a PAM endpoint, long-polled until decided |
//! | [`AutoApprove`] | Development only; must be enabled explicitly |
//! | [`NoAuthority`] | Nothing configured: every request fails |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_types::{Capability, ErrorCode, Role, SessionId, Subject};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// An elevation request as sent to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationRequest {
    /// Unique id of this request.
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub session_id: SessionId,
    pub capability: Capability,
    /// Operator-supplied justification.
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

impl ElevationRequest {
    /// Creates a request with a fresh id.
    #[must_use]
    pub fn new(
        subject: &Subject,
        capability: Capability,
        reason: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: subject.user_id().to_string(),
            role: subject.role(),
            session_id: subject.session_id().clone(),
            capability,
            reason: reason.into(),
            requested_at,
        }
    }
}

/// The authority's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    /// Elevation approved.
    Approved,
    /// Elevation denied.
    Denied {
        /// Optional reason given by the approver.
        reason: Option<String>,
    },
}

impl ApprovalDecision {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Failure to obtain a decision. Distinct from a denial.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No authority is configured.
    #[error("no approval authority configured")]
    NotConfigured,

    /// The request could not be delivered or the reply not read.
    #[error("approval authority unreachable: {0}")]
    Transport(String),

    /// The authority answered with an unexpected status.
    #[error("approval authority returned HTTP {0}")]
    Status(u16),

    /// The reply was not a decision.
    #[error("approval authority sent a malformed reply: {0}")]
    Malformed(String),
}

impl ErrorCode for ApprovalError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "APPROVAL_NOT_CONFIGURED",
            Self::Transport(_) => "APPROVAL_TRANSPORT",
            Self::Status(_) => "APPROVAL_STATUS",
            Self::Malformed(_) => "APPROVAL_MALFORMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_))
    }
}

/// Decides elevation requests.
#[async_trait]
pub trait ApprovalAuthority: Send + Sync + std::fmt::Debug {
    /// Returns the decision for `request`.
    ///
    /// May suspend while a human decides. Callers bound the wait.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError`] when no decision could be obtained.
    async fn decide(&self, request: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError>;
}

/// Approves everything. Development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalAuthority for AutoApprove {
    async fn decide(&self, request: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
        tracing::warn!(
            request_id = %request.id,
            capability = %request.capability,
            "auto-approving elevation (development mode)"
        );
        Ok(ApprovalDecision::Approved)
    }
}

/// Fails every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthority;

#[async_trait]
impl ApprovalAuthority for NoAuthority {
    async fn decide(&self, _request: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
        Err(ApprovalError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct DecisionBody {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Remote PAM authority.
///
/// POSTs the [`ElevationRequest`] as JSON and expects
/// `{"approved": bool, "reason": string?}`. The endpoint may hold the
/// request open until an approver decides.
#[derive(Debug, Clone)]
pub struct HttpApprovalAuthority {
    client: reqwest::Client,
    url: String,
    request_timeout: Duration,
}

impl HttpApprovalAuthority {
    /// Creates an authority posting to `url`.
    ///
    /// `request_timeout` bounds the HTTP exchange itself.
    #[must_use]
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl ApprovalAuthority for HttpApprovalAuthority {
    async fn decide(&self, request: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ApprovalError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApprovalError::Status(status.as_u16()));
        }

        let body: DecisionBody = resp
            .json()
            .await
            .map_err(|e| ApprovalError::Malformed(e.to_string()))?;

        Ok(if body.approved {
            ApprovalDecision::Approved
        } else {
            ApprovalDecision::Denied {
                reason: body.reason,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ElevationRequest {
        let subject = Subject::new("u-1", "Pat", Role::Engineer, SessionId::new("s-1"));
        ElevationRequest::new(&subject, Capability::EditConfiguration, "recipe change", Utc::now())
    }

    #[tokio::test]
    async fn http_authority_approves() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/elevations"))
            .and(body_partial_json(serde_json::json!({
                "capability": "edit_configuration",
                "role": "engineer",
                "session_id": "s-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let authority = HttpApprovalAuthority::new(
            format!("{}/elevations", server.uri()),
            Duration::from_secs(5),
        );
        let decision = authority.decide(&request()).await.unwrap();
        assert!(decision.is_approved());
    }

    #[tokio::test]
    async fn http_authority_denies_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": false,
                "reason": "outside maintenance window"
            })))
            .mount(&server)
            .await;

        let authority = HttpApprovalAuthority::new(server.uri(), Duration::from_secs(5));
        let decision = authority.decide(&request()).await.unwrap();
        assert_eq!(
            decision,
            ApprovalDecision::Denied {
                reason: Some("outside maintenance window".into())
            }
        );
    }

    #[tokio::test]
    async fn http_error_status_is_an_error_not_a_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let authority = HttpApprovalAuthority::new(server.uri(), Duration::from_secs(5));
        let err = authority.decide(&request()).await.unwrap_err();
        assert!(matches!(err, ApprovalError::Status(503)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn malformed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("yes please"))
            .mount(&server)
            .await;

        let authority = HttpApprovalAuthority::new(server.uri(), Duration::from_secs(5));
        let err = authority.decide(&request()).await.unwrap_err();
        assert_eq!(err.code(), "APPROVAL_MALFORMED");
    }

    #[tokio::test]
    async fn no_authority_fails() {
        let err = NoAuthority.decide(&request()).await.unwrap_err();
        assert!(matches!(err, ApprovalError::NotConfigured));
        assert!(AutoApprove.decide(&request()).await.unwrap().is_approved());
    }
}
