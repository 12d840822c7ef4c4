//! Per-request adapter context
//!
//! An [`AdapterContext`] is created once per inbound request and handed by
//! reference to every adapter call. It carries what the feature-flag
//! evaluator needs (user and organization) plus correlation data for logs.
//! Nothing in it is persisted.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::common::identifiers::{OrganizationId, UserId};

const REQUEST_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const REQUEST_ID_SUFFIX_LEN: usize = 9;

/// Request-scoped context used for flag evaluation and log correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterContext {
    /// Acting user, absent for system jobs
    pub user_id: Option<UserId>,
    /// Tenant the request belongs to
    pub organization_id: Option<OrganizationId>,
    /// Correlation token, generated when the caller supplies none
    pub request_id: String,
    /// Client address as seen by the HTTP layer
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// When the context was created
    pub operation_timestamp: DateTime<Utc>,
}

impl AdapterContext {
    /// Build a context, generating `request_id` when not supplied
    pub fn create(
        user_id: Option<UserId>,
        organization_id: Option<OrganizationId>,
        request_id: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            user_id,
            organization_id,
            request_id: request_id.unwrap_or_else(generate_request_id),
            ip_address,
            user_agent,
            operation_timestamp: Utc::now(),
        }
    }

    /// Context for an authenticated user inside an organization
    pub fn for_user(user_id: UserId, organization_id: OrganizationId) -> Self {
        Self::create(Some(user_id), Some(organization_id), None, None, None)
    }

    /// Context with no user or organization, e.g. background jobs
    pub fn anonymous() -> Self {
        Self::create(None, None, None, None, None)
    }
}

/// Generate a request id of the form `req_<unix-millis>_<9 base36 chars>`
pub fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REQUEST_ID_SUFFIX_LEN)
        .map(|_| REQUEST_ID_ALPHABET[rng.gen_range(0..REQUEST_ID_ALPHABET.len())] as char)
        .collect();
    format!("req_{}_{}", Utc::now().timestamp_millis(), suffix)
}
