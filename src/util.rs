//! Shared request helpers and the audit event builder.

use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::{ActorType, AuditAction, AuditLog};

/// Extract client IP address and user-agent from request headers.
///
/// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`,
/// and extracts the `user-agent` header for audit logging.
pub fn extract_request_info(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    (ip, user_agent)
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Fluent writer for one audit event.
///
/// ```ignore
/// AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
///     .actor(ActorType::Admin, Some(&ctx.account.id))
///     .action(AuditAction::IssueCreditKey)
///     .resource("credit_key", &key.id)
///     .save()?;
/// ```
pub struct AuditLogBuilder<'a> {
    conn: &'a Connection,
    enabled: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    actor_type: ActorType,
    actor_id: Option<&'a str>,
    action: Option<AuditAction>,
    resource_type: &'a str,
    resource_id: &'a str,
    details: Option<serde_json::Value>,
}

impl<'a> AuditLogBuilder<'a> {
    pub fn new(conn: &'a Connection, enabled: bool, headers: &HeaderMap) -> Self {
        let (ip_address, user_agent) = extract_request_info(headers);
        Self {
            conn,
            enabled,
            ip_address,
            user_agent,
            actor_type: ActorType::System,
            actor_id: None,
            action: None,
            resource_type: "",
            resource_id: "",
            details: None,
        }
    }

    pub fn actor(mut self, actor_type: ActorType, actor_id: Option<&'a str>) -> Self {
        self.actor_type = actor_type;
        self.actor_id = actor_id;
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn resource(mut self, resource_type: &'a str, resource_id: &'a str) -> Self {
        self.resource_type = resource_type;
        self.resource_id = resource_id;
        self
    }

    pub fn details(mut self, details: &serde_json::Value) -> Self {
        self.details = Some(details.clone());
        self
    }

    pub fn save(self) -> Result<AuditLog> {
        let action = self.action.ok_or_else(|| {
            crate::error::AppError::Internal("Audit event saved without an action".into())
        })?;
        queries::create_audit_log(
            self.conn,
            self.enabled,
            self.actor_type,
            self.actor_id,
            action,
            self.resource_type,
            self.resource_id,
            self.details.as_ref(),
            self.ip_address.as_deref(),
            self.user_agent.as_deref(),
        )
    }

    /// Save after the business write has committed: a failure is logged and
    /// never reaches the caller.
    pub fn save_best_effort(self) {
        let resource = format!("{}/{}", self.resource_type, self.resource_id);
        if let Err(e) = self.save() {
            tracing::warn!("Failed to write audit event for {}: {}", resource, e);
        }
    }
}
