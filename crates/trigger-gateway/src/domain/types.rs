//! Core types for trigger requests and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Where a presented token was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `X-Trigger-Token: <token>`
    Header,
    /// Form field or JSON body field `token`
    Body,
    /// `?token=<token>`
    Query,
    /// Nothing presented; validated as the empty string
    Missing,
}

/// Request metadata carried alongside the presented token.
///
/// Never contains the token itself.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext {
    pub client_ip: Option<IpAddr>,
    pub source: TokenSource,
}

impl TriggerContext {
    pub fn new(client_ip: Option<IpAddr>, source: TokenSource) -> Self {
        Self { client_ip, source }
    }
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self {
            client_ip: None,
            source: TokenSource::Missing,
        }
    }
}

/// Result of a successful downstream invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Operation-specific detail (child pid, dispatched workflow/ref).
    pub detail: Option<String>,
}

impl Invocation {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
        }
    }
}

/// A trigger that passed validation and reached the privileged operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triggered {
    pub trigger_id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one trigger attempt, as kept in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Triggered,
    Rejected,
    DispatchFailed,
}

/// One ledger row. Holds no token material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub trigger_id: Uuid,
    pub at: DateTime<Utc>,
    pub outcome: TriggerOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
    pub source: TokenSource,
}
