//! Queued operation record and its identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use finpro_common::{Error, HttpMethod, Result};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Unique identifier of a queued operation.
///
/// Generated ids are `<unix millis>-<9 base36 chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Wrap an existing id.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidInput(
                "OperationId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh time-based id with a random suffix.
    pub fn generate() -> Self {
        let mut seed = rand::random::<u64>();
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        for _ in 0..SUFFIX_LEN {
            let idx = (seed % SUFFIX_ALPHABET.len() as u64) as usize;
            suffix.push(SUFFIX_ALPHABET[idx] as char);
            seed /= SUFFIX_ALPHABET.len() as u64;
        }
        Self(format!("{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the operation does at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// HTTP verb used when the operation is replayed.
    pub fn http_method(&self) -> HttpMethod {
        match self {
            OperationKind::Create => HttpMethod::Post,
            OperationKind::Update => HttpMethod::Put,
            OperationKind::Delete => HttpMethod::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            other => Err(Error::InvalidInput(format!(
                "Unknown operation kind: {}",
                other
            ))),
        }
    }
}

/// Lifecycle status of a queued operation.
///
/// Only `Pending` entries are visible to a drain. `Processing` marks an
/// in-flight attempt; `Failed` is terminal and kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Processing => "processing",
            OperationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "processing" => Ok(OperationStatus::Processing),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "Unknown operation status: {}",
                other
            ))),
        }
    }
}

/// A network operation waiting to be replayed against its destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub destination: String,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: OperationStatus,
}

impl QueuedOperation {
    /// Create a fresh pending operation.
    ///
    /// # Errors
    /// - Returns error if destination is empty
    pub fn new(
        kind: OperationKind,
        destination: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<Self> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Operation destination cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id: OperationId::generate(),
            kind,
            destination,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
            status: OperationStatus::Pending,
        })
    }

    /// Whether a drain may pick this entry up.
    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::Pending
    }
}
