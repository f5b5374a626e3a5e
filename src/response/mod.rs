//! Result envelopes
//!
//! Every Base operation produces one of these envelopes. Expected absence
//! (a missing key, an empty page) is data, not an error: check the envelope
//! instead of matching on `Err`. [`assemble`] folds an `Err` into the envelope
//! form so callers can handle both uniformly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{OakError, OakResult};

/// Common behaviour of all envelopes
pub trait Envelope: Sized {
    /// Envelope carrying `err` and no data
    fn from_error(err: &OakError) -> Self;

    fn error(&self) -> Option<&str>;

    /// No error and data (or items) present
    fn is_ok(&self) -> bool;
}

/// Renders an error as `"<CODE>: <message>"`.
pub fn error_string(err: &OakError) -> String {
    format!("{}: {}", err.code(), err)
}

/// Folds an operation result into its envelope.
pub fn assemble<E: Envelope>(result: OakResult<E>) -> E {
    match result {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::debug!(
                target: "oakdb::base",
                event = "OPERATION_FAILED",
                code = err.code(),
                error = %err,
                "operation failed"
            );
            E::from_error(&err)
        }
    }
}

/// Serializes any envelope to JSON.
pub fn to_json<E: Serialize>(envelope: &E) -> serde_json::Result<String> {
    serde_json::to_string(envelope)
}

/// Result of `add`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddResponse {
    pub key: String,
    pub data: Option<Value>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub error: Option<String>,
}

impl Envelope for AddResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_ok(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }
}

/// Result of `adds`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddsResponse {
    pub keys: Vec<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl Envelope for AddsResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_ok(&self) -> bool {
        self.error.is_none() && self.success
    }
}

/// Result of `get`. `data` is `None` when the key is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    pub key: String,
    pub data: Option<Value>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub error: Option<String>,
}

impl GetResponse {
    pub fn not_found(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn is_found(&self) -> bool {
        self.data.is_some()
    }
}

impl Envelope for GetResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_ok(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }
}

/// Result of `delete`. `deleted` is false when the key was absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub key: String,
    pub deleted: bool,
    pub error: Option<String>,
}

impl Envelope for DeleteResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Deleting an absent key is not an error
    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of `deletes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletesResponse {
    /// Number of keys actually removed
    pub deletes: usize,
    /// Requested keys that were not present
    pub missing: Vec<String>,
    pub error: Option<String>,
}

impl Envelope for DeletesResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One item of a query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub key: String,
    pub data: Value,
    pub created: String,
    pub updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// One page of a fetch, search or similar query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub page: usize,
    pub pages: usize,
    pub total: usize,
    pub limit: usize,
    pub items: Vec<ItemRow>,
    pub error: Option<String>,
}

impl ItemsResponse {
    pub fn keys(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.key.as_str()).collect()
    }
}

impl Envelope for ItemsResponse {
    fn from_error(err: &OakError) -> Self {
        Self {
            error: Some(error_string(err)),
            ..Self::default()
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_ok(&self) -> bool {
        self.error.is_none() && !self.items.is_empty()
    }
}
