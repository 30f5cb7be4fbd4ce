//! Quota definitions, label values, and requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{QuotaError, Result};

/// The set of label values attached to a request.
pub type Labels = HashMap<String, LabelValue>;

/// The declared type of a quota label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelType {
    String,
    Int64,
    Double,
    Bool,
    Bytes,
    StringMap,
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelType::String => write!(f, "string"),
            LabelType::Int64 => write!(f, "int64"),
            LabelType::Double => write!(f, "double"),
            LabelType::Bool => write!(f, "bool"),
            LabelType::Bytes => write!(f, "bytes"),
            LabelType::StringMap => write!(f, "string map"),
        }
    }
}

/// A label value supplied with a quota request.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelValue {
    String(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    StringMap(HashMap<String, String>),
}

impl LabelValue {
    /// Get the type of this value.
    pub fn label_type(&self) -> LabelType {
        match self {
            LabelValue::String(_) => LabelType::String,
            LabelValue::Int64(_) => LabelType::Int64,
            LabelValue::Double(_) => LabelType::Double,
            LabelValue::Bool(_) => LabelType::Bool,
            LabelValue::Bytes(_) => LabelType::Bytes,
            LabelValue::StringMap(_) => LabelType::StringMap,
        }
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        LabelValue::String(v.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        LabelValue::String(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::Int64(v)
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::Double(v)
    }
}

impl From<bool> for LabelValue {
    fn from(v: bool) -> Self {
        LabelValue::Bool(v)
    }
}

impl From<Vec<u8>> for LabelValue {
    fn from(v: Vec<u8>) -> Self {
        LabelValue::Bytes(v)
    }
}

impl From<HashMap<String, String>> for LabelValue {
    fn from(v: HashMap<String, String>) -> Self {
        LabelValue::StringMap(v)
    }
}

/// The definition of a quota, created once at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaDefinition {
    /// Name of the quota, the first component of every key
    pub name: String,
    /// Maximum number of units that may be in use at once
    pub max_amount: i64,
    /// How long allocations count against the quota; zero never expires
    pub expiration: Duration,
    /// Declared label types
    pub labels: HashMap<String, LabelType>,
    /// Human readable name
    pub display_name: Option<String>,
    /// Free-form description
    pub description: Option<String>,
}

impl QuotaDefinition {
    /// Create a non-expiring definition with no declared labels.
    pub fn new(name: impl Into<String>, max_amount: i64) -> Self {
        Self {
            name: name.into(),
            max_amount,
            expiration: Duration::ZERO,
            labels: HashMap::new(),
            display_name: None,
            description: None,
        }
    }

    /// Set the expiration, turning this into a rolling-window quota.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Declare a label and its type.
    pub fn with_label(mut self, name: impl Into<String>, label_type: LabelType) -> Self {
        self.labels.insert(name.into(), label_type);
        self
    }

    /// Whether allocations against this quota roll out of a time window.
    pub fn is_expiring(&self) -> bool {
        !self.expiration.is_zero()
    }

    /// Check label values against the declared types.
    ///
    /// Labels the definition does not declare are accepted as-is.
    pub fn check_labels(&self, labels: &Labels) -> Result<()> {
        for (name, value) in labels {
            if let Some(&expected) = self.labels.get(name) {
                let actual = value.label_type();
                if actual != expected {
                    return Err(QuotaError::LabelType {
                        label: name.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

/// A single quota operation.
#[derive(Debug, Clone)]
pub struct QuotaRequest {
    /// The quota being operated on
    pub definition: Arc<QuotaDefinition>,
    /// Label values qualifying the quota
    pub labels: Labels,
    /// Number of units to allocate or release
    pub amount: i64,
    /// Caller-supplied id making retries idempotent
    pub dedup_id: String,
    /// Grant as much as possible instead of all-or-nothing
    pub best_effort: bool,
}

impl QuotaRequest {
    /// Create a strict request with no labels.
    pub fn new(definition: Arc<QuotaDefinition>, amount: i64, dedup_id: impl Into<String>) -> Self {
        Self {
            definition,
            labels: Labels::new(),
            amount,
            dedup_id: dedup_id.into(),
            best_effort: false,
        }
    }

    /// Attach a label value.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Mark the request as best-effort.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}
