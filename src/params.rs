//! Trial parameters and their environment encoding
//!
//! Every entry of a [`ParameterSet`] reaches the external program as an
//! environment variable named `RELENTLESS_<NAME>`, with the name uppercased.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix for parameter environment variables
pub const ENV_PREFIX: &str = "RELENTLESS_";

/// Numeric identifier of one trial instance (e.g. a test seed)
pub type Task = u64;

/// Named scalar inputs supplied to a trial run, compared by content
pub type ParameterSet = BTreeMap<String, ParamValue>;

/// A scalar parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Environment variable name for a parameter
pub fn env_name(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name.to_uppercase())
}

/// Environment variables exposing a parameter set to the external program
pub fn to_env(params: &ParameterSet) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(name, value)| (env_name(name), value.to_string()))
        .collect()
}
