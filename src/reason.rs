//! Failure details carried on failure command responses and failed sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub code: i32,
    pub description: String,
}

impl Reason {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)
    }
}

/// Well-known reason codes; applications may use any `i32`.
pub mod codes {
    pub const GENERAL_ERROR: i32 = 1;
    pub const UNAUTHORIZED: i32 = 31;
    pub const VALIDATION_ERROR: i32 = 69;
    pub const NOT_FOUND: i32 = 74;
    pub const COMMAND_PROCESSING_TIMEOUT: i32 = 104;
    pub const SESSION_ERROR: i32 = 100;
}
