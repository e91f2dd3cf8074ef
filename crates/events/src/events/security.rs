use serde::{Deserialize, Serialize};

/// Verification and sanitizer events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityEvent {
    VerificationCompleted {
        package: String,
        score: u8,
        threats: usize,
        warnings: Vec<String>,
    },

    /// Package refused before installation
    Blocked {
        package: String,
        score: u8,
        reason: String,
    },

    CommandRejected { command: String, reason: String },
}
