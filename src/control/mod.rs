pub mod models;
pub mod service;

pub use service::ControlService;

use crate::mqtt::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("{channel} must be \"ON\" or \"OFF\", got {}", describe(.value))]
    InvalidToken {
        channel: &'static str,
        value: Option<String>,
    },

    #[error("failed to encode control payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to publish control command: {0}")]
    Publish(#[from] BrokerError),
}

fn describe(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => "nothing".to_owned(),
    }
}
