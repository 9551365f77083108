//! Error types for the receiver pipeline.

use chainfeed_abi::AbiError;
use chainfeed_store::StoreError;
use chainfeed_wire::{Checksum256, WireError};
use thiserror::Error;

/// Fatal receiver errors. Any of these closes the connection and takes the
/// process down with a non-zero exit code; silently dropping data would be
/// worse than a restart.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("Wire decode error: {0}")]
    Wire(#[from] WireError),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream closed the connection")]
    ConnectionClosed,

    #[error("Protocol ABI has not been received yet")]
    ProtocolAbiMissing,

    #[error("Link break at block {block_num}: prev_block does not match head id {expected}")]
    LinkBreak {
        block_num: u32,
        expected: Checksum256,
    },

    #[error("Failed to inflate compressed payload: {0}")]
    Inflate(std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for ReceiverError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ReceiverError::Transport(e.to_string())
    }
}

/// Errors from the control surface other plugins call into.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Acknowledgment mode was already enabled")]
    AckModeAlreadyEnabled,

    #[error("max_unconfirmed must be greater than zero")]
    ZeroMaxUnconfirmed,

    #[error("Block {got} acked below the previously acknowledged block {acked}")]
    AckRegression { acked: u32, got: u32 },

    #[error("A receiver is already installed in this process")]
    AlreadyInstalled,
}
