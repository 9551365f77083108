//! chainfeed-receiver — the state-history stream receiver.
//!
//! Connects to an upstream node over a websocket, negotiates the protocol
//! ABI, requests an unbounded block range and converts the binary payloads
//! into decoded events on an in-process bus, while tracking fork-aware
//! durable progress so a restart resumes at the right position.
//!
//! Wiring order for embedders:
//!
//! ```no_run
//! # async fn example() -> Result<(), chainfeed_receiver::ReceiverError> {
//! use chainfeed_receiver::{build, install_receiver, ReceiverConfig};
//!
//! let (receiver, handle) = build(ReceiverConfig::default())?;
//! let _blocks = receiver.pipeline().bus().subscribe_blocks();
//! install_receiver(handle).expect("first install");
//! receiver.run().await
//! # }
//! ```

mod bus;
mod config;
mod control;
mod error;
mod events;
mod pipeline;
mod receiver;
pub mod types;

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use chainfeed_abi::ContractAbiCache;
use chainfeed_store::StateStore;

pub use bus::{EventBus, CHANNEL_PRIORITY};
pub use config::ReceiverConfig;
pub use control::{install_receiver, receiver, ControlState, DependencyGate, ReceiverHandle};
pub use error::{ControlError, ReceiverError};
pub use events::{
    AbiErrorEvent, AbiRemovalEvent, AbiUpdateEvent, BlockEvent, BlockTableDeltaEvent, ForkEvent,
    ForkReason, ReceiverPauseEvent, TableRowUpdateEvent, TransactionTraceEvent,
};
pub use pipeline::{ActionBlacklist, Pipeline};
pub use receiver::Receiver;

/// Open the durable store and assemble a receiver plus its control handle.
pub fn build(config: ReceiverConfig) -> Result<(Receiver, ReceiverHandle), ReceiverError> {
    let store = StateStore::open(&config.state_dir(), config.state_db_size_mb)?;
    let store = Arc::new(Mutex::new(store));
    let cache = Arc::new(Mutex::new(ContractAbiCache::new()));
    let control = Arc::new(ControlState::new());
    let (abort_tx, abort_rx) = watch::channel(false);

    let bus = EventBus::new(config.channel_capacity);
    let pipeline = Pipeline::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        bus,
        Arc::clone(&control),
        config.report_every,
    );
    let handle = ReceiverHandle::new(Arc::clone(&control), store, cache, abort_tx);
    let receiver = Receiver::new(config, pipeline, control, abort_rx);
    Ok((receiver, handle))
}
