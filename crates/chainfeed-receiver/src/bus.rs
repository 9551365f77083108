//! Typed in-process publish/subscribe.
//!
//! One broadcast channel per message kind; publications are `Arc`-shared
//! and dropped silently when nobody subscribes. All core publications share
//! a single fixed priority, so delivery within the reactor is FIFO.

use std::sync::Arc;

use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::events::{
    AbiErrorEvent, AbiRemovalEvent, AbiUpdateEvent, BlockEvent, BlockTableDeltaEvent, ForkEvent,
    ReceiverPauseEvent, TableRowUpdateEvent, TransactionTraceEvent,
};

/// Priority attached to every core publication.
pub const CHANNEL_PRIORITY: u8 = 50;

macro_rules! channels {
    ($( $field:ident : $ty:ty { sub: $sub:ident, pub_: $pub_:ident, has: $has:ident } ),+ $(,)?) => {
        /// The receiver's event bus.
        pub struct EventBus {
            $( $field: Sender<Arc<$ty>>, )+
        }

        impl EventBus {
            /// Create a bus whose channels buffer up to `capacity` messages
            /// per subscriber.
            pub fn new(capacity: usize) -> Self {
                Self {
                    $( $field: broadcast::channel(capacity).0, )+
                }
            }

            $(
                pub fn $sub(&self) -> Receiver<Arc<$ty>> {
                    self.$field.subscribe()
                }

                pub fn $pub_(&self, event: $ty) {
                    // no subscribers is not an error
                    let _ = self.$field.send(Arc::new(event));
                }

                pub fn $has(&self) -> bool {
                    self.$field.receiver_count() > 0
                }
            )+

            /// Deepest per-channel backlog, the reactor-queue measure used
            /// by the backpressure check.
            pub fn queue_depth(&self) -> usize {
                [ $( self.$field.len(), )+ ].into_iter().max().unwrap_or(0)
            }
        }
    };
}

channels! {
    forks: ForkEvent { sub: subscribe_forks, pub_: publish_fork, has: has_fork_subscribers },
    blocks: BlockEvent { sub: subscribe_blocks, pub_: publish_block, has: has_block_subscribers },
    block_table_deltas: BlockTableDeltaEvent {
        sub: subscribe_block_table_deltas,
        pub_: publish_block_table_delta,
        has: has_block_table_delta_subscribers
    },
    transaction_traces: TransactionTraceEvent {
        sub: subscribe_transaction_traces,
        pub_: publish_transaction_trace,
        has: has_transaction_trace_subscribers
    },
    abi_updates: AbiUpdateEvent {
        sub: subscribe_abi_updates,
        pub_: publish_abi_update,
        has: has_abi_update_subscribers
    },
    abi_removals: AbiRemovalEvent {
        sub: subscribe_abi_removals,
        pub_: publish_abi_removal,
        has: has_abi_removal_subscribers
    },
    abi_errors: AbiErrorEvent {
        sub: subscribe_abi_errors,
        pub_: publish_abi_error,
        has: has_abi_error_subscribers
    },
    table_row_updates: TableRowUpdateEvent {
        sub: subscribe_table_row_updates,
        pub_: publish_table_row_update,
        has: has_table_row_update_subscribers
    },
    receiver_pauses: ReceiverPauseEvent {
        sub: subscribe_receiver_pauses,
        pub_: publish_receiver_pause,
        has: has_receiver_pause_subscribers
    },
}
