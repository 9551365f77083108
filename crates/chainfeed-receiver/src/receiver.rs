//! The websocket ingestion loop.
//!
//! Owns the connection to the upstream state-history endpoint: handshake,
//! the protocol-ABI frame, the single open-ended block request, then a
//! serial read loop. Before each read the backpressure conditions are
//! checked and the reader sleeps on a growing timer while any of them
//! holds. Aborting closes the stream and cancels the pending read or timer.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{error, info};

use crate::config::ReceiverConfig;
use crate::control::{ControlState, DependencyGate};
use crate::error::ReceiverError;
use crate::events::ReceiverPauseEvent;
use crate::pipeline::Pipeline;

/// Full-history frames can be enormous; allow up to 1 GiB per message.
const MAX_MESSAGE_BYTES: usize = 1024 * 1024 * 1024;

/// Initial pause under backpressure, milliseconds.
const PAUSE_INITIAL_MS: u64 = 100;
/// Pause ceiling, milliseconds.
const PAUSE_MAX_MS: u64 = 8_000;
/// Pauses at or above this publish a `receiver_pause` event.
const PAUSE_REPORT_MS: u64 = 2_000;

/// Next backpressure wait: 100 ms doubling up to 8 s.
pub(crate) fn next_pause_ms(current: u64) -> u64 {
    match current {
        0 => PAUSE_INITIAL_MS,
        p => (p * 2).min(PAUSE_MAX_MS),
    }
}

/// The connected receiver: transport plus pipeline.
pub struct Receiver {
    config: ReceiverConfig,
    pipeline: Pipeline,
    control: std::sync::Arc<ControlState>,
    abort_rx: watch::Receiver<bool>,
    dependencies: DependencyGate,
}

impl Receiver {
    pub fn new(
        config: ReceiverConfig,
        pipeline: Pipeline,
        control: std::sync::Arc<ControlState>,
        abort_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            pipeline,
            control,
            abort_rx,
            dependencies: DependencyGate::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Delay `run()` until `ready` reports true (polled every second).
    pub fn add_dependency(&mut self, name: impl Into<String>, ready: impl Fn() -> bool + Send + 'static) {
        self.dependencies.add(name, ready);
    }

    /// Run the receiver until the stream ends, an abort is requested, or a
    /// fatal error occurs.
    pub async fn run(mut self) -> Result<(), ReceiverError> {
        if !self.dependencies.is_empty() {
            info!("waiting for dependent collaborators before starting");
            self.dependencies.wait().await;
        }

        self.pipeline.load_state();

        let url = self.config.url();
        info!(url = %url, "connecting to state-history endpoint");
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(MAX_MESSAGE_BYTES);
        ws_config.max_frame_size = Some(MAX_MESSAGE_BYTES);
        let (stream, _) = connect_async_with_config(url.as_str(), Some(ws_config), false).await?;
        let (mut sink, mut stream) = stream.split();

        let outcome = self.read_loop(&mut sink, &mut stream).await;
        let _ = sink.send(Message::Close(None)).await;

        match outcome {
            Err(e) => {
                error!(error = %e, "receiver failed, closing stream");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn read_loop(
        &mut self,
        sink: &mut (impl Sink<Message, Error = WsError> + Unpin),
        stream: &mut (impl Stream<Item = Result<Message, WsError>> + Unpin),
    ) -> Result<(), ReceiverError> {
        // frame 1: the protocol ABI
        let abi_frame = match self.next_frame(sink, stream).await? {
            Some(frame) => frame,
            None => return self.closed(),
        };
        self.pipeline.load_protocol_abi(&abi_frame)?;

        let request = self.pipeline.build_request()?;
        sink.send(Message::Binary(request))
            .await
            .map_err(ReceiverError::from)?;

        let mut pause_ms: u64 = 0;
        loop {
            if !self.check_pause(&mut pause_ms).await {
                return Ok(()); // aborted while pausing
            }
            match self.next_frame(sink, stream).await? {
                None => return self.closed(),
                Some(frame) => {
                    if !self.pipeline.on_result(&frame)? {
                        return Ok(()); // abort observed mid-result
                    }
                }
            }
        }
    }

    fn closed(&self) -> Result<(), ReceiverError> {
        if self.control.is_aborting() {
            Ok(())
        } else {
            Err(ReceiverError::ConnectionClosed)
        }
    }

    /// Sleep while any backpressure condition holds. Returns `false` if an
    /// abort arrived during the pause.
    async fn check_pause(&mut self, pause_ms: &mut u64) -> bool {
        loop {
            if self.control.is_aborting() {
                return false;
            }
            let unconfirmed_limit = self.control.ack_mode().is_some_and(|max| {
                self.pipeline.head().saturating_sub(self.control.acked()) >= max
            });
            let pause = self.control.take_slowdown()
                || unconfirmed_limit
                || self.pipeline.bus().queue_depth() > self.config.max_queue_size;
            if !pause {
                *pause_ms = 0;
                return true;
            }

            *pause_ms = next_pause_ms(*pause_ms);
            if *pause_ms >= PAUSE_REPORT_MS {
                self.pipeline.bus().publish_receiver_pause(ReceiverPauseEvent {
                    head: self.pipeline.head(),
                    acknowledged: self.control.acked(),
                });
                info!(
                    head = self.pipeline.head(),
                    acked = self.control.acked(),
                    wait_ms = *pause_ms,
                    "pausing the reader"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(*pause_ms)) => {}
                _ = self.abort_rx.changed() => return false,
            }
        }
    }

    /// Next data frame from the stream, answering pings along the way.
    /// `None` means the connection closed or an abort arrived.
    async fn next_frame(
        &mut self,
        sink: &mut (impl Sink<Message, Error = WsError> + Unpin),
        stream: &mut (impl Stream<Item = Result<Message, WsError>> + Unpin),
    ) -> Result<Option<Vec<u8>>, ReceiverError> {
        loop {
            if self.control.is_aborting() {
                return Ok(None);
            }
            let msg = tokio::select! {
                _ = self.abort_rx.changed() => return Ok(None),
                msg = stream.next() => msg,
            };
            match msg {
                None => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.into_bytes())),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => {}
            }
        }
    }
}
