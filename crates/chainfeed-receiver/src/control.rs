//! The control surface other plugins use to steer the receiver, and the
//! process-wide handle registry.
//!
//! The registry is initialized once at startup and never mutated after;
//! collaborators reach the running receiver through [`receiver()`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::watch;
use tracing::info;

use chainfeed_abi::ContractAbiCache;
use chainfeed_store::StateStore;
use chainfeed_wire::Name;

use crate::error::ControlError;

/// Shared flags read by the ingestion loop between frames.
#[derive(Debug, Default)]
pub struct ControlState {
    /// `max_unconfirmed` once acknowledgment mode is enabled.
    ack_mode: OnceLock<u32>,
    acked: AtomicU32,
    slowdown: AtomicBool,
    aborting: AtomicBool,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_mode(&self) -> Option<u32> {
        self.ack_mode.get().copied()
    }

    /// Enable acknowledgment mode. May succeed at most once.
    pub fn enable_ack_mode(&self, max_unconfirmed: u32) -> Result<(), ControlError> {
        if max_unconfirmed == 0 {
            return Err(ControlError::ZeroMaxUnconfirmed);
        }
        self.ack_mode
            .set(max_unconfirmed)
            .map_err(|_| ControlError::AckModeAlreadyEnabled)
    }

    pub fn acked(&self) -> u32 {
        self.acked.load(Ordering::Relaxed)
    }

    /// Acknowledge blocks up to `block_num`; regressions are fatal.
    pub fn ack_block(&self, block_num: u32) -> Result<(), ControlError> {
        let acked = self.acked();
        if block_num < acked {
            return Err(ControlError::AckRegression {
                acked,
                got: block_num,
            });
        }
        self.set_acked(block_num);
        Ok(())
    }

    pub(crate) fn set_acked(&self, block_num: u32) {
        self.acked.store(block_num, Ordering::Relaxed);
    }

    /// Request a single backpressure pause.
    pub fn request_slowdown(&self) {
        self.slowdown.store(true, Ordering::Relaxed);
    }

    /// Consume a one-shot slowdown request.
    pub(crate) fn take_slowdown(&self) -> bool {
        self.slowdown.swap(false, Ordering::Relaxed)
    }

    pub fn request_abort(&self) {
        self.aborting.store(true, Ordering::Relaxed);
    }

    pub fn is_aborting(&self) -> bool {
        self.aborting.load(Ordering::Relaxed)
    }
}

/// Handle to a running receiver, exposed to the rest of the process.
#[derive(Clone)]
pub struct ReceiverHandle {
    control: Arc<ControlState>,
    store: Arc<Mutex<StateStore>>,
    cache: Arc<Mutex<ContractAbiCache>>,
    abort_tx: watch::Sender<bool>,
}

impl ReceiverHandle {
    pub(crate) fn new(
        control: Arc<ControlState>,
        store: Arc<Mutex<StateStore>>,
        cache: Arc<Mutex<ContractAbiCache>>,
        abort_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            control,
            store,
            cache,
            abort_tx,
        }
    }

    /// Enable acknowledgment mode. May be called at most once, before or
    /// after the receiver starts; the reader pauses once `head - acked`
    /// reaches `max_unconfirmed`.
    pub fn exporter_will_ack_blocks(&self, max_unconfirmed: u32) -> Result<(), ControlError> {
        self.control.enable_ack_mode(max_unconfirmed)?;
        info!(max_unconfirmed, "receiver will pause on unacknowledged blocks");
        Ok(())
    }

    /// Acknowledge every block up to `block_num`. Must be monotonically
    /// non-decreasing; a regression is fatal.
    pub fn ack_block(&self, block_num: u32) -> Result<(), ControlError> {
        self.control.ack_block(block_num)
    }

    /// Request a single backpressure pause before the next read.
    pub fn slowdown(&self) {
        self.control.request_slowdown();
    }

    /// Ensure `account`'s ABI is loaded and return the shared decoder
    /// context.
    pub fn get_contract_abi_ctxt(&self, account: Name) -> Arc<Mutex<ContractAbiCache>> {
        ensure_contract_abi(&self.store, &self.cache, account);
        Arc::clone(&self.cache)
    }

    /// Close the connection and prevent the in-flight result from being
    /// committed.
    pub fn abort_receiver(&self) {
        self.control.request_abort();
        let _ = self.abort_tx.send(true);
    }

    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }
}

/// Load `account`'s ABI into the live context from the durable store if it
/// is not already there. Returns readiness.
pub(crate) fn ensure_contract_abi(
    store: &Mutex<StateStore>,
    cache: &Mutex<ContractAbiCache>,
    account: Name,
) -> bool {
    if cache.lock().unwrap().is_loaded(account) {
        return true;
    }
    let stored = store.lock().unwrap().abi(account).map(<[u8]>::to_vec);
    match stored {
        Some(bytes) => match cache.lock().unwrap().install(account, &bytes) {
            Ok(_) => true,
            Err(e) => {
                // unreachable for ABIs that passed validation on install
                tracing::warn!(account = %account, error = %e, "stored contract ABI failed to load");
                false
            }
        },
        None => false,
    }
}

static RECEIVER: OnceLock<ReceiverHandle> = OnceLock::new();

/// Install the process-wide receiver handle. Called once at startup.
pub fn install_receiver(handle: ReceiverHandle) -> Result<(), ControlError> {
    RECEIVER
        .set(handle)
        .map_err(|_| ControlError::AlreadyInstalled)
}

/// The process-wide receiver handle, if one has been installed.
pub fn receiver() -> Option<&'static ReceiverHandle> {
    RECEIVER.get()
}

/// Gate that delays startup until dependent collaborators report started.
#[derive(Default)]
pub struct DependencyGate {
    deps: Vec<(String, Box<dyn Fn() -> bool + Send>)>,
}

impl DependencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependency by name with its readiness probe.
    pub fn add(&mut self, name: impl Into<String>, ready: impl Fn() -> bool + Send + 'static) {
        self.deps.push((name.into(), Box::new(ready)));
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Poll every second until all dependencies are ready.
    pub async fn wait(&mut self) {
        loop {
            self.deps.retain(|(name, ready)| {
                if ready() {
                    info!(dependency = %name, "dependency has started");
                    false
                } else {
                    info!(dependency = %name, "waiting for dependency");
                    true
                }
            });
            if self.deps.is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (tempfile::TempDir, ReceiverHandle) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StateStore::open(dir.path(), 8).unwrap();
        let handle = ReceiverHandle::new(
            Arc::new(ControlState::new()),
            Arc::new(Mutex::new(store)),
            Arc::new(Mutex::new(ContractAbiCache::new())),
            watch::channel(false).0,
        );
        (dir, handle)
    }

    #[test]
    fn ack_mode_enabled_once() {
        let (_dir, h) = handle();
        assert!(matches!(
            h.exporter_will_ack_blocks(0),
            Err(ControlError::ZeroMaxUnconfirmed)
        ));
        h.exporter_will_ack_blocks(100).unwrap();
        assert!(matches!(
            h.exporter_will_ack_blocks(50),
            Err(ControlError::AckModeAlreadyEnabled)
        ));
        assert_eq!(h.control().ack_mode(), Some(100));
    }

    #[test]
    fn ack_must_be_monotonic() {
        let (_dir, h) = handle();
        h.exporter_will_ack_blocks(10).unwrap();
        h.ack_block(5).unwrap();
        h.ack_block(5).unwrap(); // equal is fine
        h.ack_block(9).unwrap();
        assert!(matches!(
            h.ack_block(4),
            Err(ControlError::AckRegression { acked: 9, got: 4 })
        ));
    }

    #[test]
    fn slowdown_is_one_shot() {
        let (_dir, h) = handle();
        h.slowdown();
        assert!(h.control().take_slowdown());
        assert!(!h.control().take_slowdown());
    }

    #[test]
    fn abort_sets_flag_and_signals() {
        let (_dir, h) = handle();
        let mut rx = h.abort_tx.subscribe();
        assert!(!*rx.borrow());
        h.abort_receiver();
        assert!(h.control().is_aborting());
        assert!(*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn dependency_gate_waits_for_readiness() {
        use std::sync::atomic::AtomicBool;
        let flag = Arc::new(AtomicBool::new(false));
        let mut gate = DependencyGate::new();
        let probe = Arc::clone(&flag);
        gate.add("exporter", move || probe.load(Ordering::Relaxed));

        let waiter = tokio::spawn(async move {
            gate.wait().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!waiter.is_finished());
        flag.store(true, Ordering::Relaxed);
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        waiter.await.unwrap();
    }
}
