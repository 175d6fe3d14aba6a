//! Explicit lifecycle for the plugin's engine binding.
//!
//! The state machine is Uninitialized -> Ready -> Destroyed, with
//! re-initialization allowed after destroy. Both transitions are idempotent.
//! The plugin tracks its own state in front of the engine so that calls
//! arriving in the wrong state fail here with a clear message instead of
//! deep inside the engine.

use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, info};

use crate::error::PluginError;

const UNINITIALIZED: u8 = 0;
const READY: u8 = 1;
const DESTROYED: u8 = 2;

static STATE: AtomicU8 = AtomicU8::new(UNINITIALIZED);

/// Bring the engine up.
///
/// `num_threads` of 0 lets the engine pick; `verbose` raises the engine's
/// per-block log level. Idempotent while ready, and valid again after
/// [`destroy`]: re-initialization restores service with the engine's
/// baseline defaults, not the previously configured ones.
pub fn init(num_threads: u32, verbose: bool) {
    // The engine must be up before the ready state becomes observable;
    // ensure_ready passing is a promise that engine calls will not fail on
    // lifecycle grounds.
    j2kblock_engine::initialize(num_threads, verbose);
    let prev = STATE.swap(READY, Ordering::SeqCst);
    match prev {
        READY => debug!("plugin already initialized"),
        DESTROYED => info!("plugin re-initialized after destroy"),
        _ => info!("plugin initialized (threads={num_threads}, verbose={verbose})"),
    }
}

/// Tear the engine down. Idempotent; a no-op unless currently ready. Safe to
/// call from process-exit paths.
pub fn destroy() {
    if STATE
        .compare_exchange(READY, DESTROYED, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        j2kblock_engine::shutdown();
        info!("plugin destroyed");
    }
}

/// Reject calls outside the ready state.
pub fn ensure_ready() -> Result<(), PluginError> {
    match STATE.load(Ordering::SeqCst) {
        READY => Ok(()),
        UNINITIALIZED => Err(PluginError::Lifecycle(
            "plugin used before initialization".into(),
        )),
        _ => Err(PluginError::Lifecycle("plugin used after destroy".into())),
    }
}

pub fn is_ready() -> bool {
    STATE.load(Ordering::SeqCst) == READY
}

/// RAII handle tying [`destroy`] to scope exit. Hosts that lack an explicit
/// teardown hook hold one of these for the engine's whole useful life.
pub struct EngineGuard {
    _priv: (),
}

impl EngineGuard {
    pub fn init(num_threads: u32, verbose: bool) -> Self {
        init(num_threads, verbose);
        Self { _priv: () }
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        destroy();
    }
}
