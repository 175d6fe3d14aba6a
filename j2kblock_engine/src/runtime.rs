//! Process-wide engine runtime.
//!
//! The runtime owns the one piece of mutable shared state in the engine: the
//! effective encoding defaults. Configuration is out-of-band — a configure
//! call replaces the defaults, and the *next* compress call observes them.
//! Each compress/decompress call takes a snapshot under the runtime lock, so
//! a single call always sees one consistent record; ordering between a
//! configure call and the encode that should observe it remains a caller
//! obligation.

use std::sync::{Mutex, MutexGuard, OnceLock};

use log::{debug, warn};

use crate::error::EngineError;
use crate::params::{EncoderDefaults, WireValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Ready,
    Destroyed,
}

struct EngineRuntime {
    state: Lifecycle,
    num_threads: u32,
    verbose: bool,
    defaults: EncoderDefaults,
}

fn runtime() -> MutexGuard<'static, EngineRuntime> {
    static RUNTIME: OnceLock<Mutex<EngineRuntime>> = OnceLock::new();
    let lock = RUNTIME.get_or_init(|| {
        Mutex::new(EngineRuntime {
            state: Lifecycle::Uninitialized,
            num_threads: 0,
            verbose: false,
            defaults: EncoderDefaults::baseline(),
        })
    });
    // A panic mid-encode must not brick the runtime for the whole process.
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bring the runtime up. Idempotent: calling again while ready only updates
/// the thread and verbosity hints. After [`shutdown`], a fresh initialize
/// restores service with baseline defaults.
pub fn initialize(num_threads: u32, verbose: bool) {
    let mut rt = runtime();
    match rt.state {
        Lifecycle::Ready => {
            debug!("engine already initialized, updating hints only");
        }
        Lifecycle::Uninitialized | Lifecycle::Destroyed => {
            rt.defaults = EncoderDefaults::baseline();
            rt.state = Lifecycle::Ready;
            debug!("engine runtime initialized (threads={num_threads}, verbose={verbose})");
        }
    }
    rt.num_threads = num_threads;
    rt.verbose = verbose;
}

/// Tear the runtime down. Idempotent; further configure/compress/decompress
/// calls fail until a fresh [`initialize`].
pub fn shutdown() {
    let mut rt = runtime();
    if rt.state == Lifecycle::Ready {
        rt.state = Lifecycle::Destroyed;
        debug!("engine runtime destroyed");
    }
}

fn ensure_ready(rt: &EngineRuntime) -> Result<(), EngineError> {
    match rt.state {
        Lifecycle::Ready => Ok(()),
        Lifecycle::Uninitialized => Err(EngineError::NotInitialized),
        Lifecycle::Destroyed => Err(EngineError::Destroyed),
    }
}

/// Apply a versioned positional parameter block as the new process-wide
/// effective defaults.
///
/// The block is decoded in full before anything is applied; on failure the
/// previously applied defaults stay in force. On success the defaults are
/// replaced wholesale — fields absent from the caller's intent still arrive
/// in the block and overwrite whatever an earlier call configured.
pub fn set_default_params(version: u32, fields: &[WireValue]) -> Result<(), EngineError> {
    let decoded = EncoderDefaults::from_positional(version, fields)?;
    let mut rt = runtime();
    ensure_ready(&rt)?;
    if decoded.num_threads != 0 && decoded.num_threads != rt.num_threads {
        debug!(
            "thread hint changed {} -> {}",
            rt.num_threads, decoded.num_threads
        );
        rt.num_threads = decoded.num_threads;
    }
    if decoded.duration != 0 {
        // Soft budget only; nothing at this layer can enforce a deadline.
        warn!("duration budget of {}s is advisory and not enforced", decoded.duration);
    }
    rt.verbose = decoded.verbose;
    rt.defaults = decoded;
    debug!("effective defaults replaced");
    Ok(())
}

/// Lifecycle check without a defaults snapshot (decode reads everything it
/// needs from the stream itself).
pub(crate) fn check_ready() -> Result<(), EngineError> {
    ensure_ready(&runtime())
}

/// Snapshot the effective defaults for one compress/decompress call.
pub(crate) fn snapshot() -> Result<EncoderDefaults, EngineError> {
    let rt = runtime();
    ensure_ready(&rt)?;
    Ok(rt.defaults.clone())
}

/// Read back the effective defaults (introspection; same snapshot the next
/// compress call would take).
pub fn effective_defaults() -> Result<EncoderDefaults, EngineError> {
    snapshot()
}
