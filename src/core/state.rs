//! Process-wide shutdown state.
//!
//! The first Ctrl+C cancels every child through the registered dispatcher and
//! lets the current command wind down; a second one exits immediately.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dispatch::Dispatcher;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Dispatcher cancelled on shutdown
static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler(dispatcher: Dispatcher) -> anyhow::Result<()> {
    let _ = DISPATCHER.set(dispatcher);

    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }

        match DISPATCHER.get() {
            Some(dispatcher) => {
                crate::log!("bakehouse"; "stopping...");
                dispatcher.cancel_all();
            }
            None => std::process::exit(130),
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
