//=========================================================================
// Abort Signal
//=========================================================================
//
// Process-wide fatal error slot. Background work writes a message here;
// the frame loop checks it at the start of every update and fails with
// that message. This is how failures cross from worker threads back to
// the main loop without a shared call stack.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::{error, warn};
use parking_lot::Mutex;

//=== AbortSignal =========================================================

/// Shared, settable abort message. Cloning shares the same slot.
///
/// The first message raised wins; later ones are logged and discarded so
/// a failure is reported exactly once.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    message: Arc<Mutex<Option<String>>>,
}

impl AbortSignal {
    /// Creates an unraised signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns false if it was already raised.
    pub fn raise(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut slot = self.message.lock();
        if let Some(existing) = slot.as_ref() {
            warn!(target: "engine", "Abort already raised ({}); ignoring: {}", existing, message);
            return false;
        }
        error!(target: "engine", "Abort raised: {}", message);
        *slot = Some(message);
        true
    }

    /// Returns the abort message, if raised.
    pub fn message(&self) -> Option<String> {
        self.message.lock().clone()
    }

    /// Returns true once the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.message.lock().is_some()
    }

    /// Clears the signal, returning the previous message.
    pub fn clear(&self) -> Option<String> {
        self.message.lock().take()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
