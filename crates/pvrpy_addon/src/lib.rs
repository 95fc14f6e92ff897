//! PVR Python add-on - the C ABI the host loads.
//!
//! Every exported entry point lives here; the work happens in
//! [`pvrpy_core`]. This crate only converts between host records and core
//! types, owns the process-wide [`PvrAddon`] slot, and turns every error or
//! panic into the sentinel of the entry point that hit it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use pvrpy_core::{BridgeError, BridgeResult, PvrAddon, PvrError};

pub mod abi;
pub mod exports;
pub mod host;
pub mod stubs;

pub use abi::{PvrAddonCapabilities, PvrProperties};
pub use host::{CallbackHost, HostCallbacks};

/// The add-on created by the last successful `ADDON_Create`.
static ADDON: Lazy<RwLock<Option<Arc<PvrAddon>>>> = Lazy::new(|| RwLock::new(None));

fn current() -> Option<Arc<PvrAddon>> {
    ADDON.read().clone()
}

fn install(addon: Arc<PvrAddon>) {
    *ADDON.write() = Some(addon);
}

fn take() -> Option<Arc<PvrAddon>> {
    ADDON.write().take()
}

/// What an entry point returns when its call failed.
pub(crate) trait Sentinel {
    fn sentinel() -> Self;
}

impl Sentinel for PvrError {
    fn sentinel() -> Self {
        PvrError::Failed
    }
}

impl Sentinel for bool {
    fn sentinel() -> Self {
        false
    }
}

impl Sentinel for i32 {
    fn sentinel() -> Self {
        -1
    }
}

impl Sentinel for i64 {
    fn sentinel() -> Self {
        -1
    }
}

impl Sentinel for () {
    fn sentinel() -> Self {}
}

impl Sentinel for String {
    fn sentinel() -> Self {
        String::new()
    }
}

/// Run `body`, returning `fallback` if it panics.
pub(crate) fn guarded<R>(operation: &str, fallback: R, body: impl FnOnce() -> R) -> R {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
        error!("{} panicked", operation);
        fallback
    })
}

/// Run `body` against the current add-on; errors and panics become the sentinel.
pub(crate) fn call<R: Sentinel>(
    operation: &'static str,
    body: impl FnOnce(&PvrAddon) -> BridgeResult<R>,
) -> R {
    guarded(operation, R::sentinel(), || {
        let result = match current() {
            Some(addon) => body(&addon),
            None => Err(BridgeError::NotCreated),
        };
        result.unwrap_or_else(|e| {
            report(operation, &e);
            R::sentinel()
        })
    })
}

fn report(operation: &str, err: &BridgeError) {
    match err {
        // Already logged with the traceback where it was settled.
        BridgeError::RuntimeFault { .. } => debug!("{} failed: {}", operation, err),
        BridgeError::NotCreated | BridgeError::NativeIoFailure { .. } => {
            warn!("{} failed: {}", operation, err)
        }
        BridgeError::RegistrationFailure(_)
        | BridgeError::ImportFailure { .. }
        | BridgeError::MarshalMismatch(_) => error!("{} failed: {}", operation, err),
    }
}

#[cfg(test)]
static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Serializes tests sharing the add-on slot, the recording host or the interpreter.
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
    TEST_LOCK.lock()
}
