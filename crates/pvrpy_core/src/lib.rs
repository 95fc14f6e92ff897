//! PVR Python core - the bridge between a host PVR add-on ABI and a
//! backend implemented in embedded Python.
//!
//! This crate contains everything except the C ABI itself:
//! - Lifecycle of the embedded execution context
//! - Marshaling between typed host records and Python objects
//! - The concurrency gate serializing all entry into the interpreter
//! - The stream arbiter deciding native vs. managed live-stream I/O
//!
//! The host is only reached through [`host::HostServices`], so the whole
//! crate runs against a mock host in tests.

pub mod addon;
pub mod arbiter;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod gate;
pub mod host;
pub mod logging;
pub mod marshal;
pub mod records;
pub mod runtime;

pub use addon::{Capabilities, DriveSpace, PvrAddon};
pub use config::{AddonConfig, BridgeSettings, RuntimeSettings};
pub use error::{AddonStatus, BridgeError, BridgeResult, MarshalError, PvrError};
pub use host::{CallToken, HostLogLevel, HostServices, HostSink, NativeFile, NativeIo};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
pub(crate) mod test_support;
