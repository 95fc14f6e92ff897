//! Logging infrastructure for the bridge.
//!
//! All diagnostics go through `tracing`. The subscriber installed by
//! [`init_tracing`] has:
//! - an `EnvFilter` honouring `RUST_LOG`, falling back to the configured level
//! - an optional file layer writing into the add-on's user path
//! - a [`HostLogLayer`] forwarding every event to the host log sink
//!
//! The forwarding target is switched with [`attach_host`] / [`detach_host`]
//! as the add-on is created and destroyed; the subscriber itself is
//! process-wide and installed once.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::host::{HostLogLevel, HostSink};

/// Log file written into the user path when file logging is enabled.
pub const LOG_FILE: &str = "pvr-python.log";

static HOST_TARGET: RwLock<Option<Arc<dyn HostSink>>> = parking_lot::const_rwlock(None);

/// Install the process-wide subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing(settings: &LoggingSettings, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let file_layer = log_dir
        .filter(|_| settings.file)
        .and_then(|dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE)
                .build(dir)
                .map_err(|e| eprintln!("pvr-python: file logging disabled: {}", e))
                .ok()
        })
        .map(|appender| {
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(appender)
        });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(HostLogLayer)
        .with(file_layer)
        .try_init();
}

/// Route log events to `sink` from now on.
pub fn attach_host(sink: Arc<dyn HostSink>) {
    *HOST_TARGET.write() = Some(sink);
}

/// Stop forwarding log events to the host.
pub fn detach_host() {
    HOST_TARGET.write().take();
}

/// Forwards tracing events to the attached host log sink.
pub struct HostLogLayer;

impl<S: Subscriber> Layer<S> for HostLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(sink) = HOST_TARGET.read().clone() else {
            return;
        };
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        sink.log(
            HostLogLevel::from_tracing(event.metadata().level()),
            &visitor.finish(),
        );
    }
}

/// Flattens an event into `message key=value ...`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
