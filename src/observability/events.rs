//! Lifecycle and request events
//!
//! Every log line carries one of these as its `event` field.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Process lifecycle
    BootStart,
    ConfigLoaded,
    /// Log replayed and indexes rebuilt
    StoreOpened,
    Serving,
    ShutdownComplete,
    /// Store could not be opened (corruption, I/O)
    StoreOpenFailed,

    // Registry
    DomainCreated,
    BucketCreated,

    // Items
    SnapshotWritten,

    // Rendering
    RenderBegin,
    RenderComplete,
    RenderFailed,
    /// Request waited on another request's in-flight render
    RenderJoined,

    // Edge
    RequestRejected,
    InternalError,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StoreOpened => "STORE_OPENED",
            Event::Serving => "SERVING",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::StoreOpenFailed => "STORE_OPEN_FAILED",
            Event::DomainCreated => "DOMAIN_CREATED",
            Event::BucketCreated => "BUCKET_CREATED",
            Event::SnapshotWritten => "SNAPSHOT_WRITTEN",
            Event::RenderBegin => "RENDER_BEGIN",
            Event::RenderComplete => "RENDER_COMPLETE",
            Event::RenderFailed => "RENDER_FAILED",
            Event::RenderJoined => "RENDER_JOINED",
            Event::RequestRejected => "REQUEST_REJECTED",
            Event::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            Event::StoreOpenFailed => Severity::Fatal,
            Event::InternalError => Severity::Error,
            Event::RenderFailed | Event::RequestRejected => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
