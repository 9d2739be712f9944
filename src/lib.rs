//! # PasteSync
//!
//! Cross-device clipboard capture and synchronization pipeline.
//!
//! PasteSync watches the system clipboard, decodes each snapshot into a
//! structured record of typed items, and ships records to paired peer
//! devices, with chunked pull-based transfer for large file payloads.

pub mod config;
pub mod extract;
pub mod notify;
pub mod payload;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod trust;
pub mod watcher;

pub use config::Config;

/// Result type alias for PasteSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PasteSync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Clipboard watcher error
    #[error("Watcher error: {0}")]
    Watcher(#[from] watcher::WatchError),

    /// Pipeline error
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    /// Record store error
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// Peer transport error
    #[error("Transport error: {0}")]
    Transport(#[from] sync::transport::TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum inline payload size accepted from the clipboard (16MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;
