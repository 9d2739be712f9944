//! Clipboard pipelines
//!
//! The inbound pipeline turns a native payload into a persisted
//! [`crate::record::PasteRecord`]; the outbound pipeline renders a record
//! back into a native payload for write-back or peer-facing use.

pub mod collector;
pub mod inbound;
pub mod outbound;

pub use collector::PasteCollector;
pub use inbound::InboundPipeline;
pub use outbound::{OutboundPipeline, ProduceOptions};

use thiserror::Error;

/// Pipeline-level failures. Per-slot extraction failures never surface
/// here; they are captured as slot error markers inside the collector.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Persisting the finished record failed
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
