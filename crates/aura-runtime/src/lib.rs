//! `aura-runtime` – Background machinery around the Knowledge Store.
//!
//! # Modules
//!
//! - [`checkpoint`] – [`CheckpointScheduler`][checkpoint::CheckpointScheduler]:
//!   restores the [`KnowledgeStore`][aura_memory::KnowledgeStore] from its
//!   snapshot artifact at startup, then rewrites the artifact on a fixed
//!   interval and once more when shutdown is signalled.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter. Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod checkpoint;
pub mod telemetry;

pub use checkpoint::{CheckpointScheduler, DEFAULT_INTERVAL};
pub use telemetry::{init_tracing, LogFormat, TracerProviderGuard};
