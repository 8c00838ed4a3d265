//! # PRISM Comms
//!
//! Telemetry for the profiling layer: the JSON message schema and the
//! endpoints messages are transmitted through.
//!
//! ```text
//!   ProfilingVisitor / FrameTracker
//!               │ Message
//!               ▼
//!         ┌───────────┐   serde_json    ┌──────────────────────────┐
//!         │ Telemetry │ ──────────────▶ │ dyn Endpoint             │
//!         └───────────┘    Vec<u8>      │  Memory | Stream | Null  │
//!                                       └──────────────────────────┘
//! ```
//!
//! Transmission is fire-and-forget: a failing endpoint is logged and the
//! profiled application never sees the error.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod endpoint;
pub mod message;
pub mod telemetry;

pub use endpoint::{Endpoint, MemoryEndpoint, NullEndpoint, StreamEndpoint};
pub use message::{
    AccelerationStructureBuildMetadata, ByteTransferMetadata, CounterReading, CounterValue,
    DimensionsMetadata, ImageTransferMetadata, Message, RenderPassMetadata, WorkloadMessage,
};
pub use telemetry::{Telemetry, TelemetryStats};
