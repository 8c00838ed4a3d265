//! # PRISM Trackers
//!
//! Layer-side shadow state for the objects an application records into and
//! submits through.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          DeviceTracker                            │
//! │                                                                   │
//! │  ┌─────────────────────────────┐   ┌──────────────────────────┐  │
//! │  │ Arena<CommandBufferTracker> │   │   Arena<QueueTracker>    │  │
//! │  │  - CommandStream (records)  │   │  - Replay cursor         │  │
//! │  │  - LabelStack               │   │  - submit statistics     │  │
//! │  │  - active render pass       │   │                          │  │
//! │  └──────────────┬──────────────┘   └────────────▲─────────────┘  │
//! │                 │        replay_submission()    │                │
//! │                 └───────────────────────────────┘                │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The command buffer tracker is the Command Stream Recorder: it appends a
//! record only when told the device is capturing, but keeps its label stack
//! and render pass state correct either way.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod command_buffer;
pub mod device;
pub mod queue;

// Re-exports
pub use command_buffer::{
    CaptureMode, CommandBufferLevel, CommandBufferStats, CommandBufferTracker, RecordingState,
    RenderPassBegin, RenderPassEnd, RenderPassFlags,
};
pub use device::{CommandBufferHandle, DeviceTracker, QueueHandle};
pub use queue::{QueueStats, QueueTracker};
