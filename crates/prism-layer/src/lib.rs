//! # PRISM Layer
//!
//! A profiling layer that sits between an application and its GPU driver.
//! Workloads recorded into command buffers are captured while a frame of
//! interest is open; when those buffers are submitted, the layer replays
//! the records and samples hardware counters around each workload through
//! a pair of trap events.
//!
//! ## Trap protocol
//!
//! ```text
//!   device                                      host
//!   ──────                                      ────
//!   ... workload ...
//!   set(device_to_host)  ───────────────────▶   poll status until Set
//!   wait(host_to_device)                        reset(device_to_host)
//!        │                                      settle delay
//!        │                                      sample counters
//!        │               ◀───────────────────   set(host_to_device)
//!   reset(host_to_device)                       read counters, emit message
//!   ... next workload ...
//! ```
//!
//! ## Frames
//!
//! A frame closes at `queue_present` or at a submission flagged
//! [`SubmitFlags::END_OF_FRAME`]. Frames are selected by an explicit list
//! or periodically; see [`ProfileConfig`].
//!
//! ## Locking
//!
//! One blocking lock covers all tracked state. It is released before
//! forwarding to the driver, except around submissions that are replayed and
//! around frame boundaries that sample, where it is held until sampling
//! completes.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod config;
pub mod counters;
pub mod device;
pub mod driver;
pub mod entry;
pub mod frame;
pub mod layer;
pub mod trap;
pub mod visitor;

#[cfg(test)]
mod mock;

pub use command::{AccelerationStructureBuildInfo, Command, Extent3d, ImageRegion};
pub use config::{FrameMode, ProfileConfig, TrapConfig, CONFIG_ENV};
pub use counters::{
    CounterBackend, CounterDescriptor, CounterKind, CounterSession, NullCounterBackend,
    SessionStats,
};
pub use device::ProfileDevice;
pub use driver::{DeviceDriver, EventStatus, RawCommandBuffer, RawEvent, RawQueue};
pub use entry::{EntryPointTable, Interception};
pub use frame::{BoundaryActions, FramePhase, FrameTracker, FrameTransition};
pub use layer::{
    CommandBufferId, DeviceId, Layer, LayerState, QueueId, SubmitFlags, Submission,
};
pub use trap::{TrapEvents, TrapPair};
pub use visitor::ProfilingVisitor;

pub use prism_comms::{Endpoint, MemoryEndpoint, NullEndpoint, StreamEndpoint};
pub use prism_trackers::{CommandBufferLevel, RenderPassBegin, RenderPassFlags};
