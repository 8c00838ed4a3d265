//! # PRISM Core
//!
//! The data model of the PRISM workload profiling layer.
//!
//! This crate holds everything that describes *what* an application asked the
//! GPU to do, independent of how it is sampled:
//!
//! - [`Workload`] / [`WorkloadRecord`] - one unit of device work plus the debug
//!   label stack that was open when it was recorded
//! - [`CommandStream`] - the ordered log of records owned by one command buffer
//! - [`WorkloadVisitor`] / [`Replay`] - submission-order walk over streams
//! - [`Handle`] / [`Arena`] - generation-checked object registry
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           prism-core                              │
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐    │
//! │  │  LabelStack  │───▶│WorkloadRecord│───▶│  CommandStream   │    │
//! │  │  (snapshot)  │    │  (Workload)  │    │   (recording)    │    │
//! │  └──────────────┘    └──────────────┘    └────────┬─────────┘    │
//! │                                                    │              │
//! │                                           ┌────────▼─────────┐    │
//! │                                           │      Replay      │    │
//! │                                           │ (WorkloadVisitor)│    │
//! │                                           └──────────────────┘    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod handle;
pub mod labels;
pub mod stream;
pub mod visitor;
pub mod workload;

// Re-exports for convenience
pub use error::{Error, Result};
pub use handle::{Arena, Handle};
pub use labels::{LabelStack, Labels};
pub use stream::CommandStream;
pub use visitor::{run_submit_command_stream, Replay, WorkloadVisitor};
pub use workload::*;
