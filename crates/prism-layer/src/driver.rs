//! # Driver Interface
//!
//! The layer sits on top of a [`DeviceDriver`]: every intercepted call ends
//! in a forward to it, and the trap protocol uses its event primitives.
//! Driver errors are carried as [`Error::Driver`](prism_core::Error::Driver)
//! and passed back to the application unchanged.

use prism_core::Result;
use prism_trackers::CommandBufferLevel;

use crate::command::Command;

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw value
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

raw_handle!(
    /// Driver queue handle
    RawQueue
);
raw_handle!(
    /// Driver command buffer handle
    RawCommandBuffer
);
raw_handle!(
    /// Driver event handle
    RawEvent
);

/// Host-visible event state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Signalled
    Set,
    /// Not signalled
    Reset,
}

/// The driver beneath the layer, one instance per device
pub trait DeviceDriver: Send + Sync {
    // -------------------------------------------------------------------------
    // Queues and command buffers
    // -------------------------------------------------------------------------

    /// Get a device queue
    fn get_device_queue(&self, family: u32, index: u32) -> RawQueue;

    /// Allocate a command buffer
    fn allocate_command_buffer(&self, level: CommandBufferLevel) -> Result<RawCommandBuffer>;

    /// Free a command buffer
    fn free_command_buffer(&self, command_buffer: RawCommandBuffer);

    /// Begin recording
    fn begin_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()>;

    /// End recording
    fn end_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()>;

    /// Reset to the initial state
    fn reset_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()>;

    /// Record a command
    fn cmd(&self, command_buffer: RawCommandBuffer, command: &Command<'_>);

    /// Record secondary buffer execution
    fn cmd_execute_commands(&self, command_buffer: RawCommandBuffer, secondaries: &[RawCommandBuffer]);

    /// Submit batches of command buffers
    fn queue_submit(&self, queue: RawQueue, batches: &[&[RawCommandBuffer]]) -> Result<()>;

    /// Present
    fn queue_present(&self, queue: RawQueue) -> Result<()>;

    /// Block until all submitted work has completed
    fn device_wait_idle(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Create an unsignalled event
    fn create_event(&self) -> Result<RawEvent>;

    /// Destroy an event
    fn destroy_event(&self, event: RawEvent);

    /// Query an event from the host
    fn event_status(&self, event: RawEvent) -> Result<EventStatus>;

    /// Signal an event from the host
    fn set_event(&self, event: RawEvent) -> Result<()>;

    /// Unsignal an event from the host
    fn reset_event(&self, event: RawEvent) -> Result<()>;

    /// Record a device-side signal
    fn cmd_set_event(&self, command_buffer: RawCommandBuffer, event: RawEvent);

    /// Record a device-side wait
    fn cmd_wait_event(&self, command_buffer: RawCommandBuffer, event: RawEvent);

    /// Record a device-side unsignal
    fn cmd_reset_event(&self, command_buffer: RawCommandBuffer, event: RawEvent);
}
