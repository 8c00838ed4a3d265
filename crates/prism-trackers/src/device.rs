//! # Device Tracker
//!
//! Owns the queue and command buffer trackers of one device. Application
//! objects are looked up by driver handle and stored in generational arenas,
//! so a freed command buffer can never be confused with a later one that
//! reuses its slot.

use alloc::vec::Vec;

use hashbrown::HashMap;
use prism_core::{Arena, CommandStream, Error, Handle, Result, WorkloadVisitor};

use crate::command_buffer::{CommandBufferLevel, CommandBufferTracker};
use crate::queue::QueueTracker;

/// Handle to a tracked command buffer
pub type CommandBufferHandle = Handle<CommandBufferTracker>;

/// Handle to a tracked queue
pub type QueueHandle = Handle<QueueTracker>;

/// Shadow state of one device
#[derive(Debug, Default)]
pub struct DeviceTracker {
    queues: Arena<QueueTracker>,
    queue_lookup: HashMap<u64, QueueHandle>,
    command_buffers: Arena<CommandBufferTracker>,
    command_buffer_lookup: HashMap<u64, CommandBufferHandle>,
}

static_assertions::assert_impl_all!(DeviceTracker: Send, Sync);

impl DeviceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Register a queue; asking again for the same driver queue returns the
    /// existing handle
    pub fn register_queue(&mut self, raw: u64, family: u32, index: u32) -> QueueHandle {
        if let Some(&handle) = self.queue_lookup.get(&raw) {
            return handle;
        }
        let handle = self.queues.insert(QueueTracker::new(raw, family, index));
        self.queue_lookup.insert(raw, handle);
        log::debug!("Tracker: queue {:#x} (family {}, index {})", raw, family, index);
        handle
    }

    /// Find a queue by driver handle
    pub fn find_queue(&self, raw: u64) -> Option<QueueHandle> {
        self.queue_lookup.get(&raw).copied()
    }

    /// Get a queue
    pub fn queue(&self, handle: QueueHandle) -> Result<&QueueTracker> {
        self.queues.get(handle).ok_or(Error::InvalidHandle)
    }

    /// Get a queue mutably
    pub fn queue_mut(&mut self, handle: QueueHandle) -> Result<&mut QueueTracker> {
        self.queues.get_mut(handle).ok_or(Error::InvalidHandle)
    }

    /// Number of tracked queues
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    // =========================================================================
    // Command buffers
    // =========================================================================

    /// Track a newly allocated command buffer
    pub fn allocate_command_buffer(
        &mut self,
        raw: u64,
        level: CommandBufferLevel,
    ) -> CommandBufferHandle {
        if let Some(stale) = self.command_buffer_lookup.remove(&raw) {
            log::warn!("Tracker: command buffer {:#x} allocated twice", raw);
            self.command_buffers.remove(stale);
        }
        let handle = self
            .command_buffers
            .insert(CommandBufferTracker::new(raw, level));
        self.command_buffer_lookup.insert(raw, handle);
        handle
    }

    /// Stop tracking a command buffer
    pub fn free_command_buffer(
        &mut self,
        handle: CommandBufferHandle,
    ) -> Result<CommandBufferTracker> {
        let tracker = self
            .command_buffers
            .remove(handle)
            .ok_or(Error::InvalidHandle)?;
        self.command_buffer_lookup.remove(&tracker.raw());
        Ok(tracker)
    }

    /// Find a command buffer by driver handle
    pub fn find_command_buffer(&self, raw: u64) -> Option<CommandBufferHandle> {
        self.command_buffer_lookup.get(&raw).copied()
    }

    /// Get a command buffer
    pub fn command_buffer(&self, handle: CommandBufferHandle) -> Result<&CommandBufferTracker> {
        self.command_buffers
            .get(handle)
            .ok_or(Error::InvalidHandle)
    }

    /// Get a command buffer mutably
    pub fn command_buffer_mut(
        &mut self,
        handle: CommandBufferHandle,
    ) -> Result<&mut CommandBufferTracker> {
        self.command_buffers
            .get_mut(handle)
            .ok_or(Error::InvalidHandle)
    }

    /// Number of tracked command buffers
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    /// Append the streams of `secondaries` to `primary`, in order
    pub fn execute_commands(
        &mut self,
        primary: CommandBufferHandle,
        secondaries: &[CommandBufferHandle],
    ) -> Result<()> {
        let mut combined = CommandStream::new();
        for &secondary in secondaries {
            combined.extend_from(self.command_buffer(secondary)?.stream());
        }
        self.command_buffer_mut(primary)?.execute_commands(&combined);
        Ok(())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Check if any of `buffers` holds a record the device traps after
    pub fn has_traps(&self, buffers: &[CommandBufferHandle]) -> bool {
        buffers.iter().any(|&h| {
            self.command_buffers
                .get(h)
                .map_or(false, |cb| cb.stream().iter().any(|r| r.workload().traps()))
        })
    }

    /// Replay the streams of a submission on `queue`, in order
    ///
    /// Every handle is validated before the first record is visited, so an
    /// invalid handle never leaves a submission half replayed. Returns the
    /// number of records visited.
    pub fn replay_submission<V>(
        &mut self,
        queue: QueueHandle,
        buffers: &[CommandBufferHandle],
        visitor: &mut V,
    ) -> Result<usize>
    where
        V: WorkloadVisitor + ?Sized,
    {
        let Self {
            queues,
            command_buffers,
            ..
        } = self;

        let queue = queues.get_mut(queue).ok_or(Error::InvalidHandle)?;
        let streams = buffers
            .iter()
            .map(|&h| command_buffers.get(h).map(|cb| cb.stream()))
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::InvalidHandle)?;

        queue.note_submit();
        let mut visited = 0;
        for stream in streams {
            queue.run_submit_command_stream(stream, visitor);
            visited += stream.len();
        }
        Ok(visited)
    }
}
