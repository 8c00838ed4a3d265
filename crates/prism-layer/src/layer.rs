//! # Layer Context
//!
//! The intercepted API surface. All tracked state lives in one
//! [`LayerState`] behind one lock:
//!
//! - the lock is taken before tracked state is read or changed
//! - it is released before forwarding to the driver
//! - except around a submission that must be replayed or a frame boundary
//!   that samples, where it is held for the forward plus the trap cycles and
//!   samples, so no other thread perturbs the device while a sample is in
//!   flight
//!
//! Trap cycles can block for as long as the device takes to reach the trap,
//! so the lock is a blocking [`std::sync::Mutex`]. A poisoned lock is
//! recovered rather than propagated.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prism_comms::{Endpoint, Telemetry, TelemetryStats};
use prism_core::{Arena, Error, Handle, Result};
use prism_trackers::{
    CaptureMode, CommandBufferHandle, CommandBufferLevel, CommandBufferTracker, QueueHandle,
};

use crate::command::Command;
use crate::config::ProfileConfig;
use crate::counters::CounterBackend;
use crate::device::ProfileDevice;
use crate::driver::{DeviceDriver, RawCommandBuffer, RawQueue};
use crate::entry::EntryPointTable;
use crate::frame::FramePhase;
use crate::trap::TrapEvents;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// A device known to the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(Handle<ProfileDevice>);

/// A queue of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId {
    device: DeviceId,
    queue: QueueHandle,
}

impl QueueId {
    /// Owning device
    pub fn device(&self) -> DeviceId {
        self.device
    }
}

/// A command buffer of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId {
    device: DeviceId,
    buffer: CommandBufferHandle,
}

impl CommandBufferId {
    /// Owning device
    pub fn device(&self) -> DeviceId {
        self.device
    }
}

bitflags::bitflags! {
    /// Submission flags
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SubmitFlags: u32 {
        /// The submission ends the current frame
        const END_OF_FRAME = 1 << 0;
    }
}

/// One batch of a queue submission
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    /// Command buffers, in execution order
    pub command_buffers: &'a [CommandBufferId],
    /// Flags
    pub flags: SubmitFlags,
}

impl<'a> Submission<'a> {
    /// A batch without flags
    pub fn new(command_buffers: &'a [CommandBufferId]) -> Self {
        Self {
            command_buffers,
            flags: SubmitFlags::empty(),
        }
    }

    /// A batch that ends the frame
    pub fn end_of_frame(command_buffers: &'a [CommandBufferId]) -> Self {
        Self {
            command_buffers,
            flags: SubmitFlags::END_OF_FRAME,
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Registry of every tracked device
#[derive(Debug, Default)]
pub struct LayerState {
    devices: Arena<ProfileDevice>,
}

impl LayerState {
    /// Number of live devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, id: DeviceId) -> Result<&ProfileDevice> {
        self.devices.get(id.0).ok_or(Error::InvalidHandle)
    }

    fn device_mut(&mut self, id: DeviceId) -> Result<&mut ProfileDevice> {
        self.devices.get_mut(id.0).ok_or(Error::InvalidHandle)
    }
}

/// What a recording call forwards with, gathered under the lock
struct Forward {
    driver: Arc<dyn DeviceDriver>,
    raw: RawCommandBuffer,
    trap: Option<TrapEvents>,
}

// =============================================================================
// LAYER
// =============================================================================

/// The profiling layer
pub struct Layer {
    config: Arc<ProfileConfig>,
    telemetry: Arc<Telemetry>,
    entry_points: EntryPointTable,
    state: Mutex<LayerState>,
}

static_assertions::assert_impl_all!(Layer: Send, Sync);

impl Layer {
    /// Create a layer reporting to `endpoint`
    pub fn new(config: ProfileConfig, endpoint: Arc<dyn Endpoint>) -> Self {
        let entry_points = EntryPointTable::for_config(&config);
        log::info!(
            "Layer: frame mode {:?}, workloads {}, frames {}",
            config.frame_mode,
            config.sample_workloads,
            config.sample_frames
        );
        Self {
            config: Arc::new(config),
            telemetry: Arc::new(Telemetry::new(endpoint)),
            entry_points,
            state: Mutex::new(LayerState::default()),
        }
    }

    /// Create a layer configured from the environment
    pub fn from_env(endpoint: Arc<dyn Endpoint>) -> Self {
        Self::new(ProfileConfig::from_env(), endpoint)
    }

    /// Active configuration
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Entrypoint resolution table
    pub fn entry_points(&self) -> &EntryPointTable {
        &self.entry_points
    }

    /// Telemetry statistics
    pub fn telemetry_stats(&self) -> TelemetryStats {
        self.telemetry.stats()
    }

    /// Number of live devices
    pub fn device_count(&self) -> usize {
        self.lock().device_count()
    }

    // =========================================================================
    // Devices and queues
    // =========================================================================

    /// Start tracking a device created by `driver`
    pub fn create_device(
        &self,
        driver: Arc<dyn DeviceDriver>,
        backend: Box<dyn CounterBackend>,
    ) -> DeviceId {
        let mut state = self.lock();
        let device = ProfileDevice::activate(
            driver,
            backend,
            self.config.clone(),
            self.telemetry.clone(),
        );
        DeviceId(state.devices.insert(device))
    }

    /// Stop tracking a device; its trap events are destroyed
    pub fn destroy_device(&self, id: DeviceId) -> Result<()> {
        let device = self
            .lock()
            .devices
            .remove(id.0)
            .ok_or(Error::InvalidHandle)?;
        log::info!(
            "Layer: device destroyed after {} trap cycles",
            device.trap_cycles()
        );
        drop(device);
        Ok(())
    }

    /// Get a device queue
    pub fn get_device_queue(&self, device: DeviceId, family: u32, index: u32) -> Result<QueueId> {
        let driver = self.lock().device(device)?.driver().clone();
        let raw = driver.get_device_queue(family, index);

        let mut state = self.lock();
        let queue = state
            .device_mut(device)?
            .tracker_mut()
            .register_queue(raw.raw(), family, index);
        Ok(QueueId { device, queue })
    }

    // =========================================================================
    // Command buffers
    // =========================================================================

    /// Allocate a command buffer
    pub fn allocate_command_buffer(
        &self,
        device: DeviceId,
        level: CommandBufferLevel,
    ) -> Result<CommandBufferId> {
        let driver = self.lock().device(device)?.driver().clone();
        let raw = driver.allocate_command_buffer(level)?;

        let mut state = self.lock();
        match state.device_mut(device) {
            Ok(tracked) => {
                let buffer = tracked
                    .tracker_mut()
                    .allocate_command_buffer(raw.raw(), level);
                Ok(CommandBufferId { device, buffer })
            }
            Err(err) => {
                drop(state);
                driver.free_command_buffer(raw);
                Err(err)
            }
        }
    }

    /// Free a command buffer
    pub fn free_command_buffer(&self, id: CommandBufferId) -> Result<()> {
        let (driver, raw) = {
            let mut state = self.lock();
            let device = state.device_mut(id.device)?;
            let tracker = device.tracker_mut().free_command_buffer(id.buffer)?;
            (device.driver().clone(), RawCommandBuffer(tracker.raw()))
        };
        driver.free_command_buffer(raw);
        Ok(())
    }

    /// Begin recording; earlier records are discarded
    pub fn begin_command_buffer(&self, id: CommandBufferId) -> Result<()> {
        let (forward, ()) = self.update_command_buffer(id, |cb, _| cb.begin())?;
        forward.driver.begin_command_buffer(forward.raw)
    }

    /// End recording
    pub fn end_command_buffer(&self, id: CommandBufferId) -> Result<()> {
        let (forward, ()) = self.update_command_buffer(id, |cb, _| cb.end())?;
        forward.driver.end_command_buffer(forward.raw)
    }

    /// Reset a command buffer
    pub fn reset_command_buffer(&self, id: CommandBufferId) -> Result<()> {
        let (forward, ()) = self.update_command_buffer(id, |cb, _| cb.reset())?;
        forward.driver.reset_command_buffer(forward.raw)
    }

    /// Record a command, then the device half of a trap if it was captured
    pub fn cmd(&self, id: CommandBufferId, command: &Command<'_>) -> Result<()> {
        let (forward, trap_after) = self.update_command_buffer(id, |cb, mode| match command {
            Command::BeginDebugLabel(label) => {
                cb.push_label(label);
                false
            }
            Command::EndDebugLabel => {
                cb.pop_label();
                false
            }
            Command::BeginRenderPass(begin) => {
                cb.begin_render_pass(begin, mode);
                false
            }
            Command::EndRenderPass => cb.end_render_pass().needs_trap,
            _ => match (command.draw_count(), command.workload()) {
                (Some(count), _) => {
                    cb.record_draws(count);
                    false
                }
                (None, Some(workload)) => cb.record(workload, mode.capturing()),
                (None, None) => false,
            },
        })?;

        forward.driver.cmd(forward.raw, command);
        if trap_after {
            if let Some(events) = forward.trap {
                events.emit(&*forward.driver, forward.raw);
            }
        }
        Ok(())
    }

    /// Execute secondary command buffers from a primary
    pub fn cmd_execute_commands(
        &self,
        id: CommandBufferId,
        secondaries: &[CommandBufferId],
    ) -> Result<()> {
        let (driver, raw, raw_secondaries) = {
            let mut state = self.lock();
            let device = state.device_mut(id.device)?;
            if secondaries.iter().any(|s| s.device != id.device) {
                return Err(Error::ForeignHandle);
            }

            let handles: Vec<_> = secondaries.iter().map(|s| s.buffer).collect();
            device.tracker_mut().execute_commands(id.buffer, &handles)?;

            let tracker = device.tracker();
            let raw = RawCommandBuffer(tracker.command_buffer(id.buffer)?.raw());
            let raw_secondaries = handles
                .iter()
                .map(|&h| tracker.command_buffer(h).map(|cb| RawCommandBuffer(cb.raw())))
                .collect::<Result<Vec<_>>>()?;
            (device.driver().clone(), raw, raw_secondaries)
        };
        driver.cmd_execute_commands(raw, &raw_secondaries);
        Ok(())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit command buffers, then replay any recorded workloads
    ///
    /// The driver result is returned unchanged. Replay only runs when the
    /// driver accepted the submission.
    pub fn queue_submit(&self, queue: QueueId, submits: &[Submission<'_>]) -> Result<()> {
        let mut state = self.lock();
        let device = state.device_mut(queue.device)?;
        let raw_queue = RawQueue(device.tracker().queue(queue.queue)?.raw());

        let mut handles = Vec::new();
        let mut batches = Vec::with_capacity(submits.len());
        for submit in submits {
            let mut batch = Vec::with_capacity(submit.command_buffers.len());
            for id in submit.command_buffers {
                if id.device != queue.device {
                    return Err(Error::ForeignHandle);
                }
                let cb = device.tracker().command_buffer(id.buffer)?;
                batch.push(RawCommandBuffer(cb.raw()));
                handles.push(id.buffer);
            }
            batches.push(batch);
        }
        let batches: Vec<&[RawCommandBuffer]> = batches.iter().map(Vec::as_slice).collect();

        device.note_submit();
        let end_of_frame = submits
            .iter()
            .any(|s| s.flags.contains(SubmitFlags::END_OF_FRAME));
        let replay = device.needs_replay(&handles);
        let transition = end_of_frame.then(|| device.advance_frame());
        let sample = transition
            .as_ref()
            .map_or(false, |t| device.transition_needs_sample(t));
        let driver = device.driver().clone();

        if !replay && !sample {
            if let Some(transition) = transition {
                device.finish_frame(transition);
            }
            drop(state);
            return driver.queue_submit(raw_queue, &batches);
        }

        let result = driver.queue_submit(raw_queue, &batches);
        if replay && result.is_ok() {
            if let Err(err) = device.replay_submission(queue.queue, &handles) {
                log::error!("Layer: replay failed: {}", err);
            }
        }
        if let Some(transition) = transition {
            device.finish_frame(transition);
        }
        result
    }

    /// Present; closes the current frame
    ///
    /// The lock is held across the forward only when the boundary samples.
    pub fn queue_present(&self, queue: QueueId) -> Result<()> {
        let mut state = self.lock();
        let device = state.device_mut(queue.device)?;
        let raw_queue = RawQueue(device.tracker().queue(queue.queue)?.raw());
        let transition = device.advance_frame();
        let driver = device.driver().clone();

        if !device.transition_needs_sample(&transition) {
            device.finish_frame(transition);
            drop(state);
            return driver.queue_present(raw_queue);
        }

        let result = driver.queue_present(raw_queue);
        device.finish_frame(transition);
        result
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current frame index of a device
    pub fn frame_index(&self, device: DeviceId) -> Result<u64> {
        Ok(self.lock().device(device)?.frame_index())
    }

    /// Current frame phase of a device
    pub fn frame_phase(&self, device: DeviceId) -> Result<FramePhase> {
        Ok(self.lock().device(device)?.frame_phase())
    }

    /// Check if workloads recorded now on `device` are captured
    pub fn is_capturing(&self, device: DeviceId) -> Result<bool> {
        Ok(self.lock().device(device)?.capturing())
    }

    /// Completed trap cycles of a device
    pub fn trap_cycles(&self, device: DeviceId) -> Result<u64> {
        Ok(self.lock().device(device)?.trap_cycles())
    }

    /// Driver handle of a command buffer
    pub fn raw_command_buffer(&self, id: CommandBufferId) -> Result<RawCommandBuffer> {
        let state = self.lock();
        let cb = state
            .device(id.device)?
            .tracker()
            .command_buffer(id.buffer)?;
        Ok(RawCommandBuffer(cb.raw()))
    }

    /// Records held by a command buffer
    pub fn recorded_workloads(&self, id: CommandBufferId) -> Result<usize> {
        let state = self.lock();
        let cb = state
            .device(id.device)?
            .tracker()
            .command_buffer(id.buffer)?;
        Ok(cb.stream().len())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, LayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Another caller holds the state lock
    #[cfg(test)]
    pub(crate) fn state_busy(&self) -> bool {
        matches!(self.state.try_lock(), Err(std::sync::TryLockError::WouldBlock))
    }

    fn update_command_buffer<R>(
        &self,
        id: CommandBufferId,
        f: impl FnOnce(&mut CommandBufferTracker, CaptureMode) -> R,
    ) -> Result<(Forward, R)> {
        let mut state = self.lock();
        let device = state.device_mut(id.device)?;
        let mode = device.capture_mode();
        let trap = device.trap_events();
        let driver = device.driver().clone();

        let cb = device.tracker_mut().command_buffer_mut(id.buffer)?;
        let result = f(&mut *cb, mode);
        let raw = RawCommandBuffer(cb.raw());
        Ok((Forward { driver, raw, trap }, result))
    }
}

impl core::fmt::Debug for Layer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Layer")
            .field("config", &self.config)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}
