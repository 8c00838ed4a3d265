//! # Profiled Device
//!
//! Everything the layer keeps per device: object trackers, frame state, the
//! trap pair and the counter session. All methods run under the layer lock.

use std::sync::Arc;
use std::thread;

use prism_comms::{Message, Telemetry};
use prism_core::Result;
use prism_trackers::{CaptureMode, CommandBufferHandle, DeviceTracker, QueueHandle};

use crate::config::ProfileConfig;
use crate::counters::{CounterBackend, CounterSession};
use crate::driver::DeviceDriver;
use crate::frame::{BoundaryActions, FramePhase, FrameTracker, FrameTransition};
use crate::trap::{TrapEvents, TrapPair};
use crate::visitor::ProfilingVisitor;

/// Per-device profiling state
pub struct ProfileDevice {
    driver: Arc<dyn DeviceDriver>,
    config: Arc<ProfileConfig>,
    telemetry: Arc<Telemetry>,
    tracker: DeviceTracker,
    frame: FrameTracker,
    trap: Option<TrapPair>,
    session: CounterSession,
}

impl ProfileDevice {
    /// Activate profiling for a new device
    ///
    /// The trap pair is created only when the configuration can sample
    /// anything; if event creation fails, the device runs unprofiled.
    pub fn activate(
        driver: Arc<dyn DeviceDriver>,
        backend: Box<dyn CounterBackend>,
        config: Arc<ProfileConfig>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let trap = if config.is_active() {
            match TrapPair::create(driver.clone(), &config.trap) {
                Ok(trap) => Some(trap),
                Err(err) => {
                    log::error!("Device: trap events unavailable ({}), profiling disabled", err);
                    None
                }
            }
        } else {
            None
        };

        let session = CounterSession::new(backend, &config.counters);
        let (frame, actions) = FrameTracker::start(&config);

        let mut device = Self {
            driver,
            config,
            telemetry,
            tracker: DeviceTracker::new(),
            frame,
            trap,
            session,
        };

        log::info!(
            "Device: profiling {}",
            if device.is_profiling() { "active" } else { "inactive" }
        );

        if device.is_profiling() {
            device.apply(FrameTransition {
                closing: 0,
                opening: 0,
                actions,
            });
        }
        device
    }

    /// Driver of this device
    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    /// Object trackers
    pub fn tracker(&self) -> &DeviceTracker {
        &self.tracker
    }

    /// Object trackers, mutably
    pub fn tracker_mut(&mut self) -> &mut DeviceTracker {
        &mut self.tracker
    }

    /// Trap events exist for this device
    pub fn is_profiling(&self) -> bool {
        self.trap.is_some()
    }

    /// Workloads recorded now are captured (and trapped on the device)
    pub fn capturing(&self) -> bool {
        self.is_profiling() && self.frame.capturing(&self.config)
    }

    /// How commands recorded now are tracked
    pub fn capture_mode(&self) -> CaptureMode {
        if self.capturing() {
            CaptureMode::Capture
        } else if self.is_profiling() {
            CaptureMode::Track
        } else {
            CaptureMode::Off
        }
    }

    /// Event handles for device-side trap emission
    pub fn trap_events(&self) -> Option<TrapEvents> {
        self.trap.as_ref().map(TrapPair::events)
    }

    /// Current frame index
    pub fn frame_index(&self) -> u64 {
        self.frame.index()
    }

    /// Current frame phase
    pub fn frame_phase(&self) -> FramePhase {
        self.frame.phase()
    }

    /// Completed trap cycles
    pub fn trap_cycles(&self) -> u64 {
        self.trap.as_ref().map_or(0, TrapPair::cycles)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Note a submission in the current frame
    pub fn note_submit(&mut self) {
        self.frame.note_submit();
    }

    /// Check if a submission of `buffers` must be replayed
    ///
    /// Only records the device traps after need the host; a submission
    /// holding nothing but suspended render pass parts runs unattended.
    pub fn needs_replay(&self, buffers: &[CommandBufferHandle]) -> bool {
        self.is_profiling() && self.tracker.has_traps(buffers)
    }

    /// Replay a forwarded submission, sampling each recorded workload
    pub fn replay_submission(
        &mut self,
        queue: QueueHandle,
        buffers: &[CommandBufferHandle],
    ) -> Result<()> {
        let Self {
            tracker,
            trap,
            session,
            telemetry,
            ..
        } = self;
        let Some(trap) = trap.as_mut() else {
            return Ok(());
        };

        let mut visitor = ProfilingVisitor::new(trap, session, &**telemetry);
        let visited = tracker.replay_submission(queue, buffers, &mut visitor)?;
        log::debug!(
            "Device: replayed {} records, {} sampled",
            visited,
            visitor.sampled()
        );
        Ok(())
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Close the current frame, returning the transition still to be applied
    pub fn advance_frame(&mut self) -> FrameTransition {
        self.frame.boundary(&self.config)
    }

    /// Check if applying `transition` waits on the device and samples
    pub fn transition_needs_sample(&self, transition: &FrameTransition) -> bool {
        self.is_profiling() && transition.actions.needs_sample()
    }

    /// Emit the frame messages of `transition` and sample if it asks to
    pub fn finish_frame(&mut self, transition: FrameTransition) {
        if self.is_profiling() {
            self.apply(transition);
        }
    }

    fn apply(&mut self, transition: FrameTransition) {
        let actions = transition.actions;

        if actions.contains(BoundaryActions::END_FRAME) {
            self.telemetry.emit(&Message::EndFrame {
                frame: transition.closing,
            });
        }
        if actions.contains(BoundaryActions::START_FRAME) {
            self.telemetry.emit(&Message::StartFrame {
                frame: transition.opening,
            });
        }
        if !actions.needs_sample() {
            return;
        }

        if let Err(err) = self.driver.device_wait_idle() {
            log::error!("Device: wait idle failed: {}", err);
        }
        thread::sleep(self.config.trap.settle_delay());

        if !self.session.sample_now() {
            return;
        }
        if actions.contains(BoundaryActions::SAMPLE_FRAME) {
            let counters = self.session.read_all();
            self.telemetry.emit(&Message::Frame {
                frame: transition.closing,
                counters,
            });
        }
    }
}

impl core::fmt::Debug for ProfileDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProfileDevice")
            .field("frame", &self.frame)
            .field("trap", &self.trap)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
