//! # Command Buffer Tracker
//!
//! Records the workloads of one command buffer into its [`CommandStream`].

use prism_core::{
    CommandStream, ContinuationWorkload, LabelStack, RenderPassTag, RenderPassWorkload, Workload,
    WorkloadKind,
};

// =============================================================================
// RECORDING INPUTS
// =============================================================================

bitflags::bitflags! {
    /// Render pass begin flags (dynamic rendering suspend/resume)
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct RenderPassFlags: u32 {
        /// This part ends suspended; a later part resumes it
        const SUSPENDING = 1 << 0;
        /// This part resumes a suspended render pass
        const RESUMING = 1 << 1;
    }
}

/// Capture state of the device while a command is recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// Profiling is off; nothing is recorded
    #[default]
    Off,
    /// Profiling is on but workloads recorded now are not sampled. Parts of
    /// split render passes are still recorded, untrapped, so that a part
    /// recorded later can find its origin at replay.
    Track,
    /// Workloads are recorded and trapped
    Capture,
}

impl CaptureMode {
    /// Workloads recorded now are sampled
    pub const fn capturing(self) -> bool {
        matches!(self, Self::Capture)
    }
}

/// Render pass begin parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderPassBegin {
    /// Render area width
    pub width: u32,
    /// Render area height
    pub height: u32,
    /// Number of attachments
    pub attachments: u32,
    /// Suspend/resume flags
    pub flags: RenderPassFlags,
}

/// Command buffer level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    /// Submitted directly to a queue
    Primary,
    /// Executed from a primary
    Secondary,
}

/// Command buffer recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Allocated or reset
    Initial,
    /// Between begin and end
    Recording,
    /// Ended, ready to submit
    Executable,
}

/// Per-buffer command statistics (counted whether or not capturing)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandBufferStats {
    /// Logical render passes begun
    pub render_passes: u64,
    /// Draw calls
    pub draw_calls: u64,
    /// Compute dispatches
    pub dispatches: u64,
    /// Ray tracing dispatches
    pub trace_rays: u64,
    /// Image transfers
    pub image_transfers: u64,
    /// Buffer transfers
    pub buffer_transfers: u64,
    /// Acceleration structure builds and transfers
    pub acceleration_structure_ops: u64,
}

/// Result of ending a render pass part
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderPassEnd {
    /// The part ended suspended
    pub suspending: bool,
    /// The logical render pass is complete and this part was captured, so
    /// the device must trap here. The part's record is marked to match.
    pub needs_trap: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRenderPass {
    /// Stream position of the record, when one was kept
    record: Option<usize>,
    /// Own tag for a new render pass, origin for a continuation
    tag: Option<RenderPassTag>,
    /// The device traps after this part if it ends the logical pass
    captured: bool,
    flags: RenderPassFlags,
    draw_calls: u64,
}

#[derive(Debug, Clone, Copy)]
struct SuspendedRenderPass {
    tag: Option<RenderPassTag>,
    captured: bool,
}

// =============================================================================
// COMMAND BUFFER TRACKER
// =============================================================================

/// Shadow state of one command buffer
#[derive(Debug, Clone)]
pub struct CommandBufferTracker {
    raw: u64,
    level: CommandBufferLevel,
    state: RecordingState,
    stream: CommandStream,
    labels: LabelStack,
    render_pass: Option<ActiveRenderPass>,
    last_suspended: Option<SuspendedRenderPass>,
    stats: CommandBufferStats,
}

impl CommandBufferTracker {
    /// Track a newly allocated command buffer
    pub fn new(raw: u64, level: CommandBufferLevel) -> Self {
        Self {
            raw,
            level,
            state: RecordingState::Initial,
            stream: CommandStream::new(),
            labels: LabelStack::new(),
            render_pass: None,
            last_suspended: None,
            stats: CommandBufferStats::default(),
        }
    }

    /// Driver handle of the buffer
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Buffer level
    pub fn level(&self) -> CommandBufferLevel {
        self.level
    }

    /// Recording state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Recorded workload stream
    pub fn stream(&self) -> &CommandStream {
        &self.stream
    }

    /// Open debug labels
    pub fn labels(&self) -> &LabelStack {
        &self.labels
    }

    /// Command statistics since the last begin/reset
    pub fn stats(&self) -> &CommandBufferStats {
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start recording; discards anything recorded before
    pub fn begin(&mut self) {
        self.reset();
        self.state = RecordingState::Recording;
    }

    /// Finish recording
    pub fn end(&mut self) {
        self.state = RecordingState::Executable;
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.state = RecordingState::Initial;
        self.stream.clear();
        self.labels.clear();
        self.render_pass = None;
        self.last_suspended = None;
        self.stats = CommandBufferStats::default();
    }

    // -------------------------------------------------------------------------
    // Debug labels
    // -------------------------------------------------------------------------

    /// Open a debug label
    pub fn push_label(&mut self, label: &str) {
        self.labels.push(label);
    }

    /// Close the innermost debug label
    pub fn pop_label(&mut self) {
        if self.labels.pop().is_none() {
            log::debug!("Tracker: unbalanced label pop on buffer {:#x}", self.raw);
        }
    }

    // -------------------------------------------------------------------------
    // Render passes
    // -------------------------------------------------------------------------

    /// Begin a render pass (or resume a suspended one)
    ///
    /// Returns the tag of the logical render pass when known: a fresh tag for
    /// a new pass, the origin for a resume within this buffer. A resume in
    /// the same buffer follows the capture decision of the part it resumes;
    /// a resume of a pass suspended elsewhere decides from `mode`. Whichever
    /// part ends the pass, its own decision sets both the device trap and the
    /// `trapped` flag of its record.
    pub fn begin_render_pass(
        &mut self,
        begin: &RenderPassBegin,
        mode: CaptureMode,
    ) -> Option<RenderPassTag> {
        let suspending = begin.flags.contains(RenderPassFlags::SUSPENDING);
        let resuming = begin.flags.contains(RenderPassFlags::RESUMING);
        let mut captured = mode.capturing();

        let (workload, tag) = if resuming {
            let origin = match self.last_suspended.take() {
                Some(suspended) => {
                    captured = suspended.captured;
                    suspended.tag
                }
                None => None,
            };
            let workload = Workload::RenderPassContinuation(ContinuationWorkload {
                origin,
                suspending,
                draw_calls: 0,
                trapped: false,
            });
            (workload, origin)
        } else {
            let tag = RenderPassTag::next();
            self.stats.render_passes += 1;
            let workload = Workload::RenderPass(RenderPassWorkload {
                tag,
                width: begin.width,
                height: begin.height,
                attachments: begin.attachments,
                suspending,
                draw_calls: 0,
                trapped: false,
            });
            (workload, Some(tag))
        };

        let split = suspending || resuming;
        let keep = captured || (split && mode != CaptureMode::Off);
        let record = keep.then(|| self.stream.push(workload, self.labels.snapshot()));

        self.render_pass = Some(ActiveRenderPass {
            record,
            tag,
            captured,
            flags: begin.flags,
            draw_calls: 0,
        });
        tag
    }

    /// End the open render pass part
    pub fn end_render_pass(&mut self) -> RenderPassEnd {
        let Some(active) = self.render_pass.take() else {
            return RenderPassEnd::default();
        };

        let suspending = active.flags.contains(RenderPassFlags::SUSPENDING);
        let needs_trap = !suspending && active.captured;

        if let Some(index) = active.record {
            match self.stream.get_mut(index).map(|r| r.workload_mut()) {
                Some(Workload::RenderPass(w)) => {
                    w.draw_calls = active.draw_calls;
                    w.trapped = needs_trap;
                }
                Some(Workload::RenderPassContinuation(w)) => {
                    w.draw_calls = active.draw_calls;
                    w.trapped = needs_trap;
                }
                _ => {}
            }
        }

        self.last_suspended = suspending.then_some(SuspendedRenderPass {
            tag: active.tag,
            captured: active.captured,
        });
        RenderPassEnd {
            suspending,
            needs_trap,
        }
    }

    /// Count draw calls (an indirect draw may issue several)
    pub fn record_draws(&mut self, count: u64) {
        self.stats.draw_calls += count;
        if let Some(active) = self.render_pass.as_mut() {
            active.draw_calls += count;
        }
    }

    // -------------------------------------------------------------------------
    // Other workloads
    // -------------------------------------------------------------------------

    /// Record a non-render-pass workload; returns `true` if it was appended
    pub fn record(&mut self, workload: Workload, capture: bool) -> bool {
        match workload.kind() {
            WorkloadKind::Dispatch => self.stats.dispatches += 1,
            WorkloadKind::TraceRays => self.stats.trace_rays += 1,
            WorkloadKind::ImageTransfer => self.stats.image_transfers += 1,
            WorkloadKind::BufferTransfer => self.stats.buffer_transfers += 1,
            WorkloadKind::AccelerationStructureBuild
            | WorkloadKind::AccelerationStructureTransfer => {
                self.stats.acceleration_structure_ops += 1
            }
            WorkloadKind::RenderPass | WorkloadKind::RenderPassContinuation => {
                log::warn!("Tracker: render pass passed to record(), ignored");
                return false;
            }
        }

        if !capture {
            return false;
        }
        self.stream.push(workload, self.labels.snapshot());
        true
    }

    /// Append the records of executed secondary command buffers
    pub fn execute_commands(&mut self, secondary: &CommandStream) {
        self.stream.extend_from(secondary);
    }
}
