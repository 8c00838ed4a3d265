//! # Frame Boundary State Machine
//!
//! ```text
//!            first submission              boundary (end-of-frame or present)
//!   ┌──────┐ ───────────────▶ ┌───────────┐ ────────────────▶ ┌──────┐
//!   │ Idle │                  │ FrameOpen │                   │ Idle │ ...
//!   └──────┘                  └───────────┘                   └──────┘
//! ```
//!
//! The tracker only decides; [`BoundaryActions`] tells the device what to
//! emit and sample at each boundary.

use crate::config::ProfileConfig;

bitflags::bitflags! {
    /// Work to do at a frame boundary, in declaration order
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct BoundaryActions: u32 {
        /// Emit `end_frame` for the closing frame
        const END_FRAME = 1 << 0;
        /// Emit `start_frame` for the opening frame
        const START_FRAME = 1 << 1;
        /// Sample and emit `frame` for the closing frame
        const SAMPLE_FRAME = 1 << 2;
        /// Sample without reporting so the next frame starts clean
        const SAMPLE_RESET = 1 << 3;
    }
}

impl BoundaryActions {
    /// A counter sample must be taken
    pub fn needs_sample(self) -> bool {
        self.intersects(Self::SAMPLE_FRAME | Self::SAMPLE_RESET)
    }
}

/// Frame phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No work submitted since the last boundary
    Idle,
    /// Work submitted in the current frame
    FrameOpen,
}

/// Outcome of one boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTransition {
    /// Index of the frame that closed
    pub closing: u64,
    /// Index of the frame that opened
    pub opening: u64,
    /// Work to do
    pub actions: BoundaryActions,
}

/// Frame counter and phase for one device
#[derive(Debug, Clone)]
pub struct FrameTracker {
    index: u64,
    of_interest: bool,
    phase: FramePhase,
}

impl FrameTracker {
    /// Start at frame 0; returns the actions for opening it
    pub fn start(config: &ProfileConfig) -> (Self, BoundaryActions) {
        let of_interest = config.is_frame_of_interest(0);
        let mut actions = BoundaryActions::empty();
        if of_interest && config.sample_workloads {
            actions |= BoundaryActions::START_FRAME;
        }
        if of_interest && config.sample_any() {
            actions |= BoundaryActions::SAMPLE_RESET;
        }

        let tracker = Self {
            index: 0,
            of_interest,
            phase: FramePhase::Idle,
        };
        (tracker, actions)
    }

    /// Current frame index
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Current frame is selected for sampling
    pub fn of_interest(&self) -> bool {
        self.of_interest
    }

    /// Current phase
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Workloads recorded now are captured
    pub fn capturing(&self, config: &ProfileConfig) -> bool {
        self.of_interest && config.sample_workloads
    }

    /// Note a submission in the current frame
    pub fn note_submit(&mut self) {
        if self.phase == FramePhase::Idle {
            log::debug!("Frame: {} open", self.index);
            self.phase = FramePhase::FrameOpen;
        }
    }

    /// Close the current frame and open the next
    pub fn boundary(&mut self, config: &ProfileConfig) -> FrameTransition {
        if self.phase == FramePhase::Idle {
            log::debug!("Frame: {} closed without submissions", self.index);
        }

        let closing = self.index;
        let closing_of_interest = self.of_interest;
        let mut actions = BoundaryActions::empty();

        if closing_of_interest && config.sample_workloads {
            actions |= BoundaryActions::END_FRAME;
        }

        self.index += 1;
        self.of_interest = config.is_frame_of_interest(self.index);
        self.phase = FramePhase::Idle;

        if self.of_interest && config.sample_workloads {
            actions |= BoundaryActions::START_FRAME;
        }
        if closing_of_interest && config.sample_frames {
            actions |= BoundaryActions::SAMPLE_FRAME;
        }
        if self.of_interest && config.sample_any() {
            actions |= BoundaryActions::SAMPLE_RESET;
        }

        log::debug!(
            "Frame: {} -> {} ({:?})",
            closing,
            self.index,
            actions
        );
        FrameTransition {
            closing,
            opening: self.index,
            actions,
        }
    }
}
