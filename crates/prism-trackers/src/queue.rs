//! # Queue Tracker

use prism_core::{CommandStream, Replay, WorkloadVisitor};

/// Per-queue submission statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Submissions seen
    pub submits: u64,
    /// Records replayed to a visitor
    pub replayed_records: u64,
}

/// Shadow state of one device queue
#[derive(Debug, Clone)]
pub struct QueueTracker {
    raw: u64,
    family: u32,
    index: u32,
    replay: Replay,
    stats: QueueStats,
}

impl QueueTracker {
    /// Track a queue obtained from the device
    pub fn new(raw: u64, family: u32, index: u32) -> Self {
        Self {
            raw,
            family,
            index,
            replay: Replay::new(),
            stats: QueueStats::default(),
        }
    }

    /// Driver handle of the queue
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Queue family index
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Index within the family
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Submission statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Start replaying a submission
    ///
    /// A suspended render pass must be resumed within the submission that
    /// suspended it, so continuation state never crosses submissions.
    pub fn note_submit(&mut self) {
        self.stats.submits += 1;
        self.replay = Replay::new();
    }

    /// Replay one submitted command stream
    ///
    /// Continuation state carries over between calls, so the streams of one
    /// submission must be passed in order.
    pub fn run_submit_command_stream<V>(&mut self, stream: &CommandStream, visitor: &mut V)
    where
        V: WorkloadVisitor + ?Sized,
    {
        self.replay.run(stream, visitor);
        self.stats.replayed_records += stream.len() as u64;
    }
}
