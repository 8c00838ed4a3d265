//! # Workload Visitor
//!
//! Submission-time walk over recorded command streams.
//!
//! A [`WorkloadVisitor`] has one method per [`Workload`] kind; [`Replay`]
//! feeds it every record of one or more streams strictly in order. Replay
//! also resolves which render pass a continuation belongs to: a continuation
//! whose origin was not known when it was recorded (the suspend happened in
//! another command buffer) continues the last render pass that ended
//! suspended earlier in the same replay.

use crate::labels::Labels;
use crate::stream::CommandStream;
use crate::workload::*;

// =============================================================================
// VISITOR TRAIT
// =============================================================================

/// Receiver for replayed workload records
pub trait WorkloadVisitor {
    /// Logical render pass
    fn render_pass(&mut self, workload: &RenderPassWorkload, labels: &Labels);

    /// Continuation of `origin` (if it could be resolved)
    ///
    /// `origin` is the logical render pass with draw calls accumulated over
    /// every part up to and including this one.
    fn render_pass_continuation(
        &mut self,
        workload: &ContinuationWorkload,
        origin: Option<&RenderPassWorkload>,
        labels: &Labels,
    );

    /// Compute dispatch
    fn dispatch(&mut self, workload: &DispatchWorkload, labels: &Labels);

    /// Ray tracing dispatch
    fn trace_rays(&mut self, workload: &TraceRaysWorkload, labels: &Labels);

    /// Image transfer
    fn image_transfer(&mut self, workload: &ImageTransferWorkload, labels: &Labels);

    /// Buffer transfer
    fn buffer_transfer(&mut self, workload: &BufferTransferWorkload, labels: &Labels);

    /// Acceleration structure build
    fn acceleration_structure_build(
        &mut self,
        workload: &AccelerationStructureBuildWorkload,
        labels: &Labels,
    );

    /// Acceleration structure transfer
    fn acceleration_structure_transfer(
        &mut self,
        workload: &AccelerationStructureTransferWorkload,
        labels: &Labels,
    );
}

// =============================================================================
// REPLAY
// =============================================================================

/// Replay cursor carrying continuation state across streams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    suspended: Option<RenderPassWorkload>,
}

impl Replay {
    /// Create a fresh cursor
    pub const fn new() -> Self {
        Self { suspended: None }
    }

    /// Render pass that a following continuation would resume
    pub fn last_suspended(&self) -> Option<RenderPassTag> {
        self.suspended.as_ref().map(|pass| pass.tag)
    }

    /// Visit every record of `stream` in order
    pub fn run<V>(&mut self, stream: &CommandStream, visitor: &mut V)
    where
        V: WorkloadVisitor + ?Sized,
    {
        for record in stream {
            self.visit(record, visitor);
        }
    }

    /// Visit a single record
    pub fn visit<V>(&mut self, record: &WorkloadRecord, visitor: &mut V)
    where
        V: WorkloadVisitor + ?Sized,
    {
        let labels = record.labels();
        log::trace!("Replay: {}", record.workload().kind().type_name());

        match record.workload() {
            Workload::RenderPass(w) => {
                self.suspended = w.suspending.then(|| w.clone());
                visitor.render_pass(w, labels);
            }
            Workload::RenderPassContinuation(w) => {
                let resumed = match self.suspended.take() {
                    Some(mut pass) if w.origin.map_or(true, |tag| tag == pass.tag) => {
                        pass.draw_calls += w.draw_calls;
                        Some(pass)
                    }
                    _ => None,
                };
                if w.suspending {
                    self.suspended.clone_from(&resumed);
                }
                visitor.render_pass_continuation(w, resumed.as_ref(), labels);
            }
            Workload::Dispatch(w) => visitor.dispatch(w, labels),
            Workload::TraceRays(w) => visitor.trace_rays(w, labels),
            Workload::ImageTransfer(w) => visitor.image_transfer(w, labels),
            Workload::BufferTransfer(w) => visitor.buffer_transfer(w, labels),
            Workload::AccelerationStructureBuild(w) => {
                visitor.acceleration_structure_build(w, labels)
            }
            Workload::AccelerationStructureTransfer(w) => {
                visitor.acceleration_structure_transfer(w, labels)
            }
        }
    }
}

/// Visit every record of one stream with a fresh [`Replay`] cursor
pub fn run_submit_command_stream<V>(stream: &CommandStream, visitor: &mut V)
where
    V: WorkloadVisitor + ?Sized,
{
    Replay::new().run(stream, visitor);
}
