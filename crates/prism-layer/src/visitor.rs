//! # Profiling Visitor
//!
//! Replays a submission against the device: one trap cycle and one telemetry
//! message per trapped workload. Records the device does not trap after
//! (suspended render pass parts, and parts recorded outside a sampled frame)
//! are passed over, so a render pass split across buffers is sampled once,
//! at its terminal part, and reported with the origin pass's metadata.

use prism_comms::{CounterReading, Message, Telemetry};
use prism_core::*;

use crate::counters::CounterSession;
use crate::trap::TrapPair;

/// Visitor that samples every workload it is shown
pub struct ProfilingVisitor<'a> {
    trap: &'a mut TrapPair,
    session: &'a mut CounterSession,
    telemetry: &'a Telemetry,
    sampled: u64,
}

impl<'a> ProfilingVisitor<'a> {
    /// Sample through `trap` and `session`, reporting to `telemetry`
    pub fn new(
        trap: &'a mut TrapPair,
        session: &'a mut CounterSession,
        telemetry: &'a Telemetry,
    ) -> Self {
        Self {
            trap,
            session,
            telemetry,
            sampled: 0,
        }
    }

    /// Workloads sampled so far
    pub fn sampled(&self) -> u64 {
        self.sampled
    }

    /// Run one trap cycle and read the counters it latched
    fn cycle(&mut self) -> Vec<CounterReading> {
        let session = &mut *self.session;
        let latched = self.trap.cycle(|| session.sample_now());
        self.sampled += 1;
        if latched {
            session.read_all()
        } else {
            Vec::new()
        }
    }

    fn sample(&mut self, workload: Workload, labels: &Labels) {
        let counters = self.cycle();
        if let Some(message) = Message::from_workload(&workload, labels, counters) {
            self.telemetry.emit(&message);
        }
    }
}

impl WorkloadVisitor for ProfilingVisitor<'_> {
    fn render_pass(&mut self, workload: &RenderPassWorkload, labels: &Labels) {
        if workload.trapped {
            self.sample(Workload::RenderPass(workload.clone()), labels);
        }
    }

    fn render_pass_continuation(
        &mut self,
        workload: &ContinuationWorkload,
        origin: Option<&RenderPassWorkload>,
        labels: &Labels,
    ) {
        if !workload.trapped {
            return;
        }
        // The device is parked on this part whether or not the origin is known
        let counters = self.cycle();
        let Some(origin) = origin else {
            log::warn!("Replay: render pass ended without a known origin, not reported");
            return;
        };
        let pass = Workload::RenderPass(RenderPassWorkload {
            suspending: false,
            trapped: true,
            ..origin.clone()
        });
        if let Some(message) = Message::from_workload(&pass, labels, counters) {
            self.telemetry.emit(&message);
        }
    }

    fn dispatch(&mut self, workload: &DispatchWorkload, labels: &Labels) {
        self.sample(Workload::Dispatch(*workload), labels);
    }

    fn trace_rays(&mut self, workload: &TraceRaysWorkload, labels: &Labels) {
        self.sample(Workload::TraceRays(*workload), labels);
    }

    fn image_transfer(&mut self, workload: &ImageTransferWorkload, labels: &Labels) {
        self.sample(Workload::ImageTransfer(*workload), labels);
    }

    fn buffer_transfer(&mut self, workload: &BufferTransferWorkload, labels: &Labels) {
        self.sample(Workload::BufferTransfer(*workload), labels);
    }

    fn acceleration_structure_build(
        &mut self,
        workload: &AccelerationStructureBuildWorkload,
        labels: &Labels,
    ) {
        self.sample(Workload::AccelerationStructureBuild(*workload), labels);
    }

    fn acceleration_structure_transfer(
        &mut self,
        workload: &AccelerationStructureTransferWorkload,
        labels: &Labels,
    ) {
        self.sample(Workload::AccelerationStructureTransfer(*workload), labels);
    }
}
