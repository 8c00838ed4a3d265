//! Test doubles: a driver whose device timeline runs on its own thread, and
//! a scripted counter backend. Both append to a shared [`OpLog`] so tests can
//! check the interleaving of host and device operations.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use hashbrown::HashMap;
use prism_comms::CounterValue;
use prism_core::{Error, Result};
use prism_trackers::CommandBufferLevel;

use crate::command::Command;
use crate::counters::{CounterBackend, CounterDescriptor, CounterKind};
use crate::driver::{DeviceDriver, EventStatus, RawCommandBuffer, RawEvent, RawQueue};

/// Observable operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Device executed a command
    DeviceWork(&'static str),
    /// Device signalled an event
    DeviceSet(RawEvent),
    /// Device passed a wait
    DeviceResume(RawEvent),
    /// Device unsignalled an event
    DeviceReset(RawEvent),
    /// Host saw an event signalled
    HostObserved(RawEvent),
    /// Host unsignalled an event
    HostReset(RawEvent),
    /// Host signalled an event
    HostSet(RawEvent),
    /// Counters latched
    Sample,
    /// Present forwarded
    Present,
}

/// Shared, ordered operation log
#[derive(Debug, Clone, Default)]
pub struct OpLog(Arc<Mutex<Vec<Op>>>);

impl OpLog {
    pub fn push(&self, op: Op) {
        lock(&self.0).push(op);
    }

    pub fn snapshot(&self) -> Vec<Op> {
        lock(&self.0).clone()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// DRIVER
// =============================================================================

#[derive(Debug, Clone)]
enum DeviceOp {
    Work(&'static str),
    SetEvent(RawEvent),
    WaitEvent(RawEvent),
    ResetEvent(RawEvent),
    Execute(Vec<RawCommandBuffer>),
}

#[derive(Default)]
struct State {
    next_handle: u64,
    events: HashMap<RawEvent, bool>,
    buffers: HashMap<RawCommandBuffer, Vec<DeviceOp>>,
    pending: usize,
    event_creations_left: Option<usize>,
    failing_status_queries: usize,
}

impl State {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn flatten(&self, buffer: RawCommandBuffer, out: &mut Vec<DeviceOp>) {
        for op in self.buffers.get(&buffer).into_iter().flatten() {
            match op {
                DeviceOp::Execute(secondaries) => {
                    for &secondary in secondaries {
                        self.flatten(secondary, out);
                    }
                }
                op => out.push(op.clone()),
            }
        }
    }
}

struct Shared {
    state: Mutex<State>,
    changed: Condvar,
    log: OpLog,
}

impl Shared {
    fn execute(&self, op: DeviceOp) {
        let mut state = lock(&self.state);
        match op {
            DeviceOp::Work(name) => self.log.push(Op::DeviceWork(name)),
            DeviceOp::SetEvent(event) => {
                state.events.insert(event, true);
                self.log.push(Op::DeviceSet(event));
                self.changed.notify_all();
            }
            DeviceOp::WaitEvent(event) => {
                while !state.events.get(&event).copied().unwrap_or(false) {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                self.log.push(Op::DeviceResume(event));
            }
            DeviceOp::ResetEvent(event) => {
                state.events.insert(event, false);
                self.log.push(Op::DeviceReset(event));
            }
            DeviceOp::Execute(_) => {}
        }
    }
}

type PresentHook = Box<dyn Fn() + Send + Sync>;

/// The driver half handed to the layer
struct MockDevice {
    shared: Arc<Shared>,
    timeline: Mutex<Sender<Vec<DeviceOp>>>,
    on_present: Mutex<Option<PresentHook>>,
}

impl MockDevice {
    fn record(&self, command_buffer: RawCommandBuffer, op: DeviceOp) {
        let mut state = lock(&self.shared.state);
        state.buffers.entry(command_buffer).or_default().push(op);
    }
}

impl DeviceDriver for MockDevice {
    fn get_device_queue(&self, family: u32, index: u32) -> RawQueue {
        RawQueue(0x1000 + u64::from(family) * 16 + u64::from(index))
    }

    fn allocate_command_buffer(&self, _level: CommandBufferLevel) -> Result<RawCommandBuffer> {
        let mut state = lock(&self.shared.state);
        let raw = RawCommandBuffer(state.next_handle());
        state.buffers.insert(raw, Vec::new());
        Ok(raw)
    }

    fn free_command_buffer(&self, command_buffer: RawCommandBuffer) {
        lock(&self.shared.state).buffers.remove(&command_buffer);
    }

    fn begin_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        lock(&self.shared.state).buffers.insert(command_buffer, Vec::new());
        Ok(())
    }

    fn end_command_buffer(&self, _command_buffer: RawCommandBuffer) -> Result<()> {
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: RawCommandBuffer) -> Result<()> {
        self.begin_command_buffer(command_buffer)
    }

    fn cmd(&self, command_buffer: RawCommandBuffer, command: &Command<'_>) {
        self.record(command_buffer, DeviceOp::Work(command.name()));
    }

    fn cmd_execute_commands(&self, command_buffer: RawCommandBuffer, secondaries: &[RawCommandBuffer]) {
        self.record(command_buffer, DeviceOp::Execute(secondaries.to_vec()));
    }

    fn queue_submit(&self, _queue: RawQueue, batches: &[&[RawCommandBuffer]]) -> Result<()> {
        let mut state = lock(&self.shared.state);
        let mut ops = Vec::new();
        for &buffer in batches.iter().flat_map(|batch| batch.iter()) {
            state.flatten(buffer, &mut ops);
        }
        state.pending += 1;
        lock(&self.timeline).send(ops).map_err(|_| Error::DeviceLost)
    }

    fn queue_present(&self, _queue: RawQueue) -> Result<()> {
        self.shared.log.push(Op::Present);
        if let Some(hook) = lock(&self.on_present).as_ref() {
            hook();
        }
        Ok(())
    }

    fn device_wait_idle(&self) -> Result<()> {
        let mut state = lock(&self.shared.state);
        while state.pending > 0 {
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(())
    }

    fn create_event(&self) -> Result<RawEvent> {
        let mut state = lock(&self.shared.state);
        match state.event_creations_left {
            Some(0) => return Err(Error::EventCreationFailed),
            Some(n) => state.event_creations_left = Some(n - 1),
            None => {}
        }
        let event = RawEvent(state.next_handle());
        state.events.insert(event, false);
        Ok(event)
    }

    fn destroy_event(&self, event: RawEvent) {
        lock(&self.shared.state).events.remove(&event);
    }

    fn event_status(&self, event: RawEvent) -> Result<EventStatus> {
        let mut state = lock(&self.shared.state);
        if state.failing_status_queries > 0 {
            state.failing_status_queries -= 1;
            return Err(Error::Driver(-4));
        }
        match state.events.get(&event) {
            Some(true) => {
                self.shared.log.push(Op::HostObserved(event));
                Ok(EventStatus::Set)
            }
            Some(false) => Ok(EventStatus::Reset),
            None => Err(Error::InvalidHandle),
        }
    }

    fn set_event(&self, event: RawEvent) -> Result<()> {
        let mut state = lock(&self.shared.state);
        state.events.insert(event, true);
        self.shared.log.push(Op::HostSet(event));
        self.shared.changed.notify_all();
        Ok(())
    }

    fn reset_event(&self, event: RawEvent) -> Result<()> {
        let mut state = lock(&self.shared.state);
        state.events.insert(event, false);
        self.shared.log.push(Op::HostReset(event));
        Ok(())
    }

    fn cmd_set_event(&self, command_buffer: RawCommandBuffer, event: RawEvent) {
        self.record(command_buffer, DeviceOp::SetEvent(event));
    }

    fn cmd_wait_event(&self, command_buffer: RawCommandBuffer, event: RawEvent) {
        self.record(command_buffer, DeviceOp::WaitEvent(event));
    }

    fn cmd_reset_event(&self, command_buffer: RawCommandBuffer, event: RawEvent) {
        self.record(command_buffer, DeviceOp::ResetEvent(event));
    }
}

/// Test-side handle of a mock device
pub struct MockDriver {
    device: Arc<MockDevice>,
}

impl MockDriver {
    /// Start a device whose timeline executes submitted batches in order
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            log: OpLog::default(),
        });
        let (timeline, batches) = mpsc::channel::<Vec<DeviceOp>>();

        let worker = shared.clone();
        thread::spawn(move || {
            for batch in batches {
                for op in batch {
                    worker.execute(op);
                }
                lock(&worker.state).pending -= 1;
                worker.changed.notify_all();
            }
        });

        Self {
            device: Arc::new(MockDevice {
                shared,
                timeline: Mutex::new(timeline),
                on_present: Mutex::new(None),
            }),
        }
    }

    pub fn driver(&self) -> Arc<dyn DeviceDriver> {
        self.device.clone()
    }

    pub fn log(&self) -> OpLog {
        self.device.shared.log.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.device.shared.log.snapshot()
    }

    /// Logged operations other than device work and presents
    pub fn sync_ops(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::DeviceWork(_) | Op::Present))
            .collect()
    }

    pub fn clear_log(&self) {
        self.device.shared.log.clear();
    }

    pub fn live_events(&self) -> usize {
        lock(&self.device.shared.state).events.len()
    }

    /// Live events in creation order
    pub fn events(&self) -> Vec<RawEvent> {
        let mut events: Vec<_> = lock(&self.device.shared.state).events.keys().copied().collect();
        events.sort();
        events
    }

    /// Let `n` more event creations succeed, then fail
    pub fn fail_event_creation_after(&self, n: usize) {
        lock(&self.device.shared.state).event_creations_left = Some(n);
    }

    /// Fail the next `n` host status queries
    pub fn fail_status_queries(&self, n: usize) {
        lock(&self.device.shared.state).failing_status_queries = n;
    }

    /// Device-side signals recorded in a command buffer
    pub fn trap_emissions(&self, command_buffer: RawCommandBuffer) -> usize {
        lock(&self.device.shared.state)
            .buffers
            .get(&command_buffer)
            .map_or(0, |ops| {
                ops.iter()
                    .filter(|op| matches!(op, DeviceOp::SetEvent(_)))
                    .count()
            })
    }

    /// Run `hook` inside every forwarded present
    pub fn on_present(&self, hook: impl Fn() + Send + Sync + 'static) {
        *lock(&self.device.on_present) = Some(Box::new(hook));
    }
}

// =============================================================================
// COUNTERS
// =============================================================================

/// Counter backend with two counters and scriptable failures
pub struct ScriptedBackend {
    log: OpLog,
    counters: Vec<CounterDescriptor>,
    samples: u64,
    failing_samples: bool,
    failing_read: Option<u32>,
    mistyped: Option<u32>,
}

impl ScriptedBackend {
    pub const CYCLES: u32 = 0;
    pub const BUSY: u32 = 1;

    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            counters: vec![
                CounterDescriptor {
                    id: Self::CYCLES,
                    name: "cycles".to_string(),
                    kind: CounterKind::Integer,
                },
                CounterDescriptor {
                    id: Self::BUSY,
                    name: "busy".to_string(),
                    kind: CounterKind::Float,
                },
            ],
            samples: 0,
            failing_samples: false,
            failing_read: None,
            mistyped: None,
        }
    }

    pub fn failing_read(mut self, id: u32) -> Self {
        self.failing_read = Some(id);
        self
    }

    /// Report counter `id` with the other value kind than it declares
    pub fn mistyped(mut self, id: u32) -> Self {
        self.mistyped = Some(id);
        self
    }

    pub fn failing_samples(mut self) -> Self {
        self.failing_samples = true;
        self
    }
}

impl CounterBackend for ScriptedBackend {
    fn counters(&self) -> Vec<CounterDescriptor> {
        self.counters.clone()
    }

    fn sample_now(&mut self) -> Result<()> {
        if self.failing_samples {
            return Err(Error::SampleFailed);
        }
        self.samples += 1;
        self.log.push(Op::Sample);
        Ok(())
    }

    fn read(&mut self, id: u32) -> Result<CounterValue> {
        if self.failing_read == Some(id) {
            return Err(Error::CounterReadFailed(id));
        }
        let mistyped = self.mistyped == Some(id);
        match id {
            Self::CYCLES if mistyped => Ok(CounterValue::Float(1.5)),
            Self::CYCLES => Ok(CounterValue::Integer(self.samples * 1000)),
            Self::BUSY if mistyped => Ok(CounterValue::Integer(1)),
            Self::BUSY => Ok(CounterValue::Float(0.5)),
            _ => Err(Error::CounterUnavailable(id)),
        }
    }
}
