//! # Counter Sampling Session
//!
//! Wraps the hardware counter backend. The session decides which counters
//! are reported and turns backend failures into omissions: a failed sample
//! drops the whole reading, a failed read drops that counter, and so does a
//! value whose type differs from the counter's declared kind.

use prism_comms::{CounterReading, CounterValue};
use prism_core::{Error, Result};

/// Native type of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Unsigned integer
    Integer,
    /// Floating point
    Float,
}

impl CounterKind {
    /// Check if `value` has this kind
    pub const fn matches(self, value: &CounterValue) -> bool {
        matches!(
            (self, value),
            (Self::Integer, CounterValue::Integer(_)) | (Self::Float, CounterValue::Float(_))
        )
    }
}

/// A counter exposed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDescriptor {
    /// Backend identifier
    pub id: u32,
    /// Reported name
    pub name: String,
    /// Native type
    pub kind: CounterKind,
}

/// Hardware counter backend
pub trait CounterBackend: Send {
    /// Counters the backend can read
    fn counters(&self) -> Vec<CounterDescriptor>;

    /// Latch every counter now
    fn sample_now(&mut self) -> Result<()>;

    /// Read the value latched by the last sample
    fn read(&mut self, id: u32) -> Result<CounterValue>;
}

/// Backend with no counters; sampling always succeeds
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounterBackend;

impl CounterBackend for NullCounterBackend {
    fn counters(&self) -> Vec<CounterDescriptor> {
        Vec::new()
    }

    fn sample_now(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, id: u32) -> Result<CounterValue> {
        Err(Error::CounterUnavailable(id))
    }
}

/// Session statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Successful samples
    pub samples: u64,
    /// Failed samples
    pub failed_samples: u64,
    /// Failed counter reads
    pub failed_reads: u64,
}

/// Connection to the counter backend for one device
pub struct CounterSession {
    backend: Box<dyn CounterBackend>,
    active: Vec<CounterDescriptor>,
    stats: SessionStats,
}

impl CounterSession {
    /// Open a session reporting the counters named in `filter` (all if empty)
    pub fn new(backend: Box<dyn CounterBackend>, filter: &[String]) -> Self {
        let available = backend.counters();
        for name in filter {
            if !available.iter().any(|c| &c.name == name) {
                log::warn!("Counters: '{}' not provided by the backend", name);
            }
        }

        let active: Vec<_> = available
            .into_iter()
            .filter(|c| filter.is_empty() || filter.contains(&c.name))
            .collect();
        log::debug!("Counters: {} active", active.len());

        Self {
            backend,
            active,
            stats: SessionStats::default(),
        }
    }

    /// Counters reported by this session
    pub fn active(&self) -> &[CounterDescriptor] {
        &self.active
    }

    /// Session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Latch the counters; returns `false` (logged) on failure
    pub fn sample_now(&mut self) -> bool {
        match self.backend.sample_now() {
            Ok(()) => {
                self.stats.samples += 1;
                true
            }
            Err(err) => {
                log::warn!("Counters: sample failed: {}", err);
                self.stats.failed_samples += 1;
                false
            }
        }
    }

    /// Read every active counter, skipping those that fail
    pub fn read_all(&mut self) -> Vec<CounterReading> {
        let mut readings = Vec::with_capacity(self.active.len());
        for counter in &self.active {
            match self.backend.read(counter.id) {
                Ok(value) if counter.kind.matches(&value) => {
                    readings.push(CounterReading::new(counter.name.clone(), value));
                }
                Ok(value) => {
                    log::warn!(
                        "Counters: '{}' declared {:?}, read {:?}; dropped",
                        counter.name,
                        counter.kind,
                        value
                    );
                    self.stats.failed_reads += 1;
                }
                Err(err) => {
                    log::warn!("Counters: '{}' not read: {}", counter.name, err);
                    self.stats.failed_reads += 1;
                }
            }
        }
        readings
    }

    /// Sample, then read; `None` if the sample failed
    pub fn sample(&mut self) -> Option<Vec<CounterReading>> {
        self.sample_now().then(|| self.read_all())
    }
}

impl core::fmt::Debug for CounterSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CounterSession")
            .field("active", &self.active.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{OpLog, ScriptedBackend};

    #[test]
    fn test_filter_selects_named_counters() {
        let backend = ScriptedBackend::new(OpLog::default());
        let session = CounterSession::new(Box::new(backend), &["busy".to_string()]);
        let names: Vec<_> = session.active().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["busy"]);
    }

    #[test]
    fn test_failed_read_skips_counter() {
        let backend = ScriptedBackend::new(OpLog::default()).failing_read(ScriptedBackend::CYCLES);
        let mut session = CounterSession::new(Box::new(backend), &[]);

        let readings = session.sample().unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].name, "busy");
        assert_eq!(session.stats().failed_reads, 1);
    }

    #[test]
    fn test_mistyped_value_skips_counter() {
        let backend = ScriptedBackend::new(OpLog::default()).mistyped(ScriptedBackend::BUSY);
        let mut session = CounterSession::new(Box::new(backend), &[]);

        let readings = session.sample().unwrap();
        let names: Vec<_> = readings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["cycles"]);
        assert_eq!(readings[0].value, CounterValue::Integer(1000));
        assert_eq!(session.stats().failed_reads, 1);
    }

    #[test]
    fn test_kind_matches_value() {
        assert!(CounterKind::Integer.matches(&CounterValue::Integer(3)));
        assert!(CounterKind::Float.matches(&CounterValue::Float(0.25)));
        assert!(!CounterKind::Integer.matches(&CounterValue::Float(3.0)));
        assert!(!CounterKind::Float.matches(&CounterValue::Integer(0)));
    }

    #[test]
    fn test_failed_sample_drops_reading() {
        let backend = ScriptedBackend::new(OpLog::default()).failing_samples();
        let mut session = CounterSession::new(Box::new(backend), &[]);
        assert!(session.sample().is_none());
        assert_eq!(session.stats().failed_samples, 1);
    }

    #[test]
    fn test_null_backend() {
        let mut session = CounterSession::new(Box::new(NullCounterBackend), &[]);
        assert!(session.active().is_empty());
        assert_eq!(session.sample(), Some(Vec::new()));
    }
}
