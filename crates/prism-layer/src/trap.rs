//! # Synchronization Trap
//!
//! A trap parks the device timeline at a chosen point so the host can sample
//! counters with nothing else in flight.
//!
//! ```text
//!   device timeline                         host (replay, under the lock)
//!   ───────────────                         ─────────────────────────────
//!   ... workload ...
//!   set(device_to_host)   ───────────────▶  wait_for_gpu: poll until Set
//!   wait(host_to_device)                                 reset(device_to_host)
//!        │ parked                                        settle delay
//!        │                                  sample counters
//!        ▼                ◀───────────────  notify_gpu: set(host_to_device)
//!   reset(host_to_device)
//!   ... next work ...
//! ```
//!
//! One pair of events per device, so at most one trap is in flight per device.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use prism_core::Result;

use crate::config::TrapConfig;
use crate::driver::{DeviceDriver, EventStatus, RawCommandBuffer, RawEvent};

// =============================================================================
// DEVICE SIDE
// =============================================================================

/// Event handles of a trap pair, for device-side emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapEvents {
    /// Signalled by the device when it reaches the trap
    pub device_to_host: RawEvent,
    /// Signalled by the host to release the device
    pub host_to_device: RawEvent,
}

impl TrapEvents {
    /// Record the device half of a trap into `command_buffer`
    pub fn emit(&self, driver: &dyn DeviceDriver, command_buffer: RawCommandBuffer) {
        driver.cmd_set_event(command_buffer, self.device_to_host);
        driver.cmd_wait_event(command_buffer, self.host_to_device);
        driver.cmd_reset_event(command_buffer, self.host_to_device);
    }
}

// =============================================================================
// HOST SIDE
// =============================================================================

/// Host half of the trap protocol; owns the two events
pub struct TrapPair {
    driver: Arc<dyn DeviceDriver>,
    events: TrapEvents,
    poll_interval: Duration,
    settle_delay: Duration,
    cycles: u64,
}

impl TrapPair {
    /// Create both events, unsignalled
    pub fn create(driver: Arc<dyn DeviceDriver>, timing: &TrapConfig) -> Result<Self> {
        let device_to_host = driver.create_event()?;
        let host_to_device = match driver.create_event() {
            Ok(event) => event,
            Err(err) => {
                driver.destroy_event(device_to_host);
                return Err(err);
            }
        };

        Ok(Self {
            driver,
            events: TrapEvents {
                device_to_host,
                host_to_device,
            },
            poll_interval: timing.poll_interval(),
            settle_delay: timing.settle_delay(),
            cycles: 0,
        })
    }

    /// Event handles for device-side emission
    pub fn events(&self) -> TrapEvents {
        self.events
    }

    /// Completed trap cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Settle delay applied after the device parks or idles
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Block until the device reaches its trap, then let it quiesce
    ///
    /// There is no timeout: a device that never reaches the trap blocks the
    /// caller.
    pub fn wait_for_gpu(&self) {
        let event = self.events.device_to_host;
        loop {
            match self.driver.event_status(event) {
                Ok(EventStatus::Set) => break,
                Ok(EventStatus::Reset) => {}
                Err(err) => log::error!("Trap: event status query failed: {}", err),
            }
            if self.poll_interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(self.poll_interval);
            }
        }

        if let Err(err) = self.driver.reset_event(event) {
            log::error!("Trap: device-to-host reset failed: {}", err);
        }
        thread::sleep(self.settle_delay);
    }

    /// Release the parked device
    pub fn notify_gpu(&self) {
        if let Err(err) = self.driver.set_event(self.events.host_to_device) {
            log::error!("Trap: host-to-device signal failed: {}", err);
        }
    }

    /// Run one full cycle: acquire, `sample`, release
    pub fn cycle<R>(&mut self, sample: impl FnOnce() -> R) -> R {
        self.wait_for_gpu();
        let result = sample();
        self.notify_gpu();
        self.cycles += 1;
        log::debug!("Trap: cycle {} complete", self.cycles);
        result
    }
}

impl Drop for TrapPair {
    fn drop(&mut self) {
        self.driver.destroy_event(self.events.device_to_host);
        self.driver.destroy_event(self.events.host_to_device);
    }
}

impl core::fmt::Debug for TrapPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TrapPair")
            .field("events", &self.events)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, Op};

    fn fast() -> TrapConfig {
        TrapConfig {
            poll_interval_us: 0,
            settle_delay_ms: 0,
        }
    }

    #[test]
    fn test_create_and_destroy_events() {
        let mock = MockDriver::new();
        let trap = TrapPair::create(mock.driver(), &fast()).unwrap();
        let events = trap.events();
        assert_ne!(events.device_to_host, events.host_to_device);
        assert_eq!(mock.live_events(), 2);

        drop(trap);
        assert_eq!(mock.live_events(), 0);
    }

    #[test]
    fn test_second_event_failure_releases_first() {
        let mock = MockDriver::new();
        mock.fail_event_creation_after(1);
        let result = TrapPair::create(mock.driver(), &fast());
        assert!(result.is_err());
        assert_eq!(mock.live_events(), 0);
    }

    #[test]
    fn test_cycle_order() {
        let mock = MockDriver::new();
        let mut trap = TrapPair::create(mock.driver(), &fast()).unwrap();
        let events = trap.events();

        // Device reaches the trap before the host waits
        mock.driver().set_event(events.device_to_host).unwrap();
        mock.clear_log();

        let log = mock.log();
        trap.cycle(|| log.push(Op::Sample));

        assert_eq!(
            mock.ops(),
            [
                Op::HostObserved(events.device_to_host),
                Op::HostReset(events.device_to_host),
                Op::Sample,
                Op::HostSet(events.host_to_device),
            ]
        );
        assert_eq!(trap.cycles(), 1);
    }

    #[test]
    fn test_status_errors_keep_polling() {
        let mock = MockDriver::new();
        let trap = TrapPair::create(mock.driver(), &fast()).unwrap();
        let events = trap.events();
        mock.fail_status_queries(3);
        mock.driver().set_event(events.device_to_host).unwrap();

        trap.wait_for_gpu();
        assert_eq!(
            mock.driver().event_status(events.device_to_host),
            Ok(EventStatus::Reset)
        );
    }
}
