//! # PRISM Error Handling
//!
//! Error types shared by every PRISM crate.
//!
//! Profiling failures never reach the application: counter and
//! synchronization errors are logged at the point they occur and the affected
//! sample is dropped. The variants below exist so that the collaborators
//! (driver, counter backend, telemetry endpoint) can report *what* failed.

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// PRISM Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// PRISM unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation not supported
    NotSupported,

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// Handle does not refer to a live object (freed or never allocated)
    InvalidHandle,
    /// Handle belongs to a different device than the call targets
    ForeignHandle,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file could not be read
    ConfigUnreadable,
    /// Configuration file is not valid
    ConfigInvalid,

    // =========================================================================
    // Driver Errors
    // =========================================================================
    /// The driver returned a raw failure code
    Driver(i32),
    /// Device event creation failed
    EventCreationFailed,
    /// Device was lost
    DeviceLost,

    // =========================================================================
    // Counter Backend Errors
    // =========================================================================
    /// Taking a counter sample failed
    SampleFailed,
    /// Reading a counter value failed
    CounterReadFailed(u32),
    /// Counter is not available on this device
    CounterUnavailable(u32),

    // =========================================================================
    // Telemetry Errors
    // =========================================================================
    /// Message could not be serialized
    SerializationFailed,
    /// Endpoint is closed or could not transmit
    EndpointFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Generic
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotSupported => write!(f, "operation not supported"),

            // Registry
            Self::InvalidHandle => write!(f, "stale or unknown handle"),
            Self::ForeignHandle => write!(f, "handle belongs to another device"),

            // Configuration
            Self::ConfigUnreadable => write!(f, "configuration file unreadable"),
            Self::ConfigInvalid => write!(f, "configuration file invalid"),

            // Driver
            Self::Driver(code) => write!(f, "driver error {}", code),
            Self::EventCreationFailed => write!(f, "device event creation failed"),
            Self::DeviceLost => write!(f, "device lost"),

            // Counters
            Self::SampleFailed => write!(f, "counter sample failed"),
            Self::CounterReadFailed(id) => write!(f, "counter {} read failed", id),
            Self::CounterUnavailable(id) => write!(f, "counter {} unavailable", id),

            // Telemetry
            Self::SerializationFailed => write!(f, "message serialization failed"),
            Self::EndpointFailed => write!(f, "telemetry endpoint failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
