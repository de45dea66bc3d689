//! Server configuration limits and timeouts
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion through unbounded task registration
//! - Memory overflows from oversized requests
//! - Slowloris-style connection squatting
//!
//! # Examples
//!
//! ```no_run
//! use weathervane::{Scheduler, Server, ServerConfig};
//! use weathervane::limits::{ConnLimits, SchedLimits, ServerLimits};
//! use std::time::Duration;
//!
//! let mut sched = Scheduler::new(&SchedLimits {
//!     max_tasks: 512,
//!     ..SchedLimits::default()
//! });
//!
//! let server = Server::bind(
//!     &ServerConfig::default(),
//!     ServerLimits::default(),
//!     ConnLimits {
//!         read_timeout: Duration::from_secs(5),
//!         ..ConnLimits::default()
//!     },
//! ).unwrap();
//!
//! server.spawn(&mut sched).unwrap();
//! sched.run();
//! ```

use std::time::Duration;

/// Controls the cooperative scheduler's capacity and pacing.
///
/// The scheduler owns every unit of work in the process: the listener is
/// one task, each live connection is one task. `max_tasks` is therefore
/// the hard cap on concurrent connections plus one.
#[derive(Debug, Clone)]
pub struct SchedLimits {
    /// Maximum number of live tasks (default: `256`).
    ///
    /// Adding a task beyond this count fails with
    /// [`CapacityExceeded`](crate::errors::SchedulerError::CapacityExceeded).
    /// The listener answers that failure by dropping the new connection,
    /// which is the intended backpressure: no retries, no queueing beyond
    /// the OS accept backlog.
    pub max_tasks: usize,

    /// Pause between ticks of the run loop (default: `1ms`).
    ///
    /// Bounds the CPU burned by an idle server. Set to `None` to spin.
    /// The pause sits between full passes over the task set, so it cannot
    /// reorder tasks within a tick.
    pub tick_backoff: Option<Duration>,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for SchedLimits {
    fn default() -> Self {
        Self {
            max_tasks: 256,
            tick_backoff: Some(Duration::from_millis(1)),

            _priv: (),
        }
    }
}

/// Connection-level limits and timeouts.
///
/// Default values balance compatibility, resource usage, and security.
/// Only change if you understand the consequences.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum time from connect to a complete request head (default: `10 seconds`).
    ///
    /// Checked against a monotonic clock on every entry to the reading
    /// state. A connection that has not produced a framed request in time
    /// is dropped without a response. This is the only timeout; write
    /// errors end the session on their own.
    pub read_timeout: Duration,

    /// Size of the request buffer in bytes (default: `8192`).
    ///
    /// A request head must fit completely, framing marker included. A
    /// full buffer without the marker answers `413 Content Too Large`
    /// and closes.
    pub max_request_bytes: usize,

    /// Maximum URL length in bytes including the query string (default: `256`).
    ///
    /// Longer URLs are rejected by the parser and answered with `400`.
    pub max_url_len: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            max_request_bytes: 8 * 1024,
            max_url_len: 256,

            _priv: (),
        }
    }
}

/// Listener-level limits.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum sockets accepted per scheduler tick (default: `16`).
    ///
    /// Bounds the time the listener task holds the thread, keeping the
    /// accept loop cooperative with in-flight connections.
    pub max_accepts_per_tick: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_accepts_per_tick: 16,

            _priv: (),
        }
    }
}
