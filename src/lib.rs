//! weathervane - single-threaded cooperative HTTP/1.1 weather service
//!
//! A small weather service built on a cooperative, non-blocking I/O
//! engine: one thread, one scheduler, and a task per connection. No
//! async runtime, no worker pool; concurrency comes from non-blocking
//! sockets and tasks that always return quickly.
//!
//! # Architecture
//!
//! - **[`Scheduler`]** drives a bounded set of [`Task`]s, one pass per
//!   tick in insertion order. Tasks yield by returning and leave the loop
//!   by removing themselves.
//! - **The listener task** accepts a bounded batch of sockets per tick
//!   and registers each as a connection task. When the scheduler is full,
//!   new sockets are dropped: backpressure is shedding, not queueing.
//! - **Each connection task** is a state machine
//!   (read, parse, route, backend work, send, done) over a non-blocking
//!   socket with a polled read timeout and fixed-size buffers.
//! - **Backends** produce response bodies across ticks: the compiled-in
//!   city catalogue, a weather lookup behind the [`WeatherProvider`]
//!   seam, and static binary assets.
//!
//! # Routes
//!
//! | Route | Response |
//! |---|---|
//! | `GET /` | `text/plain` greeting |
//! | `GET /health` | `OK` |
//! | `GET /index.html` | `www/index.html`, or a built-in fallback |
//! | `GET /surprise` | `www/bonzi.png` as `image/png` |
//! | `GET /weather?location=<name>` or `?lat=<f>&lon=<f>` | JSON report |
//! | `GET /cities` | JSON catalogue |
//!
//! Sessions are single-request: every response carries
//! `Connection: close`.
//!
//! # Quick Start
//!
//! ```no_run
//! use weathervane::{Scheduler, Server, ServerConfig};
//! use weathervane::limits::{ConnLimits, SchedLimits, ServerLimits};
//!
//! let server = Server::bind(
//!     &ServerConfig::default(),
//!     ServerLimits::default(),
//!     ConnLimits::default(),
//! ).unwrap();
//!
//! let mut sched = Scheduler::new(&SchedLimits::default());
//! server.spawn(&mut sched).unwrap();
//! sched.run();
//! ```
pub(crate) mod backend {
    pub(crate) mod assets;
    pub(crate) mod backend;
    pub(crate) mod cities;
    pub(crate) mod weather;
}
pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub mod response;
    pub mod types;
}
pub(crate) mod net {
    pub(crate) mod transport;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod listener;
    pub(crate) mod server_impl;
}
pub mod errors;
pub mod limits;
pub mod scheduler;

pub use crate::{
    backend::{
        cities::City,
        weather::{LocalProvider, Observation, ProviderError, WeatherProvider},
    },
    http::{
        query,
        request::Request,
        response::{self, Response},
        types::{Method, StatusCode, Version},
    },
    scheduler::{Scheduler, Task},
    server::server_impl::{Server, ServerConfig},
};
