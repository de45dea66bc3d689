use std::{error, fmt, io};

/// Errors surfaced by the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// The live task count already equals `max_tasks`.
    ///
    /// No hook is invoked on the rejected task; the caller keeps ownership
    /// and decides the policy (the listener drops the connection).
    CapacityExceeded,

    /// `remove_current` was called while no task was executing.
    InvalidOperation,
}

impl error::Error for SchedulerError {}
impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::CapacityExceeded => write!(f, "scheduler task capacity exceeded"),
            SchedulerError::InvalidOperation => {
                write!(f, "remove_current called outside a task run")
            }
        }
    }
}

/// Errors produced while creating a [`Server`](crate::Server).
#[derive(Debug)]
pub enum ServerError {
    /// The port string is not 1-5 decimal digits, or exceeds 65535.
    InvalidPort,
    /// The bind address did not parse or resolve.
    InvalidAddress,
    Bind(io::Error),
    Listen(io::Error),
    Nonblocking(io::Error),
    Io(io::Error),
}

impl error::Error for ServerError {}
impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::InvalidPort => write!(f, "port must be 1-5 decimal digits <= 65535"),
            ServerError::InvalidAddress => write!(f, "bind address did not resolve"),
            ServerError::Bind(e) => write!(f, "bind failed: {}", e),
            ServerError::Listen(e) => write!(f, "listen failed: {}", e),
            ServerError::Nonblocking(e) => write!(f, "set_nonblocking failed: {}", e),
            ServerError::Io(e) => write!(f, "socket setup failed: {}", e),
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        ServerError::Io(err)
    }
}

/// Failure modes of a single client session.
///
/// Set on the connection when a pipeline stage fails. Kinds that still
/// have a usable socket synthesize an HTTP error response on entry to the
/// sending state; the rest close the session silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionError {
    /// The socket read failed.
    Read,
    /// No complete request head arrived within the read timeout.
    Timeout,
    /// The request buffer filled without a framing marker.
    RequestTooLarge,
    /// Unparseable request, or no matching route.
    Malformed,
    /// The request URL exceeds the configured limit.
    UrlTooLong,
    /// A backend failed; the client sees a 500.
    Internal,
    /// The socket write failed mid-response.
    Send(SendErrorKind),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Read => write!(f, "socket read failed"),
            SessionError::Timeout => write!(f, "request head timed out"),
            SessionError::RequestTooLarge => write!(f, "request exceeds buffer"),
            SessionError::Malformed => write!(f, "malformed request"),
            SessionError::UrlTooLong => write!(f, "request url too long"),
            SessionError::Internal => write!(f, "internal failure"),
            SessionError::Send(kind) => write!(f, "socket write failed: {:?}", kind),
        }
    }
}

/// Write failures the transport distinguishes.
///
/// `Interrupted` never reaches this enum; the transport retries it a
/// bounded number of times and reports the overflow as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendErrorKind {
    /// Peer closed the connection (EPIPE).
    BrokenPipe,
    /// Peer reset the connection (ECONNRESET).
    ConnectionReset,
    Other(io::ErrorKind),
}

impl SendErrorKind {
    #[inline]
    pub(crate) fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::BrokenPipe => SendErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset => SendErrorKind::ConnectionReset,
            other => SendErrorKind::Other(other),
        }
    }
}

/// Request parser failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// The request line or framing is not valid HTTP/1.x.
    Malformed,
    /// The URL token exceeds the configured maximum.
    UrlTooLong,
}

impl error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed => write!(f, "malformed HTTP request"),
            ParseError::UrlTooLong => write!(f, "request URL too long"),
        }
    }
}

impl From<ParseError> for SessionError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Malformed => SessionError::Malformed,
            ParseError::UrlTooLong => SessionError::UrlTooLong,
        }
    }
}

/// Failures inside a backend's work loop.
///
/// All of them surface as a 500 at the connection; the variants exist for
/// the logs.
#[derive(Debug)]
pub(crate) enum BackendError {
    Io(io::Error),
    Encode(serde_json::Error),
    Provider(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Io(e) => write!(f, "backend i/o failed: {}", e),
            BackendError::Encode(e) => write!(f, "backend encoding failed: {}", e),
            BackendError::Provider(e) => write!(f, "weather provider failed: {}", e),
        }
    }
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        BackendError::Io(err)
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Encode(err)
    }
}
