//! Non-blocking byte transport over an accepted TCP stream.
//!
//! The adapter owns the only code that touches options on accepted
//! sockets: construction puts the stream into non-blocking mode, and both
//! operations translate `io` results into outcomes the connection state
//! machine can match on without inspecting errno-level detail.

use crate::errors::SendErrorKind;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

// EINTR is transient; anything past this many retries in one call is
// reported instead of spun on.
const MAX_INTERRUPT_RETRIES: usize = 10;

/// Result of one non-blocking read.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// `n` bytes landed in the buffer.
    Bytes(usize),
    /// Orderly shutdown from the peer, distinct from an error.
    Closed,
    /// No data available right now; retry on a later tick.
    WouldBlock,
    Failed(io::ErrorKind),
}

/// Result of one non-blocking write.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// `n` bytes were accepted by the kernel, possibly fewer than offered.
    Bytes(usize),
    /// The send buffer is full; retry on a later tick.
    WouldBlock,
    Failed(SendErrorKind),
}

/// One client socket in non-blocking mode.
///
/// The socket is closed exactly once, when the transport is dropped.
#[derive(Debug)]
pub(crate) struct Transport {
    stream: TcpStream,
}

impl Transport {
    pub(crate) fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }

    #[inline]
    pub(crate) fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Attempts one read into `buf`. Never blocks.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        match self.stream.read(buf) {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Bytes(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadOutcome::WouldBlock,
            // A signal landed mid-call; the next tick retries anyway.
            Err(e) if e.kind() == io::ErrorKind::Interrupted => ReadOutcome::WouldBlock,
            Err(e) => ReadOutcome::Failed(e.kind()),
        }
    }

    /// Attempts one write of `buf`. Never blocks.
    pub(crate) fn write(&mut self, buf: &[u8]) -> WriteOutcome {
        for _ in 0..MAX_INTERRUPT_RETRIES {
            return match self.stream.write(buf) {
                Ok(0) if !buf.is_empty() => {
                    WriteOutcome::Failed(SendErrorKind::Other(io::ErrorKind::WriteZero))
                }
                Ok(n) => WriteOutcome::Bytes(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => WriteOutcome::WouldBlock,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => WriteOutcome::Failed(SendErrorKind::from_io(e.kind())),
            };
        }

        WriteOutcome::Failed(SendErrorKind::Other(io::ErrorKind::Interrupted))
    }
}
