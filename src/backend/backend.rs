//! The contract between a connection and its data-producing backend.

use crate::{errors::BackendError, http::types::StatusCode};
use std::borrow::Cow;

/// What a call to [`Backend::work`] achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// More ticks needed; call `work` again later.
    Pending,
    /// The output is ready to be taken.
    Done,
}

/// The finished product of a backend.
///
/// `status` lets a backend report domain outcomes (an unknown location is
/// a 404, not a transport failure); `content_type` tells the connection
/// how to wrap the body.
#[derive(Debug)]
pub(crate) struct BackendOutput {
    pub(crate) status: StatusCode,
    pub(crate) content_type: Cow<'static, str>,
    pub(crate) body: Vec<u8>,
}

impl BackendOutput {
    #[inline]
    pub(crate) fn ok(content_type: impl Into<Cow<'static, str>>, body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::Ok,
            content_type: content_type.into(),
            body,
        }
    }

    #[inline]
    pub(crate) fn json(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Cow::Borrowed("application/json"),
            body,
        }
    }
}

/// An asynchronous producer of response bytes, owned by one connection.
///
/// The connection drives `work` once per scheduler tick until it reports
/// [`Progress::Done`], then moves the product out with `take_output`. Each
/// `work` call must be a bounded, non-blocking step; a backend waiting on
/// something external reports `Pending` and is retried next tick.
///
/// Errors from `work` surface to the client as a 500; backends with a
/// domain-level failure to report (not found, upstream rejected) encode it
/// in the output's status instead.
pub(crate) trait Backend {
    /// Advances the backend's internal sub-state by one step.
    fn work(&mut self) -> Result<Progress, BackendError>;

    /// Moves the finished output out.
    ///
    /// Yields `Some` exactly once, after `work` has reported `Done`; the
    /// buffer ownership passes to the caller.
    fn take_output(&mut self) -> Option<BackendOutput>;
}
