use crate::{
    backend::{
        assets::StaticAsset,
        backend::{Backend, Progress},
        cities::CityListing,
        weather::{Location, WeatherLookup},
    },
    errors::{SessionError, SessionError::*},
    http::{query, request, request::Request, response, response::Response, types::Method},
    net::transport::{ReadOutcome, Transport, WriteOutcome},
    scheduler::{Scheduler, Task},
    server::server_impl::ServerContext,
};
use std::rc::Rc;
use std::time::Instant;

// Served when www/index.html is absent or unreadable.
const FALLBACK_INDEX: &str = "<!DOCTYPE html>\n<html>\n<head><title>weathervane</title></head>\n\
<body><h1>weathervane</h1><p>Try <a href=\"/weather?location=stockholm\">/weather</a> \
or <a href=\"/cities\">/cities</a>.</p></body>\n</html>\n";

/// Where a session currently is in its lifecycle.
///
/// Transitions only move forward; `Done` is reached exactly once and is
/// where the task removes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnState {
    Reading,
    Parsing,
    Processing,
    BackendWorking,
    Sending,
    Done,
}

// What a single state step decided about the rest of the tick.
enum Flow {
    /// The state changed; keep stepping within this tick.
    Continue,
    /// No more progress possible now; resume next tick.
    Yield,
    /// Terminal; the task removes itself.
    Finished,
}

// What the route table decided for a request.
enum RouteAction {
    Respond(Vec<u8>),
    Dispatch(Box<dyn Backend>),
    Fail(SessionError),
}

/// One client session, scheduled as one task.
///
/// Owns the socket (via the transport), the bounded read buffer, the
/// parsed request, the backend while one is active, and the response
/// buffer. Everything is dropped together when the scheduler removes the
/// task, which closes the socket exactly once.
pub(crate) struct Connection {
    transport: Transport,
    number: u64,
    ctx: Rc<ServerContext>,

    state: ConnState,
    connected_at: Instant,
    error: Option<SessionError>,

    buffer: Box<[u8]>,
    filled: usize,

    request: Option<Request>,
    backend: Option<Box<dyn Backend>>,

    response: Option<Vec<u8>>,
    sent: usize,
}

impl Connection {
    pub(crate) fn new(transport: Transport, number: u64, ctx: Rc<ServerContext>) -> Self {
        let buffer = vec![0; ctx.conn_limits.max_request_bytes].into_boxed_slice();

        Self {
            transport,
            number,
            ctx,
            state: ConnState::Reading,
            connected_at: Instant::now(),
            error: None,
            buffer,
            filled: 0,
            request: None,
            backend: None,
            response: None,
            sent: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn last_error(&self) -> Option<SessionError> {
        self.error
    }

    #[inline]
    fn fail(&mut self, error: SessionError) {
        self.error = Some(error);
        self.state = ConnState::Sending;
    }

    // Terminal transition. A session that failed mid-request may leave
    // unread bytes in the socket, and closing over them turns the close
    // into an RST that can discard the response in flight; a bounded
    // drain keeps the close an orderly FIN.
    fn enter_done(&mut self) {
        if self.error.is_some() {
            let mut scratch = [0u8; 1024];
            for _ in 0..16 {
                match self.transport.read(&mut scratch) {
                    ReadOutcome::Bytes(_) => continue,
                    _ => break,
                }
            }
        }

        self.state = ConnState::Done;
    }

    // One state step. `Continue` means the state advanced and the next
    // step may run within the same tick; I/O states yield instead so a
    // single connection cannot hog the thread.
    fn step(&mut self) -> Flow {
        match self.state {
            ConnState::Reading => self.on_reading(),
            ConnState::Parsing => self.on_parsing(),
            ConnState::Processing => self.on_processing(),
            ConnState::BackendWorking => self.on_backend(),
            ConnState::Sending => self.on_sending(),
            ConnState::Done => Flow::Finished,
        }
    }
}

// Reading and parsing
impl Connection {
    fn on_reading(&mut self) -> Flow {
        if self.connected_at.elapsed() >= self.ctx.conn_limits.read_timeout {
            log::debug!("connection #{}: read timed out", self.number);
            self.error = Some(Timeout);
            self.enter_done();
            return Flow::Continue;
        }

        match self.transport.read(&mut self.buffer[self.filled..]) {
            ReadOutcome::Bytes(n) => {
                self.filled += n;

                if request::head_complete(&self.buffer[..self.filled]) {
                    self.state = ConnState::Parsing;
                    Flow::Continue
                } else if self.filled == self.buffer.len() {
                    self.fail(RequestTooLarge);
                    Flow::Continue
                } else {
                    Flow::Yield
                }
            }
            ReadOutcome::WouldBlock => Flow::Yield,
            ReadOutcome::Closed => {
                log::debug!("connection #{}: peer closed before a request", self.number);
                self.enter_done();
                Flow::Continue
            }
            ReadOutcome::Failed(kind) => {
                log::debug!("connection #{}: read failed: {:?}", self.number, kind);
                self.error = Some(Read);
                self.enter_done();
                Flow::Continue
            }
        }
    }

    fn on_parsing(&mut self) -> Flow {
        match Request::parse(
            &self.buffer[..self.filled],
            self.ctx.conn_limits.max_url_len,
        ) {
            Ok(parsed) => {
                self.request = Some(parsed);
                self.state = ConnState::Processing;
            }
            Err(e) => self.fail(e.into()),
        }

        Flow::Continue
    }
}

// Routing
impl Connection {
    fn on_processing(&mut self) -> Flow {
        let Some(parsed) = self.request.take() else {
            self.fail(Internal);
            return Flow::Continue;
        };

        let action = self.route(&parsed);
        self.request = Some(parsed);

        match action {
            RouteAction::Respond(bytes) => {
                self.response = Some(bytes);
                self.sent = 0;
                self.state = ConnState::Sending;
            }
            RouteAction::Dispatch(backend) => {
                self.backend = Some(backend);
                self.state = ConnState::BackendWorking;
            }
            RouteAction::Fail(error) => self.fail(error),
        }

        Flow::Continue
    }

    fn route(&self, parsed: &Request) -> RouteAction {
        if parsed.method() != Method::Get {
            return RouteAction::Fail(Malformed);
        }

        match parsed.path() {
            "/" => RouteAction::Respond(response::text("Hello from weather server!")),
            "/health" => RouteAction::Respond(response::text("OK")),
            "/index.html" => RouteAction::Respond(self.index_page()),
            "/surprise" => RouteAction::Dispatch(Box::new(StaticAsset::new(
                self.ctx.www_dir.join("bonzi.png"),
                "image/png",
            ))),
            "/cities" => RouteAction::Dispatch(Box::new(CityListing::new())),
            "/weather" => match Self::parse_location(parsed) {
                Some(location) => RouteAction::Dispatch(Box::new(WeatherLookup::new(
                    location,
                    self.ctx.provider.clone(),
                ))),
                None => RouteAction::Fail(Malformed),
            },
            _ => RouteAction::Fail(Malformed),
        }
    }

    fn index_page(&self) -> Vec<u8> {
        match std::fs::read_to_string(self.ctx.www_dir.join("index.html")) {
            Ok(page) => response::html(&page),
            Err(_) => response::html(FALLBACK_INDEX),
        }
    }

    // `location=<name>` wins over `lat=<f64>&lon=<f64>`; anything else is
    // a client error answered before a backend exists.
    fn parse_location(parsed: &Request) -> Option<Location> {
        let raw = parsed.query_raw()?;
        let pairs = query::parse(raw.as_bytes()).ok()?;

        if let Some(name) = query::first(&pairs, "location") {
            if name.is_empty() {
                return None;
            }
            return Some(Location::Name(query::fold_location(name)));
        }

        let latitude: f64 = query::first(&pairs, "lat")?.parse().ok()?;
        let longitude: f64 = query::first(&pairs, "lon")?.parse().ok()?;
        Some(Location::Coords {
            latitude,
            longitude,
        })
    }
}

// Backend driving and sending
impl Connection {
    fn on_backend(&mut self) -> Flow {
        let Some(backend) = self.backend.as_mut() else {
            self.fail(Internal);
            return Flow::Continue;
        };

        match backend.work() {
            Ok(Progress::Pending) => Flow::Yield,
            Ok(Progress::Done) => {
                match backend.take_output() {
                    Some(output) => {
                        let bytes =
                            Response::new(output.status, output.content_type, output.body)
                                .into_bytes();
                        self.response = Some(bytes);
                        self.sent = 0;
                        self.state = ConnState::Sending;
                    }
                    None => self.fail(Internal),
                }
                Flow::Continue
            }
            Err(e) => {
                log::warn!("connection #{}: backend failed: {}", self.number, e);
                self.fail(Internal);
                Flow::Continue
            }
        }
    }

    fn on_sending(&mut self) -> Flow {
        if self.response.is_none() {
            self.response = Some(self.error_response());
            self.sent = 0;
        }
        let Some(response) = self.response.as_ref() else {
            self.enter_done();
            return Flow::Continue;
        };

        let outcome = self.transport.write(&response[self.sent..]);
        let total = response.len();
        match outcome {
            WriteOutcome::Bytes(n) => {
                self.sent += n;
                match self.sent == total {
                    true => {
                        self.enter_done();
                        Flow::Continue
                    }
                    false => Flow::Yield,
                }
            }
            WriteOutcome::WouldBlock => Flow::Yield,
            WriteOutcome::Failed(kind) => {
                log::debug!("connection #{}: write failed: {:?}", self.number, kind);
                if self.error.is_none() {
                    self.error = Some(Send(kind));
                }
                self.enter_done();
                Flow::Continue
            }
        }
    }

    fn error_response(&self) -> Vec<u8> {
        match self.error {
            Some(Malformed) => response::bad_request("Malformed HTTP request"),
            Some(UrlTooLong) => response::bad_request("Request URL too long"),
            Some(RequestTooLarge) => {
                response::content_too_large(self.ctx.conn_limits.max_request_bytes)
            }
            // Sending is only entered with one of the kinds above set (or
            // with a response already built); everything else is a bug
            // answered as a 500.
            _ => response::internal_error("Internal server error"),
        }
    }
}

impl Task for Connection {
    fn run(&mut self, sched: &mut Scheduler) {
        loop {
            match self.step() {
                Flow::Continue => continue,
                Flow::Yield => return,
                Flow::Finished => {
                    if sched.remove_current().is_err() {
                        log::error!("connection #{}: self-removal refused", self.number);
                    }
                    return;
                }
            }
        }
    }

    fn attached(&mut self, _: &mut Scheduler) {
        self.ctx.active.set(self.ctx.active.get() + 1);
        log::debug!(
            "connection #{} from {:?} attached ({} active)",
            self.number,
            self.transport.peer_addr(),
            self.ctx.active.get()
        );
    }

    fn cleanup(&mut self, _: &mut Scheduler) {
        self.ctx.active.set(self.ctx.active.get() - 1);
        match self.error {
            Some(error) => log::debug!(
                "connection #{} closed after error: {} ({} active)",
                self.number,
                error,
                self.ctx.active.get()
            ),
            None => log::debug!(
                "connection #{} closed ({} active)",
                self.number,
                self.ctx.active.get()
            ),
        }
    }
}
