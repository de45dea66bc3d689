use crate::{
    backend::weather::{LocalProvider, SharedProvider, WeatherProvider},
    errors::{SchedulerError, ServerError},
    limits::{ConnLimits, ServerLimits},
    scheduler::Scheduler,
    server::listener::ListenerTask,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::cell::{Cell, RefCell};
use std::net::{IpAddr, SocketAddr, TcpListener, ToSocketAddrs};
use std::path::PathBuf;
use std::rc::Rc;

/// Bind parameters.
///
/// The port is kept as a string because it usually arrives from an
/// environment variable or command line; it must be 1-5 decimal digits
/// and fit a `u16`. No address means the wildcard address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub port: String,
    pub listen_backlog: i32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: "8080".to_string(),
            listen_backlog: 4096,

            _priv: (),
        }
    }
}

/// State shared by the listener and every connection it creates.
///
/// Lives on the single scheduler thread, so plain `Cell` counters are
/// enough; connections hold it behind an `Rc` that never outlives the
/// scheduler.
pub(crate) struct ServerContext {
    pub(crate) conn_limits: ConnLimits,
    pub(crate) www_dir: PathBuf,
    pub(crate) provider: SharedProvider,

    /// Connections currently registered as tasks.
    pub(crate) active: Cell<usize>,
    /// Total connections ever accepted.
    pub(crate) accepted: Cell<u64>,
}

impl ServerContext {
    fn new(conn_limits: ConnLimits, www_dir: PathBuf, provider: SharedProvider) -> Self {
        Self {
            conn_limits,
            www_dir,
            provider,
            active: Cell::new(0),
            accepted: Cell::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(conn_limits: ConnLimits) -> Self {
        Self::new(
            conn_limits,
            PathBuf::from("www-missing-for-tests"),
            Rc::new(RefCell::new(LocalProvider::new(None))),
        )
    }
}

/// A bound, listening weather server, ready to join a scheduler.
///
/// # Examples
/// ```no_run
/// use weathervane::{Scheduler, Server, ServerConfig};
/// use weathervane::limits::{ConnLimits, SchedLimits, ServerLimits};
///
/// let server = Server::bind(
///     &ServerConfig::default(),
///     ServerLimits::default(),
///     ConnLimits::default(),
/// ).unwrap();
///
/// let mut sched = Scheduler::new(&SchedLimits::default());
/// server.spawn(&mut sched).unwrap();
/// sched.run();
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    limits: ServerLimits,
    conn_limits: ConnLimits,

    www_dir: PathBuf,
    weather_cache: Option<PathBuf>,
    provider: Option<SharedProvider>,
}

impl Server {
    /// Creates the listening socket and validates the configuration.
    ///
    /// `SO_REUSEADDR` is set before bind, `TCP_NODELAY` on the listening
    /// socket, and the socket is non-blocking before it ever reaches the
    /// accept loop.
    pub fn bind(
        config: &ServerConfig,
        limits: ServerLimits,
        conn_limits: ConnLimits,
    ) -> Result<Self, ServerError> {
        let port = Self::parse_port(&config.port)?;
        let addr = Self::resolve_address(config.address.as_deref(), port)?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_tcp_nodelay(true)?;
        socket
            .set_nonblocking(true)
            .map_err(ServerError::Nonblocking)?;
        socket.bind(&addr.into()).map_err(ServerError::Bind)?;
        socket
            .listen(config.listen_backlog)
            .map_err(ServerError::Listen)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            limits,
            conn_limits,
            www_dir: PathBuf::from("www"),
            weather_cache: Some(PathBuf::from("weather_cache")),
            provider: None,
        })
    }

    /// The address actually bound, useful with port `"0"`.
    #[inline(always)]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Directory for static assets (default: `www`).
    pub fn www_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.www_dir = dir.into();
        self
    }

    /// Cache directory for the default weather provider
    /// (default: `weather_cache`; `None` disables the cache).
    pub fn weather_cache(mut self, dir: Option<PathBuf>) -> Self {
        self.weather_cache = dir;
        self
    }

    /// Replaces the default local weather provider.
    pub fn weather_provider(mut self, provider: impl WeatherProvider + 'static) -> Self {
        self.provider = Some(Rc::new(RefCell::new(provider)));
        self
    }

    /// Registers the listener task; the server then lives inside the
    /// scheduler until the process exits.
    pub fn spawn(self, sched: &mut Scheduler) -> Result<(), SchedulerError> {
        let provider = self
            .provider
            .unwrap_or_else(|| Rc::new(RefCell::new(LocalProvider::new(self.weather_cache))));
        let ctx = Rc::new(ServerContext::new(self.conn_limits, self.www_dir, provider));

        sched.add(Box::new(ListenerTask::new(self.listener, ctx, self.limits)))
    }

    fn parse_port(port: &str) -> Result<u16, ServerError> {
        if port.is_empty() || port.len() > 5 || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ServerError::InvalidPort);
        }
        port.parse::<u16>().map_err(|_| ServerError::InvalidPort)
    }

    fn resolve_address(address: Option<&str>, port: u16) -> Result<SocketAddr, ServerError> {
        let Some(host) = address else {
            return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
        };

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        (host, port)
            .to_socket_addrs()
            .map_err(|_| ServerError::InvalidAddress)?
            .next()
            .ok_or(ServerError::InvalidAddress)
    }
}
