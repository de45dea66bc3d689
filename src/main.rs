use std::path::PathBuf;
use std::process::ExitCode;
use weathervane::limits::{ConnLimits, SchedLimits, ServerLimits};
use weathervane::{Scheduler, Server, ServerConfig};

// Environment overrides, all optional:
//   WEATHERVANE_ADDRESS  bind address (default: wildcard)
//   WEATHERVANE_PORT     port, 1-5 decimal digits (default: 8080)
//   WEATHERVANE_WWW      static asset directory (default: www)
//   WEATHERVANE_CACHE    weather cache directory, empty disables (default: weather_cache)
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig {
        address: std::env::var("WEATHERVANE_ADDRESS").ok(),
        port: std::env::var("WEATHERVANE_PORT").unwrap_or_else(|_| "8080".to_string()),
        ..ServerConfig::default()
    };

    let server = match Server::bind(&config, ServerLimits::default(), ConnLimits::default()) {
        Ok(server) => server,
        Err(e) => {
            log::error!("startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match std::env::var("WEATHERVANE_WWW") {
        Ok(dir) => server.www_dir(dir),
        Err(_) => server,
    };
    let server = match std::env::var("WEATHERVANE_CACHE") {
        Ok(dir) if dir.is_empty() => server.weather_cache(None),
        Ok(dir) => server.weather_cache(Some(PathBuf::from(dir))),
        Err(_) => server,
    };

    let mut sched = Scheduler::new(&SchedLimits::default());
    if let Err(e) = server.spawn(&mut sched) {
        log::error!("could not register the listener: {}", e);
        return ExitCode::FAILURE;
    }

    sched.run();
    ExitCode::SUCCESS
}
