//! Weather lookup backend.
//!
//! Resolves the requested location against the city catalogue, obtains an
//! observation through the [`WeatherProvider`] seam, and encodes a JSON
//! report. The provider is where a real data source (an upstream API, a
//! station feed) plugs in; the default implementation is local,
//! deterministic, and backed by an on-disk cache.

use crate::{
    backend::{
        backend::{Backend, BackendOutput, Progress},
        cities::{self, City},
    },
    errors::BackendError,
    http::{query, types::StatusCode},
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{error, fmt, fs};

/// The location a client asked about, already decoded and validated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Location {
    /// Folded name form, e.g. `location=stockholm`.
    Name(String),
    /// Coordinate form, e.g. `lat=59.33&lon=18.07`.
    Coords { latitude: f64, longitude: f64 },
}

/// A single weather observation for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub temperature_c: f64,
    pub wind_mps: f64,
    pub humidity_pct: u8,
    pub condition: String,
    /// Seconds since the Unix epoch at observation time.
    pub observed_at: u64,
}

/// A provider-side failure, surfaced to the client as a 500.
#[derive(Debug)]
pub struct ProviderError(pub String);

impl error::Error for ProviderError {}
impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ProviderError> for BackendError {
    fn from(err: ProviderError) -> Self {
        BackendError::Provider(err.0)
    }
}

/// Source of observations.
///
/// `poll_observation` must be bounded and non-blocking: a provider that
/// is still acquiring data answers `Ok(None)` and is polled again on the
/// next scheduler tick.
pub trait WeatherProvider {
    fn poll_observation(&mut self, city: &City) -> Result<Option<Observation>, ProviderError>;
}

/// Shared handle to the provider; one provider serves every connection on
/// the single scheduler thread.
pub(crate) type SharedProvider = Rc<RefCell<dyn WeatherProvider>>;

// The report sent to the client.
#[derive(Serialize)]
struct WeatherReport<'a> {
    city: &'static str,
    latitude: f64,
    longitude: f64,
    observation: &'a Observation,
}

/// Backend answering `GET /weather`.
pub(crate) struct WeatherLookup {
    phase: Phase,
    provider: SharedProvider,
    output: Option<BackendOutput>,
}

// Each variant carries exactly what the next step needs.
enum Phase {
    Resolve(Location),
    Fetch(City),
    Encode(City, Observation),
    Done,
}

impl WeatherLookup {
    pub(crate) fn new(location: Location, provider: SharedProvider) -> Self {
        Self {
            phase: Phase::Resolve(location),
            provider,
            output: None,
        }
    }

    fn resolve(&mut self, location: Location) -> Progress {
        let city = match location {
            Location::Name(folded) => match cities::find(&folded) {
                Some(city) => city,
                None => {
                    let body = format!(r#"{{"error":"unknown location","location":"{}"}}"#, folded);
                    self.output =
                        Some(BackendOutput::json(StatusCode::NotFound, body.into_bytes()));
                    return Progress::Done;
                }
            },
            Location::Coords {
                latitude,
                longitude,
            } => cities::nearest(latitude, longitude),
        };

        log::debug!("weather lookup resolved to {}", city.name);
        self.phase = Phase::Fetch(city);
        Progress::Pending
    }

    fn fetch(&mut self, city: City) -> Result<Progress, BackendError> {
        match self.provider.borrow_mut().poll_observation(&city)? {
            Some(observation) => self.phase = Phase::Encode(city, observation),
            None => self.phase = Phase::Fetch(city),
        }

        Ok(Progress::Pending)
    }

    fn encode(&mut self, city: City, observation: Observation) -> Result<Progress, BackendError> {
        let report = WeatherReport {
            city: city.name,
            latitude: city.latitude,
            longitude: city.longitude,
            observation: &observation,
        };

        let body = serde_json::to_vec(&report)?;
        self.output = Some(BackendOutput::ok("application/json", body));
        Ok(Progress::Done)
    }
}

impl Backend for WeatherLookup {
    fn work(&mut self) -> Result<Progress, BackendError> {
        // The phase is moved out so each step owns its data; steps that
        // stay in flight put the next phase back.
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::Resolve(location) => Ok(self.resolve(location)),
            Phase::Fetch(city) => self.fetch(city),
            Phase::Encode(city, observation) => self.encode(city, observation),
            Phase::Done => Ok(Progress::Done),
        }
    }

    fn take_output(&mut self) -> Option<BackendOutput> {
        self.output.take()
    }
}

// LOCAL PROVIDER

const CONDITIONS: [&str; 6] = ["clear", "cloudy", "rain", "snow", "fog", "windy"];

/// Deterministic local observation source with an on-disk cache.
///
/// Observations derive from a hash of the city name and the current day,
/// so repeated lookups agree within a day without any upstream traffic.
/// With a cache directory configured, fresh observations are served from
/// disk; files are replaced atomically (temp file + rename) so a crashed
/// writer can never leave a torn cache entry. Cache trouble of any kind
/// degrades to recomputation, never to a failed request.
pub struct LocalProvider {
    cache_dir: Option<PathBuf>,
    ttl: Duration,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    stored_at: u64,
    observation: Observation,
}

impl LocalProvider {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            ttl: Duration::from_secs(600),
        }
    }

    fn cache_path(&self, city: &City) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        Some(dir.join(format!("{}.json", query::fold_location(city.name))))
    }

    fn load_cached(&self, city: &City, now: u64) -> Option<Observation> {
        let path = self.cache_path(city)?;
        let raw = fs::read(&path).ok()?;
        let entry: CacheEntry = serde_json::from_slice(&raw).ok()?;

        match now.saturating_sub(entry.stored_at) <= self.ttl.as_secs() {
            true => Some(entry.observation),
            false => None,
        }
    }

    fn store_cached(&self, city: &City, observation: &Observation, now: u64) {
        let Some(path) = self.cache_path(city) else {
            return;
        };
        let Some(dir) = self.cache_dir.as_ref() else {
            return;
        };

        let entry = CacheEntry {
            stored_at: now,
            observation: observation.clone(),
        };
        let Ok(raw) = serde_json::to_vec(&entry) else {
            return;
        };

        let tmp = path.with_extension("json.tmp");
        let written = fs::create_dir_all(dir)
            .and_then(|_| fs::write(&tmp, &raw))
            .and_then(|_| fs::rename(&tmp, &path));

        if let Err(e) = written {
            log::debug!("weather cache write skipped for {}: {}", city.name, e);
        }
    }

    fn synthesize(city: &City, now: u64) -> Observation {
        let h = Self::mix(city.name, now / 86_400);

        Observation {
            temperature_c: -15.0 + (h % 400) as f64 / 10.0,
            wind_mps: ((h >> 8) % 150) as f64 / 10.0,
            humidity_pct: (30 + (h >> 16) % 70) as u8,
            condition: CONDITIONS[((h >> 24) % CONDITIONS.len() as u64) as usize].to_string(),
            observed_at: now,
        }
    }

    // FNV-1a over the name, then folded with the day number.
    fn mix(name: &str, day: u64) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in name.bytes() {
            h ^= byte as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        (h ^ day).wrapping_mul(0x0000_0100_0000_01b3)
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl WeatherProvider for LocalProvider {
    fn poll_observation(&mut self, city: &City) -> Result<Option<Observation>, ProviderError> {
        let now = Self::unix_now();

        if let Some(cached) = self.load_cached(city, now) {
            return Ok(Some(cached));
        }

        let observation = Self::synthesize(city, now);
        self.store_cached(city, &observation, now);
        Ok(Some(observation))
    }
}
