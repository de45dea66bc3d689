//! The compiled-in city catalogue and its listing backend.

use crate::{
    backend::backend::{Backend, BackendOutput, Progress},
    errors::BackendError,
    http::query,
};
use serde::Serialize;

/// One catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct City {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

#[rustfmt::skip]
pub(crate) const CATALOGUE: [City; 24] = [
    City { name: "Stockholm",   latitude: 59.3293, longitude: 18.0686 },
    City { name: "Göteborg",    latitude: 57.7089, longitude: 11.9746 },
    City { name: "Malmö",       latitude: 55.6050, longitude: 13.0038 },
    City { name: "Uppsala",     latitude: 59.8586, longitude: 17.6389 },
    City { name: "Västerås",    latitude: 59.6099, longitude: 16.5448 },
    City { name: "Örebro",      latitude: 59.2753, longitude: 15.2134 },
    City { name: "Linköping",   latitude: 58.4108, longitude: 15.6214 },
    City { name: "Helsingborg", latitude: 56.0465, longitude: 12.6945 },
    City { name: "Jönköping",   latitude: 57.7826, longitude: 14.1618 },
    City { name: "Norrköping",  latitude: 58.5877, longitude: 16.1924 },
    City { name: "Lund",        latitude: 55.7047, longitude: 13.1910 },
    City { name: "Umeå",        latitude: 63.8258, longitude: 20.2630 },
    City { name: "Gävle",       latitude: 60.6749, longitude: 17.1413 },
    City { name: "Borås",       latitude: 57.7210, longitude: 12.9401 },
    City { name: "Södertälje",  latitude: 59.1955, longitude: 17.6253 },
    City { name: "Eskilstuna",  latitude: 59.3666, longitude: 16.5077 },
    City { name: "Halmstad",    latitude: 56.6745, longitude: 12.8570 },
    City { name: "Växjö",       latitude: 56.8777, longitude: 14.8091 },
    City { name: "Karlstad",    latitude: 59.4022, longitude: 13.5115 },
    City { name: "Sundsvall",   latitude: 62.3908, longitude: 17.3069 },
    City { name: "Östersund",   latitude: 63.1792, longitude: 14.6357 },
    City { name: "Luleå",       latitude: 65.5848, longitude: 22.1567 },
    City { name: "Kiruna",      latitude: 67.8558, longitude: 20.2253 },
    City { name: "Visby",       latitude: 57.6348, longitude: 18.2948 },
];

/// Exact lookup by folded name (see [`query::fold_location`]).
pub(crate) fn find(folded_name: &str) -> Option<City> {
    CATALOGUE
        .iter()
        .find(|city| query::fold_location(city.name) == folded_name)
        .copied()
}

/// Closest catalogue entry to the given coordinates.
///
/// Squared euclidean distance over raw degrees; the catalogue covers one
/// country, so great-circle precision buys nothing here.
pub(crate) fn nearest(latitude: f64, longitude: f64) -> City {
    let mut best = CATALOGUE[0];
    let mut best_dist = f64::INFINITY;

    for city in CATALOGUE {
        let dlat = city.latitude - latitude;
        let dlon = city.longitude - longitude;
        let dist = dlat * dlat + dlon * dlon;

        if dist < best_dist {
            best = city;
            best_dist = dist;
        }
    }

    best
}

/// Backend serving the whole catalogue as a JSON array.
#[derive(Debug)]
pub(crate) struct CityListing {
    phase: Phase,
    output: Option<BackendOutput>,
}

#[derive(Debug, PartialEq)]
enum Phase {
    Init,
    Done,
}

impl CityListing {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Init,
            output: None,
        }
    }
}

impl Backend for CityListing {
    fn work(&mut self) -> Result<Progress, BackendError> {
        if self.phase == Phase::Init {
            let body = serde_json::to_vec(&CATALOGUE[..])?;
            self.output = Some(BackendOutput::ok("application/json", body));
            self.phase = Phase::Done;
        }

        Ok(Progress::Done)
    }

    fn take_output(&mut self) -> Option<BackendOutput> {
        self.output.take()
    }
}
