//! Country list sources and the one-shot background load.
//!
//! This module provides:
//! - `CountrySource` trait for abstracting where the list comes from
//! - `HttpSource` (the public REST endpoint) and `FileSource` (local JSON)
//! - `LoadHandle`, which runs a source on a worker thread and hands the
//!   result back to the UI thread

pub mod file;
pub mod http;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::country::CountryRecord;

pub use file::FileSource;
pub use http::HttpSource;

/// Anything that goes wrong while obtaining the country list.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed country list from {origin}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not start the fetch worker")]
    Spawn(#[source] io::Error),
    #[error("fetch worker exited without a result")]
    WorkerLost,
}

pub type LoadOutcome = Result<Vec<CountryRecord>, FetchFailure>;

/// Trait for country list providers
pub trait CountrySource: Send {
    /// Human readable origin (URL or path) for logs
    fn describe(&self) -> String;

    /// Read and decode the complete list
    fn load_all(&self) -> LoadOutcome;
}

/// Decode a response body as a JSON array of country records.
pub fn decode_countries(origin: &str, body: &[u8]) -> LoadOutcome {
    serde_json::from_slice(body).map_err(|source| FetchFailure::Decode {
        origin: origin.to_string(),
        source,
    })
}

/// Receiving end of a background load.
///
/// Dropping the handle closes the channel; a result that arrives afterwards
/// is discarded by the worker instead of being applied.
pub struct LoadHandle {
    receiver: Receiver<LoadOutcome>,
}

impl LoadHandle {
    pub fn spawn(source: Box<dyn CountrySource>) -> Self {
        let (handle, _worker) = Self::spawn_worker(source);
        handle
    }

    /// Returns the handle and the worker's join handle. The worker yields
    /// `true` when its result was delivered.
    fn spawn_worker(source: Box<dyn CountrySource>) -> (Self, Option<JoinHandle<bool>>) {
        let (sender, receiver) = mpsc::channel();
        let worker_sender = sender.clone();

        let spawned = thread::Builder::new()
            .name("country-fetch".to_string())
            .spawn(move || {
                let origin = source.describe();
                tracing::info!(%origin, "fetching country list");
                let outcome = source.load_all();
                match worker_sender.send(outcome) {
                    Ok(()) => true,
                    Err(_) => {
                        tracing::debug!(%origin, "viewer closed before the country list arrived; discarding");
                        false
                    }
                }
            });

        match spawned {
            Ok(worker) => (Self { receiver }, Some(worker)),
            Err(err) => {
                // Receiver is still alive here, so this cannot fail.
                let _ = sender.send(Err(FetchFailure::Spawn(err)));
                (Self { receiver }, None)
            }
        }
    }

    /// Non-blocking check for the result. The worker sends exactly once, so
    /// callers drop the handle after the first `Some`.
    pub fn try_take(&self) -> Option<LoadOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FetchFailure::WorkerLost)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    pub(crate) const SAMPLE: &str = r#"[
        {"name": {"common": "Uzbekistan"}, "flags": {"png": "https://flagcdn.com/w320/uz.png"},
         "region": "Asia", "population": 34000000, "area": 447400, "capital": ["Tashkent"]},
        {"name": {"common": "France"}, "flags": {"png": "https://flagcdn.com/w320/fr.png"},
         "region": "Europe", "population": 67391582, "area": 551695},
        {"name": {"common": "Brazil"}, "flags": {"png": "https://flagcdn.com/w320/br.png"},
         "region": "Americas", "population": 212559409, "area": 8515767}
    ]"#;

    /// Source that returns a canned outcome.
    pub(crate) struct StaticSource {
        body: Option<String>,
    }

    impl StaticSource {
        pub(crate) fn ok(body: &str) -> Self {
            Self { body: Some(body.to_string()) }
        }

        pub(crate) fn failing() -> Self {
            Self { body: None }
        }
    }

    impl CountrySource for StaticSource {
        fn describe(&self) -> String {
            "static".to_string()
        }

        fn load_all(&self) -> LoadOutcome {
            match &self.body {
                Some(body) => decode_countries("static", body.as_bytes()),
                None => Err(FetchFailure::Io {
                    path: PathBuf::from("/unreachable"),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "simulated network error"),
                }),
            }
        }
    }

    /// Source that blocks until the test releases it.
    struct GatedSource {
        gate: Receiver<()>,
    }

    impl CountrySource for GatedSource {
        fn describe(&self) -> String {
            "gated".to_string()
        }

        fn load_all(&self) -> LoadOutcome {
            let _ = self.gate.recv();
            decode_countries("gated", SAMPLE.as_bytes())
        }
    }

    pub(crate) fn wait_for(handle: &LoadHandle) -> LoadOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = handle.try_take() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "load did not finish in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_decode_sample() {
        let countries = decode_countries("sample", SAMPLE.as_bytes()).unwrap();
        assert_eq!(countries.len(), 3);
        assert_eq!(countries[0].common_name(), "Uzbekistan");
        assert_eq!(countries[2].population, 212_559_409);
    }

    #[test]
    fn test_decode_malformed_body() {
        let err = decode_countries("sample", b"{\"status\": 404}").unwrap_err();
        assert!(matches!(err, FetchFailure::Decode { .. }));
        assert!(err.to_string().contains("sample"));

        let err = decode_countries("sample", b"<html>").unwrap_err();
        assert!(matches!(err, FetchFailure::Decode { .. }));
    }

    #[test]
    fn test_background_load_delivers_result() {
        let handle = LoadHandle::spawn(Box::new(StaticSource::ok(SAMPLE)));
        let countries = wait_for(&handle).unwrap();
        assert_eq!(countries.len(), 3);
    }

    #[test]
    fn test_background_load_reports_failure() {
        let handle = LoadHandle::spawn(Box::new(StaticSource::failing()));
        assert!(wait_for(&handle).is_err());
    }

    #[test]
    fn test_result_after_drop_is_discarded() {
        let (release, gate) = mpsc::channel();
        let source = GatedSource { gate };
        let (handle, worker) = LoadHandle::spawn_worker(Box::new(source));
        drop(handle);
        release.send(()).unwrap();

        let delivered = worker.unwrap().join().unwrap();
        assert!(!delivered);
    }
}
