//! Simulated fragment and key loaders.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cuetide_core::config::SimulationConfig;
use cuetide_core::error::{KeyError, LoadError};
use cuetide_core::media::{DecryptKey, Fragment};
use cuetide_core::traits::{FragmentLoader, KeyLoader};
use parking_lot::Mutex;

use crate::rng::DeterministicRng;

/// Seconds of subtitle text covered by each generated cue.
const CUE_SPACING: f64 = 2.0;

const SUPPORTED_METHODS: &[&str] = &["AES-128", "SAMPLE-AES"];

/// Fragment loader producing WebVTT payloads with simulated latency and
/// seeded failures.
#[derive(Debug)]
pub struct SimulatedFragmentLoader {
    rng: Mutex<DeterministicRng>,
    latency: Duration,
    failure_rate: f64,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl SimulatedFragmentLoader {
    pub fn new(config: &SimulationConfig, rng: DeterministicRng) -> Arc<Self> {
        Arc::new(Self {
            rng: Mutex::new(rng),
            latency: Duration::from_millis(config.network_latency_ms),
            failure_rate: config.load_failure_rate,
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Latency with up to 50% jitter, and whether this request fails.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock();
        let base = self.latency.as_millis() as u64;
        let jitter = rng.random_range(0, base / 2 + 1);
        let fails = rng.random_bool(self.failure_rate);
        (Duration::from_millis(base + jitter), fails)
    }
}

#[async_trait]
impl FragmentLoader for SimulatedFragmentLoader {
    async fn load(&self, fragment: &Fragment) -> Result<Bytes, LoadError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let (latency, fails) = self.roll();
        tokio::time::sleep(latency).await;

        if fails {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %fragment.url, "Simulated fragment load failure");
            return Err(LoadError::Network {
                url: fragment.url.clone(),
                reason: "simulated connection reset".to_string(),
            });
        }

        Ok(Bytes::from(webvtt_payload(fragment)))
    }
}

/// Generates a WebVTT document with one cue per `CUE_SPACING` seconds.
pub fn webvtt_payload(fragment: &Fragment) -> String {
    let mut body = String::from("WEBVTT\n");
    let mut cue_start = fragment.start;
    let mut index = 0;
    while cue_start < fragment.end() {
        let cue_end = (cue_start + CUE_SPACING).min(fragment.end());
        let _ = write!(
            body,
            "\n{}-{}\n{} --> {}\nTrack {} line {}\n",
            fragment.sn,
            index,
            timestamp(cue_start),
            timestamp(cue_end),
            fragment.track,
            index
        );
        cue_start = cue_end;
        index += 1;
    }
    body
}

fn timestamp(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1000 % 60,
        millis % 1000
    )
}

/// Key loader returning a stable random key per key URI.
#[derive(Debug)]
pub struct SimulatedKeyLoader {
    rng: Mutex<DeterministicRng>,
    latency: Duration,
    failure_rate: f64,
    keys: Mutex<HashMap<String, Bytes>>,
    requests: AtomicU64,
}

impl SimulatedKeyLoader {
    pub fn new(config: &SimulationConfig, rng: DeterministicRng) -> Arc<Self> {
        Arc::new(Self {
            rng: Mutex::new(rng),
            latency: Duration::from_millis(config.network_latency_ms),
            failure_rate: config.key_failure_rate,
            keys: Mutex::new(HashMap::new()),
            requests: AtomicU64::new(0),
        })
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KeyLoader for SimulatedKeyLoader {
    async fn load_key(&self, fragment: &Fragment) -> Result<DecryptKey, KeyError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let Some(decrypt) = &fragment.decrypt else {
            return Err(KeyError::Unavailable {
                uri: String::new(),
                reason: format!("fragment {} is not encrypted", fragment.sn),
            });
        };
        if !SUPPORTED_METHODS.contains(&decrypt.method.as_str()) {
            return Err(KeyError::UnsupportedMethod {
                method: decrypt.method.clone(),
            });
        }

        tokio::time::sleep(self.latency).await;

        let key = {
            let mut rng = self.rng.lock();
            if rng.random_bool(self.failure_rate) {
                return Err(KeyError::Unavailable {
                    uri: decrypt.uri.clone(),
                    reason: "simulated key server error".to_string(),
                });
            }
            self.keys
                .lock()
                .entry(decrypt.uri.clone())
                .or_insert_with(|| {
                    let mut key = [0u8; 16];
                    rng.fill_bytes(&mut key);
                    Bytes::copy_from_slice(&key)
                })
                .clone()
        };

        Ok(DecryptKey {
            uri: decrypt.uri.clone(),
            key,
            iv: decrypt.iv,
        })
    }
}
