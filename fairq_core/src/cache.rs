//! Request-scoped exposure cache keyed by content hash.
//!
//! Keys are SHA-256 digests over the validated FAIR parameters and the
//! effectiveness-relevant fields of the associated controls, sorted by id.
//! Identical content always hits, changed content always misses; there is
//! nothing to invalidate.

use crate::effectiveness::Composition;
use crate::exposure::RiskExposure;
use crate::types::{Control, RiskParameters, TriangularEstimate};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

fn feed_f64(hasher: &mut Sha256, value: f64) {
    hasher.update(value.to_bits().to_le_bytes());
}

fn feed_optional(hasher: &mut Sha256, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            feed_f64(hasher, v);
        }
        None => hasher.update([0u8]),
    }
}

fn feed_estimate(hasher: &mut Sha256, estimate: &TriangularEstimate) {
    feed_f64(hasher, estimate.min);
    feed_f64(hasher, estimate.avg);
    feed_f64(hasher, estimate.max);
}

fn feed_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Hex content key for a parameter set and its controls
pub fn content_key(params: &RiskParameters, controls: &[Control]) -> String {
    let mut hasher = Sha256::new();

    for estimate in [
        params.contact_frequency(),
        params.probability_of_action(),
        params.threat_capability(),
        params.resistance_strength(),
        params.primary_loss_magnitude(),
    ] {
        feed_estimate(&mut hasher, &estimate);
    }
    match params.secondary_loss_magnitude() {
        Some(secondary) => {
            hasher.update([1u8]);
            feed_estimate(&mut hasher, &secondary);
        }
        None => hasher.update([0u8]),
    }

    let mut sorted: Vec<&Control> = controls.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    hasher.update((sorted.len() as u64).to_le_bytes());
    for control in sorted {
        feed_str(&mut hasher, &control.id);
        feed_str(&mut hasher, control.control_type.as_str());
        feed_str(&mut hasher, control.implementation_status.as_str());
        for coefficient in control.coefficients() {
            feed_optional(&mut hasher, coefficient);
        }
        feed_optional(&mut hasher, control.control_effectiveness);
    }

    hex::encode(hasher.finalize())
}

/// Memoizes exposure results for the lifetime of one request
#[derive(Debug, Default)]
pub struct ExposureCache {
    entries: HashMap<String, (RiskExposure, Composition)>,
    hits: usize,
    misses: usize,
}

impl ExposureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for this content, computing it on a miss
    pub fn get_or_compute<F>(
        &mut self,
        params: &RiskParameters,
        controls: &[Control],
        compute: F,
    ) -> (RiskExposure, Composition)
    where
        F: FnOnce() -> (RiskExposure, Composition),
    {
        let key = content_key(params, controls);
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            log::debug!("[CACHE] Hit {}", &key[..12]);
            return cached.clone();
        }

        self.misses += 1;
        let value = compute();
        self.entries.insert(key, value.clone());
        value
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
