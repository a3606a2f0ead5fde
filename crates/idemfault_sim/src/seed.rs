//! Seed management for reproducible failure schedules.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Source of simulation seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedSource {
    /// From a literal value
    Literal(u64),
    /// From a string (hashed)
    FromString(String),
    /// Wall clock at creation (non-deterministic)
    Random,
}

impl SeedSource {
    /// Generate a seed value
    #[must_use]
    pub fn to_seed(&self) -> u64 {
        match self {
            SeedSource::Literal(seed) => *seed,
            SeedSource::FromString(s) => {
                let mut hasher = fnv::FnvHasher::default();
                hasher.write(s.as_bytes());
                hasher.finish()
            }
            SeedSource::Random => {
                use std::time::SystemTime;
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or_default()
            }
        }
    }
}

/// Simulation seed for reproducibility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSeed {
    /// Base seed value
    pub seed: u64,
    /// Source of the seed
    pub source: SeedSource,
    /// Namespace for derived seeds
    pub namespace: String,
}

impl SimSeed {
    /// Create a new simulation seed
    #[must_use]
    pub fn new(source: SeedSource) -> Self {
        let seed = source.to_seed();
        Self {
            seed,
            source,
            namespace: String::new(),
        }
    }

    /// Create a seed from a literal value
    #[must_use]
    pub fn from_literal(seed: u64) -> Self {
        Self::new(SeedSource::Literal(seed))
    }

    /// Create a seed from a string
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self::new(SeedSource::FromString(s))
    }

    /// Set namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = namespace;
        self
    }

    /// Derive a seed for a specific context, e.g. one iteration of a target
    #[must_use]
    pub fn derive(&self, context: &str) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write_u64(self.seed);
        hasher.write(self.namespace.as_bytes());
        hasher.write(context.as_bytes());
        let derived_seed = hasher.finish();

        Self {
            seed: derived_seed,
            source: SeedSource::Literal(derived_seed),
            namespace: self.namespace.clone(),
        }
    }

    /// Create RNG borrowing seed
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }
}

impl Default for SimSeed {
    fn default() -> Self {
        Self::new(SeedSource::Literal(42))
    }
}
