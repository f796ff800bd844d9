//! Runtime: live, externally adjustable integer settings.
//!
//! # Responsibilities
//! - Resolve runtime keys to integers with a configured fallback
//! - Evaluate fractional feature gates against a caller-supplied draw
//! - Supply random draws for callers that have none
//!
//! # Design Decisions
//! - Overrides live in a concurrent map; readers never block writers
//! - Values are re-read on every call (no snapshot caching)

use std::collections::HashMap;

use dashmap::DashMap;
use rand::Rng;

/// Source of runtime values consulted by route matching.
pub trait Loader: Send + Sync {
    /// Integer value of `key`, or `default` when unset.
    fn get_integer(&self, key: &str, default: u64) -> u64;

    /// True if `random_value % denominator` falls below the live numerator.
    fn feature_enabled(&self, key: &str, default: u64, random_value: u64, denominator: u64) -> bool {
        if denominator == 0 {
            return false;
        }
        random_value % denominator < self.get_integer(key, default)
    }

    /// A fresh random draw.
    fn random(&self) -> u64;
}

/// In-process runtime backed by a map of overrides.
#[derive(Debug, Default)]
pub struct RuntimeLoader {
    overrides: DashMap<String, u64>,
}

impl RuntimeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the loader with initial overrides.
    pub fn with_overrides(overrides: &HashMap<String, u64>) -> Self {
        let loader = Self::new();
        for (key, value) in overrides {
            loader.overrides.insert(key.clone(), *value);
        }
        loader
    }

    /// Set or replace an override.
    pub fn set(&self, key: impl Into<String>, value: u64) {
        let key = key.into();
        tracing::debug!(key = %key, value, "Runtime override updated");
        self.overrides.insert(key, value);
    }

    /// Drop an override, restoring the caller default.
    pub fn clear(&self, key: &str) {
        self.overrides.remove(key);
    }
}

impl Loader for RuntimeLoader {
    fn get_integer(&self, key: &str, default: u64) -> u64 {
        self.overrides.get(key).map(|v| *v).unwrap_or(default)
    }

    fn random(&self) -> u64 {
        rand::thread_rng().gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_falls_back_to_default() {
        let runtime = RuntimeLoader::new();
        assert_eq!(runtime.get_integer("routing.weight", 30), 30);

        runtime.set("routing.weight", 70);
        assert_eq!(runtime.get_integer("routing.weight", 30), 70);

        runtime.clear("routing.weight");
        assert_eq!(runtime.get_integer("routing.weight", 30), 30);
    }

    #[test]
    fn test_feature_enabled() {
        let runtime = RuntimeLoader::new();
        // 42 % 100 = 42 < 50
        assert!(runtime.feature_enabled("gate", 50, 42, 100));
        // 142 % 100 = 42 >= 40
        assert!(!runtime.feature_enabled("gate", 40, 142, 100));

        runtime.set("gate", 0);
        assert!(!runtime.feature_enabled("gate", 50, 0, 100));
        assert!(!runtime.feature_enabled("gate", 50, 1, 0));
    }
}
