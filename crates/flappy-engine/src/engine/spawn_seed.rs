use std::{fmt, str::FromStr};

use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seed for the obstacle course.
///
/// This is a 128-bit seed for the generator that picks gap centers. Two
/// simulators reset with the same seed spawn the same obstacle sequence, which
/// keeps fitness comparable between genomes of one generation and makes runs
/// reproducible.
///
/// Seeds are written as 32-character lowercase hex strings.
///
/// # Example
///
/// ```
/// use flappy_engine::SpawnSeed;
/// use rand::Rng as _;
///
/// let seed: SpawnSeed = rand::rng().random();
/// let parsed: SpawnSeed = seed.to_string().parse().unwrap();
/// assert_eq!(seed, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpawnSeed([u8; 16]);

impl SpawnSeed {
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub const fn as_u128(self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    pub(crate) const fn bytes(self) -> [u8; 16] {
        self.0
    }
}

impl fmt::Display for SpawnSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.as_u128())
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("invalid spawn seed {input:?}: {reason}")]
pub struct ParseSpawnSeedError {
    input: String,
    reason: String,
}

impl FromStr for SpawnSeed {
    type Err = ParseSpawnSeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(ParseSpawnSeedError {
                input: s.to_owned(),
                reason: format!("expected 32 hex characters, got {}", s.len()),
            });
        }
        let num = u128::from_str_radix(s, 16).map_err(|e| ParseSpawnSeedError {
            input: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_u128(num))
    }
}

impl Serialize for SpawnSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpawnSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        hex_str.parse().map_err(serde::de::Error::custom)
    }
}

/// Allows generating random `SpawnSeed` values with `rng.random()`.
impl Distribution<SpawnSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SpawnSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        SpawnSeed(seed)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng as _;

    use super::*;

    #[test]
    fn test_roundtrip_random_seed() {
        let seed: SpawnSeed = rand::rng().random();
        let serialized = serde_json::to_string(&seed).unwrap();
        let deserialized: SpawnSeed = serde_json::from_str(&serialized).unwrap();
        assert_eq!(seed, deserialized);
    }

    #[test]
    fn test_known_value_sequential_bytes() {
        let seed = SpawnSeed([
            0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54,
            0x32, 0x10,
        ]);
        let serialized = serde_json::to_string(&seed).unwrap();
        assert_eq!(serialized, "\"0123456789abcdeffedcba9876543210\"");
    }

    #[test]
    fn test_from_u128_is_zero_padded() {
        assert_eq!(
            SpawnSeed::from_u128(42).to_string(),
            "0000000000000000000000000000002a"
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = "abc".parse::<SpawnSeed>().unwrap_err();
        assert!(err.to_string().contains("expected 32 hex characters"));
    }

    #[test]
    fn test_rejects_non_hex() {
        assert!("zz000000000000000000000000000000".parse::<SpawnSeed>().is_err());
        assert!(serde_json::from_str::<SpawnSeed>("\"zz000000000000000000000000000000\"").is_err());
    }
}
