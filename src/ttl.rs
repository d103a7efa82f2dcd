//! TTL values given either as whole seconds or as duration strings
//! (`"90"`, `"15m"`, `"2h"`).

use serde::{Deserialize, Deserializer};

use crate::config::humantime_serde;
use crate::{Error, Result};

/// Parse a TTL into seconds.
pub fn parse(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    let duration = humantime_serde::parse(raw)
        .map_err(|e| Error::InvalidRequest(format!("invalid ttl: {e}")))?;
    if duration.subsec_nanos() != 0 {
        return Err(Error::InvalidRequest(format!(
            "invalid ttl '{raw}': must be whole seconds"
        )));
    }
    Ok(duration.as_secs())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTtl {
    Secs(u64),
    Text(String),
}

impl RawTtl {
    fn seconds<E: serde::de::Error>(self) -> std::result::Result<u64, E> {
        match self {
            Self::Secs(secs) => Ok(secs),
            Self::Text(text) => parse(&text).map_err(E::custom),
        }
    }
}

/// `deserialize_with` for `u64` TTL fields.
pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    RawTtl::deserialize(d)?.seconds()
}

/// `deserialize_with` for `Option<u64>` TTL fields.
pub fn deserialize_opt<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<u64>, D::Error> {
    Option::<RawTtl>::deserialize(d)?
        .map(RawTtl::seconds)
        .transpose()
}
