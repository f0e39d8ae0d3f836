use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::DomainError;

const INFINITY: &str = "infinity";
const DEFAULT_MAX_RESULTS: usize = 10;

/// Upper bound on the results of a similarity search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxResults {
    Limited(NonZeroUsize),
    Unbounded,
}

impl MaxResults {
    pub fn limited(n: usize) -> Result<Self, DomainError> {
        NonZeroUsize::new(n).map(Self::Limited).ok_or_else(|| {
            DomainError::configuration("The maximum number of results must be greater than 0")
        })
    }

    /// Length of a result list of `len` candidates after truncation
    pub fn cap(&self, len: usize) -> usize {
        match self {
            MaxResults::Limited(n) => len.min(n.get()),
            MaxResults::Unbounded => len,
        }
    }
}

impl Default for MaxResults {
    fn default() -> Self {
        match NonZeroUsize::new(DEFAULT_MAX_RESULTS) {
            Some(n) => Self::Limited(n),
            None => Self::Unbounded,
        }
    }
}

impl fmt::Display for MaxResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxResults::Limited(n) => write!(f, "{}", n),
            MaxResults::Unbounded => write!(f, "{}", INFINITY),
        }
    }
}

impl FromStr for MaxResults {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(INFINITY) {
            return Ok(Self::Unbounded);
        }

        let n: i64 = s.parse().map_err(|_| {
            DomainError::configuration(format!(
                "Invalid max_results '{}': expected a positive integer or '{}'",
                s, INFINITY
            ))
        })?;
        if n < 1 {
            return Err(DomainError::configuration(
                "The maximum number of results must be greater than 0",
            ));
        }

        Self::limited(n as usize)
    }
}

impl Serialize for MaxResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxResults::Limited(n) => serializer.serialize_u64(n.get() as u64),
            MaxResults::Unbounded => serializer.serialize_str(INFINITY),
        }
    }
}

impl<'de> Deserialize<'de> for MaxResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ten() {
        assert_eq!(MaxResults::default(), MaxResults::limited(10).unwrap());
    }

    #[test]
    fn test_parse() {
        assert_eq!("5".parse::<MaxResults>().unwrap(), MaxResults::limited(5).unwrap());
        assert_eq!("Infinity".parse::<MaxResults>().unwrap(), MaxResults::Unbounded);
        assert!("0".parse::<MaxResults>().is_err());
        assert!("-3".parse::<MaxResults>().is_err());
        assert!("many".parse::<MaxResults>().is_err());
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let limited: MaxResults = serde_json::from_str("3").unwrap();
        let unbounded: MaxResults = serde_json::from_str("\"INFINITY\"").unwrap();

        assert_eq!(limited, MaxResults::limited(3).unwrap());
        assert_eq!(unbounded, MaxResults::Unbounded);
        assert!(serde_json::from_str::<MaxResults>("0").is_err());
    }

    #[test]
    fn test_cap() {
        assert_eq!(MaxResults::limited(2).unwrap().cap(5), 2);
        assert_eq!(MaxResults::limited(8).unwrap().cap(5), 5);
        assert_eq!(MaxResults::Unbounded.cap(5), 5);
    }
}
