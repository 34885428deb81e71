//! A newtype that redacts the elevation secret in `Debug` and `Display`
//! output.
//!
//! The sudo password travels from the prompt through the detector into the
//! drivers that need it; wrapping it in [`Secret`] keeps it out of logs and
//! error chains. Call [`Secret::expose`] when the raw value is actually
//! needed (to pipe it into `sudo -S`). The value only ever lives in memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A wrapper around `String` that prints `***` instead of its content.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new `Secret` from a `String`.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Return the inner value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the wrapped value is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl FromStr for Secret {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn redact_debug_output() {
        let s = Secret::new("hunter2".into());
        assert_eq!(format!("{:?}", s), "Secret(***)");
    }

    #[test]
    fn redact_display_output() {
        let s = Secret::new("hunter2".into());
        assert_eq!(format!("{}", s), "***");
    }

    #[test]
    fn expose_inner_value() {
        let s = Secret::new("hunter2".into());
        assert_eq!(s.expose(), "hunter2");
        assert!(!s.is_empty());
    }

    #[test]
    fn parse_from_str() {
        let s: Secret = "swordfish".parse().unwrap();
        assert_eq!(s.expose(), "swordfish");
    }
}
