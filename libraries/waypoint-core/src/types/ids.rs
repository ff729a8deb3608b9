/// ID types for Waypoint entities
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Tour identifier (e.g. `"rome-01"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TourId(String);

impl TourId {
    /// Create a new tour ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TourId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TourId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TourId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Stop identifier, unique within a tour
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StopId(String);

impl StopId {
    /// Create a new stop ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StopId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StopId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StopId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StopId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StopId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
