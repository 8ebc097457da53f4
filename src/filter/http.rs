use crate::error::FilterParseError;

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// 1) status class digit for `4+`, 2) exact three digit code
static HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:([1-5])\+|([1-5][0-9]{2}))\s*$").expect("http status regex")
});

/// `404` matches one code, `4+` matches 400..=499.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpStatusFilter {
    Exact(u16),
    Class(u8),
}

impl HttpStatusFilter {
    /// Flows without an HTTP status never match.
    pub fn matches(&self, status: Option<u16>) -> bool {
        let Some(code) = status else {
            return false;
        };
        match *self {
            HttpStatusFilter::Exact(want) => code == want,
            HttpStatusFilter::Class(class) => code / 100 == u16::from(class),
        }
    }
}

impl FromStr for HttpStatusFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FilterParseError::HttpStatus(s.to_string());
        let caps = HTTP_STATUS.captures(s).ok_or_else(bad)?;

        if let Some(class) = caps.get(1) {
            return class
                .as_str()
                .parse::<u8>()
                .map(HttpStatusFilter::Class)
                .map_err(|_| bad());
        }
        caps.get(2)
            .ok_or_else(bad)?
            .as_str()
            .parse::<u16>()
            .map(HttpStatusFilter::Exact)
            .map_err(|_| bad())
    }
}

impl fmt::Display for HttpStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpStatusFilter::Exact(code) => write!(f, "{code}"),
            HttpStatusFilter::Class(class) => write!(f, "{class}+"),
        }
    }
}

impl Serialize for HttpStatusFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
