//! Chapter numbers and navigation step sizes

use crate::ChapterError;
use std::fmt;
use std::str::FromStr;

/// Chapter values are re-rounded to this many steps per unit after arithmetic
const PRECISION: f64 = 1_000_000.0;

fn round_value(value: f64) -> f64 {
    (value * PRECISION).round() / PRECISION
}

/// A non-negative, possibly fractional chapter number
///
/// Whole chapters display as integers (`12`), fractional ones as decimals
/// (`12.5`). The dash form replaces the decimal point with a hyphen for use
/// in URL paths (`12-5`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Chapter(f64);

impl Chapter {
    /// Creates a chapter, rejecting negative and non-finite values
    pub fn new(value: f64) -> Result<Self, ChapterError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ChapterError::InvalidChapter(value.to_string()));
        }
        Ok(Self(round_value(value)))
    }

    /// The numeric value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns true when the chapter has no fractional part
    pub fn is_whole(&self) -> bool {
        self.0.fract() == 0.0
    }

    /// The chapter one step further along
    pub fn advance(self, rate: ChapterRate) -> Self {
        Self(round_value(self.0 + rate.value()))
    }

    /// The chapter one step back, saturating at zero
    pub fn retreat(self, rate: ChapterRate) -> Self {
        Self(round_value((self.0 - rate.value()).max(0.0)))
    }

    /// URL path form, e.g. `1-5` for chapter 1.5
    pub fn dash(&self) -> String {
        self.to_string().replace('.', "-")
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for Chapter {
    type Err = ChapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| ChapterError::InvalidChapter(s.to_string()))?;
        Self::new(value)
    }
}

/// Step size applied by next/previous navigation; always strictly positive
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ChapterRate(f64);

impl ChapterRate {
    pub fn new(value: f64) -> Result<Self, ChapterError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ChapterError::InvalidChapter(format!(
                "chapter rate must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for ChapterRate {
    fn default() -> Self {
        Self(1.0)
    }
}

impl fmt::Display for ChapterRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
