use std::fmt;
use std::str::FromStr;

/// A constant digital-output state held for a fixed time.
///
/// `mask` carries one bit per output line, least-significant line first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRun {
    pub mask: u64,
    pub duration: f64,
}

impl LevelRun {
    pub fn new(mask: u64, duration: f64) -> Self {
        Self { mask, duration }
    }

    /// Number of samples this run occupies at `sample_rate`.
    ///
    /// Ties round to even, so `2.5` samples become `2`.
    pub fn sample_count(&self, sample_rate: f64) -> f64 {
        (self.duration * sample_rate).round_ties_even()
    }
}

impl From<(u64, f64)> for LevelRun {
    fn from((mask, duration): (u64, f64)) -> Self {
        Self::new(mask, duration)
    }
}

impl fmt::Display for LevelRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}:{}", self.mask, self.duration)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseLevelRunError {
    #[error("Expected MASK:SECONDS but got '{0}'")]
    MissingSeparator(String),

    #[error("Invalid level mask '{0}'")]
    InvalidMask(String),

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),
}

fn parse_mask(text: &str) -> Result<u64, ParseLevelRunError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();

    let parsed = if let Some(bits) = lower.strip_prefix("0b") {
        u64::from_str_radix(bits, 2)
    } else if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u64::from_str_radix(oct, 8)
    } else {
        lower.parse()
    };

    parsed.map_err(|_| ParseLevelRunError::InvalidMask(text.to_string()))
}

impl FromStr for LevelRun {
    type Err = ParseLevelRunError;

    /// Parses `MASK:SECONDS`, e.g. `0b10:3` or `0xff:2.5e-6`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (mask, duration) = s
            .split_once(':')
            .ok_or_else(|| ParseLevelRunError::MissingSeparator(s.to_string()))?;

        let mask = parse_mask(mask)?;
        let duration: f64 = duration
            .trim()
            .parse()
            .map_err(|_| ParseLevelRunError::InvalidDuration(duration.to_string()))?;

        Ok(Self::new(mask, duration))
    }
}
