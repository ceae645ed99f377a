use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("limit {0:?} has no digits")]
    MissingValue(String),
    #[error("limit value {0:?} is out of range")]
    InvalidValue(String),
    #[error("unsupported unit {0:?}, expected one of kb, mb, gb, s, m, h")]
    UnsupportedUnit(String),
    #[error("limit {value}{unit} overflows its base unit")]
    Overflow { value: u64, unit: Unit },
}

/// What a quota counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Cumulative bytes of forwarded packets.
    Data,
    /// Cumulative seconds of connection time.
    Time,
}

impl LimitKind {
    /// Name of the base unit, as shown in status lines.
    pub const fn base_unit(self) -> &'static str {
        match self {
            Self::Data => "bytes",
            Self::Time => "sec",
        }
    }
}

/// Units accepted in a rule-set file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Kilobytes,
    Megabytes,
    Gigabytes,
    Seconds,
    Minutes,
    Hours,
}

impl Unit {
    /// Number of base units (bytes or seconds) in one of this unit.
    pub const fn multiplier(self) -> u64 {
        match self {
            Self::Kilobytes => 1024,
            Self::Megabytes => 1024 * 1024,
            Self::Gigabytes => 1024 * 1024 * 1024,
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
        }
    }

    pub const fn kind(self) -> LimitKind {
        match self {
            Self::Kilobytes | Self::Megabytes | Self::Gigabytes => LimitKind::Data,
            Self::Seconds | Self::Minutes | Self::Hours => LimitKind::Time,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kilobytes => "kb",
            Self::Megabytes => "mb",
            Self::Gigabytes => "gb",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
        }
    }
}

impl FromStr for Unit {
    type Err = LimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kb" => Ok(Self::Kilobytes),
            "mb" => Ok(Self::Megabytes),
            "gb" => Ok(Self::Gigabytes),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            other => Err(LimitError::UnsupportedUnit(other.to_owned())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quota ceiling as written in the rule set, e.g. `100mb` or `30m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    value: u64,
    unit: Unit,
    base: u64,
}

impl Limit {
    /// Parses a limit token. Digits and letters are collected into two separate sequences,
    /// so `1m0b` reads the same as `10mb`. Any other character is ignored.
    pub fn parse(s: &str) -> Result<Self, LimitError> {
        let mut digits = String::new();
        let mut letters = String::new();
        for c in s.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
            } else if c.is_ascii_alphabetic() {
                letters.push(c);
            }
        }

        if digits.is_empty() {
            return Err(LimitError::MissingValue(s.to_owned()));
        }
        let value: u64 = digits.parse().map_err(|_| LimitError::InvalidValue(digits.clone()))?;
        let unit: Unit = letters.parse()?;
        let base =
            value.checked_mul(unit.multiplier()).ok_or(LimitError::Overflow { value, unit })?;

        Ok(Self { value, unit, base })
    }

    /// The number as written.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub const fn unit(&self) -> Unit {
        self.unit
    }

    #[inline]
    pub const fn kind(&self) -> LimitKind {
        self.unit.kind()
    }

    /// The ceiling in bytes or seconds.
    #[inline]
    pub const fn base(&self) -> u64 {
        self.base
    }
}

impl FromStr for Limit {
    type Err = LimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}
