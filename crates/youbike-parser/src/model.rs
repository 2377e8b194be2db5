use std::fmt;
use std::str::FromStr;

use crate::errors::CoordinateError;

/// Decimal places kept for every coordinate.
pub const COORDINATE_DECIMALS: usize = 6;
const MICRO: i64 = 1_000_000;
// Keeps `int * MICRO` far away from i64 overflow.
const MAX_INTEGER_DIGITS: usize = 12;

/// Station generation as published in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StationType {
    YouBike1,
    YouBike2,
}

impl StationType {
    pub const ALL: [StationType; 2] = [StationType::YouBike1, StationType::YouBike2];

    pub fn code(self) -> u8 {
        match self {
            StationType::YouBike1 => 1,
            StationType::YouBike2 => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StationType::YouBike1),
            2 => Some(StationType::YouBike2),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StationType::YouBike1 => "YouBike 1.0",
            StationType::YouBike2 => "YouBike 2.0",
        }
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for StationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u8 = s
            .trim()
            .parse()
            .map_err(|_| "is not a station type code".to_string())?;
        StationType::from_code(code).ok_or_else(|| format!("unknown station type {code}"))
    }
}

/// Decimal degrees held as whole micro-degrees, i.e. already rounded to six
/// decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    micro_degrees: i64,
}

impl Coordinate {
    pub fn from_micro_degrees(micro_degrees: i64) -> Self {
        Self { micro_degrees }
    }

    pub fn micro_degrees(self) -> i64 {
        self.micro_degrees
    }

    pub fn degrees(self) -> f64 {
        self.micro_degrees as f64 / MICRO as f64
    }
}

impl fmt::Display for Coordinate {
    /// Shortest form: `121.5` rather than `121.500000`, `25` rather than `25.0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.micro_degrees < 0 { "-" } else { "" };
        let magnitude = self.micro_degrees.unsigned_abs();
        let whole = magnitude / MICRO as u64;
        let fraction = magnitude % MICRO as u64;
        if fraction == 0 {
            return write!(f, "{sign}{whole}");
        }
        let digits = format!("{fraction:0width$}", width = COORDINATE_DECIMALS);
        write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    /// Rounds the decimal text half-to-even at the sixth decimal place.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(CoordinateError::Empty);
        }

        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        let plain_decimal = !(integer.is_empty() && fraction.is_empty())
            && integer.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());

        if !plain_decimal {
            // Exponent forms and the like go through f64; `{:.6}` yields plain decimal text.
            let value: f64 = text
                .parse()
                .map_err(|_| CoordinateError::NotANumber(text.to_string()))?;
            if !value.is_finite() {
                return Err(CoordinateError::NotANumber(text.to_string()));
            }
            return format!("{value:.prec$}", prec = COORDINATE_DECIMALS).parse();
        }

        let integer = integer.trim_start_matches('0');
        if integer.len() > MAX_INTEGER_DIGITS {
            return Err(CoordinateError::OutOfRange(text.to_string()));
        }
        let whole: i64 = if integer.is_empty() {
            0
        } else {
            integer
                .parse()
                .map_err(|_| CoordinateError::OutOfRange(text.to_string()))?
        };

        let split = fraction.len().min(COORDINATE_DECIMALS);
        let (kept, rest) = fraction.split_at(split);
        let mut micro: i64 = format!("{kept:0<width$}", width = COORDINATE_DECIMALS)
            .parse()
            .map_err(|_| CoordinateError::NotANumber(text.to_string()))?;

        let mut rest_digits = rest.bytes();
        let round_up = match rest_digits.next() {
            Some(b'6'..=b'9') => true,
            Some(b'5') => rest_digits.any(|b| b != b'0') || micro % 2 == 1,
            _ => false,
        };
        if round_up {
            micro += 1;
        }

        let magnitude = whole * MICRO + micro;
        Ok(Coordinate::from_micro_degrees(if negative {
            -magnitude
        } else {
            magnitude
        }))
    }
}

/// One row of the station dataset with every field already converted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationRecord {
    pub name: String,
    pub city: String,
    pub area: String,
    pub address: String,
    pub space: u32,
    pub station_type: StationType,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
}
