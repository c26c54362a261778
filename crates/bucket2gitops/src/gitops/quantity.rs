//! Kubernetes storage quantities (`10Gi`, `500M`, `1073741824`).
//!
//! Scaling keeps the suffix family of the input: binary stays binary and
//! decimal stays decimal, using the largest suffix that divides the result
//! exactly.

use std::str::FromStr;

const BINARY: &[(&str, u128)] = &[
    ("Ei", 1 << 60),
    ("Pi", 1 << 50),
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

const DECIMAL: &[(&str, u128)] = &[
    ("E", 1_000_000_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Binary,
    Decimal,
}

/// A byte quantity rounded to whole bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    bytes: u128,
    family: Family,
}

impl Quantity {
    pub fn bytes(&self) -> u128 {
        self.bytes
    }

    /// Multiplies by `factor`, rounding to the nearest byte.
    pub fn scale(&self, factor: f64) -> Quantity {
        let scaled = (self.bytes as f64 * factor).round();
        let bytes = if scaled.is_finite() && scaled > 0.0 {
            scaled as u128
        } else {
            0
        };
        Quantity {
            bytes,
            family: self.family,
        }
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        if number.is_empty() {
            return Err(format!("Invalid quantity: '{}'", s));
        }

        let (multiplier, family) = if suffix.is_empty() {
            (1, Family::Decimal)
        } else if let Some((_, m)) = BINARY.iter().find(|(name, _)| *name == suffix) {
            (*m, Family::Binary)
        } else if let Some((_, m)) = DECIMAL.iter().find(|(name, _)| *name == suffix) {
            (*m, Family::Decimal)
        } else {
            return Err(format!("Unsupported quantity suffix in '{}'", s));
        };

        let bytes = match number.split_once('.') {
            None => number
                .parse::<u128>()
                .ok()
                .and_then(|n| n.checked_mul(multiplier)),
            Some(_) => number
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| (n * multiplier as f64).round() as u128),
        }
        .ok_or_else(|| format!("Invalid quantity: '{}'", s))?;

        Ok(Quantity { bytes, family })
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = match self.family {
            Family::Binary => BINARY,
            Family::Decimal => DECIMAL,
        };
        if self.bytes > 0 {
            if let Some((suffix, size)) = table.iter().find(|(_, size)| self.bytes % size == 0) {
                return write!(f, "{}{}", self.bytes / size, suffix);
            }
        }
        write!(f, "{}", self.bytes)
    }
}
