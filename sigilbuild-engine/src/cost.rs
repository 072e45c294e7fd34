//! Cost descriptor parsing.
//!
//! Catalogue content prices options with human-readable text such as
//! `"Costs 5 FP and 2 BP"` or `"Grants 3 BP"`. This module turns that text
//! into a signed [`CostRecord`]: positive amounts are costs, negative amounts
//! are grants.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg};
use std::str::FromStr;
use thiserror::Error;

use crate::constants::LOG_COST_UNRECOGNIZED;

static NO_COST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:free|variable|none|n/a|-|0)?\s*$").expect("static no-cost pattern")
});
static ALTERNATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bor\b|/").expect("static alternative pattern"));
static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?P<kw>costs?|grants?|gains?|gives?|refunds?)\b|(?P<num>[+-]?\d+)\s*(?P<cur>bp|fp)\b",
    )
    .expect("static token pattern")
});

/// The three currencies of the build economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Blessing Points
    #[default]
    Bp,
    /// Fortune Points
    Fp,
    /// Kuri Points, unlocked by the Kuri pact
    Kp,
}

impl Currency {
    pub const ALL: [Self; 3] = [Self::Bp, Self::Fp, Self::Kp];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Bp => "BP",
            Self::Fp => "FP",
            Self::Kp => "KP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bp" => Ok(Self::Bp),
            "fp" => Ok(Self::Fp),
            "kp" => Ok(Self::Kp),
            _ => Err(()),
        }
    }
}

/// Signed cost in the two descriptor currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CostRecord {
    pub fp: i64,
    pub bp: i64,
}

impl CostRecord {
    pub const ZERO: Self = Self { fp: 0, bp: 0 };

    #[must_use]
    pub const fn new(fp: i64, bp: i64) -> Self {
        Self { fp, bp }
    }

    #[must_use]
    pub const fn bp(amount: i64) -> Self {
        Self { fp: 0, bp: amount }
    }

    #[must_use]
    pub const fn fp(amount: i64) -> Self {
        Self { fp: amount, bp: 0 }
    }

    /// Amount in the given currency. Descriptors never carry KP.
    #[must_use]
    pub const fn get(self, currency: Currency) -> i64 {
        match currency {
            Currency::Bp => self.bp,
            Currency::Fp => self.fp,
            Currency::Kp => 0,
        }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.fp == 0 && self.bp == 0
    }

    #[must_use]
    pub const fn scaled(self, factor: i64) -> Self {
        Self {
            fp: self.fp.saturating_mul(factor),
            bp: self.bp.saturating_mul(factor),
        }
    }
}

impl Add for CostRecord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            fp: self.fp.saturating_add(rhs.fp),
            bp: self.bp.saturating_add(rhs.bp),
        }
    }
}

impl AddAssign for CostRecord {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Neg for CostRecord {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            fp: self.fp.saturating_neg(),
            bp: self.bp.saturating_neg(),
        }
    }
}

impl fmt::Display for CostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BP, {} FP", self.bp, self.fp)
    }
}

/// Reasons a descriptor could not be priced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CostParseError {
    #[error("unrecognized cost descriptor {0:?}")]
    Unrecognized(String),
    #[error("cost magnitude out of range in {0:?}")]
    Magnitude(String),
}

/// Parse a descriptor, rejecting text that carries no recognizable cost.
///
/// # Errors
///
/// Returns [`CostParseError::Unrecognized`] when no currency token is found and
/// the text is not a no-cost marker, or [`CostParseError::Magnitude`] when a
/// number does not fit in `i64`.
pub fn parse_strict(descriptor: &str) -> Result<CostRecord, CostParseError> {
    if NO_COST.is_match(descriptor) {
        return Ok(CostRecord::ZERO);
    }

    let primary = ALTERNATIVE
        .find(descriptor)
        .map_or(descriptor, |alt| &descriptor[..alt.start()]);

    let mut record = CostRecord::ZERO;
    let mut sign = 1_i64;
    let mut tokens = 0_usize;
    for caps in TOKEN.captures_iter(primary) {
        if let Some(keyword) = caps.name("kw") {
            let keyword = keyword.as_str().to_ascii_lowercase();
            sign = if keyword.starts_with("cost") { 1 } else { -1 };
            continue;
        }
        let (Some(num), Some(cur)) = (caps.name("num"), caps.name("cur")) else {
            continue;
        };
        let magnitude: i64 = num
            .as_str()
            .parse()
            .map_err(|_| CostParseError::Magnitude(descriptor.to_string()))?;
        let amount = magnitude.saturating_mul(sign);
        if cur.as_str().eq_ignore_ascii_case("bp") {
            record.bp = record.bp.saturating_add(amount);
        } else {
            record.fp = record.fp.saturating_add(amount);
        }
        tokens += 1;
    }

    if tokens == 0 {
        return Err(CostParseError::Unrecognized(descriptor.to_string()));
    }
    Ok(record)
}

/// Parse a descriptor leniently: unrecognized text prices as zero.
///
/// Cost text is content data and must never stop a ledger pass, so failures
/// are logged for data review instead of propagated.
#[must_use]
pub fn parse(descriptor: &str) -> CostRecord {
    parse_strict(descriptor).unwrap_or_else(|err| {
        log::warn!("{LOG_COST_UNRECOGNIZED}: {err}");
        CostRecord::ZERO
    })
}
