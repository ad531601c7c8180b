//! Fixed-point grain arithmetic
//!
//! A [`Grain`] is a signed count of attograin (10^-18 grain). Values are kept
//! as `i128`, which bounds amounts at roughly 1.7 × 10^20 whole grain; every
//! ledger mutation goes through the checked operations so an overflow is an
//! error rather than a wrap.
//!
//! At rest (JSON) a grain value is a decimal-integer string of attograin,
//! e.g. `"1000000000000000000"` for one grain.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

/// Number of decimal places in one grain
pub const DECIMAL_PRECISION: u32 = 18;

/// One whole grain, in attograin
pub const ONE: Grain = Grain(1_000_000_000_000_000_000);

/// Zero grain
pub const ZERO: Grain = Grain(0);

/// Token amount in attograin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grain(i128);

impl Grain {
    /// Construct from a raw attograin count
    pub const fn from_attos(attos: i128) -> Self {
        Self(attos)
    }

    /// Raw attograin count
    pub const fn attos(self) -> i128 {
        self.0
    }

    /// Construct from an integer count of attograin
    pub fn from_integer(n: i64) -> Self {
        Self(i128::from(n))
    }

    /// Whole-grain decimal string (e.g. `"1.5"`) to grain.
    ///
    /// At most [`DECIMAL_PRECISION`] fractional digits are accepted.
    pub fn from_float_string(s: &str) -> Result<Self> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, fraction) = match body.split_once('.') {
            Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
            Some(_) => return Err(Error::Grain(format!("invalid float string: {s:?}"))),
            None => (body, ""),
        };
        if !is_digits(whole) || !(fraction.is_empty() || is_digits(fraction)) {
            return Err(Error::Grain(format!("invalid float string: {s:?}")));
        }
        if fraction.len() > DECIMAL_PRECISION as usize {
            return Err(Error::Grain(format!(
                "{s:?} has more than {DECIMAL_PRECISION} decimal places"
            )));
        }
        let width = DECIMAL_PRECISION as usize;
        let attos: i128 = format!("{whole}{fraction:0<width$}")
            .parse()
            .map_err(|_| Error::Grain(format!("grain value out of range: {s:?}")))?;
        Ok(Self(if negative { -attos } else { attos }))
    }

    /// `ONE × f`, with the imprecision of [`Grain::multiply_float`]
    pub fn from_approximate_float(f: f64) -> Result<Self> {
        ONE.multiply_float(f)
    }

    /// `floor(self × f)` computed through an `f64` intermediate.
    ///
    /// Returns `self` unchanged when `f == 1`. The result is not exact at the
    /// attograin level: `g × (1/3) + g × (2/3)` need not equal `g`.
    pub fn multiply_float(self, f: f64) -> Result<Self> {
        if !f.is_finite() {
            return Err(Error::Grain(format!("cannot multiply grain by non-finite {f}")));
        }
        if f == 1.0 {
            return Ok(self);
        }
        let product = (self.0 as f64 * f).floor();
        if !product.is_finite() || product.abs() >= i128::MAX as f64 {
            return Err(Error::Grain(format!("product {self} × {f} out of range")));
        }
        Ok(Self(product as i128))
    }

    /// `numerator / denominator` as a float
    pub fn to_float_ratio(numerator: Grain, denominator: Grain) -> f64 {
        numerator.0 as f64 / denominator.0 as f64
    }

    /// Checked addition
    pub fn checked_add(self, rhs: Grain) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| Error::Grain(format!("overflow adding {rhs} to {self}")))
    }

    /// Checked subtraction
    pub fn checked_sub(self, rhs: Grain) -> Result<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or_else(|| Error::Grain(format!("overflow subtracting {rhs} from {self}")))
    }

    /// Checked multiplication by an integer
    pub fn checked_mul(self, rhs: i128) -> Result<Self> {
        self.0
            .checked_mul(rhs)
            .map(Self)
            .ok_or_else(|| Error::Grain(format!("overflow multiplying {self} by {rhs}")))
    }

    /// Integer division, truncating toward zero
    pub fn checked_div(self, divisor: i128) -> Result<Self> {
        if divisor == 0 {
            return Err(Error::Grain(format!("cannot divide {self} by zero")));
        }
        self.0
            .checked_div(divisor)
            .map(Self)
            .ok_or_else(|| Error::Grain(format!("overflow dividing {self} by {divisor}")))
    }

    /// True when below zero
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Human-readable amount in whole grain.
    ///
    /// Thousands are separated by commas and the fractional part is truncated
    /// (not rounded) to `decimals` places; `suffix` is appended verbatim.
    pub fn format(self, decimals: u32, suffix: &str) -> Result<String> {
        if decimals > DECIMAL_PRECISION {
            return Err(Error::Grain(format!(
                "decimals must be in range [0..{DECIMAL_PRECISION}], got {decimals}"
            )));
        }
        Ok(self.format_unchecked(decimals as usize, suffix))
    }

    /// Full-precision format with trailing zeros and an orphan point removed
    pub fn format_and_trim(self, suffix: &str) -> String {
        let full = self.format_unchecked(DECIMAL_PRECISION as usize, "");
        let trimmed = full.trim_end_matches('0').trim_end_matches('.');
        format!("{trimmed}{suffix}")
    }

    fn format_unchecked(self, decimals: usize, suffix: &str) -> String {
        let precision = DECIMAL_PRECISION as usize;
        let digits = self.0.unsigned_abs().to_string();
        let padded = format!("{digits:0>width$}", width = precision + 1);
        let (integer, fraction) = padded.split_at(padded.len() - precision);
        let sign = if self.is_negative() { "-" } else { "" };
        let integer = group_thousands(integer);
        if decimals == 0 {
            format!("{sign}{integer}{suffix}")
        } else {
            format!("{sign}{integer}.{}{suffix}", &fraction[..decimals])
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Split an integer `budget` in proportion to non-negative `shares`.
///
/// The returned pieces always sum to exactly `budget`. Each piece takes its
/// share of whatever budget remains, so rounding residue flows toward later
/// pieces and any final remainder is added to the last piece.
pub fn split_budget(budget: Grain, shares: &[f64]) -> Result<Vec<Grain>> {
    if budget.is_negative() {
        return Err(Error::Grain(format!("negative budget: {budget}")));
    }
    if let Some(bad) = shares.iter().find(|s| !s.is_finite() || **s < 0.0) {
        return Err(Error::Grain(format!(
            "shares must be finite and non-negative, got {bad}"
        )));
    }
    let total: f64 = shares.iter().sum();
    if !total.is_finite() {
        return Err(Error::Grain(format!("non-finite share total: {total}")));
    }
    if total <= 0.0 {
        return Err(Error::Grain(format!("share total must be positive, got {total}")));
    }

    let mut score_remaining = total;
    let mut budget_remaining = budget;
    let mut pieces = Vec::with_capacity(shares.len());
    for &share in shares {
        if share == 0.0 || score_remaining <= 0.0 {
            pieces.push(ZERO);
            continue;
        }
        let fraction = (share / score_remaining).min(1.0);
        // f64 rounding can overshoot what is left
        let piece = budget_remaining
            .multiply_float(fraction)?
            .clamp(ZERO, budget_remaining);
        budget_remaining = budget_remaining.checked_sub(piece)?;
        score_remaining -= share;
        pieces.push(piece);
    }

    if budget_remaining > ZERO {
        if let Some(last) = pieces.last_mut() {
            *last = last.checked_add(budget_remaining)?;
        }
    }
    Ok(pieces)
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Grain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('-').unwrap_or(s);
        if !is_digits(digits) {
            return Err(Error::Grain(format!("invalid grain string: {s:?}")));
        }
        s.parse::<i128>()
            .map(Self)
            .map_err(|_| Error::Grain(format!("grain value out of range: {s:?}")))
    }
}

impl From<Grain> for i128 {
    fn from(g: Grain) -> Self {
        g.0
    }
}

impl Serialize for Grain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Grain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// The operators below are unchecked and panic on overflow in debug builds.
// Ledger state only changes through the checked_* methods.

impl Add for Grain {
    type Output = Grain;

    fn add(self, rhs: Grain) -> Grain {
        Grain(self.0 + rhs.0)
    }
}

impl Sub for Grain {
    type Output = Grain;

    fn sub(self, rhs: Grain) -> Grain {
        Grain(self.0 - rhs.0)
    }
}

impl Neg for Grain {
    type Output = Grain;

    fn neg(self) -> Grain {
        Grain(-self.0)
    }
}

impl Mul<i128> for Grain {
    type Output = Grain;

    fn mul(self, rhs: i128) -> Grain {
        Grain(self.0 * rhs)
    }
}

impl Sum for Grain {
    fn sum<I: Iterator<Item = Grain>>(iter: I) -> Grain {
        iter.fold(ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Grain> for Grain {
    fn sum<I: Iterator<Item = &'a Grain>>(iter: I) -> Grain {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(s: &str) -> Grain {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_str() {
        assert_eq!(g("0"), ZERO);
        assert_eq!(g("-15"), Grain::from_attos(-15));
        assert_eq!(g("1000000000000000000"), ONE);
        for bad in ["", "-", "+5", "1.0", " 1", "1e3", "abc"] {
            assert!(bad.parse::<Grain>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_from_float_string() {
        assert_eq!(Grain::from_float_string("1").unwrap(), ONE);
        assert_eq!(
            Grain::from_float_string("1.5").unwrap(),
            Grain::from_attos(1_500_000_000_000_000_000)
        );
        assert_eq!(
            Grain::from_float_string("-0.000000000000000001").unwrap(),
            Grain::from_attos(-1)
        );
        assert!(Grain::from_float_string("0.0000000000000000001").is_err());
        assert!(Grain::from_float_string("1.").is_err());
        assert!(Grain::from_float_string("one").is_err());
    }

    #[test]
    fn test_format() {
        let amount = ONE * 1234 + Grain::from_attos(500_000_000_000_000_000);
        assert_eq!(amount.format(2, "g").unwrap(), "1,234.50g");
        assert_eq!(amount.format(0, "").unwrap(), "1,234");
        assert_eq!(ONE.format(0, "g").unwrap(), "1g");
        assert_eq!(Grain::from_attos(5).format(18, "").unwrap(), "0.000000000000000005");
        assert_eq!((-amount).format(1, "").unwrap(), "-1,234.5");
        assert_eq!((ONE * 1_000_000).format(0, "").unwrap(), "1,000,000");
        assert!(ONE.format(19, "").is_err());
    }

    #[test]
    fn test_format_and_trim() {
        let amount = ONE * 1234 + Grain::from_attos(500_000_000_000_000_000);
        assert_eq!(amount.format_and_trim(""), "1,234.5");
        assert_eq!(ONE.format_and_trim("g"), "1g");
        assert_eq!(ZERO.format_and_trim(""), "0");
        assert_eq!(Grain::from_attos(-10).format_and_trim(""), "-0.00000000000000001");
    }

    #[test]
    fn test_multiply_float() {
        assert_eq!(ONE.multiply_float(1.0).unwrap(), ONE);
        assert_eq!(ONE.multiply_float(0.5).unwrap(), Grain::from_attos(500_000_000_000_000_000));
        assert_eq!(Grain::from_attos(10).multiply_float(0.25).unwrap(), Grain::from_attos(2));
        assert!(ONE.multiply_float(f64::NAN).is_err());
        assert!(ONE.multiply_float(f64::INFINITY).is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(ONE.checked_add(ONE).unwrap(), ONE * 2);
        assert_eq!(ONE.checked_div(4).unwrap(), Grain::from_attos(250_000_000_000_000_000));
        assert!(ONE.checked_div(0).is_err());
        assert!(Grain::from_attos(i128::MAX).checked_add(ONE).is_err());
    }

    #[test]
    fn test_split_budget_exact_sum() {
        let budget = g("100");
        let pieces = split_budget(budget, &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(pieces.iter().sum::<Grain>(), budget);
        assert_eq!(pieces, vec![g("33"), g("33"), g("34")]);
    }

    #[test]
    fn test_split_budget_pathological_shares() {
        let pieces = split_budget(ONE, &[1.0, 1e100, 1.0]).unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces.iter().sum::<Grain>(), ONE);
    }

    #[test]
    fn test_split_budget_zero_shares_get_nothing() {
        let pieces = split_budget(g("10"), &[0.0, 3.0, 0.0, 7.0]).unwrap();
        assert_eq!(pieces, vec![ZERO, g("3"), ZERO, g("7")]);
    }

    #[test]
    fn test_split_budget_rejects_bad_input() {
        assert!(split_budget(g("-1"), &[1.0]).is_err());
        assert!(split_budget(ONE, &[f64::NAN]).is_err());
        assert!(split_budget(ONE, &[-1.0, 2.0]).is_err());
        assert!(split_budget(ONE, &[0.0, 0.0]).is_err());
        assert!(split_budget(ONE, &[]).is_err());
        assert!(split_budget(ONE, &[f64::MAX, f64::MAX]).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ONE).unwrap();
        assert_eq!(json, "\"1000000000000000000\"");
        let back: Grain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ONE);
        assert!(serde_json::from_str::<Grain>("5").is_err());
    }
}
