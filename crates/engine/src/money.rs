use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Largest difference, in cents, still treated as "equal" when reconciling
/// sums (the `0.01` currency tolerance).
pub const TOLERANCE_MINOR: i64 = 1;

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense totals,
/// paid/owed shares, settlement amounts, balances) to avoid floating-point
/// drift.
///
/// The value is signed:
/// - positive = creditor / owed to the user
/// - negative = debtor / owed by the user
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Returns `true` if `|self| <= 0.01`, i.e. the amount rounds to nothing.
    #[must_use]
    pub const fn is_negligible(self) -> bool {
        self.0.abs() <= TOLERANCE_MINOR
    }

    /// Returns `true` if `self` and `other` differ by at most the tolerance.
    #[must_use]
    pub const fn approx_eq(self, other: MoneyCents) -> bool {
        (self.0 - other.0).abs() <= TOLERANCE_MINOR
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Splits `self` proportionally to `weights` so that the parts add up to
    /// `self` exactly.
    ///
    /// Every part gets the floor of its exact share; the cents left over are
    /// handed out one each by descending fractional remainder, ties going to
    /// the earlier weight.
    ///
    /// Returns `None` when the weights are empty, contain a negative value or
    /// add up to zero.
    ///
    /// ```rust
    /// use engine::MoneyCents;
    ///
    /// let parts = MoneyCents::new(100_00).apportion(&[1, 1, 1]).unwrap();
    /// let cents: Vec<i64> = parts.iter().map(|p| p.cents()).collect();
    /// assert_eq!(cents, vec![33_34, 33_33, 33_33]);
    /// ```
    #[must_use]
    pub fn apportion(self, weights: &[i64]) -> Option<Vec<MoneyCents>> {
        if weights.is_empty() || weights.iter().any(|w| *w < 0) {
            return None;
        }
        let total_weight: i128 = weights.iter().map(|w| i128::from(*w)).sum();
        if total_weight == 0 {
            return None;
        }

        let amount = i128::from(self.0);
        let mut parts = Vec::with_capacity(weights.len());
        let mut remainders = Vec::with_capacity(weights.len());
        for (idx, weight) in weights.iter().enumerate() {
            let exact = amount * i128::from(*weight);
            parts.push(exact.div_euclid(total_weight));
            remainders.push((exact.rem_euclid(total_weight), idx));
        }

        let assigned: i128 = parts.iter().sum();
        let leftover = usize::try_from(amount - assigned).ok()?;

        // Stable sort keeps input order among equal remainders.
        remainders.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, idx) in remainders.into_iter().take(leftover) {
            parts[idx] += 1;
        }

        parts
            .into_iter()
            .map(|p| i64::try_from(p).ok().map(MoneyCents))
            .collect()
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a MoneyCents> for MoneyCents {
    fn sum<I: Iterator<Item = &'a MoneyCents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s, "amount").map(MoneyCents)
    }
}

/// A percentage stored in **hundredths of a percent** (`100%` is `10_000`).
///
/// ```rust
/// use engine::Percent;
///
/// let p: Percent = "33.33".parse().unwrap();
/// assert_eq!(p.hundredths(), 3333);
/// assert_eq!(p.to_string(), "33.33%");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Percent(i64);

impl Percent {
    pub const HUNDRED: Percent = Percent(100_00);

    #[must_use]
    pub const fn from_hundredths(value: i64) -> Self {
        Self(value)
    }

    /// Whole percent, e.g. `Percent::whole(60)` is `60%`.
    #[must_use]
    pub const fn whole(value: i64) -> Self {
        Self(value * 100)
    }

    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}%", abs / 100, abs % 100)
    }
}

impl FromStr for Percent {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
        parse_hundredths(trimmed, "percentage").map(Percent)
    }
}

/// Parses a decimal with at most two fractional digits into hundredths.
fn parse_hundredths(s: &str, label: &str) -> Result<i64, EngineError> {
    let empty = || EngineError::Validation(format!("empty {label}"));
    let invalid = || EngineError::Validation(format!("invalid {label}"));
    let overflow = || EngineError::Validation(format!("{label} too large"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let units_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next();

    if parts.next().is_some() {
        return Err(invalid());
    }

    if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let units: i64 = units_str.parse().map_err(|_| overflow())?;

    let frac: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => frac.parse::<i64>().map_err(|_| invalid())?,
                _ => {
                    return Err(EngineError::Validation(format!(
                        "too many decimals in {label}"
                    )));
                }
            }
        }
    };

    let total = units
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)?;

    if negative {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(10).to_string(), "0.10");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("10,50".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("-0.01".parse::<MoneyCents>().unwrap().cents(), -1);
        assert_eq!("+1.00".parse::<MoneyCents>().unwrap().cents(), 100);
        assert_eq!("  2.30 ".parse::<MoneyCents>().unwrap().cents(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<MoneyCents>().is_err());
        assert!("0.001".parse::<MoneyCents>().is_err());
        assert!("abc".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn percent_parses_with_or_without_sign() {
        assert_eq!("60".parse::<Percent>().unwrap(), Percent::whole(60));
        assert_eq!("12.5%".parse::<Percent>().unwrap().hundredths(), 1250);
        assert!("33.333".parse::<Percent>().is_err());
    }

    #[test]
    fn tolerance_helpers() {
        assert!(MoneyCents::new(1).is_negligible());
        assert!(MoneyCents::new(-1).is_negligible());
        assert!(!MoneyCents::new(2).is_negligible());
        assert!(MoneyCents::new(100).approx_eq(MoneyCents::new(101)));
        assert!(!MoneyCents::new(100).approx_eq(MoneyCents::new(102)));
    }

    #[test]
    fn apportion_conserves_total() {
        let parts = MoneyCents::new(100_00).apportion(&[1; 7]).unwrap();
        assert_eq!(parts.iter().sum::<MoneyCents>(), MoneyCents::new(100_00));
        let cents: Vec<i64> = parts.iter().map(|p| p.cents()).collect();
        assert_eq!(cents, vec![1429, 1429, 1429, 1429, 1428, 1428, 1428]);
    }

    #[test]
    fn apportion_prefers_largest_remainder() {
        // 10.00 split 1:2 -> 3.333.. / 6.666..; the extra cent goes to the
        // larger remainder.
        let parts = MoneyCents::new(10_00).apportion(&[1, 2]).unwrap();
        assert_eq!(parts, vec![MoneyCents::new(333), MoneyCents::new(667)]);
    }

    #[test]
    fn apportion_rejects_degenerate_weights() {
        assert!(MoneyCents::new(100).apportion(&[]).is_none());
        assert!(MoneyCents::new(100).apportion(&[0, 0]).is_none());
        assert!(MoneyCents::new(100).apportion(&[1, -1]).is_none());
    }
}
