//! Split calculation for shared expenses.
//!
//! [`compute`] turns an expense total and the raw participant inputs into
//! validated `(paid, owed)` pairs according to a [`SplitMethod`]. It is a pure
//! function: nothing is persisted and no partial result is ever returned.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, Percent, ResultEngine};

/// Rule used to distribute an expense's cost among its participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Everybody owes the same share.
    Equal,
    /// Each participant states the exact amount owed.
    Exact,
    /// Each participant owes a percentage of the total.
    Percentage,
    /// Each participant owes proportionally to an integer number of shares.
    Shares,
}

impl SplitMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Exact => "exact",
            Self::Percentage => "percentage",
            Self::Shares => "shares",
        }
    }
}

impl TryFrom<&str> for SplitMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "exact" => Ok(Self::Exact),
            "percentage" => Ok(Self::Percentage),
            "shares" => Ok(Self::Shares),
            other => Err(EngineError::Validation(format!(
                "invalid split method: {other}"
            ))),
        }
    }
}

/// Raw participant input as supplied by the caller.
///
/// Only the field matching the chosen [`SplitMethod`] may be set:
/// `owed` for `exact`, `percent` for `percentage`, `shares` for `shares`,
/// none for `equal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInput {
    pub user_id: String,
    pub paid: MoneyCents,
    pub owed: Option<MoneyCents>,
    pub percent: Option<Percent>,
    pub shares: Option<u32>,
}

impl ParticipantInput {
    #[must_use]
    pub fn new(user_id: impl Into<String>, paid: MoneyCents) -> Self {
        Self {
            user_id: user_id.into(),
            paid,
            owed: None,
            percent: None,
            shares: None,
        }
    }

    #[must_use]
    pub fn owed(mut self, owed: MoneyCents) -> Self {
        self.owed = Some(owed);
        self
    }

    #[must_use]
    pub fn percent(mut self, percent: Percent) -> Self {
        self.percent = Some(percent);
        self
    }

    #[must_use]
    pub fn shares(mut self, shares: u32) -> Self {
        self.shares = Some(shares);
        self
    }
}

/// Validated split of one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSplit {
    pub user_id: String,
    pub paid: MoneyCents,
    pub owed: MoneyCents,
}

/// Computes the per-participant split of `total`.
///
/// Derived owed amounts (equal, percentage, shares) are apportioned to the
/// cent so that they always add up to `total`; see
/// [`MoneyCents::apportion`].
///
/// # Errors
///
/// [`EngineError::Validation`] naming the violated rule: non-positive total,
/// no participants, duplicate participant, negative paid amount, a missing or
/// foreign method field, or a failed sum check.
pub fn compute(
    total: MoneyCents,
    method: SplitMethod,
    inputs: &[ParticipantInput],
) -> ResultEngine<Vec<ParticipantSplit>> {
    validate_common(total, inputs)?;
    validate_method_fields(method, inputs)?;

    let total_paid = checked_sum(inputs.iter().map(|p| p.paid))?;

    let owed = match method {
        SplitMethod::Equal => {
            if total_paid != total {
                return Err(paid_mismatch(total_paid, total));
            }
            apportion(total, &vec![1; inputs.len()])?
        }
        SplitMethod::Exact => {
            let owed: Vec<MoneyCents> = inputs.iter().filter_map(|p| p.owed).collect();
            if owed.iter().any(|o| o.is_negative()) {
                return Err(EngineError::Validation(
                    "owed_amount must be >= 0".to_string(),
                ));
            }
            let total_owed = checked_sum(owed.iter().copied())?;
            if !total_owed.approx_eq(total) {
                return Err(EngineError::Validation(format!(
                    "total owed amount ({total_owed}) must equal expense amount ({total})"
                )));
            }
            ensure_paid_matches(total_paid, total)?;
            owed
        }
        SplitMethod::Percentage => {
            let weights: Vec<i64> = inputs
                .iter()
                .filter_map(|p| p.percent)
                .map(Percent::hundredths)
                .collect();
            if weights
                .iter()
                .any(|w| *w <= 0 || *w > Percent::HUNDRED.hundredths())
            {
                return Err(EngineError::Validation(
                    "percentage must be > 0 and <= 100".to_string(),
                ));
            }
            let total_percent = Percent::from_hundredths(weights.iter().sum());
            if (total_percent.hundredths() - Percent::HUNDRED.hundredths()).abs() > 1 {
                return Err(EngineError::Validation(format!(
                    "total percentage ({total_percent}) must equal 100"
                )));
            }
            ensure_paid_matches(total_paid, total)?;
            apportion(total, &weights)?
        }
        SplitMethod::Shares => {
            let weights: Vec<i64> = inputs
                .iter()
                .filter_map(|p| p.shares)
                .map(i64::from)
                .collect();
            if weights.iter().any(|w| *w == 0) {
                return Err(EngineError::Validation(
                    "shares must be a positive integer".to_string(),
                ));
            }
            if weights.iter().sum::<i64>() <= 0 {
                return Err(EngineError::Validation(
                    "total shares must be greater than 0".to_string(),
                ));
            }
            ensure_paid_matches(total_paid, total)?;
            apportion(total, &weights)?
        }
    };

    Ok(inputs
        .iter()
        .zip(owed)
        .map(|(input, owed)| ParticipantSplit {
            user_id: input.user_id.clone(),
            paid: input.paid,
            owed,
        })
        .collect())
}

fn validate_common(total: MoneyCents, inputs: &[ParticipantInput]) -> ResultEngine<()> {
    if !total.is_positive() {
        return Err(EngineError::Validation(
            "expense amount must be > 0".to_string(),
        ));
    }
    if inputs.is_empty() {
        return Err(EngineError::Validation(
            "at least one participant is required".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if input.user_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "participant user_id must not be empty".to_string(),
            ));
        }
        if !seen.insert(input.user_id.as_str()) {
            return Err(EngineError::Validation(format!(
                "duplicate participant: {}",
                input.user_id
            )));
        }
        if input.paid.is_negative() {
            return Err(EngineError::Validation(
                "paid_amount must be >= 0".to_string(),
            ));
        }
    }
    Ok(())
}

/// Every participant must carry the field of `method` and none of the others,
/// so that a mistyped request is rejected instead of silently ignored.
fn validate_method_fields(method: SplitMethod, inputs: &[ParticipantInput]) -> ResultEngine<()> {
    for input in inputs {
        let present = [
            ("owed_amount", input.owed.is_some(), SplitMethod::Exact),
            ("percentage", input.percent.is_some(), SplitMethod::Percentage),
            ("shares", input.shares.is_some(), SplitMethod::Shares),
        ];
        for (field, is_set, owner) in present {
            if owner == method && !is_set {
                return Err(EngineError::Validation(format!(
                    "{field} is required for {} split method",
                    method.as_str()
                )));
            }
            if owner != method && is_set {
                return Err(EngineError::Validation(format!(
                    "{field} is not allowed for {} split method",
                    method.as_str()
                )));
            }
        }
    }
    Ok(())
}

fn checked_sum(amounts: impl IntoIterator<Item = MoneyCents>) -> ResultEngine<MoneyCents> {
    amounts
        .into_iter()
        .try_fold(MoneyCents::ZERO, MoneyCents::checked_add)
        .ok_or_else(|| EngineError::Validation("amount too large".to_string()))
}

fn ensure_paid_matches(total_paid: MoneyCents, total: MoneyCents) -> ResultEngine<()> {
    if !total_paid.approx_eq(total) {
        return Err(paid_mismatch(total_paid, total));
    }
    Ok(())
}

fn paid_mismatch(total_paid: MoneyCents, total: MoneyCents) -> EngineError {
    EngineError::Validation(format!(
        "total paid amount ({total_paid}) must equal expense amount ({total})"
    ))
}

fn apportion(total: MoneyCents, weights: &[i64]) -> ResultEngine<Vec<MoneyCents>> {
    total
        .apportion(weights)
        .ok_or_else(|| EngineError::Validation("cannot apportion expense amount".to_string()))
}
