//! Debt simplification.
//!
//! Given net balances that add up to zero, [`simplify`] suggests a short list
//! of transfers that would settle everybody. The algorithm is greedy: the
//! largest remaining creditor is always paired with the largest remaining
//! debtor. It is not a min-cost-flow solve, but it never emits more than
//! `creditors + debtors - 1` transfers.

use serde::{Deserialize, Serialize};

use crate::MoneyCents;

/// Net position of one user; positive = is owed money, negative = owes money.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetBalance {
    pub user_id: String,
    pub net: MoneyCents,
}

impl NetBalance {
    #[must_use]
    pub fn new(user_id: impl Into<String>, net: MoneyCents) -> Self {
        Self {
            user_id: user_id.into(),
            net,
        }
    }
}

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: MoneyCents,
}

/// Computes the suggested transfers for `balances`.
///
/// - Users within one cent of zero are ignored.
/// - Creditors and debtors are each sorted by descending magnitude; equal
///   magnitudes keep their input order.
/// - Amounts of one cent or less are never emitted.
pub fn simplify(balances: &[NetBalance]) -> Vec<Transfer> {
    let mut creditors: Vec<(&str, MoneyCents)> = Vec::new();
    let mut debtors: Vec<(&str, MoneyCents)> = Vec::new();
    for balance in balances {
        if balance.net.is_negligible() {
            continue;
        }
        if balance.net.is_positive() {
            creditors.push((balance.user_id.as_str(), balance.net));
        } else {
            debtors.push((balance.user_id.as_str(), balance.net.abs()));
        }
    }

    // `sort_by` is stable, ties resolve by input order.
    creditors.sort_by(|a, b| b.1.cmp(&a.1));
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transfers = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < creditors.len() && j < debtors.len() {
        let (creditor, credit) = &mut creditors[i];
        let (debtor, debt) = &mut debtors[j];

        let amount = (*credit).min(*debt);
        if !amount.is_negligible() {
            transfers.push(Transfer {
                from: (*debtor).to_string(),
                to: (*creditor).to_string(),
                amount,
            });
        }

        *credit -= amount;
        *debt -= amount;

        if credit.is_negligible() {
            i += 1;
        }
        if debt.is_negligible() {
            j += 1;
        }
    }

    transfers
}
