//! Balance folding over expense shares and confirmed settlements.
//!
//! These functions are pure: the engine loads the relevant rows from the
//! database and hands them over as [`ShareRecord`]s and
//! [`SettlementRecord`]s. Only confirmed, non-deleted settlements must be
//! passed in.
//!
//! # Pairwise attribution
//!
//! On an expense shared by `A` and `B`, the amount `B` still has to cover
//! (`max(owed - paid, 0)`, its *unpaid share*) is attributed to `A`, and
//! vice versa; the pairwise contribution is the difference of the two. Every
//! participant is paired with every other participant of the same expense.
//! This is exact for two-participant expenses. With three or more
//! participants a debtor's unpaid share is attributed in full to *each* other
//! participant instead of being divided among them, which overstates the
//! bilateral figures; the behavior is kept as is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MoneyCents, Transfer};

/// One participant row of an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub expense_id: Uuid,
    pub user_id: String,
    pub paid: MoneyCents,
    pub owed: MoneyCents,
}

impl ShareRecord {
    /// Part of the owed amount not covered by the participant's own payment.
    #[must_use]
    pub fn unpaid(&self) -> MoneyCents {
        let unpaid = self.owed - self.paid;
        if unpaid.is_positive() {
            unpaid
        } else {
            MoneyCents::ZERO
        }
    }
}

/// A confirmed payment between two users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub payer_id: String,
    pub payee_id: String,
    pub amount: MoneyCents,
}

/// Net position against one counterparty; positive = the counterparty owes
/// the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEdge {
    pub counterparty: String,
    pub amount: MoneyCents,
}

/// Per-member totals inside a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalance {
    pub user_id: String,
    pub total_paid: MoneyCents,
    pub total_owed: MoneyCents,
    pub net: MoneyCents,
}

/// Aggregate view of all of a user's edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Sum of the positive edges.
    pub owed_to_user: MoneyCents,
    /// Sum of the magnitudes of the negative edges.
    pub user_owes: MoneyCents,
    pub net: MoneyCents,
    pub edges: Vec<BalanceEdge>,
}

fn by_expense(shares: &[ShareRecord]) -> BTreeMap<Uuid, Vec<&ShareRecord>> {
    let mut out: BTreeMap<Uuid, Vec<&ShareRecord>> = BTreeMap::new();
    for share in shares {
        out.entry(share.expense_id).or_default().push(share);
    }
    out
}

/// Signed effect of `settlement` on `user`'s balance against the other party.
///
/// A settlement where the user is the payee counts `+amount`, as payer
/// `-amount`; `None` when the user is not involved.
fn settlement_effect<'a>(
    user: &str,
    settlement: &'a SettlementRecord,
) -> Option<(&'a str, MoneyCents)> {
    if settlement.payee_id == user {
        Some((settlement.payer_id.as_str(), settlement.amount))
    } else if settlement.payer_id == user {
        Some((settlement.payee_id.as_str(), -settlement.amount))
    } else {
        None
    }
}

/// Net balance of `user_a` against `user_b`; positive means `user_b` owes
/// `user_a`.
///
/// Shares of expenses that do not include both users are ignored, so callers
/// may pass a superset.
pub fn pairwise(
    user_a: &str,
    user_b: &str,
    shares: &[ShareRecord],
    settlements: &[SettlementRecord],
) -> MoneyCents {
    let mut balance = MoneyCents::ZERO;

    for participants in by_expense(shares).values() {
        let a = participants.iter().find(|s| s.user_id == user_a);
        let b = participants.iter().find(|s| s.user_id == user_b);
        if let (Some(a), Some(b)) = (a, b) {
            balance += b.unpaid() - a.unpaid();
        }
    }

    for settlement in settlements {
        if let Some((other, effect)) = settlement_effect(user_a, settlement)
            && other == user_b
        {
            balance += effect;
        }
    }

    balance
}

/// Balances of `user` against every counterparty found in `shares` and
/// `settlements`.
///
/// Edges within one cent of zero are dropped. The result is sorted by
/// descending magnitude, ties by counterparty id, so equal inputs always give
/// equal outputs.
pub fn all_for(
    user: &str,
    shares: &[ShareRecord],
    settlements: &[SettlementRecord],
) -> Vec<BalanceEdge> {
    let mut totals: BTreeMap<&str, MoneyCents> = BTreeMap::new();

    for participants in by_expense(shares).values() {
        let Some(own) = participants.iter().find(|s| s.user_id == user) else {
            continue;
        };
        for other in participants.iter().copied().filter(|s| s.user_id != user) {
            *totals.entry(other.user_id.as_str()).or_default() +=
                other.unpaid() - own.unpaid();
        }
    }

    for settlement in settlements {
        if let Some((other, effect)) = settlement_effect(user, settlement) {
            *totals.entry(other).or_default() += effect;
        }
    }

    let mut edges: Vec<BalanceEdge> = totals
        .into_iter()
        .filter(|(_, amount)| !amount.is_negligible())
        .map(|(counterparty, amount)| BalanceEdge {
            counterparty: counterparty.to_string(),
            amount,
        })
        .collect();
    // Stable sort over a BTreeMap walk: ties stay ordered by counterparty.
    edges.sort_by(|a, b| b.amount.abs().cmp(&a.amount.abs()));
    edges
}

/// Per-member totals for a group.
///
/// `shares` must belong to the group's expenses and `settlements` must be
/// tagged with the group. Only `members` are reported; a member's net is
/// `paid - owed`, plus what they paid in settlements, minus what they received.
/// Sorted by descending net, ties by user id.
pub fn group(
    members: &[String],
    shares: &[ShareRecord],
    settlements: &[SettlementRecord],
) -> Vec<GroupBalance> {
    let mut totals: BTreeMap<&str, (MoneyCents, MoneyCents, MoneyCents)> = members
        .iter()
        .map(|m| (m.as_str(), Default::default()))
        .collect();

    for share in shares {
        if let Some((paid, owed, _)) = totals.get_mut(share.user_id.as_str()) {
            *paid += share.paid;
            *owed += share.owed;
        }
    }

    for settlement in settlements {
        if let Some((_, _, adjustment)) = totals.get_mut(settlement.payer_id.as_str()) {
            *adjustment += settlement.amount;
        }
        if let Some((_, _, adjustment)) = totals.get_mut(settlement.payee_id.as_str()) {
            *adjustment -= settlement.amount;
        }
    }

    let mut out: Vec<GroupBalance> = totals
        .into_iter()
        .map(|(user_id, (total_paid, total_owed, adjustment))| GroupBalance {
            user_id: user_id.to_string(),
            total_paid,
            total_owed,
            net: total_paid - total_owed + adjustment,
        })
        .collect();
    out.sort_by(|a, b| b.net.cmp(&a.net));
    out
}

/// Builds the summary of a user's edges.
pub fn summarize(edges: Vec<BalanceEdge>) -> BalanceSummary {
    let owed_to_user: MoneyCents = edges
        .iter()
        .filter(|e| e.amount.is_positive())
        .map(|e| e.amount)
        .sum();
    let user_owes: MoneyCents = edges
        .iter()
        .filter(|e| e.amount.is_negative())
        .map(|e| e.amount.abs())
        .sum();
    BalanceSummary {
        owed_to_user,
        user_owes,
        net: owed_to_user - user_owes,
        edges,
    }
}

/// One direct transfer per edge: the debtor of each edge pays the creditor.
pub fn direct_transfers(user: &str, edges: &[BalanceEdge]) -> Vec<Transfer> {
    edges
        .iter()
        .filter(|e| !e.amount.is_negligible())
        .map(|e| {
            if e.amount.is_positive() {
                Transfer {
                    from: e.counterparty.clone(),
                    to: user.to_string(),
                    amount: e.amount,
                }
            } else {
                Transfer {
                    from: user.to_string(),
                    to: e.counterparty.clone(),
                    amount: e.amount.abs(),
                }
            }
        })
        .collect()
}
