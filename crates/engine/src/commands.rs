//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (expense create/update, settlement create/update), keeping call sites
//! readable and avoiding long argument lists. Patches are typed: a field left
//! as `None` is not touched.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{ExpenseCategory, MoneyCents, ParticipantInput, PaymentMethod, SplitMethod};

/// Default page size for list operations.
pub const DEFAULT_LIST_LIMIT: u64 = 20;

/// Create a shared expense.
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub user_id: String,
    pub description: String,
    pub amount: MoneyCents,
    pub split_method: SplitMethod,
    pub participants: Vec<ParticipantInput>,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
    pub group_id: Option<Uuid>,
    pub receipt_url: Option<String>,
}

impl CreateExpenseCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        description: impl Into<String>,
        amount: MoneyCents,
        split_method: SplitMethod,
        date: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            description: description.into(),
            amount,
            split_method,
            participants: Vec::new(),
            category: ExpenseCategory::default(),
            date,
            group_id: None,
            receipt_url: None,
        }
    }

    #[must_use]
    pub fn participant(mut self, participant: ParticipantInput) -> Self {
        self.participants.push(participant);
        self
    }

    #[must_use]
    pub fn participants(mut self, participants: Vec<ParticipantInput>) -> Self {
        self.participants = participants;
        self
    }

    #[must_use]
    pub fn category(mut self, category: ExpenseCategory) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    #[must_use]
    pub fn receipt_url(mut self, receipt_url: impl Into<String>) -> Self {
        self.receipt_url = Some(receipt_url.into());
        self
    }
}

/// Fields of an expense that may change after creation.
///
/// The amount and the split are fixed once the expense exists.
#[derive(Clone, Debug, Default)]
pub struct ExpensePatch {
    pub description: Option<String>,
    pub category: Option<ExpenseCategory>,
    pub date: Option<NaiveDate>,
    pub receipt_url: Option<String>,
}

impl ExpensePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.receipt_url.is_none()
    }
}

/// Update an existing expense.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub expense_id: Uuid,
    pub user_id: String,
    pub patch: ExpensePatch,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            expense_id,
            user_id: user_id.into(),
            patch: ExpensePatch::default(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.patch.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: ExpenseCategory) -> Self {
        self.patch.category = Some(category);
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.patch.date = Some(date);
        self
    }

    #[must_use]
    pub fn receipt_url(mut self, receipt_url: impl Into<String>) -> Self {
        self.patch.receipt_url = Some(receipt_url.into());
        self
    }
}

/// Record a payment from `payer_id` to `payee_id`.
#[derive(Clone, Debug)]
pub struct CreateSettlementCmd {
    pub payer_id: String,
    pub payee_id: String,
    pub amount: MoneyCents,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub group_id: Option<Uuid>,
}

impl CreateSettlementCmd {
    #[must_use]
    pub fn new(
        payer_id: impl Into<String>,
        payee_id: impl Into<String>,
        amount: MoneyCents,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            payer_id: payer_id.into(),
            payee_id: payee_id.into(),
            amount,
            payment_method,
            notes: None,
            group_id: None,
        }
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// Fields of a pending settlement the payer may change.
#[derive(Clone, Debug, Default)]
pub struct SettlementPatch {
    pub amount: Option<MoneyCents>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl SettlementPatch {
    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = Some(payment_method);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Offset pagination for list operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    #[must_use]
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}
