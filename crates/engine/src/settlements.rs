//! Settlement ledger.
//!
//! A settlement is a user-attested payment from `payer_id` to `payee_id`
//! that offsets shared-expense debt. It has three states:
//!
//! ```text
//! Pending ──confirm (payee)──▶ Confirmed
//!    │
//!    └──────delete (payer)───▶ Deleted
//! ```
//!
//! Only a pending settlement can be updated (by the payer). `Confirmed` and
//! `Deleted` are terminal. The state is not stored as such: it is derived
//! from `deleted_at` and `is_confirmed`, so a row can never carry two states.
//!
//! A transition on a terminal settlement is always an
//! [`InvalidState`](EngineError::InvalidState) error, whoever asks. Only on a
//! pending settlement does a wrong actor give
//! [`Unauthorized`](EngineError::Unauthorized).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, SettlementRecord, util::parse_uuid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Upi,
    Paypal,
    Venmo,
    CreditCard,
    DebitCard,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Upi => "upi",
            Self::Paypal => "paypal",
            Self::Venmo => "venmo",
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "upi" => Ok(Self::Upi),
            "paypal" => Ok(Self::Paypal),
            "venmo" => Ok(Self::Venmo),
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Pending,
    Confirmed,
    Deleted,
}

impl SettlementState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub payer_id: String,
    pub payee_id: String,
    pub amount: MoneyCents,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub group_id: Option<Uuid>,
    pub is_confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    pub fn new(
        payer_id: String,
        payee_id: String,
        amount: MoneyCents,
        payment_method: PaymentMethod,
        notes: Option<String>,
        group_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "settlement amount must be > 0".to_string(),
            ));
        }
        if payer_id == payee_id {
            return Err(EngineError::Validation(
                "cannot create settlement with yourself".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            payer_id,
            payee_id,
            amount,
            payment_method,
            notes,
            group_id,
            is_confirmed: false,
            confirmed_at: None,
            deleted_at: None,
            created_at,
        })
    }

    #[must_use]
    pub fn state(&self) -> SettlementState {
        if self.deleted_at.is_some() {
            SettlementState::Deleted
        } else if self.is_confirmed {
            SettlementState::Confirmed
        } else {
            SettlementState::Pending
        }
    }

    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        self.payer_id == user_id || self.payee_id == user_id
    }

    fn ensure_pending(&self, action: &str) -> ResultEngine<()> {
        match self.state() {
            SettlementState::Pending => Ok(()),
            SettlementState::Confirmed => Err(EngineError::InvalidState(format!(
                "cannot {action} a confirmed settlement"
            ))),
            SettlementState::Deleted => Err(EngineError::InvalidState(format!(
                "cannot {action} a deleted settlement"
            ))),
        }
    }

    /// Checks that `actor` may update this settlement.
    pub fn ensure_can_update(&self, actor: &str) -> ResultEngine<()> {
        self.ensure_pending("update")?;
        if self.payer_id != actor {
            return Err(EngineError::Unauthorized(
                "only the payer can update a settlement".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that `actor` may confirm this settlement.
    pub fn ensure_can_confirm(&self, actor: &str) -> ResultEngine<()> {
        self.ensure_pending("confirm")?;
        if self.payee_id != actor {
            return Err(EngineError::Unauthorized(
                "only the payee can confirm a settlement".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that `actor` may delete this settlement.
    pub fn ensure_can_delete(&self, actor: &str) -> ResultEngine<()> {
        self.ensure_pending("delete")?;
        if self.payer_id != actor {
            return Err(EngineError::Unauthorized(
                "only the payer can delete a settlement".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub amount_minor: i64,
    pub payment_method: String,
    pub notes: Option<String>,
    pub group_id: Option<String>,
    pub is_confirmed: bool,
    pub confirmed_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            payer_id: ActiveValue::Set(settlement.payer_id.clone()),
            payee_id: ActiveValue::Set(settlement.payee_id.clone()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            payment_method: ActiveValue::Set(settlement.payment_method.as_str().to_string()),
            notes: ActiveValue::Set(settlement.notes.clone()),
            group_id: ActiveValue::Set(settlement.group_id.map(|id| id.to_string())),
            is_confirmed: ActiveValue::Set(settlement.is_confirmed),
            confirmed_at: ActiveValue::Set(settlement.confirmed_at),
            deleted_at: ActiveValue::Set(settlement.deleted_at),
            created_at: ActiveValue::Set(settlement.created_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            payer_id: model.payer_id,
            payee_id: model.payee_id,
            amount: MoneyCents::new(model.amount_minor),
            payment_method: PaymentMethod::try_from(model.payment_method.as_str())?,
            notes: model.notes,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            is_confirmed: model.is_confirmed,
            confirmed_at: model.confirmed_at,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
        })
    }
}

impl From<Model> for SettlementRecord {
    fn from(model: Model) -> Self {
        Self {
            payer_id: model.payer_id,
            payee_id: model.payee_id,
            amount: MoneyCents::new(model.amount_minor),
        }
    }
}
