//! Expense participants.
//!
//! A [`Participant`] is one user's share of an
//! [`Expense`](crate::Expense): how much they paid and how much they owe.
//! Participants are only ever created together with their expense and
//! deleted together with it.
//!
//! Amounts are stored as integer **minor units** (cents), both `>= 0`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ParticipantSplit, ShareRecord, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub user_id: String,
    pub paid: MoneyCents,
    pub owed: MoneyCents,
    pub is_settled: bool,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(expense_id: Uuid, split: ParticipantSplit) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            user_id: split.user_id,
            paid: split.paid,
            owed: split.owed,
            is_settled: false,
            settled_at: None,
        }
    }

    /// Paid minus owed: positive = creditor on this expense.
    #[must_use]
    pub fn net(&self) -> MoneyCents {
        self.paid - self.owed
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub paid_minor: i64,
    pub owed_minor: i64,
    pub is_settled: bool,
    pub settled_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Participant> for ActiveModel {
    fn from(participant: &Participant) -> Self {
        Self {
            id: ActiveValue::Set(participant.id.to_string()),
            expense_id: ActiveValue::Set(participant.expense_id.to_string()),
            user_id: ActiveValue::Set(participant.user_id.clone()),
            paid_minor: ActiveValue::Set(participant.paid.cents()),
            owed_minor: ActiveValue::Set(participant.owed.cents()),
            is_settled: ActiveValue::Set(participant.is_settled),
            settled_at: ActiveValue::Set(participant.settled_at),
        }
    }
}

impl TryFrom<Model> for Participant {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "participant")?,
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            user_id: model.user_id,
            paid: MoneyCents::new(model.paid_minor),
            owed: MoneyCents::new(model.owed_minor),
            is_settled: model.is_settled,
            settled_at: model.settled_at,
        })
    }
}

impl TryFrom<Model> for ShareRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            user_id: model.user_id,
            paid: MoneyCents::new(model.paid_minor),
            owed: MoneyCents::new(model.owed_minor),
        })
    }
}
