//! Shared expenses.
//!
//! An `Expense` records a purchase of `amount` split between one or more
//! [`Participant`]s. The split itself is computed by [`crate::split`]; this
//! module only models the stored result.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, util::parse_uuid};

use super::expense_participants::Participant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    #[default]
    General,
    Food,
    Transport,
    Entertainment,
    Utilities,
    Shopping,
    Healthcare,
    Education,
    Travel,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Entertainment => "entertainment",
            Self::Utilities => "utilities",
            Self::Shopping => "shopping",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for ExpenseCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "general" => Ok(Self::General),
            "food" => Ok(Self::Food),
            "transport" => Ok(Self::Transport),
            "entertainment" => Ok(Self::Entertainment),
            "utilities" => Ok(Self::Utilities),
            "shopping" => Ok(Self::Shopping),
            "healthcare" => Ok(Self::Healthcare),
            "education" => Ok(Self::Education),
            "travel" => Ok(Self::Travel),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid expense category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub description: String,
    pub amount: MoneyCents,
    pub category: ExpenseCategory,
    pub date: NaiveDate,
    pub group_id: Option<Uuid>,
    pub receipt_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl Expense {
    /// Participant row for `user_id`, if they take part in this expense.
    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn has_settled_participant(&self) -> bool {
        self.participants.iter().any(|p| p.is_settled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub description: String,
    pub amount_minor: i64,
    pub category: String,
    pub date: Date,
    pub group_id: Option<String>,
    pub receipt_url: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_participants::Entity")]
    Participants,
}

impl Related<super::expense_participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            category: ActiveValue::Set(expense.category.as_str().to_string()),
            date: ActiveValue::Set(expense.date),
            group_id: ActiveValue::Set(expense.group_id.map(|id| id.to_string())),
            receipt_url: ActiveValue::Set(expense.receipt_url.clone()),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            description: model.description,
            amount: MoneyCents::new(model.amount_minor),
            category: ExpenseCategory::try_from(model.category.as_str())?,
            date: model.date,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            receipt_url: model.receipt_url,
            created_by: model.created_by,
            created_at: model.created_at,
            participants: Vec::new(),
        })
    }
}
