use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Query},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    CreateExpenseCmd, EngineError, Expense, ExpenseCategory, Page, Participant, ResultEngine,
    UpdateExpenseCmd, expense_participants, expenses, split,
    util::{ensure_not_future, normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

/// Filters for listing the expenses a user takes part in.
///
/// `from` and `to` are both inclusive calendar dates.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    pub group_id: Option<Uuid>,
    pub category: Option<ExpenseCategory>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Page,
}

fn validate_list_filter(filter: &ExpenseListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    if filter.page.limit == 0 {
        return Err(EngineError::Validation("limit must be > 0".to_string()));
    }
    Ok(())
}

trait ApplyExpenseFilters: QueryFilter + Sized {
    fn apply_expense_filters(self, filter: &ExpenseListFilter) -> Self;
}

impl<T> ApplyExpenseFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_expense_filters(mut self, filter: &ExpenseListFilter) -> Self {
        if let Some(group_id) = filter.group_id {
            self = self.filter(expenses::Column::GroupId.eq(group_id.to_string()));
        }
        if let Some(category) = filter.category {
            self = self.filter(expenses::Column::Category.eq(category.as_str()));
        }
        if let Some(from) = filter.from {
            self = self.filter(expenses::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(expenses::Column::Date.lte(to));
        }
        self
    }
}

impl Engine {
    /// Create an expense and all its participant rows atomically.
    ///
    /// The split is computed first; nothing is written when it fails.
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<Expense> {
        let description = normalize_required_text(&cmd.description, "description")?;
        ensure_not_future(cmd.date, Utc::now().date_naive())?;
        let splits = split::compute(cmd.amount, cmd.split_method, &cmd.participants)?;

        let mut expense = Expense {
            id: Uuid::new_v4(),
            description,
            amount: cmd.amount,
            category: cmd.category,
            date: cmd.date,
            group_id: cmd.group_id,
            receipt_url: normalize_optional_text(cmd.receipt_url.as_deref()),
            created_by: cmd.user_id.clone(),
            created_at: Utc::now(),
            participants: Vec::new(),
        };
        expense.participants = splits
            .into_iter()
            .map(|s| Participant::new(expense.id, s))
            .collect();

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &cmd.user_id).await?;
            if let Some(group_id) = cmd.group_id {
                self.require_active_member(&db_tx, group_id, &cmd.user_id)
                    .await
                    .map_err(|err| match err {
                        EngineError::Unauthorized(_) => EngineError::Unauthorized(
                            "you must be a member of the group to add expenses".to_string(),
                        ),
                        other => other,
                    })?;
            }
            for participant in &expense.participants {
                self.require_user_exists(&db_tx, &participant.user_id)
                    .await?;
                if let Some(group_id) = cmd.group_id
                    && self
                        .active_membership(&db_tx, group_id, &participant.user_id)
                        .await?
                        .is_none()
                {
                    return Err(EngineError::Validation(format!(
                        "user {} is not a member of the group",
                        participant.user_id
                    )));
                }
            }

            let expense_model: expenses::ActiveModel = (&expense).into();
            expense_model.insert(&db_tx).await?;
            let participant_models: Vec<expense_participants::ActiveModel> =
                expense.participants.iter().map(Into::into).collect();
            expense_participants::Entity::insert_many(participant_models)
                .exec(&db_tx)
                .await?;

            info!(
                expense_id = %expense.id,
                user_id = %cmd.user_id,
                amount = %expense.amount,
                method = cmd.split_method.as_str(),
                participants = expense.participants.len(),
                "expense created"
            );
            Ok(expense)
        })
    }

    /// Return an expense with its participants. Only participants may see it.
    pub async fn expense(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let expense = self.require_expense(&db_tx, expense_id).await?;
            if expense.participant(user_id).is_none() {
                return Err(EngineError::Unauthorized(
                    "you are not a participant in this expense".to_string(),
                ));
            }
            Ok(expense)
        })
    }

    /// Lists the expenses `user_id` participates in, newest first by
    /// `(date DESC, created_at DESC)`.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<Vec<Expense>> {
        validate_list_filter(filter)?;
        with_tx!(self, |db_tx| {
            if let Some(group_id) = filter.group_id {
                self.require_active_member(&db_tx, group_id, user_id)
                    .await?;
            }

            let participating = Query::select()
                .column(expense_participants::Column::ExpenseId)
                .from(expense_participants::Entity)
                .and_where(Expr::col(expense_participants::Column::UserId).eq(user_id))
                .to_owned();
            let models = expenses::Entity::find()
                .filter(expenses::Column::Id.in_subquery(participating))
                .apply_expense_filters(filter)
                .order_by_desc(expenses::Column::Date)
                .order_by_desc(expenses::Column::CreatedAt)
                .limit(filter.page.limit)
                .offset(filter.page.offset)
                .all(&db_tx)
                .await?;
            debug!(user_id, count = models.len(), "expenses listed");
            self.with_participants(&db_tx, models).await
        })
    }

    /// Update the descriptive fields of an expense. Creator only.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        let patch = cmd.patch;
        if patch.is_empty() {
            return Err(EngineError::Validation("nothing to update".to_string()));
        }
        let description = patch
            .description
            .as_deref()
            .map(|d| normalize_required_text(d, "description"))
            .transpose()?;
        if let Some(date) = patch.date {
            ensure_not_future(date, Utc::now().date_naive())?;
        }

        with_tx!(self, |db_tx| {
            let model = expenses::Entity::find_by_id(cmd.expense_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
            if model.created_by != cmd.user_id {
                return Err(EngineError::Unauthorized(
                    "only the creator can update this expense".to_string(),
                ));
            }

            let mut active: expenses::ActiveModel = model.into();
            if let Some(description) = description {
                active.description = ActiveValue::Set(description);
            }
            if let Some(category) = patch.category {
                active.category = ActiveValue::Set(category.as_str().to_string());
            }
            if let Some(date) = patch.date {
                active.date = ActiveValue::Set(date);
            }
            if let Some(receipt_url) = &patch.receipt_url {
                active.receipt_url =
                    ActiveValue::Set(normalize_optional_text(Some(receipt_url.as_str())));
            }
            active.update(&db_tx).await?;

            info!(expense_id = %cmd.expense_id, user_id = %cmd.user_id, "expense updated");
            self.require_expense(&db_tx, cmd.expense_id).await
        })
    }

    /// Delete an expense and its participants. Creator only, and only while no
    /// participant is settled.
    pub async fn delete_expense(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let expense = self.require_expense(&db_tx, expense_id).await?;
            if expense.created_by != user_id {
                return Err(EngineError::Unauthorized(
                    "only the creator can delete this expense".to_string(),
                ));
            }
            if expense.has_settled_participant() {
                return Err(EngineError::InvalidState(
                    "cannot delete expense with settled participants".to_string(),
                ));
            }

            expense_participants::Entity::delete_many()
                .filter(expense_participants::Column::ExpenseId.eq(expense_id.to_string()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id.to_string())
                .exec(&db_tx)
                .await?;

            info!(%expense_id, user_id, "expense deleted");
            Ok(())
        })
    }

    /// Mark one participant's share as settled.
    ///
    /// Allowed for the expense creator and for the participant themselves.
    pub async fn mark_participant_settled(
        &self,
        expense_id: Uuid,
        participant: &str,
        user_id: &str,
    ) -> ResultEngine<Participant> {
        with_tx!(self, |db_tx| {
            let expense = self.require_expense(&db_tx, expense_id).await?;
            if expense.created_by != user_id && participant != user_id {
                return Err(EngineError::Unauthorized(
                    "only the creator or the participant can mark a share as settled".to_string(),
                ));
            }
            let row = expense.participant(participant).ok_or_else(|| {
                EngineError::KeyNotFound("participant not exists".to_string())
            })?;
            if row.is_settled {
                return Err(EngineError::InvalidState(
                    "participant share is already settled".to_string(),
                ));
            }

            let mut settled = row.clone();
            settled.is_settled = true;
            settled.settled_at = Some(Utc::now());
            let mut active: expense_participants::ActiveModel = (&settled).into();
            active.id = ActiveValue::Unchanged(settled.id.to_string());
            active.update(&db_tx).await?;

            info!(%expense_id, participant, user_id, "participant marked settled");
            Ok(settled)
        })
    }

    /// Attach participant rows to already loaded expense models, keeping the
    /// order of `models`.
    async fn with_participants(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut by_expense: HashMap<String, Vec<Participant>> = HashMap::new();
        if !ids.is_empty() {
            let rows = expense_participants::Entity::find()
                .filter(expense_participants::Column::ExpenseId.is_in(ids))
                .order_by_asc(expense_participants::Column::UserId)
                .all(db)
                .await?;
            for row in rows {
                let key = row.expense_id.clone();
                by_expense
                    .entry(key)
                    .or_default()
                    .push(Participant::try_from(row)?);
            }
        }

        models
            .into_iter()
            .map(|model| {
                let participants = by_expense.remove(&model.id).unwrap_or_default();
                let mut expense = Expense::try_from(model)?;
                expense.participants = participants;
                Ok(expense)
            })
            .collect()
    }
}
