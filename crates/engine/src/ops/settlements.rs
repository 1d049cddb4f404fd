use chrono::Utc;
use sea_orm::{
    Condition, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, UpdateMany, prelude::*, sea_query::Expr,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    CreateSettlementCmd, EngineError, Page, ResultEngine, Settlement, SettlementPatch,
    settlements, util::normalize_optional_text,
};

use super::{Engine, with_tx};

/// Restricts an update to a pending settlement whose `actor_column` is `actor`.
fn pending_and_owned_by(
    update: UpdateMany<settlements::Entity>,
    settlement_id: Uuid,
    actor_column: settlements::Column,
    actor: &str,
) -> UpdateMany<settlements::Entity> {
    update
        .filter(settlements::Column::Id.eq(settlement_id.to_string()))
        .filter(settlements::Column::IsConfirmed.eq(false))
        .filter(settlements::Column::DeletedAt.is_null())
        .filter(actor_column.eq(actor))
}

fn validate_page(page: Page) -> ResultEngine<()> {
    if page.limit == 0 {
        return Err(EngineError::Validation("limit must be > 0".to_string()));
    }
    Ok(())
}

async fn list_settlements<C: ConnectionTrait>(
    db: &C,
    condition: Condition,
    page: Page,
) -> ResultEngine<Vec<Settlement>> {
    let models = settlements::Entity::find()
        .filter(condition)
        .filter(settlements::Column::DeletedAt.is_null())
        .order_by_desc(settlements::Column::CreatedAt)
        .order_by_desc(settlements::Column::Id)
        .limit(page.limit)
        .offset(page.offset)
        .all(db)
        .await?;
    debug!(count = models.len(), "settlements listed");
    models.into_iter().map(Settlement::try_from).collect()
}

impl Engine {
    /// Record a pending settlement paid by `cmd.payer_id`.
    pub async fn create_settlement(&self, cmd: CreateSettlementCmd) -> ResultEngine<Settlement> {
        let settlement = Settlement::new(
            cmd.payer_id,
            cmd.payee_id,
            cmd.amount,
            cmd.payment_method,
            normalize_optional_text(cmd.notes.as_deref()),
            cmd.group_id,
            Utc::now(),
        )?;

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &settlement.payer_id)
                .await?;
            self.require_user_exists(&db_tx, &settlement.payee_id)
                .await
                .map_err(|_| EngineError::KeyNotFound("payee not exists".to_string()))?;

            if let Some(group_id) = settlement.group_id {
                self.require_group(&db_tx, group_id).await?;
                if self
                    .active_membership(&db_tx, group_id, &settlement.payer_id)
                    .await?
                    .is_none()
                {
                    return Err(EngineError::Unauthorized(
                        "payer must be a member of the group".to_string(),
                    ));
                }
                if self
                    .active_membership(&db_tx, group_id, &settlement.payee_id)
                    .await?
                    .is_none()
                {
                    return Err(EngineError::Validation(
                        "payee must be a member of the group".to_string(),
                    ));
                }
            }

            let model: settlements::ActiveModel = (&settlement).into();
            model.insert(&db_tx).await?;
            info!(
                settlement_id = %settlement.id,
                payer = %settlement.payer_id,
                payee = %settlement.payee_id,
                amount = %settlement.amount,
                "settlement created"
            );
            Ok(settlement)
        })
    }

    /// Return a settlement to its payer or payee. Deleted settlements are not
    /// visible.
    pub async fn settlement(&self, settlement_id: Uuid, user_id: &str) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            let settlement = self.require_settlement(&db_tx, settlement_id).await?;
            if settlement.deleted_at.is_some() {
                return Err(EngineError::KeyNotFound("settlement not exists".to_string()));
            }
            if !settlement.involves(user_id) {
                return Err(EngineError::Unauthorized(
                    "you are not involved in this settlement".to_string(),
                ));
            }
            Ok(settlement)
        })
    }

    /// Change amount, method or notes of a pending settlement. Payer only.
    pub async fn update_settlement(
        &self,
        settlement_id: Uuid,
        patch: SettlementPatch,
        user_id: &str,
    ) -> ResultEngine<Settlement> {
        if patch.amount.is_none() && patch.payment_method.is_none() && patch.notes.is_none() {
            return Err(EngineError::Validation("nothing to update".to_string()));
        }
        if let Some(amount) = patch.amount
            && !amount.is_positive()
        {
            return Err(EngineError::Validation(
                "settlement amount must be > 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let mut update = settlements::Entity::update_many();
            if let Some(amount) = patch.amount {
                update =
                    update.col_expr(settlements::Column::AmountMinor, Expr::value(amount.cents()));
            }
            if let Some(method) = patch.payment_method {
                update = update.col_expr(
                    settlements::Column::PaymentMethod,
                    Expr::value(method.as_str()),
                );
            }
            if let Some(notes) = &patch.notes {
                update = update.col_expr(
                    settlements::Column::Notes,
                    Expr::value(normalize_optional_text(Some(notes.as_str()))),
                );
            }

            let result = pending_and_owned_by(
                update,
                settlement_id,
                settlements::Column::PayerId,
                user_id,
            )
            .exec(&db_tx)
            .await?;
            if result.rows_affected == 0 {
                return Err(self
                    .transition_error(&db_tx, settlement_id, |s| s.ensure_can_update(user_id))
                    .await);
            }

            info!(%settlement_id, user_id, "settlement updated");
            self.require_settlement(&db_tx, settlement_id).await
        })
    }

    /// Confirm receipt of a pending settlement. Payee only.
    ///
    /// Of two concurrent confirms exactly one succeeds; the other reports the
    /// settlement as already confirmed.
    pub async fn confirm_settlement(
        &self,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            let update = settlements::Entity::update_many()
                .col_expr(settlements::Column::IsConfirmed, Expr::value(true))
                .col_expr(settlements::Column::ConfirmedAt, Expr::value(Some(Utc::now())));
            let result = pending_and_owned_by(
                update,
                settlement_id,
                settlements::Column::PayeeId,
                user_id,
            )
            .exec(&db_tx)
            .await?;
            if result.rows_affected == 0 {
                return Err(self
                    .transition_error(&db_tx, settlement_id, |s| s.ensure_can_confirm(user_id))
                    .await);
            }

            info!(%settlement_id, user_id, "settlement confirmed");
            self.require_settlement(&db_tx, settlement_id).await
        })
    }

    /// Soft-delete a pending settlement. Payer only.
    pub async fn delete_settlement(&self, settlement_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let update = settlements::Entity::update_many()
                .col_expr(settlements::Column::DeletedAt, Expr::value(Some(Utc::now())));
            let result = pending_and_owned_by(
                update,
                settlement_id,
                settlements::Column::PayerId,
                user_id,
            )
            .exec(&db_tx)
            .await?;
            if result.rows_affected == 0 {
                return Err(self
                    .transition_error(&db_tx, settlement_id, |s| s.ensure_can_delete(user_id))
                    .await);
            }

            info!(%settlement_id, user_id, "settlement deleted");
            Ok(())
        })
    }

    /// Settlements where the user is payer or payee, newest first.
    pub async fn list_settlements_for_user(
        &self,
        user_id: &str,
        page: Page,
    ) -> ResultEngine<Vec<Settlement>> {
        validate_page(page)?;
        let condition = Condition::any()
            .add(settlements::Column::PayerId.eq(user_id))
            .add(settlements::Column::PayeeId.eq(user_id));
        with_tx!(self, |db_tx| {
            list_settlements(&db_tx, condition, page).await
        })
    }

    /// Settlements between two users in either direction, newest first.
    pub async fn list_settlements_between(
        &self,
        user_id: &str,
        other_user_id: &str,
        page: Page,
    ) -> ResultEngine<Vec<Settlement>> {
        validate_page(page)?;
        let condition = Condition::any()
            .add(
                Condition::all()
                    .add(settlements::Column::PayerId.eq(user_id))
                    .add(settlements::Column::PayeeId.eq(other_user_id)),
            )
            .add(
                Condition::all()
                    .add(settlements::Column::PayerId.eq(other_user_id))
                    .add(settlements::Column::PayeeId.eq(user_id)),
            );
        with_tx!(self, |db_tx| {
            list_settlements(&db_tx, condition, page).await
        })
    }

    /// Settlements tagged with a group, newest first. Members only.
    pub async fn list_group_settlements(
        &self,
        group_id: Uuid,
        user_id: &str,
        page: Page,
    ) -> ResultEngine<Vec<Settlement>> {
        validate_page(page)?;
        let condition =
            Condition::all().add(settlements::Column::GroupId.eq(group_id.to_string()));
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id)
                .await?;
            list_settlements(&db_tx, condition, page).await
        })
    }

    /// Explains why a conditional transition touched no row.
    ///
    /// Re-reads the settlement and runs `check` against its current state, so
    /// the caller sees `KeyNotFound`, `InvalidState` or `Unauthorized` exactly
    /// as a non-racing call would.
    async fn transition_error(
        &self,
        db: &DatabaseTransaction,
        settlement_id: Uuid,
        check: impl FnOnce(&Settlement) -> ResultEngine<()>,
    ) -> EngineError {
        let settlement = match self.require_settlement(db, settlement_id).await {
            Ok(settlement) => settlement,
            Err(err) => return err,
        };
        match check(&settlement) {
            Err(err) => err,
            Ok(()) => EngineError::InvalidState(format!(
                "settlement is {}",
                settlement.state().as_str()
            )),
        }
    }
}
