use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, MemberRole, Participant, ResultEngine, Settlement,
    expense_participants, expenses, group_members, groups, settlements, users,
};

use super::Engine;

impl Engine {
    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    /// Membership row of `user_id` in the group, only if still active.
    pub(super) async fn active_membership(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<group_members::Model>> {
        let row = group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        Ok(row.filter(group_members::Model::is_active))
    }

    pub(super) async fn require_active_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<group_members::Model> {
        self.require_group(db, group_id).await?;
        self.active_membership(db, group_id, user_id)
            .await?
            .ok_or_else(|| {
                EngineError::Unauthorized("user is not a member of the group".to_string())
            })
    }

    pub(super) async fn require_group_admin(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let membership = self.require_active_member(db, group_id, user_id).await?;
        if MemberRole::try_from(membership.role.as_str())? != MemberRole::Admin {
            return Err(EngineError::Unauthorized(
                "only group admins can manage members".to_string(),
            ));
        }
        Ok(())
    }

    /// User ids of the active members of a group, ordered by user id.
    pub(super) async fn active_member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<String>> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.to_string()))
            .filter(group_members::Column::LeftAt.is_null())
            .order_by_asc(group_members::Column::UserId)
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }

    /// Load an expense with its participants.
    pub(super) async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        let mut expense = Expense::try_from(model)?;
        expense.participants = expense_participants::Entity::find()
            .filter(expense_participants::Column::ExpenseId.eq(expense_id.to_string()))
            .order_by_asc(expense_participants::Column::UserId)
            .all(db)
            .await?
            .into_iter()
            .map(Participant::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(expense)
    }

    /// Load a settlement, including soft-deleted ones.
    pub(super) async fn require_settlement(
        &self,
        db: &DatabaseTransaction,
        settlement_id: Uuid,
    ) -> ResultEngine<Settlement> {
        let model = settlements::Entity::find_by_id(settlement_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))?;
        Settlement::try_from(model)
    }
}
