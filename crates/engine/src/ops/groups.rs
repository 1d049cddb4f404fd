use chrono::Utc;
use sea_orm::{
    ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::{Expr, Query},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    EngineError, Group, GroupMember, MemberRole, ResultEngine, group_members, groups,
    util::normalize_required_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a group; the creator becomes its first admin.
    pub async fn new_group(&self, name: &str, user_id: &str) -> ResultEngine<Group> {
        let name = normalize_required_text(name, "group name")?;
        let now = Utc::now();
        let group = Group::new(name, user_id.to_string(), now);
        let group_model: groups::ActiveModel = (&group).into();

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            group_model.insert(&db_tx).await?;
            group_members::ActiveModel {
                group_id: ActiveValue::Set(group.id.to_string()),
                user_id: ActiveValue::Set(user_id.to_string()),
                role: ActiveValue::Set(MemberRole::Admin.as_str().to_string()),
                joined_at: ActiveValue::Set(now),
                left_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            info!(group_id = %group.id, user_id, "group created");
            Ok(group)
        })
    }

    /// Return a group the user is an active member of.
    pub async fn group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id)
                .await?;
            let model = self.require_group(&db_tx, group_id).await?;
            Group::try_from(model)
        })
    }

    /// Groups the user is an active member of, ordered by name.
    pub async fn list_groups_for_user(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;
            let memberships = Query::select()
                .column(group_members::Column::GroupId)
                .from(group_members::Entity)
                .and_where(Expr::col(group_members::Column::UserId).eq(user_id))
                .and_where(Expr::col(group_members::Column::LeftAt).is_null())
                .to_owned();
            let models = groups::Entity::find()
                .filter(groups::Column::Id.in_subquery(memberships))
                .order_by_asc(groups::Column::Name)
                .order_by_asc(groups::Column::Id)
                .all(&db_tx)
                .await?;
            debug!(user_id, count = models.len(), "groups listed");
            models.into_iter().map(Group::try_from).collect()
        })
    }

    /// Add `member` to the group, or bring a former member back.
    ///
    /// Only active admins may add members.
    pub async fn add_group_member(
        &self,
        group_id: Uuid,
        member: &str,
        role: MemberRole,
        user_id: &str,
    ) -> ResultEngine<GroupMember> {
        with_tx!(self, |db_tx| {
            self.require_group_admin(&db_tx, group_id, user_id).await?;
            self.require_user_exists(&db_tx, member).await?;

            let existing =
                group_members::Entity::find_by_id((group_id.to_string(), member.to_string()))
                    .one(&db_tx)
                    .await?;
            let now = Utc::now();
            let model = match existing {
                Some(model) if model.is_active() => {
                    return Err(EngineError::ExistingKey(member.to_string()));
                }
                Some(model) => {
                    let mut active: group_members::ActiveModel = model.into();
                    active.role = ActiveValue::Set(role.as_str().to_string());
                    active.joined_at = ActiveValue::Set(now);
                    active.left_at = ActiveValue::Set(None);
                    active.update(&db_tx).await?
                }
                None => {
                    group_members::ActiveModel {
                        group_id: ActiveValue::Set(group_id.to_string()),
                        user_id: ActiveValue::Set(member.to_string()),
                        role: ActiveValue::Set(role.as_str().to_string()),
                        joined_at: ActiveValue::Set(now),
                        left_at: ActiveValue::Set(None),
                    }
                    .insert(&db_tx)
                    .await?
                }
            };
            info!(%group_id, member, role = role.as_str(), "group member added");
            GroupMember::try_from(model)
        })
    }

    /// Remove `member` from the group.
    ///
    /// Anyone may remove themselves; removing somebody else requires an admin.
    /// The last admin stays while other members are left in the group.
    pub async fn remove_group_member(
        &self,
        group_id: Uuid,
        member: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            if member != user_id {
                self.require_group_admin(&db_tx, group_id, user_id).await?;
            }
            let target = self
                .require_active_member(&db_tx, group_id, member)
                .await?;

            if MemberRole::try_from(target.role.as_str())? == MemberRole::Admin {
                let active_members = group_members::Entity::find()
                    .filter(group_members::Column::GroupId.eq(group_id.to_string()))
                    .filter(group_members::Column::LeftAt.is_null());
                let admins = active_members
                    .clone()
                    .filter(group_members::Column::Role.eq(MemberRole::Admin.as_str()))
                    .count(&db_tx)
                    .await?;
                let members = active_members.count(&db_tx).await?;
                if admins <= 1 && members > 1 {
                    return Err(EngineError::InvalidState(
                        "cannot remove the last admin from the group".to_string(),
                    ));
                }
            }

            let mut active: group_members::ActiveModel = target.into();
            active.left_at = ActiveValue::Set(Some(Utc::now()));
            active.update(&db_tx).await?;
            info!(%group_id, member, "group member removed");
            Ok(())
        })
    }

    /// Leave a group. The membership row is kept with `left_at` set.
    pub async fn leave_group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<()> {
        self.remove_group_member(group_id, user_id, user_id).await
    }

    /// Active members of a group, visible to active members only.
    pub async fn group_members(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<GroupMember>> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id)
                .await?;
            let rows = group_members::Entity::find()
                .filter(group_members::Column::GroupId.eq(group_id.to_string()))
                .filter(group_members::Column::LeftAt.is_null())
                .order_by_asc(group_members::Column::JoinedAt)
                .order_by_asc(group_members::Column::UserId)
                .all(&db_tx)
                .await?;
            debug!(%group_id, count = rows.len(), "group members loaded");
            rows.into_iter().map(GroupMember::try_from).collect()
        })
    }
}
