use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::{Expr, Query},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    BalanceEdge, BalanceSummary, GroupBalance, MoneyCents, NetBalance, ResultEngine,
    SettlementRecord, ShareRecord, Transfer, balances, expense_participants, expenses,
    settlements, simplify,
};

use super::{Engine, with_tx};

impl Engine {
    /// Shares of every expense `user_id` participates in, including the rows
    /// of the other participants.
    async fn shares_with(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Vec<ShareRecord>> {
        let participating = Query::select()
            .column(expense_participants::Column::ExpenseId)
            .from(expense_participants::Entity)
            .and_where(Expr::col(expense_participants::Column::UserId).eq(user_id))
            .to_owned();
        expense_participants::Entity::find()
            .filter(expense_participants::Column::ExpenseId.in_subquery(participating))
            .order_by_asc(expense_participants::Column::ExpenseId)
            .order_by_asc(expense_participants::Column::UserId)
            .all(db)
            .await?
            .into_iter()
            .map(ShareRecord::try_from)
            .collect()
    }

    /// Confirmed, non-deleted settlements matching `condition`.
    async fn confirmed_settlements(
        &self,
        db: &DatabaseTransaction,
        condition: Condition,
    ) -> ResultEngine<Vec<SettlementRecord>> {
        let records = settlements::Entity::find()
            .filter(condition)
            .filter(settlements::Column::IsConfirmed.eq(true))
            .filter(settlements::Column::DeletedAt.is_null())
            .order_by_asc(settlements::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(SettlementRecord::from)
            .collect::<Vec<_>>();
        Ok(records)
    }

    async fn balance_edges(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<Vec<BalanceEdge>> {
        self.require_user_exists(db, user_id).await?;
        let shares = self.shares_with(db, user_id).await?;
        let settled = self
            .confirmed_settlements(
                db,
                Condition::any()
                    .add(settlements::Column::PayerId.eq(user_id))
                    .add(settlements::Column::PayeeId.eq(user_id)),
            )
            .await?;
        let edges = balances::all_for(user_id, &shares, &settled);
        debug!(
            user_id,
            shares = shares.len(),
            settlements = settled.len(),
            edges = edges.len(),
            "balances computed"
        );
        Ok(edges)
    }

    async fn group_totals(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<GroupBalance>> {
        self.require_active_member(db, group_id, user_id).await?;
        let members = self.active_member_ids(db, group_id).await?;

        let group_expenses = Query::select()
            .column(expenses::Column::Id)
            .from(expenses::Entity)
            .and_where(Expr::col(expenses::Column::GroupId).eq(group_id.to_string()))
            .to_owned();
        let shares = expense_participants::Entity::find()
            .filter(expense_participants::Column::ExpenseId.in_subquery(group_expenses))
            .all(db)
            .await?
            .into_iter()
            .map(ShareRecord::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        let settled = self
            .confirmed_settlements(
                db,
                Condition::all().add(settlements::Column::GroupId.eq(group_id.to_string())),
            )
            .await?;

        debug!(
            %group_id,
            members = members.len(),
            shares = shares.len(),
            settlements = settled.len(),
            "group balances computed"
        );
        Ok(balances::group(&members, &shares, &settled))
    }

    /// Net balance between two users; positive means `user_b` owes `user_a`.
    pub async fn pairwise_balance(&self, user_a: &str, user_b: &str) -> ResultEngine<MoneyCents> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_a).await?;
            self.require_user_exists(&db_tx, user_b).await?;
            let shares = self.shares_with(&db_tx, user_a).await?;
            let settled = self
                .confirmed_settlements(
                    &db_tx,
                    Condition::any()
                        .add(
                            Condition::all()
                                .add(settlements::Column::PayerId.eq(user_a))
                                .add(settlements::Column::PayeeId.eq(user_b)),
                        )
                        .add(
                            Condition::all()
                                .add(settlements::Column::PayerId.eq(user_b))
                                .add(settlements::Column::PayeeId.eq(user_a)),
                        ),
                )
                .await?;
            Ok(balances::pairwise(user_a, user_b, &shares, &settled))
        })
    }

    /// Balance of `user_id` against every counterparty, largest first.
    ///
    /// Counterparties within one cent of zero are left out.
    pub async fn all_balances_for(&self, user_id: &str) -> ResultEngine<Vec<BalanceEdge>> {
        with_tx!(self, |db_tx| self.balance_edges(&db_tx, user_id).await)
    }

    /// Totals of what the user is owed and owes, with the underlying edges.
    pub async fn balance_summary(&self, user_id: &str) -> ResultEngine<BalanceSummary> {
        let edges = self.all_balances_for(user_id).await?;
        Ok(balances::summarize(edges))
    }

    /// One direct payment per counterparty that would clear the user's
    /// balances.
    pub async fn settlement_suggestions(&self, user_id: &str) -> ResultEngine<Vec<Transfer>> {
        let edges = self.all_balances_for(user_id).await?;
        Ok(balances::direct_transfers(user_id, &edges))
    }

    /// Paid, owed and net totals of every active member of a group.
    ///
    /// Only active members may ask.
    pub async fn group_balances(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<GroupBalance>> {
        with_tx!(self, |db_tx| {
            self.group_totals(&db_tx, group_id, user_id).await
        })
    }

    /// Simplified transfers that would settle the whole group.
    pub async fn group_settlement_suggestions(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Transfer>> {
        let totals = self.group_balances(group_id, user_id).await?;
        let nets: Vec<NetBalance> = totals
            .into_iter()
            .map(|b| NetBalance::new(b.user_id, b.net))
            .collect();
        Ok(simplify(&nets))
    }
}
