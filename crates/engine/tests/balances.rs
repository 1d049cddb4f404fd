use engine::{
    BalanceEdge, CreateExpenseCmd, CreateSettlementCmd, EngineError, GroupBalance, MemberRole,
    MoneyCents, ParticipantInput, PaymentMethod, SplitMethod, Transfer,
};

mod common;

use common::{cents, confirmed_settlement, engine_with_db, equal_expense, today};

fn edge(counterparty: &str, amount: i64) -> BalanceEdge {
    BalanceEdge {
        counterparty: counterparty.to_string(),
        amount: cents(amount),
    }
}

fn transfer(from: &str, to: &str, amount: i64) -> Transfer {
    Transfer {
        from: from.to_string(),
        to: to.to_string(),
        amount: cents(amount),
    }
}

#[tokio::test]
async fn pairwise_balance_between_two_users() {
    let (engine, _db) = engine_with_db().await;
    equal_expense(&engine, "alice", 100_00, &["bob"], None).await;

    assert_eq!(engine.pairwise_balance("alice", "bob").await.unwrap(), cents(50_00));
    assert_eq!(engine.pairwise_balance("bob", "alice").await.unwrap(), cents(-50_00));
    assert_eq!(engine.pairwise_balance("alice", "carol").await.unwrap(), MoneyCents::ZERO);
    assert_eq!(
        engine.pairwise_balance("alice", "mallory").await.unwrap_err(),
        EngineError::KeyNotFound("user not exists".to_string())
    );
}

#[tokio::test]
async fn only_confirmed_settlements_move_balances() {
    let (engine, _db) = engine_with_db().await;
    equal_expense(&engine, "alice", 100_00, &["bob"], None).await;

    let pending = engine
        .create_settlement(CreateSettlementCmd::new(
            "bob",
            "alice",
            cents(10_00),
            PaymentMethod::Cash,
        ))
        .await
        .unwrap();
    let deleted = engine
        .create_settlement(CreateSettlementCmd::new(
            "bob",
            "alice",
            cents(15_00),
            PaymentMethod::Cash,
        ))
        .await
        .unwrap();
    engine.delete_settlement(deleted.id, "bob").await.unwrap();
    assert_eq!(engine.pairwise_balance("alice", "bob").await.unwrap(), cents(50_00));

    engine.confirm_settlement(pending.id, "alice").await.unwrap();
    // Received payments count in favor of the payee.
    assert_eq!(engine.pairwise_balance("alice", "bob").await.unwrap(), cents(60_00));
    assert_eq!(engine.pairwise_balance("bob", "alice").await.unwrap(), cents(-60_00));
}

#[tokio::test]
async fn all_balances_cross_every_participant_pair() {
    let (engine, _db) = engine_with_db().await;
    equal_expense(&engine, "alice", 90_00, &["bob", "carol"], None).await;
    equal_expense(&engine, "alice", 60_00, &["carol"], None).await;

    let edges = engine.all_balances_for("alice").await.unwrap();
    assert_eq!(edges, vec![edge("carol", 60_00), edge("bob", 30_00)]);
    assert_eq!(engine.all_balances_for("alice").await.unwrap(), edges);

    // bob and carol both owe alice the same 30.00 on the shared dinner.
    assert_eq!(engine.all_balances_for("bob").await.unwrap(), vec![edge("alice", -30_00)]);
    assert!(engine.all_balances_for("dave").await.unwrap().is_empty());
}

#[tokio::test]
async fn one_cent_edges_are_dropped() {
    let (engine, _db) = engine_with_db().await;
    let cmd = CreateExpenseCmd::new("alice", "Gum", cents(2), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("alice", cents(2)))
        .participant(ParticipantInput::new("bob", MoneyCents::ZERO));
    engine.create_expense(cmd).await.unwrap();

    assert_eq!(engine.pairwise_balance("alice", "bob").await.unwrap(), cents(1));
    assert!(engine.all_balances_for("alice").await.unwrap().is_empty());
    assert!(engine.settlement_suggestions("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn summary_and_direct_suggestions() {
    let (engine, _db) = engine_with_db().await;
    equal_expense(&engine, "alice", 90_00, &["bob", "carol"], None).await;
    equal_expense(&engine, "bob", 20_00, &["alice"], None).await;

    let summary = engine.balance_summary("alice").await.unwrap();
    assert_eq!(summary.owed_to_user, cents(50_00));
    assert_eq!(summary.user_owes, MoneyCents::ZERO);
    assert_eq!(summary.net, cents(50_00));
    assert_eq!(summary.edges, vec![edge("carol", 30_00), edge("bob", 20_00)]);

    let summary = engine.balance_summary("bob").await.unwrap();
    assert_eq!(summary.user_owes, cents(20_00));
    assert_eq!(summary.net, cents(-20_00));

    assert_eq!(
        engine.settlement_suggestions("alice").await.unwrap(),
        vec![transfer("carol", "alice", 30_00), transfer("bob", "alice", 20_00)]
    );
    assert_eq!(
        engine.settlement_suggestions("bob").await.unwrap(),
        vec![transfer("bob", "alice", 20_00)]
    );
}

#[tokio::test]
async fn group_balances_and_suggestions() {
    let (engine, _db) = engine_with_db().await;
    let group = engine.new_group("Trip", "alice").await.unwrap();
    for member in ["bob", "carol"] {
        engine
            .add_group_member(group.id, member, MemberRole::Member, "alice")
            .await
            .unwrap();
    }
    equal_expense(&engine, "alice", 90_00, &["bob", "carol"], Some(group.id)).await;
    // Outside of the group, must not count.
    equal_expense(&engine, "bob", 40_00, &["alice"], None).await;

    let totals = engine.group_balances(group.id, "bob").await.unwrap();
    assert_eq!(
        totals,
        vec![
            GroupBalance {
                user_id: "alice".to_string(),
                total_paid: cents(90_00),
                total_owed: cents(30_00),
                net: cents(60_00),
            },
            GroupBalance {
                user_id: "bob".to_string(),
                total_paid: MoneyCents::ZERO,
                total_owed: cents(30_00),
                net: cents(-30_00),
            },
            GroupBalance {
                user_id: "carol".to_string(),
                total_paid: MoneyCents::ZERO,
                total_owed: cents(30_00),
                net: cents(-30_00),
            },
        ]
    );
    let sum: MoneyCents = totals.iter().map(|b| b.net).sum();
    assert_eq!(sum, MoneyCents::ZERO);

    assert_eq!(
        engine.group_settlement_suggestions(group.id, "carol").await.unwrap(),
        vec![
            transfer("bob", "alice", 30_00),
            transfer("carol", "alice", 30_00),
        ]
    );

    confirmed_settlement(&engine, "bob", "alice", 30_00, Some(group.id)).await;
    assert_eq!(
        engine.group_settlement_suggestions(group.id, "alice").await.unwrap(),
        vec![transfer("carol", "alice", 30_00)]
    );
}

#[tokio::test]
async fn group_balances_are_for_members_only() {
    let (engine, _db) = engine_with_db().await;
    let group = engine.new_group("Trip", "alice").await.unwrap();

    assert_eq!(
        engine.group_balances(group.id, "dave").await.unwrap_err(),
        EngineError::Unauthorized("user is not a member of the group".to_string())
    );
    assert_eq!(
        engine
            .group_settlement_suggestions(uuid::Uuid::new_v4(), "alice")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("group not exists".to_string())
    );
}
