use engine::{
    CreateSettlementCmd, EngineError, MemberRole, Page, PaymentMethod, SettlementPatch,
    SettlementState,
};

mod common;

use common::{cents, confirmed_settlement, engine_with_db};

fn cash(payer: &str, payee: &str, amount: i64) -> CreateSettlementCmd {
    CreateSettlementCmd::new(payer, payee, cents(amount), PaymentMethod::Cash)
}

#[tokio::test]
async fn create_settlement_validates_input() {
    let (engine, _db) = engine_with_db().await;

    assert_eq!(
        engine.create_settlement(cash("alice", "bob", 0)).await.unwrap_err(),
        EngineError::Validation("settlement amount must be > 0".to_string())
    );
    assert_eq!(
        engine
            .create_settlement(cash("alice", "alice", 10_00))
            .await
            .unwrap_err(),
        EngineError::Validation("cannot create settlement with yourself".to_string())
    );
    assert_eq!(
        engine
            .create_settlement(cash("alice", "mallory", 10_00))
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("payee not exists".to_string())
    );

    let created = engine
        .create_settlement(cash("alice", "bob", 10_00).notes("  rent  "))
        .await
        .unwrap();
    assert_eq!(created.state(), SettlementState::Pending);
    assert_eq!(created.notes.as_deref(), Some("rent"));
    assert!(created.confirmed_at.is_none());
}

#[tokio::test]
async fn payee_confirms_once() {
    let (engine, _db) = engine_with_db().await;
    let pending = engine
        .create_settlement(cash("alice", "bob", 25_00))
        .await
        .unwrap();

    assert_eq!(
        engine
            .confirm_settlement(pending.id, "alice")
            .await
            .unwrap_err(),
        EngineError::Unauthorized("only the payee can confirm a settlement".to_string())
    );

    let confirmed = engine.confirm_settlement(pending.id, "bob").await.unwrap();
    assert_eq!(confirmed.state(), SettlementState::Confirmed);
    assert!(confirmed.confirmed_at.is_some());

    for actor in ["alice", "bob", "carol"] {
        assert_eq!(
            engine.confirm_settlement(pending.id, actor).await.unwrap_err(),
            EngineError::InvalidState("cannot confirm a confirmed settlement".to_string())
        );
    }
    assert_eq!(
        engine.delete_settlement(pending.id, "alice").await.unwrap_err(),
        EngineError::InvalidState("cannot delete a confirmed settlement".to_string())
    );
    assert_eq!(
        engine
            .update_settlement(pending.id, SettlementPatch::default().amount(cents(1_00)), "alice")
            .await
            .unwrap_err(),
        EngineError::InvalidState("cannot update a confirmed settlement".to_string())
    );
}

#[tokio::test]
async fn concurrent_confirms_succeed_once() {
    let (engine, _db) = engine_with_db().await;
    let pending = engine
        .create_settlement(cash("alice", "bob", 5_00))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        engine.confirm_settlement(pending.id, "bob"),
        engine.confirm_settlement(pending.id, "bob"),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let err = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_eq!(
        err,
        EngineError::InvalidState("cannot confirm a confirmed settlement".to_string())
    );
}

#[tokio::test]
async fn payer_deletes_pending_settlement() {
    let (engine, _db) = engine_with_db().await;
    let pending = engine
        .create_settlement(cash("alice", "bob", 5_00))
        .await
        .unwrap();

    assert_eq!(
        engine.delete_settlement(pending.id, "bob").await.unwrap_err(),
        EngineError::Unauthorized("only the payer can delete a settlement".to_string())
    );
    engine.delete_settlement(pending.id, "alice").await.unwrap();

    assert_eq!(
        engine.delete_settlement(pending.id, "alice").await.unwrap_err(),
        EngineError::InvalidState("cannot delete a deleted settlement".to_string())
    );
    assert_eq!(
        engine.confirm_settlement(pending.id, "bob").await.unwrap_err(),
        EngineError::InvalidState("cannot confirm a deleted settlement".to_string())
    );
    assert_eq!(
        engine.settlement(pending.id, "alice").await.unwrap_err(),
        EngineError::KeyNotFound("settlement not exists".to_string())
    );
    assert_eq!(
        engine
            .confirm_settlement(uuid::Uuid::new_v4(), "bob")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("settlement not exists".to_string())
    );
}

#[tokio::test]
async fn payer_updates_pending_settlement() {
    let (engine, _db) = engine_with_db().await;
    let pending = engine
        .create_settlement(cash("alice", "bob", 5_00))
        .await
        .unwrap();

    assert_eq!(
        engine
            .update_settlement(pending.id, SettlementPatch::default(), "alice")
            .await
            .unwrap_err(),
        EngineError::Validation("nothing to update".to_string())
    );
    assert_eq!(
        engine
            .update_settlement(pending.id, SettlementPatch::default().amount(cents(-1)), "alice")
            .await
            .unwrap_err(),
        EngineError::Validation("settlement amount must be > 0".to_string())
    );
    assert_eq!(
        engine
            .update_settlement(pending.id, SettlementPatch::default().notes("mine"), "bob")
            .await
            .unwrap_err(),
        EngineError::Unauthorized("only the payer can update a settlement".to_string())
    );

    let updated = engine
        .update_settlement(
            pending.id,
            SettlementPatch::default()
                .amount(cents(7_50))
                .payment_method(PaymentMethod::BankTransfer)
                .notes("half of the taxi"),
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, cents(7_50));
    assert_eq!(updated.payment_method, PaymentMethod::BankTransfer);
    assert_eq!(updated.notes.as_deref(), Some("half of the taxi"));
    assert_eq!(updated.state(), SettlementState::Pending);
}

#[tokio::test]
async fn only_parties_can_read_a_settlement() {
    let (engine, _db) = engine_with_db().await;
    let pending = engine
        .create_settlement(cash("alice", "bob", 5_00))
        .await
        .unwrap();

    assert_eq!(engine.settlement(pending.id, "bob").await.unwrap().id, pending.id);
    assert_eq!(
        engine.settlement(pending.id, "carol").await.unwrap_err(),
        EngineError::Unauthorized("you are not involved in this settlement".to_string())
    );
}

#[tokio::test]
async fn lists_hide_deleted_settlements() {
    let (engine, _db) = engine_with_db().await;
    let first = confirmed_settlement(&engine, "alice", "bob", 10_00, None).await;
    let dropped = engine
        .create_settlement(cash("bob", "alice", 3_00))
        .await
        .unwrap();
    engine.delete_settlement(dropped.id, "bob").await.unwrap();
    let last = engine
        .create_settlement(cash("carol", "alice", 4_00))
        .await
        .unwrap();

    let mine = engine
        .list_settlements_for_user("alice", Page::default())
        .await
        .unwrap();
    let ids: Vec<_> = mine.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&last.id));

    let between = engine
        .list_settlements_between("bob", "alice", Page::default())
        .await
        .unwrap();
    assert_eq!(between.len(), 1);
    assert_eq!(between[0].id, first.id);

    assert_eq!(
        engine
            .list_settlements_for_user("alice", Page::new(0, 0))
            .await
            .unwrap_err(),
        EngineError::Validation("limit must be > 0".to_string())
    );
}

#[tokio::test]
async fn group_settlements_require_members() {
    let (engine, _db) = engine_with_db().await;
    let group = engine.new_group("Flat", "alice").await.unwrap();
    engine
        .add_group_member(group.id, "bob", MemberRole::Member, "alice")
        .await
        .unwrap();

    assert_eq!(
        engine
            .create_settlement(cash("carol", "alice", 5_00).group_id(group.id))
            .await
            .unwrap_err(),
        EngineError::Unauthorized("payer must be a member of the group".to_string())
    );
    assert_eq!(
        engine
            .create_settlement(cash("alice", "carol", 5_00).group_id(group.id))
            .await
            .unwrap_err(),
        EngineError::Validation("payee must be a member of the group".to_string())
    );
    assert_eq!(
        engine
            .create_settlement(cash("alice", "bob", 5_00).group_id(uuid::Uuid::new_v4()))
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("group not exists".to_string())
    );

    let tagged = confirmed_settlement(&engine, "bob", "alice", 5_00, Some(group.id)).await;
    let _untagged = confirmed_settlement(&engine, "bob", "alice", 1_00, None).await;

    let listed = engine
        .list_group_settlements(group.id, "alice", Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, tagged.id);
    assert_eq!(
        engine
            .list_group_settlements(group.id, "carol", Page::default())
            .await
            .unwrap_err(),
        EngineError::Unauthorized("user is not a member of the group".to_string())
    );
}
