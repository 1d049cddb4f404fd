use chrono::Duration;

use engine::{
    CreateExpenseCmd, EngineError, ExpenseCategory, ExpenseListFilter, MemberRole, MoneyCents,
    Page, ParticipantInput, Percent, SplitMethod, UpdateExpenseCmd,
};

mod common;

use common::{cents, engine_with_db, equal_expense, today};

#[tokio::test]
async fn equal_split_is_stored_with_participants() {
    let (engine, _db) = engine_with_db().await;

    let created = equal_expense(&engine, "alice", 90_00, &["bob", "carol"], None).await;
    assert_eq!(created.amount, cents(90_00));
    assert_eq!(created.participants.len(), 3);
    assert!(created.participants.iter().all(|p| p.owed == cents(30_00)));

    let loaded = engine.expense(created.id, "bob").await.unwrap();
    assert_eq!(loaded.description, "Dinner");
    assert_eq!(loaded.category, ExpenseCategory::General);
    let alice = loaded.participant("alice").unwrap();
    assert_eq!(alice.paid, cents(90_00));
    assert_eq!(alice.owed, cents(30_00));
    assert_eq!(alice.net(), cents(60_00));
    assert!(!alice.is_settled);
}

#[tokio::test]
async fn percentage_and_shares_splits() {
    let (engine, _db) = engine_with_db().await;

    let cmd = CreateExpenseCmd::new("alice", "Hotel", cents(200_00), SplitMethod::Percentage, today())
        .participant(ParticipantInput::new("alice", cents(200_00)).percent(Percent::whole(60)))
        .participant(ParticipantInput::new("bob", MoneyCents::ZERO).percent(Percent::whole(40)))
        .category(ExpenseCategory::Travel);
    let hotel = engine.create_expense(cmd).await.unwrap();
    assert_eq!(hotel.participant("alice").unwrap().owed, cents(120_00));
    assert_eq!(hotel.participant("bob").unwrap().owed, cents(80_00));

    let cmd = CreateExpenseCmd::new("bob", "Groceries", cents(100_00), SplitMethod::Shares, today())
        .participant(ParticipantInput::new("alice", MoneyCents::ZERO).shares(1))
        .participant(ParticipantInput::new("bob", cents(100_00)).shares(1))
        .participant(ParticipantInput::new("carol", MoneyCents::ZERO).shares(2));
    let groceries = engine.create_expense(cmd).await.unwrap();
    assert_eq!(groceries.participant("alice").unwrap().owed, cents(25_00));
    assert_eq!(groceries.participant("bob").unwrap().owed, cents(25_00));
    assert_eq!(groceries.participant("carol").unwrap().owed, cents(50_00));
}

#[tokio::test]
async fn failed_split_writes_nothing() {
    let (engine, _db) = engine_with_db().await;

    let cmd = CreateExpenseCmd::new("alice", "Taxi", cents(100_00), SplitMethod::Exact, today())
        .participant(ParticipantInput::new("alice", cents(100_00)).owed(cents(50_00)))
        .participant(ParticipantInput::new("bob", MoneyCents::ZERO).owed(cents(45_00)));
    let err = engine.create_expense(cmd).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(
            "total owed amount (95.00) must equal expense amount (100.00)".to_string()
        )
    );

    let listed = engine
        .list_expenses("alice", &ExpenseListFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn unknown_participant_rolls_back_the_expense() {
    let (engine, _db) = engine_with_db().await;

    let cmd = CreateExpenseCmd::new("alice", "Taxi", cents(10_00), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("alice", cents(10_00)))
        .participant(ParticipantInput::new("mallory", MoneyCents::ZERO));
    let err = engine.create_expense(cmd).await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("user not exists".to_string()));

    let listed = engine
        .list_expenses("alice", &ExpenseListFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn expense_input_is_validated() {
    let (engine, _db) = engine_with_db().await;

    let tomorrow = today() + Duration::days(1);
    let cmd = CreateExpenseCmd::new("alice", "Later", cents(10_00), SplitMethod::Equal, tomorrow)
        .participant(ParticipantInput::new("alice", cents(10_00)));
    assert_eq!(
        engine.create_expense(cmd).await.unwrap_err(),
        EngineError::Validation("expense date cannot be in the future".to_string())
    );

    let cmd = CreateExpenseCmd::new("alice", "   ", cents(10_00), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("alice", cents(10_00)));
    assert_eq!(
        engine.create_expense(cmd).await.unwrap_err(),
        EngineError::Validation("description must not be empty".to_string())
    );

    let cmd = CreateExpenseCmd::new("alice", "Lunch", cents(10_00), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("alice", cents(5_00)))
        .participant(ParticipantInput::new("bob", MoneyCents::ZERO));
    assert_eq!(
        engine.create_expense(cmd).await.unwrap_err(),
        EngineError::Validation(
            "total paid amount (5.00) must equal expense amount (10.00)".to_string()
        )
    );
}

#[tokio::test]
async fn group_expenses_require_active_members() {
    let (engine, _db) = engine_with_db().await;
    let group = engine.new_group("Trip", "alice").await.unwrap();
    engine
        .add_group_member(group.id, "bob", MemberRole::Member, "alice")
        .await
        .unwrap();

    let cmd = CreateExpenseCmd::new("carol", "Fuel", cents(30_00), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("carol", cents(30_00)))
        .group_id(group.id);
    assert_eq!(
        engine.create_expense(cmd).await.unwrap_err(),
        EngineError::Unauthorized("you must be a member of the group to add expenses".to_string())
    );

    let cmd = CreateExpenseCmd::new("alice", "Fuel", cents(30_00), SplitMethod::Equal, today())
        .participant(ParticipantInput::new("alice", cents(30_00)))
        .participant(ParticipantInput::new("carol", MoneyCents::ZERO))
        .group_id(group.id);
    assert_eq!(
        engine.create_expense(cmd).await.unwrap_err(),
        EngineError::Validation("user carol is not a member of the group".to_string())
    );

    let expense = equal_expense(&engine, "alice", 30_00, &["bob"], Some(group.id)).await;
    assert_eq!(expense.group_id, Some(group.id));
}

#[tokio::test]
async fn only_participants_can_read_an_expense() {
    let (engine, _db) = engine_with_db().await;
    let expense = equal_expense(&engine, "alice", 20_00, &["bob"], None).await;

    assert_eq!(
        engine.expense(expense.id, "dave").await.unwrap_err(),
        EngineError::Unauthorized("you are not a participant in this expense".to_string())
    );
    assert_eq!(
        engine
            .expense(uuid::Uuid::new_v4(), "alice")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("expense not exists".to_string())
    );
}

#[tokio::test]
async fn update_expense_is_creator_only_and_keeps_the_split() {
    let (engine, _db) = engine_with_db().await;
    let expense = equal_expense(&engine, "alice", 20_00, &["bob"], None).await;

    let err = engine
        .update_expense(UpdateExpenseCmd::new(expense.id, "bob").description("Mine now"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Unauthorized("only the creator can update this expense".to_string())
    );

    let err = engine
        .update_expense(UpdateExpenseCmd::new(expense.id, "alice"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Validation("nothing to update".to_string()));

    let yesterday = today() - Duration::days(1);
    let updated = engine
        .update_expense(
            UpdateExpenseCmd::new(expense.id, "alice")
                .description("  Pizza ")
                .category(ExpenseCategory::Food)
                .date(yesterday)
                .receipt_url("https://example.org/r/1"),
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "Pizza");
    assert_eq!(updated.category, ExpenseCategory::Food);
    assert_eq!(updated.date, yesterday);
    assert_eq!(updated.receipt_url.as_deref(), Some("https://example.org/r/1"));
    assert_eq!(updated.amount, cents(20_00));
    assert_eq!(updated.participants, expense.participants);
}

#[tokio::test]
async fn delete_expense_rules() {
    let (engine, _db) = engine_with_db().await;
    let expense = equal_expense(&engine, "alice", 20_00, &["bob"], None).await;

    assert_eq!(
        engine.delete_expense(expense.id, "bob").await.unwrap_err(),
        EngineError::Unauthorized("only the creator can delete this expense".to_string())
    );

    let settled = engine
        .mark_participant_settled(expense.id, "bob", "bob")
        .await
        .unwrap();
    assert!(settled.is_settled);
    assert!(settled.settled_at.is_some());
    assert_eq!(
        engine
            .mark_participant_settled(expense.id, "bob", "alice")
            .await
            .unwrap_err(),
        EngineError::InvalidState("participant share is already settled".to_string())
    );

    assert_eq!(
        engine.delete_expense(expense.id, "alice").await.unwrap_err(),
        EngineError::InvalidState("cannot delete expense with settled participants".to_string())
    );

    let other = equal_expense(&engine, "alice", 40_00, &["bob"], None).await;
    engine.delete_expense(other.id, "alice").await.unwrap();
    assert_eq!(
        engine.expense(other.id, "alice").await.unwrap_err(),
        EngineError::KeyNotFound("expense not exists".to_string())
    );
}

#[tokio::test]
async fn mark_settled_is_limited_to_creator_and_participant() {
    let (engine, _db) = engine_with_db().await;
    let expense = equal_expense(&engine, "alice", 30_00, &["bob", "carol"], None).await;

    assert_eq!(
        engine
            .mark_participant_settled(expense.id, "carol", "bob")
            .await
            .unwrap_err(),
        EngineError::Unauthorized(
            "only the creator or the participant can mark a share as settled".to_string()
        )
    );
    assert_eq!(
        engine
            .mark_participant_settled(expense.id, "dave", "alice")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("participant not exists".to_string())
    );
    engine
        .mark_participant_settled(expense.id, "carol", "alice")
        .await
        .unwrap();
}

#[tokio::test]
async fn list_expenses_filters_and_pages() {
    let (engine, _db) = engine_with_db().await;

    let old_day = today() - Duration::days(10);
    let cmd = CreateExpenseCmd::new("alice", "Museum", cents(12_00), SplitMethod::Equal, old_day)
        .participant(ParticipantInput::new("alice", cents(12_00)))
        .participant(ParticipantInput::new("bob", MoneyCents::ZERO))
        .category(ExpenseCategory::Entertainment);
    let museum = engine.create_expense(cmd).await.unwrap();
    let dinner = equal_expense(&engine, "bob", 50_00, &["alice"], None).await;
    let _not_mine = equal_expense(&engine, "carol", 10_00, &["dave"], None).await;

    let all = engine
        .list_expenses("alice", &ExpenseListFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![dinner.id, museum.id]);
    assert!(all.iter().all(|e| e.participants.len() == 2));

    let filter = ExpenseListFilter {
        category: Some(ExpenseCategory::Entertainment),
        ..Default::default()
    };
    let fun = engine.list_expenses("alice", &filter).await.unwrap();
    assert_eq!(fun.len(), 1);
    assert_eq!(fun[0].id, museum.id);

    let filter = ExpenseListFilter {
        from: Some(today() - Duration::days(1)),
        to: Some(today()),
        ..Default::default()
    };
    let recent = engine.list_expenses("alice", &filter).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, dinner.id);

    let filter = ExpenseListFilter {
        page: Page::new(1, 1),
        ..Default::default()
    };
    let second = engine.list_expenses("alice", &filter).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, museum.id);

    let filter = ExpenseListFilter {
        from: Some(today()),
        to: Some(old_day),
        ..Default::default()
    };
    assert_eq!(
        engine.list_expenses("alice", &filter).await.unwrap_err(),
        EngineError::Validation("invalid range: from must be <= to".to_string())
    );
}

#[tokio::test]
async fn group_filter_requires_membership() {
    let (engine, _db) = engine_with_db().await;
    let group = engine.new_group("Flat", "alice").await.unwrap();

    let filter = ExpenseListFilter {
        group_id: Some(group.id),
        ..Default::default()
    };
    assert_eq!(
        engine.list_expenses("bob", &filter).await.unwrap_err(),
        EngineError::Unauthorized("user is not a member of the group".to_string())
    );
    assert!(engine.list_expenses("alice", &filter).await.unwrap().is_empty());
}
