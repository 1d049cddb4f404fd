#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    CreateExpenseCmd, CreateSettlementCmd, Engine, Expense, MoneyCents, ParticipantInput,
    PaymentMethod, Settlement, SplitMethod,
};
use migration::MigratorTrait;
use uuid::Uuid;

pub const USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    for user in USERS {
        engine.new_user(user, &user.to_uppercase()).await.unwrap();
    }
    (engine, db)
}

pub fn cents(value: i64) -> MoneyCents {
    MoneyCents::new(value)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `payer` pays `amount` in full and the expense is split equally between
/// `payer` and `others`.
pub async fn equal_expense(
    engine: &Engine,
    payer: &str,
    amount: i64,
    others: &[&str],
    group_id: Option<Uuid>,
) -> Expense {
    let mut cmd = CreateExpenseCmd::new(payer, "Dinner", cents(amount), SplitMethod::Equal, today())
        .participant(ParticipantInput::new(payer, cents(amount)));
    for other in others {
        cmd = cmd.participant(ParticipantInput::new(*other, MoneyCents::ZERO));
    }
    if let Some(group_id) = group_id {
        cmd = cmd.group_id(group_id);
    }
    engine.create_expense(cmd).await.unwrap()
}

/// Records a settlement from `payer` to `payee` and confirms it.
pub async fn confirmed_settlement(
    engine: &Engine,
    payer: &str,
    payee: &str,
    amount: i64,
    group_id: Option<Uuid>,
) -> Settlement {
    let mut cmd = CreateSettlementCmd::new(payer, payee, cents(amount), PaymentMethod::Cash);
    if let Some(group_id) = group_id {
        cmd = cmd.group_id(group_id);
    }
    let pending = engine.create_settlement(cmd).await.unwrap();
    engine.confirm_settlement(pending.id, payee).await.unwrap()
}
