//! Shared-expense engine.
//!
//! Splits expenses between participants, folds the stored history into
//! pairwise and group balances, suggests transfers that settle a group, and
//! tracks user-attested settlements through their lifecycle.
//!
//! The pure parts ([`split`], [`balances`], [`simplify`]) work on plain values;
//! [`Engine`] wires them to the database.

pub use balances::{BalanceEdge, BalanceSummary, GroupBalance, SettlementRecord, ShareRecord};
pub use commands::{
    CreateExpenseCmd, CreateSettlementCmd, DEFAULT_LIST_LIMIT, ExpensePatch, Page,
    SettlementPatch, UpdateExpenseCmd,
};
pub use error::EngineError;
pub use expense_participants::Participant;
pub use expenses::{Expense, ExpenseCategory};
pub use group_members::{GroupMember, MemberRole};
pub use groups::Group;
pub use money::{MoneyCents, Percent, TOLERANCE_MINOR};
pub use ops::{Engine, EngineBuilder, ExpenseListFilter};
pub use settlements::{PaymentMethod, Settlement, SettlementState};
pub use simplify::{NetBalance, Transfer, simplify};
pub use split::{ParticipantInput, ParticipantSplit, SplitMethod};
pub use users::User;

pub mod balances;
mod commands;
mod error;
mod expense_participants;
mod expenses;
mod group_members;
mod groups;
mod money;
mod ops;
mod settlements;
pub mod simplify;
pub mod split;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
