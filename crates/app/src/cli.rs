//! Command line interface over the engine.
//!
//! Every command acts as the user given with `--as` (or `DIVVY_USER`).
//! Amounts are decimal strings such as `12.50`.

use std::error::Error;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    CreateExpenseCmd, CreateSettlementCmd, Engine, ExpenseCategory, ExpenseListFilter,
    MemberRole, MoneyCents, Page, ParticipantInput, PaymentMethod, Percent, SplitMethod,
};
use serde::Serialize;
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "divvy")]
#[command(about = "Split shared expenses, track balances and settle up")]
pub struct Cli {
    /// Settings file, without extension.
    #[arg(long, default_value = "settings")]
    pub config: String,

    /// Acting user.
    #[arg(long = "as", env = "DIVVY_USER", global = true)]
    pub user: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    User(UserArgs),
    Group(GroupArgs),
    Expense(ExpenseArgs),
    Settlement(SettlementArgs),
    Balance(BalanceArgs),
    Suggest(SuggestArgs),
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create {
        name: String,
    },
    List,
    AddMember {
        group: Uuid,
        member: String,
        #[arg(long)]
        admin: bool,
    },
    RemoveMember {
        group: Uuid,
        member: String,
    },
    Leave {
        group: Uuid,
    },
    Members {
        group: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct ExpenseArgs {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Add(ExpenseAddArgs),
    Show {
        id: Uuid,
    },
    List {
        #[arg(long)]
        group: Option<Uuid>,
        #[arg(long, value_parser = parse_category)]
        category: Option<ExpenseCategory>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[command(flatten)]
        page: PageArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct ExpenseAddArgs {
    #[arg(long)]
    description: String,
    #[arg(long, value_parser = parse_money)]
    amount: MoneyCents,
    #[arg(long, value_parser = parse_split_method, default_value = "equal")]
    method: SplitMethod,
    /// `user:paid[:value]`, where value is the owed amount (exact), the
    /// percentage (percentage) or the share count (shares).
    #[arg(long = "participant", required = true)]
    participants: Vec<String>,
    #[arg(long, value_parser = parse_category, default_value = "general")]
    category: ExpenseCategory,
    /// Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    group: Option<Uuid>,
    #[arg(long)]
    receipt_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct SettlementArgs {
    #[command(subcommand)]
    command: SettlementCommand,
}

#[derive(Subcommand, Debug)]
enum SettlementCommand {
    Create {
        #[arg(long)]
        to: String,
        #[arg(long, value_parser = parse_money)]
        amount: MoneyCents,
        #[arg(long, value_parser = parse_payment_method, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        group: Option<Uuid>,
    },
    Confirm {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
    List {
        /// Only settlements with this user.
        #[arg(long, conflicts_with = "group")]
        with: Option<String>,
        #[arg(long)]
        group: Option<Uuid>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    #[command(subcommand)]
    command: BalanceCommand,
}

#[derive(Subcommand, Debug)]
enum BalanceCommand {
    Pair { other: String },
    All,
    Group { group: Uuid },
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[command(subcommand)]
    command: SuggestCommand,
}

#[derive(Subcommand, Debug)]
enum SuggestCommand {
    User,
    Group { group: Uuid },
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = engine::DEFAULT_LIST_LIMIT)]
    limit: u64,
    #[arg(long, default_value_t = 0)]
    offset: u64,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page::new(args.limit, args.offset)
    }
}

fn parse_money(raw: &str) -> Result<MoneyCents, String> {
    raw.parse().map_err(|err: engine::EngineError| err.to_string())
}

fn parse_split_method(raw: &str) -> Result<SplitMethod, String> {
    SplitMethod::try_from(raw).map_err(|err| err.to_string())
}

fn parse_category(raw: &str) -> Result<ExpenseCategory, String> {
    ExpenseCategory::try_from(raw).map_err(|err| err.to_string())
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::try_from(raw).map_err(|err| err.to_string())
}

/// Parses `user:paid[:value]` for the given split method.
fn parse_participant(raw: &str, method: SplitMethod) -> CliResult<ParticipantInput> {
    let mut parts = raw.split(':');
    let (Some(user), Some(paid)) = (parts.next(), parts.next()) else {
        return Err(format!("invalid participant '{raw}': expected user:paid[:value]").into());
    };
    let value = parts.next();
    if parts.next().is_some() {
        return Err(format!("invalid participant '{raw}': too many fields").into());
    }

    let input = ParticipantInput::new(user, paid.parse::<MoneyCents>()?);
    let input = match (method, value) {
        (SplitMethod::Equal, None) => input,
        (SplitMethod::Exact, Some(owed)) => input.owed(owed.parse::<MoneyCents>()?),
        (SplitMethod::Percentage, Some(percent)) => input.percent(percent.parse::<Percent>()?),
        (SplitMethod::Shares, Some(shares)) => input.shares(shares.parse::<u32>()?),
        (SplitMethod::Equal, Some(_)) => {
            return Err(format!("invalid participant '{raw}': equal split takes no value").into());
        }
        (_, None) => {
            return Err(format!(
                "invalid participant '{raw}': {} split needs a value",
                method.as_str()
            )
            .into());
        }
    };
    Ok(input)
}

fn acting_user(cli_user: Option<&str>) -> CliResult<&str> {
    cli_user.ok_or_else(|| "missing acting user: pass --as <USER> or set DIVVY_USER".into())
}

fn emit<T, F>(json: bool, value: &T, human: F) -> CliResult<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

pub async fn run(engine: &Engine, cli: Cli) -> CliResult<()> {
    let json = cli.json;
    let user = cli.user.as_deref();

    match cli.command {
        Command::User(UserArgs {
            command:
                UserCommand::Create {
                    username,
                    display_name,
                },
        }) => {
            let display_name = display_name.unwrap_or_else(|| username.clone());
            let created = engine.new_user(&username, &display_name).await?;
            emit(json, &created, |u| println!("created user: {}", u.username))
        }

        Command::Group(GroupArgs { command }) => {
            let user = acting_user(user)?;
            match command {
                GroupCommand::Create { name } => {
                    let group = engine.new_group(&name, user).await?;
                    emit(json, &group, |g| println!("created group {} ({})", g.name, g.id))
                }
                GroupCommand::List => {
                    let groups = engine.list_groups_for_user(user).await?;
                    emit(json, &groups, |groups| {
                        for g in groups {
                            println!("{}\t{}\tcreated by {}", g.id, g.name, g.created_by);
                        }
                    })
                }
                GroupCommand::AddMember {
                    group,
                    member,
                    admin,
                } => {
                    let role = if admin {
                        MemberRole::Admin
                    } else {
                        MemberRole::Member
                    };
                    let added = engine.add_group_member(group, &member, role, user).await?;
                    emit(json, &added, |m| {
                        println!("added {} as {}", m.user_id, m.role.as_str())
                    })
                }
                GroupCommand::RemoveMember { group, member } => {
                    engine.remove_group_member(group, &member, user).await?;
                    emit(json, &member, |m| println!("removed {m} from group {group}"))
                }
                GroupCommand::Leave { group } => {
                    engine.leave_group(group, user).await?;
                    emit(json, &group, |g| println!("left group {g}"))
                }
                GroupCommand::Members { group } => {
                    let members = engine.group_members(group, user).await?;
                    emit(json, &members, |members| {
                        for m in members {
                            println!("{}\t{}\tjoined {}", m.user_id, m.role.as_str(), m.joined_at);
                        }
                    })
                }
            }
        }

        Command::Expense(ExpenseArgs { command }) => {
            let user = acting_user(user)?;
            match command {
                ExpenseCommand::Add(args) => {
                    let participants = args
                        .participants
                        .iter()
                        .map(|raw| parse_participant(raw, args.method))
                        .collect::<CliResult<Vec<_>>>()?;
                    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
                    let mut cmd =
                        CreateExpenseCmd::new(user, args.description, args.amount, args.method, date)
                            .participants(participants)
                            .category(args.category);
                    if let Some(group) = args.group {
                        cmd = cmd.group_id(group);
                    }
                    if let Some(url) = args.receipt_url {
                        cmd = cmd.receipt_url(url);
                    }
                    let expense = engine.create_expense(cmd).await?;
                    emit(json, &expense, |e| {
                        println!("created expense {} ({} {})", e.id, e.description, e.amount);
                        for p in &e.participants {
                            println!("  {}\tpaid {}\towes {}", p.user_id, p.paid, p.owed);
                        }
                    })
                }
                ExpenseCommand::Show { id } => {
                    let expense = engine.expense(id, user).await?;
                    emit(json, &expense, |e| {
                        println!(
                            "{}  {}  {}  [{}] by {}",
                            e.date,
                            e.description,
                            e.amount,
                            e.category.as_str(),
                            e.created_by
                        );
                        for p in &e.participants {
                            let settled = if p.is_settled { "  settled" } else { "" };
                            println!(
                                "  {}\tpaid {}\towes {}\tnet {}{settled}",
                                p.user_id,
                                p.paid,
                                p.owed,
                                p.net()
                            );
                        }
                    })
                }
                ExpenseCommand::List {
                    group,
                    category,
                    from,
                    to,
                    page,
                } => {
                    let filter = ExpenseListFilter {
                        group_id: group,
                        category,
                        from,
                        to,
                        page: page.into(),
                    };
                    let expenses = engine.list_expenses(user, &filter).await?;
                    emit(json, &expenses, |expenses| {
                        for e in expenses {
                            println!("{}  {}  {}  {}", e.id, e.date, e.amount, e.description);
                        }
                    })
                }
                ExpenseCommand::Delete { id } => {
                    engine.delete_expense(id, user).await?;
                    emit(json, &id, |id| println!("deleted expense {id}"))
                }
            }
        }

        Command::Settlement(SettlementArgs { command }) => {
            let user = acting_user(user)?;
            match command {
                SettlementCommand::Create {
                    to,
                    amount,
                    method,
                    notes,
                    group,
                } => {
                    let mut cmd = CreateSettlementCmd::new(user, to, amount, method);
                    if let Some(notes) = notes {
                        cmd = cmd.notes(notes);
                    }
                    if let Some(group) = group {
                        cmd = cmd.group_id(group);
                    }
                    let settlement = engine.create_settlement(cmd).await?;
                    emit(json, &settlement, |s| {
                        println!(
                            "recorded settlement {}: {} -> {} {}",
                            s.id, s.payer_id, s.payee_id, s.amount
                        )
                    })
                }
                SettlementCommand::Confirm { id } => {
                    let settlement = engine.confirm_settlement(id, user).await?;
                    emit(json, &settlement, |s| println!("confirmed settlement {}", s.id))
                }
                SettlementCommand::Delete { id } => {
                    engine.delete_settlement(id, user).await?;
                    emit(json, &id, |id| println!("deleted settlement {id}"))
                }
                SettlementCommand::List { with, group, page } => {
                    let page = page.into();
                    let settlements = match (with, group) {
                        (Some(other), _) => {
                            engine.list_settlements_between(user, &other, page).await?
                        }
                        (None, Some(group)) => {
                            engine.list_group_settlements(group, user, page).await?
                        }
                        (None, None) => engine.list_settlements_for_user(user, page).await?,
                    };
                    emit(json, &settlements, |settlements| {
                        for s in settlements {
                            println!(
                                "{}  {} -> {}  {}  {}  {}",
                                s.id,
                                s.payer_id,
                                s.payee_id,
                                s.amount,
                                s.payment_method.as_str(),
                                s.state().as_str()
                            );
                        }
                    })
                }
            }
        }

        Command::Balance(BalanceArgs { command }) => {
            let user = acting_user(user)?;
            match command {
                BalanceCommand::Pair { other } => {
                    let balance = engine.pairwise_balance(user, &other).await?;
                    emit(json, &balance, |b| {
                        if b.is_positive() {
                            println!("{other} owes {user} {b}");
                        } else if b.is_negative() {
                            println!("{user} owes {other} {}", b.abs());
                        } else {
                            println!("{user} and {other} are settled up");
                        }
                    })
                }
                BalanceCommand::All => {
                    let summary = engine.balance_summary(user).await?;
                    emit(json, &summary, |s| {
                        for e in &s.edges {
                            println!("{}\t{}", e.counterparty, e.amount);
                        }
                        println!(
                            "owed to you {}, you owe {}, net {}",
                            s.owed_to_user, s.user_owes, s.net
                        );
                    })
                }
                BalanceCommand::Group { group } => {
                    let balances = engine.group_balances(group, user).await?;
                    emit(json, &balances, |balances| {
                        for b in balances {
                            println!(
                                "{}\tpaid {}\towed {}\tnet {}",
                                b.user_id, b.total_paid, b.total_owed, b.net
                            );
                        }
                    })
                }
            }
        }

        Command::Suggest(SuggestArgs { command }) => {
            let user = acting_user(user)?;
            let transfers = match command {
                SuggestCommand::User => engine.settlement_suggestions(user).await?,
                SuggestCommand::Group { group } => {
                    engine.group_settlement_suggestions(group, user).await?
                }
            };
            emit(json, &transfers, |transfers| {
                for t in transfers {
                    println!("{} -> {}  {}", t.from, t.to, t.amount);
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_values_follow_the_split_method() {
        let p = parse_participant("alice:90.00", SplitMethod::Equal).unwrap();
        assert_eq!(p.user_id, "alice");
        assert_eq!(p.paid, MoneyCents::new(90_00));

        let p = parse_participant("bob:0:12.50", SplitMethod::Exact).unwrap();
        assert_eq!(p.owed, Some(MoneyCents::new(12_50)));

        let p = parse_participant("bob:0:33.33", SplitMethod::Percentage).unwrap();
        assert_eq!(p.percent, Some(Percent::from_hundredths(33_33)));

        let p = parse_participant("bob:0:2", SplitMethod::Shares).unwrap();
        assert_eq!(p.shares, Some(2));
    }

    #[test]
    fn malformed_participants_are_rejected() {
        assert!(parse_participant("alice", SplitMethod::Equal).is_err());
        assert!(parse_participant("alice:1:2", SplitMethod::Equal).is_err());
        assert!(parse_participant("alice:1", SplitMethod::Shares).is_err());
        assert!(parse_participant("alice:1:2:3", SplitMethod::Shares).is_err());
        assert!(parse_participant("alice:abc", SplitMethod::Equal).is_err());
    }

    #[test]
    fn cli_parses_expense_add() {
        let cli = Cli::try_parse_from([
            "divvy",
            "--as",
            "alice",
            "expense",
            "add",
            "--description",
            "Dinner",
            "--amount",
            "90.00",
            "--participant",
            "alice:90",
            "--participant",
            "bob:0",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("alice"));
        let Command::Expense(ExpenseArgs {
            command: ExpenseCommand::Add(args),
        }) = cli.command
        else {
            panic!("expected expense add");
        };
        assert_eq!(args.amount, MoneyCents::new(90_00));
        assert_eq!(args.method, SplitMethod::Equal);
        assert_eq!(args.participants.len(), 2);
    }
}
