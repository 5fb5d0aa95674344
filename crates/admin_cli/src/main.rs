use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{
    AccountRole, BurnCmd, Engine, MintCmd, Money, NewInstrumentCmd, SystemAccountKind,
    parse_volatility,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "classbank_admin")]
#[command(about = "Admin utilities for Classbank (bootstrap classrooms, mint, sweeps)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./classbank.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Classroom(Classroom),
    Account(Account),
    Instrument(Instrument),
    /// Create currency on an account.
    Mint(MoneyArgs),
    /// Destroy currency from an account.
    Burn(MoneyArgs),
    /// Run the maturity and recruitment sweep once.
    Sweep,
    /// Replay the ledger of a classroom and report mismatches.
    Audit(ClassroomArg),
}

#[derive(Args, Debug)]
struct Classroom {
    #[command(subcommand)]
    command: ClassroomCommand,
}

#[derive(Subcommand, Debug)]
enum ClassroomCommand {
    Create(ClassroomCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct ClassroomCreateArgs {
    #[arg(long)]
    name: String,
    /// User id of the teacher owning the treasury.
    #[arg(long)]
    teacher: String,
}

#[derive(Args, Debug)]
struct ClassroomArg {
    #[arg(long)]
    classroom: Uuid,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Open(AccountOpenArgs),
    List(ClassroomArg),
}

#[derive(Args, Debug)]
struct AccountOpenArgs {
    #[arg(long)]
    classroom: Uuid,
    #[arg(long)]
    user: String,
    #[arg(long)]
    name: String,
    /// student, mart or banker
    #[arg(long, default_value = "student", value_parser = parse_role)]
    role: AccountRole,
}

#[derive(Args, Debug)]
struct Instrument {
    #[command(subcommand)]
    command: InstrumentCommand,
}

#[derive(Subcommand, Debug)]
enum InstrumentCommand {
    Create(InstrumentCreateArgs),
    SetPrice(SetPriceArgs),
}

#[derive(Args, Debug)]
struct InstrumentCreateArgs {
    #[arg(long)]
    classroom: Uuid,
    #[arg(long)]
    name: String,
    #[arg(long)]
    price: Money,
    /// Volatility coefficient, 0.01 to 1.
    #[arg(long, default_value = "0.02", value_parser = parse_volatility_arg)]
    volatility: i32,
}

#[derive(Args, Debug)]
struct SetPriceArgs {
    #[arg(long)]
    classroom: Uuid,
    #[arg(long)]
    instrument: Uuid,
    #[arg(long)]
    price: Money,
}

#[derive(Args, Debug)]
struct MoneyArgs {
    #[arg(long)]
    classroom: Uuid,
    /// Banker or teacher account performing the operation; defaults to the
    /// treasury.
    #[arg(long)]
    actor: Option<Uuid>,
    #[arg(long)]
    account: Uuid,
    #[arg(long)]
    amount: Money,
    #[arg(long)]
    memo: Option<String>,
}

fn parse_role(raw: &str) -> Result<AccountRole, String> {
    AccountRole::try_from(raw.to_ascii_lowercase().as_str()).map_err(|err| err.to_string())
}

fn parse_volatility_arg(raw: &str) -> Result<i32, String> {
    parse_volatility(raw).map_err(|err| err.to_string())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn actor_or_treasury(
    engine: &Engine,
    classroom: Uuid,
    actor: Option<Uuid>,
) -> Result<Uuid, Box<dyn Error + Send + Sync>> {
    match actor {
        Some(actor) => Ok(actor),
        None => Ok(engine.treasury(classroom).await?.id),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Classroom(Classroom {
            command: ClassroomCommand::Create(args),
        }) => {
            let classroom = engine.new_classroom(&args.name, &args.teacher).await?;
            let treasury = engine.treasury(classroom.id).await?;
            println!("created classroom: {} ({})", classroom.name, classroom.id);
            println!("treasury: {}", treasury.id);
        }
        Command::Classroom(Classroom {
            command: ClassroomCommand::List,
        }) => {
            for classroom in engine.classrooms().await? {
                println!(
                    "{}  {}  teacher={}",
                    classroom.id, classroom.name, classroom.teacher_user_id
                );
            }
        }
        Command::Account(Account {
            command: AccountCommand::Open(args),
        }) => {
            let account = engine
                .open_account(args.classroom, &args.user, &args.name, args.role)
                .await?;
            println!(
                "opened {} account: {} ({})",
                account.role.as_str(),
                account.name,
                account.id
            );
        }
        Command::Account(Account {
            command: AccountCommand::List(args),
        }) => {
            for account in engine.accounts(args.classroom).await? {
                let kind = account
                    .system_kind
                    .map(SystemAccountKind::as_str)
                    .unwrap_or_else(|| account.role.as_str());
                let archived = if account.archived { " (archived)" } else { "" };
                println!(
                    "{}  {:<16} {:<14} {:>12}{archived}",
                    account.id,
                    account.name,
                    kind,
                    Money::new(account.balance).to_string()
                );
            }
        }
        Command::Instrument(Instrument {
            command: InstrumentCommand::Create(args),
        }) => {
            let actor = engine.treasury(args.classroom).await?.id;
            let instrument = engine
                .create_instrument(NewInstrumentCmd::new(
                    args.classroom,
                    actor,
                    args.name,
                    args.price.minor(),
                    args.volatility,
                ))
                .await?;
            println!(
                "listed {} at {} (fee {:.2}%)",
                instrument.name,
                Money::new(instrument.price_minor),
                instrument.fee_rate_bp() as f64 / 100.0
            );
        }
        Command::Instrument(Instrument {
            command: InstrumentCommand::SetPrice(args),
        }) => {
            let actor = engine.treasury(args.classroom).await?.id;
            let point = engine
                .set_price(args.classroom, actor, args.instrument, args.price.minor())
                .await?;
            println!(
                "price set to {} at {}",
                Money::new(point.price_minor),
                point.recorded_at
            );
        }
        Command::Mint(args) => {
            let actor = actor_or_treasury(&engine, args.classroom, args.actor).await?;
            let mut cmd = MintCmd::new(args.classroom, actor, args.account, args.amount.minor());
            if let Some(memo) = args.memo {
                cmd = cmd.memo(memo);
            }
            let tx = engine.mint(cmd).await?;
            println!(
                "minted {}, balance {}",
                args.amount,
                Money::new(tx.balance_after)
            );
        }
        Command::Burn(args) => {
            let actor = actor_or_treasury(&engine, args.classroom, args.actor).await?;
            let mut cmd = BurnCmd::new(args.classroom, actor, args.account, args.amount.minor());
            if let Some(memo) = args.memo {
                cmd = cmd.memo(memo);
            }
            let tx = engine.burn(cmd).await?;
            println!(
                "burned {}, balance {}",
                args.amount,
                Money::new(tx.balance_after)
            );
        }
        Command::Sweep => {
            let report = engine.run_sweeps(chrono::Utc::now()).await?;
            println!(
                "savings matured: {}, funds started: {}",
                report.savings_matured, report.funds_started
            );
            for failure in &report.failures {
                eprintln!(
                    "failed {} {} in {}: {}",
                    failure.subject, failure.id, failure.classroom_id, failure.error
                );
            }
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Command::Audit(args) => {
            let report = engine.verify_scope_balances(args.classroom).await?;
            for mismatch in &report.mismatches {
                println!(
                    "{}: stored {} ledger {}{}",
                    mismatch.account_id,
                    Money::new(mismatch.stored_minor),
                    Money::new(mismatch.ledger_minor),
                    mismatch
                        .broken_chain_at
                        .map(|id| format!(" (chain breaks at {id})"))
                        .unwrap_or_default()
                );
            }
            println!(
                "savings escrow {} / principal {}",
                Money::new(report.savings_escrow_minor),
                Money::new(report.savings_principal_minor)
            );
            println!(
                "fund escrow {} / principal {}",
                Money::new(report.fund_escrow_minor),
                Money::new(report.fund_principal_minor)
            );
            if !report.is_consistent() {
                eprintln!("ledger is inconsistent");
                std::process::exit(1);
            }
            println!("ledger is consistent");
        }
    }

    Ok(())
}
