//! Ledger and market-simulation core of a classroom economy.
//!
//! The [`Engine`] owns every balance change: transfers between participants,
//! stock trades, savings deposits, tax payments and crowdfunding campaigns all
//! go through the same ledger primitives, so money is only created or
//! destroyed by explicit mint/burn operations.
//!
//! All state lives in the database; each write runs inside one database
//! transaction and either fully applies or leaves nothing behind.

pub use accounts::{Account, AccountRole, SystemAccountKind};
pub use classrooms::Classroom;
pub use commands::{
    BurnCmd, IssueBillCmd, MintCmd, NewFundCmd, NewInstrumentCmd, NewSavingsProductCmd,
    SalaryCmd, TransferCmd,
};
pub use error::EngineError;
pub use fund_investments::FundInvestment;
pub use funds::{Fund, FundOutcome, FundStatus};
pub use holdings::{AVG_PRICE_SCALE, Holding};
pub use instruments::{
    Instrument, MAX_VOLATILITY_BP, MIN_VOLATILITY_BP, fee_rate_bp, parse_volatility,
    sell_proceeds,
};
pub use money::{Money, Rate};
pub use ops::{
    AuditReport, BalanceMismatch, Engine, EngineBuilder, FundRefund, FundSettlement,
    FundSummary, HistoryPage, Position, SavingsPosition, SavingsSettlement, SweepFailure,
    SweepReport, Trade,
};
pub use price_history::PricePoint;
pub use savings_products::{MAX_MATURITY_DAYS, SavingsProduct};
pub use savings_subscriptions::SavingsSubscription;
pub use tax_bills::TaxBill;
pub use tax_recipients::TaxRecipient;
pub use transactions::{Transaction, TransactionKind, TransferReceipt};

mod accounts;
mod classrooms;
mod commands;
mod error;
mod fund_investments;
mod funds;
mod holdings;
mod instruments;
mod money;
mod ops;
mod price_history;
mod savings_products;
mod savings_subscriptions;
mod tax_bills;
mod tax_recipients;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
