use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod access;
mod audit;
mod billing;
mod classrooms;
mod funds;
mod ledger;
mod market;
mod savings;
mod sweep;

pub use audit::{AuditReport, BalanceMismatch};
pub use funds::{FundRefund, FundSettlement, FundSummary};
pub use ledger::HistoryPage;
pub use market::{Position, Trade};
pub use savings::{SavingsPosition, SavingsSettlement};
pub use sweep::{SweepFailure, SweepReport};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of every ledger, market, savings, billing and fund operation.
///
/// The engine keeps no in-memory state: the database is the only source of
/// truth, so several engines may share one database.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The underlying connection, for callers that run migrations.
    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
