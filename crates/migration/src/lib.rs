pub use sea_orm_migration::prelude::*;

mod m20261005_000000_ledger;
mod m20261005_000100_market;
mod m20261005_000200_savings;
mod m20261005_000300_billing;
mod m20261005_000400_funds;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261005_000000_ledger::Migration),
            Box::new(m20261005_000100_market::Migration),
            Box::new(m20261005_000200_savings::Migration),
            Box::new(m20261005_000300_billing::Migration),
            Box::new(m20261005_000400_funds::Migration),
        ]
    }
}
