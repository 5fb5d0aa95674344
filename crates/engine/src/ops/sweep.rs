use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

use super::{Engine, with_tx};

/// A row the sweep could not process. It stays due and is retried on the next
/// run.
#[derive(Debug)]
pub struct SweepFailure {
    pub classroom_id: Uuid,
    /// `"savings"`, `"fund"` or `"classroom"`.
    pub subject: &'static str,
    pub id: Uuid,
    pub error: EngineError,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub savings_matured: usize,
    pub funds_started: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.savings_matured += other.savings_matured;
        self.funds_started += other.funds_started;
        self.failures.extend(other.failures);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Engine {
    /// Runs every due time-driven transition of every classroom.
    ///
    /// Each subscription and fund is settled in its own transaction, so a
    /// crash mid-sweep leaves processed rows settled and the rest due.
    pub async fn run_sweeps(&self, now: DateTime<Utc>) -> ResultEngine<SweepReport> {
        let classroom_ids = with_tx!(self, |db_tx| self.classroom_ids(&db_tx).await)?;

        let mut report = SweepReport::default();
        for classroom_id in classroom_ids {
            report.merge(self.sweep_classroom(classroom_id, now).await);
        }

        tracing::info!(
            savings_matured = report.savings_matured,
            funds_started = report.funds_started,
            failures = report.failures.len(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Matures due savings and closes recruitment of due funds in one classroom.
    pub async fn sweep_classroom(&self, classroom_id: Uuid, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        match self.due_subscriptions(classroom_id, now).await {
            Ok(ids) => {
                for id in ids {
                    match self.mature_subscription(classroom_id, id, now).await {
                        Ok(Some(settlement)) => {
                            tracing::info!(
                                %classroom_id,
                                subscription_id = %id,
                                account_id = %settlement.account_id,
                                payout = settlement.payout_minor,
                                "savings matured"
                            );
                            report.savings_matured += 1;
                        }
                        Ok(None) => {}
                        Err(error) => report.fail(classroom_id, "savings", id, error),
                    }
                }
            }
            Err(error) => report.fail(classroom_id, "classroom", classroom_id, error),
        }

        match self.due_funds(classroom_id, now).await {
            Ok(ids) => {
                for id in ids {
                    match self.advance_recruitment(classroom_id, id, now).await {
                        Ok(true) => {
                            tracing::info!(%classroom_id, fund_id = %id, "fund recruitment closed");
                            report.funds_started += 1;
                        }
                        Ok(false) => {}
                        Err(error) => report.fail(classroom_id, "fund", id, error),
                    }
                }
            }
            Err(error) => report.fail(classroom_id, "classroom", classroom_id, error),
        }

        report
    }
}

impl SweepReport {
    fn fail(&mut self, classroom_id: Uuid, subject: &'static str, id: Uuid, error: EngineError) {
        tracing::warn!(%classroom_id, subject, %id, %error, "sweep row failed");
        self.failures.push(SweepFailure {
            classroom_id,
            subject,
            id,
            error,
        });
    }
}
