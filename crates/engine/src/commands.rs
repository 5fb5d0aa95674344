//! Command structs for engine operations.
//!
//! These types group parameters for write operations (transfers, currency
//! issuance, product/bill/fund creation), keeping call sites readable and
//! avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Rate;

/// Move money between two accounts of the same classroom.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub classroom_id: Uuid,
    pub from: Uuid,
    pub to: Uuid,
    pub amount_minor: i64,
    pub memo: Option<String>,
    /// Caller-supplied key; a repeated key returns the first transfer.
    pub idempotency_key: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(classroom_id: Uuid, from: Uuid, to: Uuid, amount_minor: i64) -> Self {
        Self {
            classroom_id,
            from,
            to,
            amount_minor,
            memo: None,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Create currency on an account (banker deposit).
#[derive(Clone, Debug)]
pub struct MintCmd {
    pub classroom_id: Uuid,
    /// Banker or teacher performing the deposit.
    pub actor: Uuid,
    pub account: Uuid,
    pub amount_minor: i64,
    pub memo: Option<String>,
}

impl MintCmd {
    #[must_use]
    pub fn new(classroom_id: Uuid, actor: Uuid, account: Uuid, amount_minor: i64) -> Self {
        Self {
            classroom_id,
            actor,
            account,
            amount_minor,
            memo: None,
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Destroy currency from an account (banker withdrawal).
#[derive(Clone, Debug)]
pub struct BurnCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub account: Uuid,
    pub amount_minor: i64,
    pub memo: Option<String>,
}

impl BurnCmd {
    #[must_use]
    pub fn new(classroom_id: Uuid, actor: Uuid, account: Uuid, amount_minor: i64) -> Self {
        Self {
            classroom_id,
            actor,
            account,
            amount_minor,
            memo: None,
        }
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Pay salaries from the teacher's treasury. All payees or none.
#[derive(Clone, Debug)]
pub struct SalaryCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub payees: Vec<(Uuid, i64)>,
    pub memo: Option<String>,
}

impl SalaryCmd {
    #[must_use]
    pub fn new(classroom_id: Uuid, actor: Uuid) -> Self {
        Self {
            classroom_id,
            actor,
            payees: Vec::new(),
            memo: None,
        }
    }

    #[must_use]
    pub fn payee(mut self, account: Uuid, amount_minor: i64) -> Self {
        self.payees.push((account, amount_minor));
        self
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// List a new tradable instrument.
#[derive(Clone, Debug)]
pub struct NewInstrumentCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub name: String,
    pub price_minor: i64,
    /// Volatility coefficient `k` in basis points (100 = 0.01).
    pub volatility_bp: i32,
}

impl NewInstrumentCmd {
    #[must_use]
    pub fn new(
        classroom_id: Uuid,
        actor: Uuid,
        name: impl Into<String>,
        price_minor: i64,
        volatility_bp: i32,
    ) -> Self {
        Self {
            classroom_id,
            actor,
            name: name.into(),
            price_minor,
            volatility_bp,
        }
    }
}

/// Offer a new savings product.
#[derive(Clone, Debug)]
pub struct NewSavingsProductCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub name: String,
    pub maturity_days: i32,
    pub rate: Rate,
    pub cancellation_rate: Rate,
    pub max_amount_minor: i64,
}

impl NewSavingsProductCmd {
    #[must_use]
    pub fn new(
        classroom_id: Uuid,
        actor: Uuid,
        name: impl Into<String>,
        maturity_days: i32,
        rate: Rate,
        max_amount_minor: i64,
    ) -> Self {
        Self {
            classroom_id,
            actor,
            name: name.into(),
            maturity_days,
            rate,
            cancellation_rate: Rate::ZERO,
            max_amount_minor,
        }
    }

    #[must_use]
    pub fn cancellation_rate(mut self, rate: Rate) -> Self {
        self.cancellation_rate = rate;
        self
    }
}

/// Issue a tax bill to a set of accounts.
#[derive(Clone, Debug)]
pub struct IssueBillCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub name: String,
    pub amount_minor: i64,
    pub due_at: DateTime<Utc>,
    pub recipients: Vec<Uuid>,
}

impl IssueBillCmd {
    #[must_use]
    pub fn new(
        classroom_id: Uuid,
        actor: Uuid,
        name: impl Into<String>,
        amount_minor: i64,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            classroom_id,
            actor,
            name: name.into(),
            amount_minor,
            due_at,
            recipients: Vec::new(),
        }
    }

    #[must_use]
    pub fn recipient(mut self, account: Uuid) -> Self {
        self.recipients.push(account);
        self
    }

    #[must_use]
    pub fn recipients(mut self, accounts: impl IntoIterator<Item = Uuid>) -> Self {
        self.recipients.extend(accounts);
        self
    }
}

/// Open a crowdfunding campaign.
#[derive(Clone, Debug)]
pub struct NewFundCmd {
    pub classroom_id: Uuid,
    pub actor: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_minor: i64,
    pub target_amount_minor: i64,
    pub base_reward_minor: i64,
    pub incentive_reward_minor: i64,
    pub recruitment_deadline: DateTime<Utc>,
    pub maturity_at: DateTime<Utc>,
}

impl NewFundCmd {
    #[must_use]
    pub fn new(
        classroom_id: Uuid,
        actor: Uuid,
        name: impl Into<String>,
        unit_price_minor: i64,
        recruitment_deadline: DateTime<Utc>,
        maturity_at: DateTime<Utc>,
    ) -> Self {
        Self {
            classroom_id,
            actor,
            name: name.into(),
            description: None,
            unit_price_minor,
            target_amount_minor: 0,
            base_reward_minor: 0,
            incentive_reward_minor: 0,
            recruitment_deadline,
            maturity_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn target(mut self, amount_minor: i64) -> Self {
        self.target_amount_minor = amount_minor;
        self
    }

    #[must_use]
    pub fn rewards(mut self, base_minor: i64, incentive_minor: i64) -> Self {
        self.base_reward_minor = base_minor;
        self.incentive_reward_minor = incentive_minor;
        self
    }
}
