//! Collateral ledger seam.
//!
//! The engine only asks how much collateral a trader has and hands it realized
//! PnL once a trade commits. Custody lives behind [`CollateralLedger`]; the
//! in-memory [`Vault`] is the implementation used by the simulator and tests.

use crate::types::{AccountId, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Quote, available: Quote },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Quote),

    #[error("Unknown account {0:?}")]
    UnknownAccount(AccountId),
}

pub trait CollateralLedger {
    // collateral the trader can put behind positions, before pnl
    fn free_collateral(&self, trader: AccountId) -> Quote;

    // credit (or debit, when negative) realized pnl, stamped with the engine clock
    fn settle_pnl(&mut self, trader: AccountId, pnl: Quote, timestamp: Timestamp) -> Result<(), CollateralError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Quote,
    pub total_deposited: Quote,
    pub total_withdrawn: Quote,
    pub realized_pnl: Quote,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    pub fn new(id: AccountId, timestamp: Timestamp) -> Self {
        Self {
            id,
            balance: Quote::zero(),
            total_deposited: Quote::zero(),
            total_withdrawn: Quote::zero(),
            realized_pnl: Quote::zero(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn deposit(&mut self, amount: Quote) {
        self.balance = self.balance.add(amount);
        self.total_deposited = self.total_deposited.add(amount);
    }

    pub fn withdraw(&mut self, amount: Quote) -> Result<(), CollateralError> {
        if amount.value() > self.balance.value() {
            return Err(CollateralError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = self.balance.sub(amount);
        self.total_withdrawn = self.total_withdrawn.add(amount);
        Ok(())
    }

    // losses may push the balance negative. that is bad debt, not an error here.
    pub fn realize_pnl(&mut self, pnl: Quote) {
        self.balance = self.balance.add(pnl);
        self.realized_pnl = self.realized_pnl.add(pnl);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Vault {
    accounts: HashMap<AccountId, Account>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, trader: AccountId) -> Option<&Account> {
        self.accounts.get(&trader)
    }

    pub fn balance(&self, trader: AccountId) -> Quote {
        self.accounts
            .get(&trader)
            .map(|a| a.balance)
            .unwrap_or_else(Quote::zero)
    }

    pub fn deposit(&mut self, trader: AccountId, amount: Quote, timestamp: Timestamp) -> Result<(), CollateralError> {
        if amount.value() <= rust_decimal::Decimal::ZERO {
            return Err(CollateralError::NonPositiveAmount(amount));
        }
        let account = self
            .accounts
            .entry(trader)
            .or_insert_with(|| Account::new(trader, timestamp));
        account.deposit(amount);
        account.updated_at = timestamp;
        Ok(())
    }

    pub fn withdraw(&mut self, trader: AccountId, amount: Quote, timestamp: Timestamp) -> Result<(), CollateralError> {
        if amount.value() <= rust_decimal::Decimal::ZERO {
            return Err(CollateralError::NonPositiveAmount(amount));
        }
        let account = self
            .accounts
            .get_mut(&trader)
            .ok_or(CollateralError::UnknownAccount(trader))?;
        account.withdraw(amount)?;
        account.updated_at = timestamp;
        Ok(())
    }
}

impl CollateralLedger for Vault {
    fn free_collateral(&self, trader: AccountId) -> Quote {
        self.balance(trader)
    }

    fn settle_pnl(&mut self, trader: AccountId, pnl: Quote, timestamp: Timestamp) -> Result<(), CollateralError> {
        let account = self
            .accounts
            .entry(trader)
            .or_insert_with(|| Account::new(trader, timestamp));
        account.realize_pnl(pnl);
        account.updated_at = timestamp;
        Ok(())
    }
}
