//! Margin sufficiency for traders with vAMM positions.
//!
//! Initial margin (IM) is the share of open notional a trader must back with
//! collateral to add exposure. Maintenance margin (MM) is the lower floor
//! reported alongside it.
//!
//! Free collateral never counts unrealized gains: it is
//! `min(collateral, collateral + unrealized_pnl) - sum(IM)`.

use crate::types::{Price, Quote, SignedSize};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarginError {
    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },
    #[error("invalid margin parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginParams {
    pub initial_margin_ratio: Decimal,
    pub maintenance_margin_ratio: Decimal,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            // 10x max leverage on open
            initial_margin_ratio: dec!(0.1),
            maintenance_margin_ratio: dec!(0.0625),
        }
    }
}

impl MarginParams {
    pub fn validate(&self) -> Result<(), MarginError> {
        let im = self.initial_margin_ratio;
        let mm = self.maintenance_margin_ratio;
        if im <= Decimal::ZERO || im > Decimal::ONE {
            return Err(MarginError::InvalidParams(format!(
                "initial margin ratio {} must be in (0, 1]",
                im
            )));
        }
        if mm <= Decimal::ZERO || mm > im {
            return Err(MarginError::InvalidParams(format!(
                "maintenance margin ratio {} must be in (0, {}]",
                mm, im
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginRequirement {
    pub initial: Quote,
    pub maintenance: Quote,
}

pub fn notional_value(size: SignedSize, price: Price) -> Quote {
    Quote::new(size.abs() * price.value())
}

pub fn calculate_margin_requirement(
    size: SignedSize,
    price: Price,
    params: &MarginParams,
) -> MarginRequirement {
    let notional = notional_value(size, price);
    MarginRequirement {
        initial: notional.mul(params.initial_margin_ratio),
        maintenance: notional.mul(params.maintenance_margin_ratio),
    }
}

// One open position valued at a price.
#[derive(Debug, Clone, Copy)]
pub struct Exposure {
    pub size: SignedSize,
    pub open_notional: Quote,
    pub price: Price,
}

impl Exposure {
    pub fn unrealized_pnl(&self) -> Quote {
        Quote::new(self.size.value() * self.price.value() + self.open_notional.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountValuation {
    pub collateral: Quote,
    pub unrealized_pnl: Quote,
    pub total_notional: Quote,
    pub initial_required: Quote,
    pub maintenance_required: Quote,
    pub free_collateral: Quote,
}

impl AccountValuation {
    pub fn account_value(&self) -> Quote {
        self.collateral.add(self.unrealized_pnl)
    }

    pub fn is_above_maintenance(&self) -> bool {
        self.account_value() >= self.maintenance_required
    }
}

pub fn evaluate_account<I>(collateral: Quote, exposures: I, params: &MarginParams) -> AccountValuation
where
    I: IntoIterator<Item = Exposure>,
{
    let mut unrealized_pnl = Quote::zero();
    let mut total_notional = Quote::zero();
    let mut initial_required = Quote::zero();
    let mut maintenance_required = Quote::zero();

    for exposure in exposures {
        unrealized_pnl = unrealized_pnl.add(exposure.unrealized_pnl());
        total_notional = total_notional.add(notional_value(exposure.size, exposure.price));
        let req = calculate_margin_requirement(exposure.size, exposure.price, params);
        initial_required = initial_required.add(req.initial);
        maintenance_required = maintenance_required.add(req.maintenance);
    }

    let value = collateral.add(unrealized_pnl);
    let counted = if value < collateral { value } else { collateral };
    let free_collateral = counted.sub(initial_required);

    AccountValuation {
        collateral,
        unrealized_pnl,
        total_notional,
        initial_required,
        maintenance_required,
        free_collateral,
    }
}

pub fn check_initial_margin(valuation: &AccountValuation) -> Result<(), MarginError> {
    if valuation.free_collateral.is_negative() {
        let available = valuation.free_collateral.add(valuation.initial_required);
        return Err(MarginError::InsufficientMargin {
            required: valuation.initial_required,
            available,
        });
    }
    Ok(())
}
