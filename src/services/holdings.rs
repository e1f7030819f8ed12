//! Applies a filled order to a holding: weighted-average cost on buys,
//! quantity decrement on sells. Called inside the execution transaction,
//! after `store::holdings::lock` has serialized concurrent access to the
//! `(investor_id, asset_id)` pair.

use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::Postgres;

use crate::models::Holding;
use crate::store::{holdings, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum HoldingsError {
    #[error("insufficient holdings")]
    InsufficientHoldings,
    #[error(transparent)]
    Store(#[from] StoreError),
}

const SCALE: u32 = 4;

pub enum SellOutcome {
    Remaining(Decimal),
    Exhausted,
}

/// Pure weighted-average arithmetic for a buy against an optional existing
/// holding. Shared by the Postgres-backed and in-memory stores so both apply
/// the exact same rounding.
pub fn compute_buy(
    existing: Option<&Holding>,
    quantity: Decimal,
    execution_price: Decimal,
) -> (Decimal, Decimal) {
    match existing {
        Some(h) => {
            let new_qty = h.quantity + quantity;
            let new_avg = ((h.quantity * h.average_cost) + (quantity * execution_price)) / new_qty;
            (round(new_qty), round(new_avg))
        }
        None => (round(quantity), round(execution_price)),
    }
}

/// Pure quantity decrement for a sell against an existing holding. Errs if
/// the holding is missing or smaller than `quantity`.
pub fn compute_sell(
    existing: Option<&Holding>,
    quantity: Decimal,
) -> Result<SellOutcome, HoldingsError> {
    let holding = match existing {
        Some(h) if h.quantity >= quantity => h,
        _ => return Err(HoldingsError::InsufficientHoldings),
    };

    let new_qty = round(holding.quantity - quantity);
    if new_qty.is_zero() {
        Ok(SellOutcome::Exhausted)
    } else {
        Ok(SellOutcome::Remaining(new_qty))
    }
}

/// Buy: create or average the holding up with `order.quantity @ execution_price`.
pub async fn apply_buy(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
    quantity: Decimal,
    execution_price: Decimal,
) -> Result<Holding, HoldingsError> {
    holdings::lock(tx, investor_id, asset_id).await?;
    let existing = holdings::get_for_update(tx, investor_id, asset_id).await?;

    let (new_qty, new_avg) = compute_buy(existing.as_ref(), quantity, execution_price);

    let holding = holdings::upsert(tx, investor_id, asset_id, new_qty, new_avg).await?;
    Ok(holding)
}

/// Sell: decrement quantity, average cost unchanged. Deletes the row when
/// the remaining quantity is exactly zero.
pub async fn apply_sell(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    investor_id: i64,
    asset_id: i64,
    quantity: Decimal,
) -> Result<Option<Holding>, HoldingsError> {
    holdings::lock(tx, investor_id, asset_id).await?;
    let existing = holdings::get_for_update(tx, investor_id, asset_id).await?;
    let average_cost = existing.as_ref().map(|h| h.average_cost).unwrap_or_default();

    match compute_sell(existing.as_ref(), quantity)? {
        SellOutcome::Exhausted => {
            holdings::delete(tx, investor_id, asset_id).await?;
            Ok(None)
        }
        SellOutcome::Remaining(new_qty) => {
            let updated = holdings::upsert(tx, investor_id, asset_id, new_qty, average_cost).await?;
            Ok(Some(updated))
        }
    }
}

fn round(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven)
}
