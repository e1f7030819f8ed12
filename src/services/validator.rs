//! Pure validation of an order against its investor, asset, and current
//! holding. Checks run in order and short-circuit on the first failure.

use rust_decimal::Decimal;

use crate::models::{AccountStatus, Asset, Holding, Investor, Order, OrderSide};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationFailed(pub String);

pub fn validate(
    order: &Order,
    investor: Option<&Investor>,
    asset: Option<&Asset>,
    holding: Option<&Holding>,
) -> Result<(), ValidationFailed> {
    let investor = match investor {
        Some(i) => i,
        None => return Err(ValidationFailed("Investor not found".into())),
    };
    if investor.account_status != AccountStatus::Active {
        return Err(ValidationFailed(format!(
            "Account is {}",
            investor.account_status
        )));
    }

    let asset = match asset {
        Some(a) => a,
        None => return Err(ValidationFailed("Asset is not available for trading".into())),
    };
    if !asset.is_active {
        return Err(ValidationFailed("Asset is not available for trading".into()));
    }

    if order.quantity <= Decimal::ZERO {
        return Err(ValidationFailed("Quantity must be positive".into()));
    }
    if let Some(price) = order.price {
        if price <= Decimal::ZERO {
            return Err(ValidationFailed("Price must be positive".into()));
        }
    }

    if order.side == OrderSide::Sell {
        let available = holding.map(|h| h.quantity).unwrap_or(Decimal::ZERO);
        if available < order.quantity {
            return Err(ValidationFailed(format!(
                "Insufficient holdings. Available: {available}, Requested: {}",
                order.quantity
            )));
        }
    }

    if order.is_market() && asset.current_price <= Decimal::ZERO {
        return Err(ValidationFailed("Invalid market price for asset".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(side: OrderSide, quantity: Decimal, price: Option<Decimal>) -> Order {
        Order {
            id: Uuid::new_v4(),
            investor_id: 1,
            asset_id: 10,
            side,
            quantity,
            price,
            status: OrderStatus::New,
            idempotency_key: None,
            ordered_at: Utc::now(),
            executed_at: None,
            settled_at: None,
        }
    }

    fn active_investor() -> Investor {
        Investor {
            investor_id: 1,
            account_status: AccountStatus::Active,
        }
    }

    fn active_asset() -> Asset {
        Asset {
            asset_id: 10,
            is_active: true,
            current_price: dec!(50.00),
        }
    }

    #[test]
    fn happy_buy_passes() {
        let o = order(OrderSide::Buy, dec!(2), None);
        assert!(validate(&o, Some(&active_investor()), Some(&active_asset()), None).is_ok());
    }

    #[test]
    fn suspended_investor_rejected() {
        let o = order(OrderSide::Buy, dec!(2), None);
        let investor = Investor {
            account_status: AccountStatus::Suspended,
            ..active_investor()
        };
        let err = validate(&o, Some(&investor), Some(&active_asset()), None).unwrap_err();
        assert_eq!(err.0, "Account is Suspended");
    }

    #[test]
    fn inactive_asset_rejected() {
        let o = order(OrderSide::Buy, dec!(2), None);
        let asset = Asset {
            is_active: false,
            ..active_asset()
        };
        let err = validate(&o, Some(&active_investor()), Some(&asset), None).unwrap_err();
        assert_eq!(err.0, "Asset is not available for trading");
    }

    #[test]
    fn oversell_rejected_with_exact_message() {
        let o = order(OrderSide::Sell, dec!(2), None);
        let holding = Holding {
            investor_id: 1,
            asset_id: 10,
            quantity: dec!(1),
            average_cost: dec!(40.00),
            updated_at: Utc::now(),
        };
        let err = validate(
            &o,
            Some(&active_investor()),
            Some(&active_asset()),
            Some(&holding),
        )
        .unwrap_err();
        assert_eq!(err.0, "Insufficient holdings. Available: 1, Requested: 2");
    }

    #[test]
    fn market_order_needs_positive_asset_price() {
        let o = order(OrderSide::Buy, dec!(2), None);
        let asset = Asset {
            current_price: dec!(0),
            ..active_asset()
        };
        let err = validate(&o, Some(&active_investor()), Some(&asset), None).unwrap_err();
        assert_eq!(err.0, "Invalid market price for asset");
    }

    #[test]
    fn missing_investor_rejected() {
        let o = order(OrderSide::Buy, dec!(2), None);
        let err = validate(&o, None, Some(&active_asset()), None).unwrap_err();
        assert_eq!(err.0, "Investor not found");
    }
}
