//! Trade entity: one row per successful execution, 1:1 with a filled order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::order::OrderSide;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub order_id: Uuid,
    pub investor_id: i64,
    pub asset_id: i64,
    pub quantity: Decimal,
    pub execution_price: Decimal,
    pub side: OrderSide,
    pub traded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trade_carries_side_from_order() {
        let t = Trade {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            investor_id: 1,
            asset_id: 10,
            quantity: dec!(2),
            execution_price: dec!(50.00),
            side: OrderSide::Buy,
            traded_at: Utc::now(),
        };
        assert_eq!(t.side, OrderSide::Buy);
    }
}
