//! Cost-averaging ("물타기") arithmetic
//!
//! Everything here is synchronous and stateless. Prices are currency units as
//! `f64`; every currency figure in a result is rounded to the nearest whole unit.
//! [`AveragingDesk`] adds the broker lookup in front of the calculator.

use crate::api::BrokerProvider;
use crate::error::{Result, StockError};
use crate::models::{HoldingSnapshot, round_to};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Extra share counts used when the caller gives none
pub const DEFAULT_SCENARIOS: [u64; 4] = [1, 5, 10, 20];

/// Above this many shares an inversion is treated as unreachable
const MAX_TARGET_QUANTITY: f64 = 1e12;

/// Largest share count an `f64` cost still represents exactly (2^53)
const MAX_SHARES: u64 = 1 << 53;

/// Shares currently held and their average cost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub avg_price: f64,
    pub quantity: u64,
}

impl Position {
    pub fn new(avg_price: f64, quantity: u64) -> Self {
        Self {
            avg_price,
            quantity,
        }
    }

    fn cost(&self) -> f64 {
        self.avg_price * self.quantity as f64
    }
}

impl From<&HoldingSnapshot> for Position {
    fn from(holding: &HoldingSnapshot) -> Self {
        Self::new(holding.avg_price, holding.quantity)
    }
}

/// How the additional purchase is described
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AveragingMode {
    /// Buy an exact number of shares
    Quantity {
        additional_price: f64,
        additional_quantity: u64,
    },
    /// Spend up to an amount; the share count is truncated, never rounded up
    Amount {
        investment_amount: f64,
        purchase_price: f64,
    },
}

/// Outcome of one averaging calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragingResult {
    pub new_avg_price: i64,
    pub avg_price_change: i64,
    pub avg_price_change_pct: f64,
    pub total_quantity: u64,
    pub total_cost: i64,
    /// Shares bought, given or derived from the amount
    pub additional_quantity: u64,
    pub additional_cost: i64,
    pub breakeven_price: i64,
    pub profit_if_sell_now: i64,
    pub profit_pct: f64,
}

/// One row of a scenario table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub additional_quantity: u64,
    pub result: AveragingResult,
}

/// Minimal purchase reaching a target average price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetQuantity {
    pub target_avg_price: f64,
    pub required_quantity: u64,
    pub additional_cost: i64,
    pub resulting_avg_price: i64,
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StockError::InvalidInput(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn validate_position(position: &Position) -> Result<()> {
    require_positive("current_avg_price", position.avg_price)?;
    if position.quantity == 0 {
        return Err(StockError::InvalidInput(
            "current_quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AveragingCalculator;

impl AveragingCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the position after an additional purchase
    ///
    /// `market_price` values the position for `profit_if_sell_now`; without it
    /// the purchase price is used. An additional quantity of zero (given, or
    /// an amount too small for a single share) leaves the average unchanged.
    pub fn calculate(
        &self,
        position: Position,
        mode: AveragingMode,
        market_price: Option<f64>,
    ) -> Result<AveragingResult> {
        validate_position(&position)?;
        if let Some(price) = market_price {
            require_positive("market_price", price)?;
        }

        let (price, quantity) = match mode {
            AveragingMode::Quantity {
                additional_price,
                additional_quantity,
            } => {
                require_positive("additional_price", additional_price)?;
                (additional_price, additional_quantity)
            }
            AveragingMode::Amount {
                investment_amount,
                purchase_price,
            } => {
                require_positive("investment_amount", investment_amount)?;
                require_positive("purchase_price", purchase_price)?;
                let shares = (investment_amount / purchase_price).floor();
                if shares > MAX_SHARES as f64 {
                    return Err(StockError::InvalidInput(format!(
                        "investment_amount {investment_amount} buys more shares than can be counted"
                    )));
                }
                debug!(investment_amount, purchase_price, shares, "amount converted to shares");
                (purchase_price, shares as u64)
            }
        };

        Self::combine(position, price, quantity, market_price.unwrap_or(price))
    }

    fn combine(
        position: Position,
        price: f64,
        quantity: u64,
        market_price: f64,
    ) -> Result<AveragingResult> {
        let total_quantity = position
            .quantity
            .checked_add(quantity)
            .filter(|total| *total <= MAX_SHARES)
            .ok_or_else(|| {
                StockError::InvalidInput(format!(
                    "{} held plus {quantity} additional shares is out of range",
                    position.quantity
                ))
            })?;

        let additional_cost = price * quantity as f64;
        let total_cost = position.cost() + additional_cost;
        let new_avg_price = (total_cost / total_quantity as f64).round() as i64;

        let current = position.avg_price.round() as i64;
        let change = new_avg_price - current;
        let profit = (market_price - new_avg_price as f64) * total_quantity as f64;

        Ok(AveragingResult {
            new_avg_price,
            avg_price_change: change,
            avg_price_change_pct: round_to(Some(change as f64 / position.avg_price * 100.0), 2)
                .unwrap_or_default(),
            total_quantity,
            total_cost: total_cost.round() as i64,
            additional_quantity: quantity,
            additional_cost: additional_cost.round() as i64,
            breakeven_price: new_avg_price,
            profit_if_sell_now: profit.round() as i64,
            profit_pct: round_to(Some(profit / total_cost * 100.0), 2).unwrap_or_default(),
        })
    }

    /// Quantity-mode results for several extra share counts at one price
    pub fn calculate_scenarios(
        &self,
        position: Position,
        additional_price: f64,
        quantities: &[u64],
        market_price: Option<f64>,
    ) -> Result<Vec<Scenario>> {
        let quantities = if quantities.is_empty() {
            &DEFAULT_SCENARIOS[..]
        } else {
            quantities
        };

        quantities
            .iter()
            .map(|&additional_quantity| {
                let result = self.calculate(
                    position,
                    AveragingMode::Quantity {
                        additional_price,
                        additional_quantity,
                    },
                    market_price,
                )?;
                Ok(Scenario {
                    additional_quantity,
                    result,
                })
            })
            .collect()
    }

    /// Smallest whole number of shares at `additional_price` that brings the
    /// average down to `target_avg_price` or below
    pub fn target_quantity(
        &self,
        position: Position,
        additional_price: f64,
        target_avg_price: f64,
    ) -> Result<TargetQuantity> {
        validate_position(&position)?;
        require_positive("additional_price", additional_price)?;
        require_positive("target_avg_price", target_avg_price)?;

        if target_avg_price >= position.avg_price {
            return Err(StockError::UnreachableTarget(format!(
                "target {target_avg_price} is not below the current average {}",
                position.avg_price
            )));
        }
        if additional_price >= target_avg_price {
            return Err(StockError::UnreachableTarget(format!(
                "buying at {additional_price} can never bring the average to {target_avg_price}"
            )));
        }

        let held = position.quantity as f64;
        let estimate = (held * (position.avg_price - target_avg_price)
            / (target_avg_price - additional_price))
            .ceil();
        if !estimate.is_finite() || estimate > MAX_TARGET_QUANTITY {
            return Err(StockError::UnreachableTarget(format!(
                "target {target_avg_price} needs an unbounded purchase"
            )));
        }

        let reaches = |qty: u64| {
            let qty = qty as f64;
            position.cost() + additional_price * qty <= target_avg_price * (held + qty)
        };

        // The closed form can land one share off under float rounding.
        let mut required = estimate.max(0.0) as u64;
        while !reaches(required) {
            required += 1;
        }
        while required > 0 && reaches(required - 1) {
            required -= 1;
        }

        let result = Self::combine(position, additional_price, required, additional_price)?;
        Ok(TargetQuantity {
            target_avg_price,
            required_quantity: required,
            additional_cost: result.additional_cost,
            resulting_avg_price: result.new_avg_price,
        })
    }
}

/// Runs the calculator against the position a broker reports
pub struct AveragingDesk {
    broker: Arc<dyn BrokerProvider>,
    calculator: AveragingCalculator,
}

impl AveragingDesk {
    pub fn new(broker: Arc<dyn BrokerProvider>) -> Self {
        Self {
            broker,
            calculator: AveragingCalculator::new(),
        }
    }

    /// Current holding, or [`StockError::NotHolding`] when there is none
    pub async fn holding(&self, symbol: &str) -> Result<HoldingSnapshot> {
        match self.broker.fetch_holding(symbol).await? {
            Some(holding) if holding.quantity > 0 => Ok(holding),
            _ => Err(StockError::NotHolding(symbol.to_string())),
        }
    }

    pub async fn calculate(&self, symbol: &str, mode: AveragingMode) -> Result<AveragingResult> {
        let holding = self.holding(symbol).await?;
        self.calculator
            .calculate(Position::from(&holding), mode, holding.current_price)
    }

    /// Scenario table at `price`, or at the broker's last price
    pub async fn scenarios(
        &self,
        symbol: &str,
        price: Option<f64>,
        quantities: &[u64],
    ) -> Result<Vec<Scenario>> {
        let holding = self.holding(symbol).await?;
        let price = Self::purchase_price(&holding, price)?;
        self.calculator.calculate_scenarios(
            Position::from(&holding),
            price,
            quantities,
            holding.current_price,
        )
    }

    pub async fn target(
        &self,
        symbol: &str,
        price: Option<f64>,
        target_avg_price: f64,
    ) -> Result<TargetQuantity> {
        let holding = self.holding(symbol).await?;
        let price = Self::purchase_price(&holding, price)?;
        self.calculator
            .target_quantity(Position::from(&holding), price, target_avg_price)
    }

    fn purchase_price(holding: &HoldingSnapshot, price: Option<f64>) -> Result<f64> {
        price.or(holding.current_price).ok_or_else(|| {
            StockError::InvalidInput(format!(
                "no purchase price given and no current price for {}",
                holding.symbol
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBrokerProvider;
    use tokio_test::{assert_err, assert_ok};

    fn held() -> Position {
        Position::new(75_000.0, 100)
    }

    fn buy(additional_price: f64, additional_quantity: u64) -> AveragingMode {
        AveragingMode::Quantity {
            additional_price,
            additional_quantity,
        }
    }

    #[test]
    fn test_quantity_mode() {
        let result = AveragingCalculator::new()
            .calculate(held(), buy(70_000.0, 10), None)
            .unwrap();

        assert_eq!(result.new_avg_price, 74_545);
        assert_eq!(result.total_quantity, 110);
        assert_eq!(result.total_cost, 8_200_000);
        assert_eq!(result.additional_cost, 700_000);
        assert_eq!(result.avg_price_change, -455);
        assert_eq!(result.avg_price_change_pct, -0.61);
        assert_eq!(result.breakeven_price, result.new_avg_price);
        assert_eq!(result.profit_if_sell_now, -499_950);
        assert_eq!(result.profit_pct, -6.1);
    }

    #[test]
    fn test_change_follows_rounded_average() {
        // 199 / 2 = 99.5 rounds back up to the current average
        let result = AveragingCalculator::new()
            .calculate(Position::new(100.0, 1), buy(99.0, 1), None)
            .unwrap();

        assert_eq!(result.new_avg_price, 100);
        assert_eq!(result.avg_price_change, 0);
        assert_eq!(result.avg_price_change_pct, 0.0);
    }

    #[test]
    fn test_selling_at_breakeven_is_flat() {
        let calc = AveragingCalculator::new();
        let result = calc.calculate(held(), buy(70_000.0, 10), None).unwrap();

        let at_breakeven = calc
            .calculate(held(), buy(70_000.0, 10), Some(result.breakeven_price as f64))
            .unwrap();
        assert_eq!(at_breakeven.profit_if_sell_now, 0);
        assert_eq!(at_breakeven.profit_pct, 0.0);
    }

    #[test]
    fn test_oversized_purchase_rejected() {
        let calc = AveragingCalculator::new();

        let err = calc
            .calculate(
                held(),
                AveragingMode::Amount {
                    investment_amount: 1e30,
                    purchase_price: 1.0,
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)), "{err}");

        let err = calc.calculate(held(), buy(1.0, u64::MAX), None).unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)), "{err}");

        let err = calc
            .calculate(Position::new(1.0, u64::MAX), buy(1.0, 1), None)
            .unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn test_amount_mode_truncates() {
        let result = AveragingCalculator::new()
            .calculate(
                held(),
                AveragingMode::Amount {
                    investment_amount: 1_000_000.0,
                    purchase_price: 70_000.0,
                },
                None,
            )
            .unwrap();

        assert_eq!(result.additional_quantity, 14);
        assert_eq!(result.total_quantity, 114);
        assert_eq!(result.total_cost, 8_480_000);
        assert_eq!(result.new_avg_price, 74_386);
    }

    #[test]
    fn test_zero_additional_quantity_is_identity() {
        let calc = AveragingCalculator::new();
        let result = calc.calculate(held(), buy(70_000.0, 0), None).unwrap();
        assert_eq!(result.new_avg_price, 75_000);
        assert_eq!(result.avg_price_change, 0);
        assert_eq!(result.total_quantity, 100);

        let small = calc
            .calculate(
                held(),
                AveragingMode::Amount {
                    investment_amount: 50_000.0,
                    purchase_price: 70_000.0,
                },
                None,
            )
            .unwrap();
        assert_eq!(small.additional_quantity, 0);
        assert_eq!(small.new_avg_price, 75_000);
    }

    #[test]
    fn test_market_price_values_position() {
        let result = AveragingCalculator::new()
            .calculate(held(), buy(70_000.0, 10), Some(80_000.0))
            .unwrap();
        assert_eq!(result.profit_if_sell_now, (80_000 - 74_545) * 110);
        assert!(result.profit_pct > 0.0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let calc = AveragingCalculator::new();

        for (position, mode) in [
            (Position::new(0.0, 100), buy(70_000.0, 10)),
            (Position::new(75_000.0, 0), buy(70_000.0, 10)),
            (held(), buy(-1.0, 10)),
            (held(), buy(f64::NAN, 10)),
            (
                held(),
                AveragingMode::Amount {
                    investment_amount: 0.0,
                    purchase_price: 70_000.0,
                },
            ),
            (
                held(),
                AveragingMode::Amount {
                    investment_amount: 1_000.0,
                    purchase_price: 0.0,
                },
            ),
        ] {
            let err = calc.calculate(position, mode, None).unwrap_err();
            assert!(matches!(err, StockError::InvalidInput(_)), "{err}");
        }
    }

    #[test]
    fn test_scenarios_default_table() {
        let rows = AveragingCalculator::new()
            .calculate_scenarios(held(), 70_000.0, &[], None)
            .unwrap();

        let quantities: Vec<u64> = rows.iter().map(|r| r.additional_quantity).collect();
        assert_eq!(quantities, DEFAULT_SCENARIOS);
        assert_eq!(rows[2].result.new_avg_price, 74_545);
        // more shares at a lower price never raise the average
        assert!(
            rows.windows(2)
                .all(|w| w[1].result.new_avg_price <= w[0].result.new_avg_price)
        );
    }

    #[test]
    fn test_target_quantity_is_minimal() {
        let calc = AveragingCalculator::new();
        let target = calc.target_quantity(held(), 70_000.0, 74_000.0).unwrap();

        assert_eq!(target.required_quantity, 25);
        assert_eq!(target.additional_cost, 1_750_000);
        assert_eq!(target.resulting_avg_price, 74_000);

        let short = calc.calculate(held(), buy(70_000.0, 24), None).unwrap();
        assert!(short.new_avg_price > 74_000);
    }

    #[test]
    fn test_average_descends_towards_purchase_price() {
        let calc = AveragingCalculator::new();
        let mut previous = i64::MAX;
        for qty in 0..200 {
            let result = calc.calculate(held(), buy(70_000.0, qty), None).unwrap();
            assert!(result.new_avg_price <= previous);
            assert!(result.new_avg_price >= 70_000);
            previous = result.new_avg_price;
        }
    }

    #[test]
    fn test_unreachable_targets() {
        let calc = AveragingCalculator::new();

        let err = calc.target_quantity(held(), 70_000.0, 69_000.0).unwrap_err();
        assert!(matches!(err, StockError::UnreachableTarget(_)));

        let err = calc.target_quantity(held(), 70_000.0, 70_000.0).unwrap_err();
        assert!(matches!(err, StockError::UnreachableTarget(_)));

        let err = calc.target_quantity(held(), 70_000.0, 76_000.0).unwrap_err();
        assert!(matches!(err, StockError::UnreachableTarget(_)));

        let err = calc.target_quantity(held(), 0.0, 74_000.0).unwrap_err();
        assert!(matches!(err, StockError::InvalidInput(_)));
    }

    fn holding(quantity: u64) -> HoldingSnapshot {
        HoldingSnapshot {
            symbol: "005930".to_string(),
            name: Some("삼성전자".to_string()),
            quantity,
            avg_price: 75_000.0,
            current_price: Some(70_000.0),
        }
    }

    #[tokio::test]
    async fn test_desk_uses_broker_holding() {
        let mut broker = MockBrokerProvider::new();
        broker
            .expect_fetch_holding()
            .returning(|_| Ok(Some(holding(100))));
        let desk = AveragingDesk::new(Arc::new(broker));

        let result = assert_ok!(desk.calculate("005930", buy(70_000.0, 10)).await);
        assert_eq!(result.new_avg_price, 74_545);

        let rows = assert_ok!(desk.scenarios("005930", None, &[10]).await);
        assert_eq!(rows[0].result.total_cost, 8_200_000);

        let target = assert_ok!(desk.target("005930", None, 74_000.0).await);
        assert_eq!(target.required_quantity, 25);
    }

    #[tokio::test]
    async fn test_desk_not_holding() {
        let mut broker = MockBrokerProvider::new();
        broker.expect_fetch_holding().returning(|symbol| {
            if symbol == "EMPTY" {
                Ok(Some(holding(0)))
            } else {
                Ok(None)
            }
        });
        let desk = AveragingDesk::new(Arc::new(broker));

        for symbol in ["AAPL", "EMPTY"] {
            let err = assert_err!(desk.holding(symbol).await);
            assert_eq!(err, StockError::NotHolding(symbol.to_string()));
        }
    }
}
