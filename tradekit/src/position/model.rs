//! Position lifecycle (component C7): signed-quantity bookkeeping with
//! spot/futures-specific fee handling, PnL and liquidation math.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::MarketMeta;
use crate::market::{ExchangeId, SymbolId};
use crate::order::{Order, Side};
use crate::position::error::PositionError;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum PositionType {
    Long,
    Short,
    Close,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum AccountKind {
    Spot,
    Futures,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum LeverageMode {
    Cross,
    Isolated,
}

/// The state transition [`Position::on_executed_order`] resolved to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PositionTransition {
    Open,
    Increase,
    Reduce,
    Flip,
    Close,
}

enum QtyOp {
    Set,
    Add,
    Sub,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub exchange_name: ExchangeId,
    pub symbol: SymbolId,
    pub account_kind: AccountKind,

    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub current_price: Option<Decimal>,

    /// Sign encodes LONG (positive) / SHORT (negative).
    pub qty: Decimal,
    pub previous_qty: Decimal,

    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    pub leverage: Decimal,
    pub leverage_mode: Option<LeverageMode>,
    pub mark_price: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    pub next_funding_timestamp: Option<DateTime<Utc>>,

    pub fee_rate: Decimal,
    pub min_qty: Decimal,
    pub min_notional_size: Decimal,
}

impl Position {
    pub fn flat(
        exchange_name: impl Into<ExchangeId>,
        symbol: impl Into<SymbolId>,
        account_kind: AccountKind,
        fee_rate: Decimal,
        min_qty: Decimal,
        min_notional_size: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exchange_name: exchange_name.into(),
            symbol: symbol.into(),
            account_kind,
            entry_price: None,
            exit_price: None,
            current_price: None,
            qty: Decimal::ZERO,
            previous_qty: Decimal::ZERO,
            opened_at: None,
            closed_at: None,
            leverage: Decimal::ONE,
            leverage_mode: None,
            mark_price: None,
            funding_rate: None,
            next_funding_timestamp: None,
            fee_rate,
            min_qty,
            min_notional_size,
        }
    }

    /// Effective minimum size below which the position is CLOSE. Falls
    /// back to `min_notional_size / current_price` when `min_qty` is zero
    /// and a current price is known (precision metadata unavailable).
    fn effective_min_qty(&self) -> Decimal {
        if self.min_qty > Decimal::ZERO {
            return self.min_qty;
        }
        match self.current_price.or(self.entry_price) {
            Some(price) if price > Decimal::ZERO => self.min_notional_size / price,
            _ => Decimal::ZERO,
        }
    }

    pub fn position_type(&self) -> PositionType {
        if self.qty.abs() < self.effective_min_qty() {
            PositionType::Close
        } else if self.qty.is_sign_positive() {
            PositionType::Long
        } else {
            PositionType::Short
        }
    }

    pub fn is_open(&self) -> bool {
        self.position_type() != PositionType::Close
    }

    pub fn value(&self) -> Decimal {
        let price = self.current_price.or(self.mark_price).unwrap_or_default();
        (self.qty * price).abs()
    }

    pub fn total_cost(&self) -> Decimal {
        let entry = self.entry_price.unwrap_or_default();
        (self.qty * entry).abs() / self.leverage
    }

    pub fn pnl(&self) -> Decimal {
        let entry = self.entry_price.unwrap_or_default();
        let gross = self.value() - (self.qty * entry).abs();
        match self.position_type() {
            PositionType::Short => -gross,
            _ => gross,
        }
    }

    pub fn roi(&self) -> Decimal {
        let cost = self.total_cost();
        if cost.is_zero() {
            Decimal::ZERO
        } else {
            self.pnl() / cost
        }
    }

    /// ISOLATED futures only: `entry * (1 - 1/leverage + 0.004)` long,
    /// `entry * (1 + 1/leverage - 0.004)` short.
    pub fn liquidation_price(&self) -> Result<Decimal, PositionError> {
        if self.account_kind != AccountKind::Futures || self.leverage_mode != Some(LeverageMode::Isolated) {
            return Err(PositionError::NoLiquidationPrice);
        }
        let entry = self.entry_price.ok_or(PositionError::NotOpen)?;
        let adj = Decimal::ONE / self.leverage;
        let buffer = Decimal::new(4, 3); // 0.004
        Ok(match self.position_type() {
            PositionType::Long => entry * (Decimal::ONE - adj + buffer),
            _ => entry * (Decimal::ONE + adj - buffer),
        })
    }

    fn update_qty(&mut self, op: QtyOp, delta: Decimal) {
        self.previous_qty = self.qty;
        self.qty = match (self.account_kind, op) {
            (AccountKind::Spot, QtyOp::Set) => delta * (Decimal::ONE - self.fee_rate),
            (AccountKind::Spot, QtyOp::Add) => self.qty + delta * (Decimal::ONE - self.fee_rate),
            (AccountKind::Spot, QtyOp::Sub) => self.qty - delta,
            (AccountKind::Futures, QtyOp::Set) => delta,
            (AccountKind::Futures, QtyOp::Add) => self.qty + delta,
            (AccountKind::Futures, QtyOp::Sub) => self.qty - delta,
        };
    }

    /// Opens the position from flat. Requires CLOSE unless on spot-live,
    /// where qty observed from the stream is merely recorded here.
    pub fn open(&mut self, qty: Decimal, price: Decimal, at: DateTime<Utc>) -> Result<(), PositionError> {
        if self.is_open() {
            return Err(PositionError::AlreadyOpen);
        }
        self.update_qty(QtyOp::Set, qty);
        self.entry_price = Some(price);
        self.exit_price = None;
        self.current_price = Some(price);
        self.opened_at = Some(at);
        self.closed_at = None;
        Ok(())
    }

    /// Adds to an already-open position, keeping the sign of `qty`.
    pub fn increase(&mut self, qty: Decimal, price: Decimal) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::NotOpen);
        }
        let prior_qty = self.qty;
        let prior_entry = self.entry_price.unwrap_or_default();
        self.update_qty(QtyOp::Add, qty);
        // Blended entry price, weighted by the notional each side contributed.
        let total_notional = prior_qty.abs() * prior_entry + qty.abs() * price;
        let total_qty = prior_qty.abs() + qty.abs();
        if !total_qty.is_zero() {
            self.entry_price = Some(total_notional / total_qty);
        }
        Ok(())
    }

    /// Shrinks `|qty|` without changing sign.
    pub fn reduce(&mut self, qty: Decimal, price: Decimal) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::NotOpen);
        }
        if qty.abs() > self.qty.abs() {
            return Err(PositionError::ReduceExceedsSize);
        }
        self.update_qty(QtyOp::Sub, qty.abs() * self.qty.signum());
        self.current_price = Some(price);
        Ok(())
    }

    pub fn close(&mut self, close_price: Decimal, at: DateTime<Utc>) -> Result<(), PositionError> {
        self.previous_qty = self.qty;
        self.qty = Decimal::ZERO;
        self.exit_price = Some(close_price);
        self.current_price = Some(close_price);
        self.closed_at = Some(at);
        Ok(())
    }

    pub fn update_from_market(&mut self, meta: MarketMeta) {
        self.current_price = Decimal::try_from(meta.close).ok();
    }

    /// Pure preview of the PnL a fill at `fill_price` would realize against
    /// the currently open position, without mutating anything. Zero unless
    /// `side`/`qty` oppose the held side (Reduce/Close/Flip); only the
    /// closing portion of `qty` counts toward the realized amount, matching
    /// [`Self::on_executed_order`]'s own close/flip accounting.
    pub fn realized_pnl_at(&self, side: Side, qty: Decimal, fill_price: Decimal) -> Decimal {
        if self.qty.is_zero() {
            return Decimal::ZERO;
        }
        let order_side_sign = match side {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        };
        let order_qty = qty.abs() * order_side_sign;
        if self.qty.signum() == order_qty.signum() {
            return Decimal::ZERO;
        }
        let closing_qty = order_qty.abs().min(self.qty.abs());
        let entry = self.entry_price.unwrap_or_default();
        match self.position_type() {
            PositionType::Short => (entry - fill_price) * closing_qty,
            _ => (fill_price - entry) * closing_qty,
        }
    }

    /// Resolves an executed order into exactly one [`PositionTransition`]
    /// and applies the corresponding mutation. Reduce-only orders that
    /// would increase the position are clamped to CLOSE.
    pub fn on_executed_order(&mut self, order: &Order, at: DateTime<Utc>) -> Result<PositionTransition, PositionError> {
        let order_side_sign = match order.side {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        };
        let order_qty = order.qty.abs() * order_side_sign;

        if self.qty.is_zero() {
            self.open(order_qty, order.price.unwrap_or_default(), at)?;
            return Ok(PositionTransition::Open);
        }

        let same_sign = self.qty.signum() == order_qty.signum();
        let resulting = self.qty + order_qty;

        if same_sign {
            if order.reduce_only {
                // A reduce-only order can never increase; treat as a close.
                self.close(order.price.unwrap_or_default(), at)?;
                return Ok(PositionTransition::Close);
            }
            self.increase(order_qty, order.price.unwrap_or_default())?;
            return Ok(PositionTransition::Increase);
        }

        if resulting.abs() < self.effective_min_qty() {
            self.close(order.price.unwrap_or_default(), at)?;
            return Ok(PositionTransition::Close);
        }

        if order_qty.abs() > self.qty.abs() {
            if order.reduce_only {
                // Reduce-only can never flip to the other side; the excess
                // beyond the closing quantity is simply discarded.
                self.close(order.price.unwrap_or_default(), at)?;
                return Ok(PositionTransition::Close);
            }
            // FLIP: close the existing side, then re-open on the other
            // side for the excess quantity.
            let excess = order_qty + self.qty;
            self.close(order.price.unwrap_or_default(), at)?;
            self.open(excess, order.price.unwrap_or_default(), at)?;
            return Ok(PositionTransition::Flip);
        }

        self.reduce(order_qty.abs(), order.price.unwrap_or_default())?;
        Ok(PositionTransition::Reduce)
    }
}
