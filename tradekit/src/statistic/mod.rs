//! Optimization-ratio statistics computed over a strategy's periodic
//! returns (§4.12): risk-adjusted performance metrics used to rank and
//! compare backtest runs, independent of any particular presentation
//! layer.

pub mod error;
pub mod ratio;

pub use error::StatisticError;
pub use ratio::{
    calmar_ratio, max_drawdown, omega_ratio, serenity_ratio, sharpe_ratio, smart_sharpe_ratio,
    smart_sortino_ratio, sortino_ratio, Dispersion,
};
