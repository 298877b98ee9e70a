//! Optimization ratios (§4.12): Sharpe, Calmar, Sortino, Omega, Serenity
//! and their autocorrelation-corrected "smart" variants, computed from a
//! series of periodic returns.

use crate::statistic::error::StatisticError;

/// Running mean/variance accumulator (Welford's algorithm) split into a
/// full-sample and a downside-only (negative returns) pass, updated in a
/// single sweep over the return series.
#[derive(Default)]
pub struct Dispersion {
    count: u64,
    mean: f64,
    m2: f64,
    downside_count: u64,
    downside_mean: f64,
    downside_m2: f64,
}

impl Dispersion {
    pub fn push(&mut self, r: f64) {
        self.count += 1;
        let delta = r - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = r - self.mean;
        self.m2 += delta * delta2;

        if r < 0.0 {
            self.downside_count += 1;
            let d_delta = r - self.downside_mean;
            self.downside_mean += d_delta / self.downside_count as f64;
            let d_delta2 = r - self.downside_mean;
            self.downside_m2 += d_delta * d_delta2;
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Downside deviation computed against zero, not the sample mean —
    /// the conventional Sortino denominator.
    pub fn downside_deviation(&self) -> f64 {
        if self.downside_count == 0 {
            0.0
        } else {
            (self.downside_m2 / self.downside_count as f64).sqrt()
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

fn dispersion_of(returns: &[f64]) -> Dispersion {
    let mut d = Dispersion::default();
    for &r in returns {
        d.push(r);
    }
    d
}

/// Sample autocorrelation at `lag`, used to discount Sharpe/Sortino for
/// serially-correlated returns (the "smart" variants below).
fn autocorrelation(returns: &[f64], mean: f64, lag: usize) -> f64 {
    if returns.len() <= lag {
        return 0.0;
    }
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }
    let covariance: f64 = returns
        .iter()
        .zip(returns.iter().skip(lag))
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();
    covariance / variance
}

/// Penalty factor from quantstats' "smart" ratios: `1 + 2 * sum_{k=1}^{n-1}
/// (1 - k/n) * autocorr(k)`, which discounts the ratio when returns are
/// serially correlated (the naive Sharpe overstates skill in that case).
fn autocorrelation_penalty(returns: &[f64], mean: f64) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 1.0;
    }
    let sum: f64 = (1..n)
        .map(|k| (1.0 - k as f64 / n as f64) * autocorrelation(returns, mean, k))
        .sum();
    (1.0 + 2.0 * sum).max(f64::EPSILON)
}

fn require_samples(returns: &[f64]) -> Result<(), StatisticError> {
    if returns.len() < 2 {
        Err(StatisticError::InsufficientSamples)
    } else {
        Ok(())
    }
}

pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    require_samples(returns)?;
    let d = dispersion_of(returns);
    if d.std_dev() == 0.0 {
        return Ok(0.0);
    }
    Ok(d.mean() / d.std_dev() * periods_per_year.sqrt())
}

pub fn smart_sharpe_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    let raw = sharpe_ratio(returns, periods_per_year)?;
    let d = dispersion_of(returns);
    Ok(raw / autocorrelation_penalty(returns, d.mean()))
}

pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    require_samples(returns)?;
    let d = dispersion_of(returns);
    if d.downside_deviation() == 0.0 {
        return Ok(0.0);
    }
    Ok(d.mean() / d.downside_deviation() * periods_per_year.sqrt())
}

pub fn smart_sortino_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    let raw = sortino_ratio(returns, periods_per_year)?;
    let d = dispersion_of(returns);
    Ok(raw / autocorrelation_penalty(returns, d.mean()))
}

/// Largest peak-to-trough drop in the cumulative return curve, as a
/// positive fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut worst = 0.0;
    for &r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        let drawdown = (peak - equity) / peak;
        worst = worst.max(drawdown);
    }
    worst
}

pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    require_samples(returns)?;
    let d = dispersion_of(returns);
    let annualized_return = d.mean() * periods_per_year;
    let drawdown = max_drawdown(returns);
    if drawdown == 0.0 {
        return Ok(0.0);
    }
    Ok(annualized_return / drawdown)
}

/// `sqrt(mean(drawdown^2))` over the whole equity curve — the Ulcer Index,
/// used as Serenity's risk denominator in place of a single worst
/// drawdown.
fn ulcer_index(returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut sum_sq = 0.0;
    for &r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        let drawdown = (peak - equity) / peak;
        sum_sq += drawdown * drawdown;
    }
    (sum_sq / returns.len() as f64).sqrt()
}

pub fn serenity_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64, StatisticError> {
    require_samples(returns)?;
    let d = dispersion_of(returns);
    let annualized_return = d.mean() * periods_per_year;
    let ulcer = ulcer_index(returns);
    if ulcer == 0.0 {
        return Ok(0.0);
    }
    Ok(annualized_return / ulcer)
}

/// Ratio of the probability-weighted gains to losses above/below
/// `threshold` (usually 0): `sum(max(r - threshold, 0)) / abs(sum(min(r -
/// threshold, 0)))`.
pub fn omega_ratio(returns: &[f64], threshold: f64) -> Result<f64, StatisticError> {
    require_samples(returns)?;
    let gains: f64 = returns.iter().map(|r| (r - threshold).max(0.0)).sum();
    let losses: f64 = returns.iter().map(|r| (r - threshold).min(0.0)).sum::<f64>().abs();
    if losses == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(gains / losses)
}
