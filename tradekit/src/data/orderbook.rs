//! Order-book state (component C3): trimmed ask/bid ladders plus a
//! time-bucketed ring of formatted snapshots, one per `(exchange, symbol)`.

use crate::collection::DynamicArray;

/// Ladder depth the trimmed snapshot is padded/truncated to.
pub const LADDER_DEPTH: usize = 50;

/// Minimum spacing, in wall-clock milliseconds, between two formatted
/// snapshots written to the ring.
const SNAPSHOT_INTERVAL_MS: i64 = 1_000;

/// A single `(price, quantity)` level. Unused ladder slots are represented
/// with `price = NaN, qty = 0.0`.
pub type Level = (f64, f64);

fn empty_ladder() -> Vec<Level> {
    vec![(f64::NAN, 0.0); LADDER_DEPTH]
}

/// The price-grid unit used to collapse raw levels, chosen from the first
/// (best) raw level's price.
fn grid_unit(first_price: f64) -> f64 {
    if first_price < 0.1 {
        1e-5
    } else if first_price < 1.0 {
        1e-4
    } else if first_price < 10.0 {
        1e-3
    } else if first_price < 100.0 {
        1e-2
    } else if first_price < 1000.0 {
        1e-1
    } else if first_price < 10_000.0 {
        1.0
    } else {
        10.0
    }
}

/// Round a price up to the next grid point (asks).
fn round_up_to_grid(price: f64, unit: f64) -> f64 {
    (price / unit).ceil() * unit
}

/// Round a price down to the next grid point (bids).
fn round_down_to_grid(price: f64, unit: f64) -> f64 {
    (price / unit).floor() * unit
}

/// Collapse raw levels onto the price grid, summing quantities that land on
/// the same grid point, then sort into the side's canonical order
/// (ascending for asks, descending for bids) and pad/truncate to
/// [`LADDER_DEPTH`].
fn trim(raw: &[Level], ascending: bool) -> Vec<Level> {
    if raw.is_empty() {
        return empty_ladder();
    }
    let unit = grid_unit(raw[0].0);

    let mut grid: Vec<Level> = Vec::with_capacity(raw.len());
    for &(price, qty) in raw {
        let rounded = if ascending {
            round_up_to_grid(price, unit)
        } else {
            round_down_to_grid(price, unit)
        };
        match grid.iter_mut().find(|(p, _)| (*p - rounded).abs() < f64::EPSILON) {
            Some((_, q)) => *q += qty,
            None => grid.push((rounded, qty)),
        }
    }

    if ascending {
        grid.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    } else {
        grid.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    }

    grid.truncate(LADDER_DEPTH);
    while grid.len() < LADDER_DEPTH {
        grid.push((f64::NAN, 0.0));
    }
    grid
}

fn flatten(ts_ms: i64, asks: &[Level], bids: &[Level]) -> Vec<f64> {
    let mut row = Vec::with_capacity(1 + LADDER_DEPTH * 4);
    row.push(ts_ms as f64);
    for &(p, q) in asks {
        row.push(p);
        row.push(q);
    }
    for &(p, q) in bids {
        row.push(p);
        row.push(q);
    }
    row
}

/// Per-`(exchange, symbol)` order-book state: the current trimmed ladders
/// plus a capacity-bounded ring of formatted snapshots.
pub struct OrderBookState {
    asks: Vec<Level>,
    bids: Vec<Level>,
    snapshots: DynamicArray,
    last_snapshot_ms: Option<i64>,
}

impl OrderBookState {
    pub fn new() -> Self {
        Self {
            asks: empty_ladder(),
            bids: empty_ladder(),
            snapshots: DynamicArray::with_auto_drop(1 + LADDER_DEPTH * 4, 60),
            last_snapshot_ms: None,
        }
    }

    /// Apply a fresh raw update: trim both sides onto the price grid, then
    /// write a formatted snapshot to the ring if at least
    /// [`SNAPSHOT_INTERVAL_MS`] of wall time has elapsed since the last one.
    pub fn update_raw(&mut self, raw_asks: &[Level], raw_bids: &[Level], now_ms: i64) {
        self.asks = trim(raw_asks, true);
        self.bids = trim(raw_bids, false);

        let due = match self.last_snapshot_ms {
            None => true,
            Some(last) => now_ms - last >= SNAPSHOT_INTERVAL_MS,
        };
        if due {
            let row = flatten(now_ms, &self.asks, &self.bids);
            // Row arity always matches: constructed from fixed-depth ladders.
            self.snapshots.append(row).expect("snapshot row arity");
            self.last_snapshot_ms = Some(now_ms);
        }
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied().filter(|(p, _)| !p.is_nan())
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied().filter(|(p, _)| !p.is_nan())
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

impl Default for OrderBookState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_unit_scales_with_price() {
        assert_eq!(grid_unit(0.05), 1e-5);
        assert_eq!(grid_unit(0.5), 1e-4);
        assert_eq!(grid_unit(5.0), 1e-3);
        assert_eq!(grid_unit(50.0), 1e-2);
        assert_eq!(grid_unit(500.0), 1e-1);
        assert_eq!(grid_unit(5_000.0), 1.0);
        assert_eq!(grid_unit(50_000.0), 10.0);
    }

    #[test]
    fn trim_collapses_and_sums_same_grid_point() {
        let raw = vec![(100.01, 1.0), (100.02, 2.0), (100.011, 0.5)];
        let trimmed = trim(&raw, true);
        assert_eq!(trimmed[0].1, 1.5);
        assert!(trimmed[0].0 <= trimmed[1].0);
    }

    #[test]
    fn bids_sort_descending_asks_ascending() {
        let mut book = OrderBookState::new();
        book.update_raw(
            &[(101.0, 1.0), (102.0, 1.0)],
            &[(99.0, 1.0), (98.0, 1.0)],
            0,
        );
        assert_eq!(book.best_ask(), Some((101.0, 1.0)));
        assert_eq!(book.best_bid(), Some((99.0, 1.0)));
    }

    #[test]
    fn snapshot_only_written_once_per_second() {
        let mut book = OrderBookState::new();
        book.update_raw(&[(1.0, 1.0)], &[(0.9, 1.0)], 0);
        book.update_raw(&[(1.0, 1.0)], &[(0.9, 1.0)], 500);
        assert_eq!(book.snapshot_count(), 1);
        book.update_raw(&[(1.0, 1.0)], &[(0.9, 1.0)], 1000);
        assert_eq!(book.snapshot_count(), 2);
    }
}
