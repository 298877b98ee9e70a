use thiserror::Error;

/// Errors raised by [`DynamicArray`] positional access.
#[derive(Error, Copy, Clone, Debug, Eq, PartialEq)]
pub enum DynamicArrayError {
    #[error("index out of range")]
    OutOfRange,

    #[error("row has the wrong column count")]
    WrongArity,
}

/// An append-only 2-D numeric buffer with a fixed column count (component
/// C1). Backed by a `Vec<Vec<f64>>` — `Vec`'s own amortized-geometric growth
/// already satisfies the "factor >= 1.5" growth policy, so no custom
/// capacity bookkeeping is needed beyond the optional `drop_at` retention
/// bound used for unbounded streams (order-book/trade/candle rings).
#[derive(Clone, Debug)]
pub struct DynamicArray {
    cols: usize,
    rows: Vec<Vec<f64>>,
    drop_at: Option<usize>,
}

impl DynamicArray {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            rows: Vec::new(),
            drop_at: None,
        }
    }

    /// Construct with automatic retention: whenever the logical size reaches
    /// a multiple of `drop_at`, the oldest `drop_at / 2` rows are dropped.
    ///
    /// The spec's two candidate trigger rules (`size == drop_at` vs.
    /// `size % drop_at == 0`) are resolved in favor of the modulo rule,
    /// since only it keeps bounding memory for an unbounded stream (see
    /// DESIGN.md Open Question).
    pub fn with_auto_drop(cols: usize, drop_at: usize) -> Self {
        Self {
            cols,
            rows: Vec::new(),
            drop_at: Some(drop_at),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Append one row, then apply the auto-drop rule if configured.
    pub fn append(&mut self, row: Vec<f64>) -> Result<(), DynamicArrayError> {
        if row.len() != self.cols {
            return Err(DynamicArrayError::WrongArity);
        }
        self.rows.push(row);
        self.apply_auto_drop();
        Ok(())
    }

    pub fn append_multiple(&mut self, rows: Vec<Vec<f64>>) -> Result<(), DynamicArrayError> {
        for row in rows {
            self.append(row)?;
        }
        Ok(())
    }

    fn apply_auto_drop(&mut self) {
        if let Some(drop_at) = self.drop_at {
            if drop_at > 0 && self.rows.len() % drop_at == 0 {
                let to_drop = drop_at / 2;
                self.rows.drain(0..to_drop.min(self.rows.len()));
            }
        }
    }

    /// Resolve a possibly-negative index (`-1` = last row) to an absolute
    /// one, bounds-checked against the current length.
    fn resolve_index(&self, i: i64) -> Result<usize, DynamicArrayError> {
        let len = self.rows.len() as i64;
        let resolved = if i < 0 { len + i } else { i };
        if resolved < 0 || resolved >= len {
            Err(DynamicArrayError::OutOfRange)
        } else {
            Ok(resolved as usize)
        }
    }

    pub fn get(&self, i: i64) -> Result<&[f64], DynamicArrayError> {
        let idx = self.resolve_index(i)?;
        Ok(&self.rows[idx])
    }

    pub fn get_mut(&mut self, i: i64) -> Result<&mut [f64], DynamicArrayError> {
        let idx = self.resolve_index(i)?;
        Ok(&mut self.rows[idx])
    }

    pub fn last(&self) -> Option<&[f64]> {
        self.rows.last().map(Vec::as_slice)
    }

    /// The `k` most recent rows, oldest-first; fewer than `k` if the buffer
    /// doesn't hold that many yet.
    pub fn past(&self, k: usize) -> &[Vec<f64>] {
        let len = self.rows.len();
        &self.rows[len.saturating_sub(k)..]
    }

    /// Half-open slice `[start, stop)`, supporting negative-from-end bounds.
    pub fn rows(&self, start: i64, stop: i64) -> Result<&[Vec<f64>], DynamicArrayError> {
        let len = self.rows.len() as i64;
        let start = if start < 0 { len + start } else { start };
        let stop = if stop < 0 { len + stop } else { stop };
        if start < 0 || stop > len || start > stop {
            return Err(DynamicArrayError::OutOfRange);
        }
        Ok(&self.rows[start as usize..stop as usize])
    }

    pub fn delete(&mut self, i: i64) -> Result<Vec<f64>, DynamicArrayError> {
        let idx = self.resolve_index(i)?;
        Ok(self.rows.remove(idx))
    }

    pub fn flush(&mut self) {
        self.rows.clear();
    }

    /// Index of the first row equal to `row`, or `None`. `axis` selects
    /// which column range to compare; `None` compares the whole row.
    pub fn find(&self, row: &[f64], axis: Option<usize>) -> Option<usize> {
        self.rows.iter().position(|candidate| match axis {
            Some(col) => candidate.get(col) == row.first(),
            None => candidate.as_slice() == row,
        })
    }

    /// All rows whose value at `col` equals `value`.
    pub fn filter(&self, col: usize, value: f64) -> Vec<&Vec<f64>> {
        self.rows
            .iter()
            .filter(|row| row.get(col) == Some(&value))
            .collect()
    }

    pub fn sum(&self, col: usize) -> f64 {
        self.rows.iter().filter_map(|row| row.get(col)).sum()
    }
}
