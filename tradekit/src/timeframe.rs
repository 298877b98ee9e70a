//! Timeframe catalog (component C2): a closed set of candle periods, each
//! with a fixed minute-count, totally ordered by that minute-count.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One of the supported candle periods. Ordering is by minute-count, ties
/// (there are none in this set) broken by declaration order.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Timeframe {
    Minute1,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Minute45,
    Hour1,
    Hour2,
    Hour3,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
    Month1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 17] = [
        Timeframe::Minute1,
        Timeframe::Minute3,
        Timeframe::Minute5,
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Minute45,
        Timeframe::Hour1,
        Timeframe::Hour2,
        Timeframe::Hour3,
        Timeframe::Hour4,
        Timeframe::Hour6,
        Timeframe::Hour8,
        Timeframe::Hour12,
        Timeframe::Day1,
        Timeframe::Day3,
        Timeframe::Week1,
        Timeframe::Month1,
    ];

    /// Minute-count this [`Timeframe`] spans. `1M` is treated as a fixed
    /// 30-day month, matching the distilled spec's closed set (no calendar
    /// awareness is implied elsewhere in the kernel).
    pub fn to_minutes(self) -> u64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute3 => 3,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Minute45 => 45,
            Timeframe::Hour1 => 60,
            Timeframe::Hour2 => 120,
            Timeframe::Hour3 => 180,
            Timeframe::Hour4 => 240,
            Timeframe::Hour6 => 360,
            Timeframe::Hour8 => 480,
            Timeframe::Hour12 => 720,
            Timeframe::Day1 => 1_440,
            Timeframe::Day3 => 4_320,
            Timeframe::Week1 => 10_080,
            Timeframe::Month1 => 43_200,
        }
    }

    pub fn to_millis(self) -> i64 {
        self.to_minutes() as i64 * 60_000
    }

    pub fn format(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Minute45 => "45m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour3 => "3h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour6 => "6h",
            Timeframe::Hour8 => "8h",
            Timeframe::Hour12 => "12h",
            Timeframe::Day1 => "1D",
            Timeframe::Day3 => "3D",
            Timeframe::Week1 => "1W",
            Timeframe::Month1 => "1M",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.format() == value)
            .ok_or_else(|| ConfigError::InvalidTimeframe(value.to_string()))
    }

    /// The [`Timeframe`] with the largest minute-count in `list`. Ties are
    /// impossible within [`Timeframe::ALL`] since every minute-count is
    /// distinct, but `Iterator::max` already breaks ties by later-wins,
    /// which matches "ties broken by enum order" for any caller-supplied
    /// duplicate list.
    pub fn max_of(list: impl IntoIterator<Item = Timeframe>) -> Option<Timeframe> {
        list.into_iter().max()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.format())
    }
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s)
    }
}
