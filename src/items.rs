//! Item payloads and the catalog served by `GET /items`.

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric item value. Integers stay integers on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    Integer(i64),
    Decimal(f64),
}

impl ItemValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Decimal(v) => v,
        }
    }

    /// JSON has no NaN or infinity; such values would go out as `null`.
    pub fn is_finite(self) -> bool {
        match self {
            Self::Integer(_) => true,
            Self::Decimal(v) => v.is_finite(),
        }
    }
}

impl From<i64> for ItemValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ItemValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for ItemValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for ItemValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid item value {0:?}: expected an integer or a finite decimal")]
pub struct ParseItemValueError(String);

impl FromStr for ItemValue {
    type Err = ParseItemValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Ok(Self::Integer(v));
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Self::Decimal(v)),
            _ => Err(ParseItemValueError(s.to_string())),
        }
    }
}

/// Body of `POST /items/{name}/update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub value: ItemValue,
    pub date: String,
}

impl UpdatePayload {
    pub fn new(value: impl Into<ItemValue>, date: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            date: date.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Mythical,
    Legendary,
    Epic,
    Rare,
    Common,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mythical => "Mythical",
            Self::Legendary => "Legendary",
            Self::Epic => "Epic",
            Self::Rare => "Rare",
            Self::Common => "Common",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stable => "stable",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub rarity: Rarity,
    pub current_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Item {
    fn last_two(&self) -> Option<(f64, f64)> {
        match self.history.as_slice() {
            [.., previous, latest] => Some((previous.value, latest.value)),
            _ => None,
        }
    }

    /// Direction of the most recent change; `Stable` with under two entries.
    pub fn trend(&self) -> Trend {
        match self.last_two() {
            Some((previous, latest)) => match latest.partial_cmp(&previous) {
                Some(Ordering::Greater) => Trend::Up,
                Some(Ordering::Less) => Trend::Down,
                _ => Trend::Stable,
            },
            None => Trend::Stable,
        }
    }

    /// Change between the last two entries in percent, rounded to two
    /// decimals. Zero when there is no previous value to compare against.
    pub fn percent_change(&self) -> f64 {
        match self.last_two() {
            Some((previous, latest)) if previous != 0.0 => {
                ((latest - previous) / previous * 10_000.0).round() / 100.0
            }
            _ => 0.0,
        }
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.history.last().map(|entry| entry.date.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub items: BTreeMap<String, Item>,
}

impl Catalog {
    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    /// Items whose name contains `search` (case-insensitive), ordered by
    /// `sort`. Ties fall back to name order.
    pub fn view(&self, search: Option<&str>, sort: SortMode) -> Vec<(&str, &Item)> {
        let needle = search.map(str::to_lowercase).unwrap_or_default();
        let mut items: Vec<_> = self
            .items
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains(&needle))
            .map(|(name, item)| (name.as_str(), item))
            .collect();
        items.sort_by(|(name_a, a), (name_b, b)| {
            let order = match sort {
                SortMode::ValueHigh => b.current_value.total_cmp(&a.current_value),
                SortMode::ValueLow => a.current_value.total_cmp(&b.current_value),
                SortMode::Alpha => name_a.to_lowercase().cmp(&name_b.to_lowercase()),
            };
            order.then_with(|| name_a.cmp(name_b))
        });
        items
    }

    /// Items ordered by current value, highest first.
    pub fn sorted_by_value(&self) -> Vec<(&str, &Item)> {
        self.view(None, SortMode::ValueHigh)
    }

    /// Sum of `current_value * quantity`; unknown items count as zero.
    pub fn trade_total(&self, lines: &[TradeLine]) -> f64 {
        lines
            .iter()
            .map(|line| {
                let value = self.get(&line.item).map_or(0.0, |item| item.current_value);
                value * f64::from(line.quantity)
            })
            .sum()
    }

    /// Weighs what you give against what you get. The trade is fair while the
    /// difference stays within `threshold_percent` of your side.
    pub fn compare_trade(
        &self,
        yours: &[TradeLine],
        theirs: &[TradeLine],
        threshold_percent: f64,
    ) -> TradeOutcome {
        let your_total = self.trade_total(yours);
        let their_total = self.trade_total(theirs);
        let difference = their_total - your_total;
        let percent_diff = if your_total > 0.0 {
            difference / your_total * 100.0
        } else {
            0.0
        };

        let verdict = if percent_diff.abs() <= threshold_percent {
            TradeVerdict::Fair
        } else if difference > 0.0 {
            TradeVerdict::Win
        } else {
            TradeVerdict::Loss
        };

        TradeOutcome {
            your_total,
            their_total,
            difference,
            percent_diff,
            verdict,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    ValueHigh,
    ValueLow,
    Alpha,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown sort mode {0:?}: expected value-high, value-low or alpha")]
pub struct ParseSortModeError(String);

impl FromStr for SortMode {
    type Err = ParseSortModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value-high" => Ok(Self::ValueHigh),
            "value-low" => Ok(Self::ValueLow),
            "alpha" => Ok(Self::Alpha),
            other => Err(ParseSortModeError(other.to_string())),
        }
    }
}

pub const DEFAULT_FAIRNESS_THRESHOLD: f64 = 5.0;

/// One side entry of a trade: an item name and how many of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeLine {
    pub item: String,
    pub quantity: u32,
}

impl TradeLine {
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid trade entry {0:?}: expected NAME or NAME:QUANTITY")]
pub struct ParseTradeLineError(String);

/// Parses `NAME` (quantity 1) or `NAME:QUANTITY`.
impl FromStr for TradeLine {
    type Err = ParseTradeLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTradeLineError(s.to_string());
        let (item, quantity) = match s.rsplit_once(':') {
            Some((item, quantity)) => (item, quantity.trim().parse().map_err(|_| invalid())?),
            None => (s, 1),
        };
        let item = item.trim();
        if item.is_empty() || quantity == 0 {
            return Err(invalid());
        }
        Ok(Self::new(item, quantity))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeVerdict {
    Fair,
    Win,
    Loss,
}

impl fmt::Display for TradeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fair => "FAIR",
            Self::Win => "WIN",
            Self::Loss => "LOSS",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TradeOutcome {
    pub your_total: f64,
    pub their_total: f64,
    /// `their_total - your_total`
    pub difference: f64,
    /// Difference relative to your side; zero when your side is worth nothing.
    pub percent_diff: f64,
    pub verdict: TradeVerdict,
}
