//! Client for a local items REST API: update an item's value and date, list
//! the item catalog. Transport is a thin wrapper around reqwest with an
//! in-memory mock for deterministic tests.

pub mod adapter;
pub mod client;
pub mod config;
pub mod items;
pub mod mock;

pub use reqwest::Method;
pub use sonic_rs::Value;

pub use adapter::{
    Client, ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest,
    RestResponse, RestResult, RestTransport,
};
pub use client::{API_KEY_HEADER, ItemsClient, ItemsError, ItemsResult};
pub use config::{ApiConfig, ConfigError, DEFAULT_API_URL};
pub use items::{
    Catalog, DEFAULT_FAIRNESS_THRESHOLD, HistoryEntry, Item, ItemValue, Rarity, SortMode,
    TradeLine, TradeOutcome, TradeVerdict, Trend, UpdatePayload,
};
pub use mock::{MockBehavior, MockResponse, MockRestAdapter, MockRestStateSnapshot};
