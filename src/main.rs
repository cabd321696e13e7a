use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use item_restapi::config::{API_KEY_VAR, API_TIMEOUT_MS_VAR, API_URL_VAR, parse_timeout_ms};
use item_restapi::{
    ApiConfig, DEFAULT_API_URL, DEFAULT_FAIRNESS_THRESHOLD, Item, ItemValue, ItemsClient,
    SortMode, TradeLine, TradeOutcome, Value,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "item-restapi", version, about = "Update and inspect items on the items API")]
struct Cli {
    /// Base url of the items API
    #[arg(long, env = API_URL_VAR, default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
    api_key: String,

    /// Per-request timeout in milliseconds; no timeout when unset
    #[arg(long, env = API_TIMEOUT_MS_VAR, value_parser = parse_timeout_ms)]
    timeout_ms: Option<std::time::Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set an item's value for a date and print the server response
    Update {
        name: String,
        #[arg(allow_negative_numbers = true)]
        value: ItemValue,
        /// Date of the value, e.g. 2025-01-22
        date: String,
        /// Fail on a non-2xx status instead of printing the error body
        #[arg(long)]
        checked: bool,
    },
    /// Print the item catalog as JSON
    List,
    /// One line per item
    Summary {
        /// Only items whose name contains this text, ignoring case
        #[arg(long)]
        search: Option<String>,
        /// value-high, value-low or alpha
        #[arg(long, default_value = "value-high")]
        sort: SortMode,
    },
    /// Weigh a trade against current catalog values
    Compare {
        /// Item you give, as NAME or NAME:QUANTITY; repeatable
        #[arg(long, required = true)]
        give: Vec<TradeLine>,
        /// Item you get, as NAME or NAME:QUANTITY; repeatable
        #[arg(long, required = true)]
        get: Vec<TradeLine>,
        /// Largest difference, in percent of your side, that still counts as fair
        #[arg(long, default_value_t = DEFAULT_FAIRNESS_THRESHOLD)]
        threshold: f64,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) -> Result<()> {
    let rendered = sonic_rs::to_string_pretty(value).context("failed to render response")?;
    println!("{rendered}");
    Ok(())
}

fn summary_line(name: &str, item: &Item) -> String {
    format!(
        "{name:<16} {:<10} {:>12} {:<6} {:+.2}% {}",
        item.rarity.to_string(),
        item.current_value,
        item.trend().to_string(),
        item.percent_change(),
        item.last_updated().unwrap_or("N/A"),
    )
}

fn trade_report(outcome: &TradeOutcome) -> String {
    format!(
        "give {} get {} difference {:+} ({:+.2}%) {}",
        outcome.your_total,
        outcome.their_total,
        outcome.difference,
        outcome.percent_diff,
        outcome.verdict,
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let config = ApiConfig::new(cli.api_url, cli.api_key)
        .context("invalid items api configuration")?
        .with_optional_timeout(cli.timeout_ms);
    config.log_startup();
    let client = ItemsClient::new(config);

    match cli.command {
        Command::Update {
            name,
            value,
            date,
            checked,
        } => {
            let response = if checked {
                client.update_item_checked(&name, value, date).await
            } else {
                client.update_item(&name, value, date).await
            }
            .with_context(|| format!("failed to update item {name}"))?;
            print_json(&response)?;
        }
        Command::List => {
            let items = client.list_items().await.context("failed to list items")?;
            print_json(&items)?;
        }
        Command::Summary { search, sort } => {
            let catalog = client.catalog().await.context("failed to fetch catalog")?;
            for (name, item) in catalog.view(search.as_deref(), sort) {
                println!("{}", summary_line(name, item));
            }
        }
        Command::Compare {
            give,
            get,
            threshold,
        } => {
            let catalog = client.catalog().await.context("failed to fetch catalog")?;
            for line in give.iter().chain(&get) {
                if catalog.get(&line.item).is_none() {
                    tracing::warn!(item = %line.item, "item not in catalog, counted as 0");
                }
            }
            let outcome = catalog.compare_trade(&give, &get, threshold);
            println!("{}", trade_report(&outcome));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    use clap::error::ErrorKind;
    use item_restapi::{HistoryEntry, Rarity, TradeVerdict};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env_vars() {
        unsafe {
            env::remove_var(API_URL_VAR);
            env::remove_var(API_KEY_VAR);
            env::remove_var(API_TIMEOUT_MS_VAR);
        }
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        Cli::try_parse_from(std::iter::once("item-restapi").chain(args.iter().copied()))
    }

    #[test]
    fn update_accepts_negative_value() {
        let cli = parse(&["--api-key", "k", "update", "Pika", "-3", "2025-01-22"]).unwrap();
        match cli.command {
            Command::Update { value, checked, .. } => {
                assert_eq!(value, ItemValue::Integer(-3));
                assert!(!checked);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn update_checked_flag() {
        let cli = parse(&[
            "--api-key", "k", "update", "Pika", "4500.5", "2025-01-22", "--checked",
        ])
        .unwrap();
        match cli.command {
            Command::Update {
                name,
                value,
                date,
                checked,
            } => {
                assert_eq!(name, "Pika");
                assert_eq!(value, ItemValue::Decimal(4500.5));
                assert_eq!(date, "2025-01-22");
                assert!(checked);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = parse(&["--api-key", "k", "--timeout-ms", "0", "list"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn timeout_is_parsed_as_millis() {
        let cli = parse(&["--api-key", "k", "--timeout-ms", "1500", "list"]).unwrap();
        assert_eq!(cli.timeout_ms, Some(Duration::from_millis(1500)));
        assert_eq!(cli.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = parse(&["list"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var(API_KEY_VAR, "from-env");
            env::set_var(API_URL_VAR, "https://items.example.com/api");
        }

        let parsed = Cli::try_parse_from(["item-restapi", "list"]);
        clear_env_vars();

        let cli = parsed.unwrap();
        assert_eq!(cli.api_key, "from-env");
        assert_eq!(cli.api_url, "https://items.example.com/api");
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn summary_takes_search_and_sort() {
        let cli = parse(&["--api-key", "k", "summary"]).unwrap();
        match cli.command {
            Command::Summary { search, sort } => {
                assert_eq!(search, None);
                assert_eq!(sort, SortMode::ValueHigh);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = parse(&["--api-key", "k", "summary", "--search", "pi", "--sort", "alpha"]).unwrap();
        match cli.command {
            Command::Summary { search, sort } => {
                assert_eq!(search.as_deref(), Some("pi"));
                assert_eq!(sort, SortMode::Alpha);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let err = parse(&["--api-key", "k", "summary", "--sort", "random"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn compare_collects_both_sides() {
        let cli = parse(&[
            "--api-key", "k", "compare", "--give", "Pika:2", "--give", "Mera", "--get", "Hie",
        ])
        .unwrap();
        match cli.command {
            Command::Compare {
                give,
                get,
                threshold,
            } => {
                assert_eq!(give, vec![TradeLine::new("Pika", 2), TradeLine::new("Mera", 1)]);
                assert_eq!(get, vec![TradeLine::new("Hie", 1)]);
                assert_eq!(threshold, DEFAULT_FAIRNESS_THRESHOLD);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let err = parse(&["--api-key", "k", "compare", "--give", "Pika"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn summary_line_columns() {
        let item = Item {
            rarity: Rarity::Mythical,
            current_value: 4800.0,
            icon: None,
            history: vec![
                HistoryEntry {
                    date: "2024-12-01".to_string(),
                    value: 4000.0,
                },
                HistoryEntry {
                    date: "2025-01-05".to_string(),
                    value: 4800.0,
                },
            ],
        };
        let line = summary_line("Pika", &item);
        assert_eq!(
            line,
            "Pika             Mythical           4800 up     +20.00% 2025-01-05"
        );

        let fresh = Item {
            history: Vec::new(),
            ..item
        };
        assert!(summary_line("Pika", &fresh).ends_with("+0.00% N/A"));
    }

    #[test]
    fn trade_report_shows_totals_and_verdict() {
        let outcome = TradeOutcome {
            your_total: 16.0,
            their_total: 17.0,
            difference: 1.0,
            percent_diff: 6.25,
            verdict: TradeVerdict::Win,
        };
        assert_eq!(trade_report(&outcome), "give 16 get 17 difference +1 (+6.25%) WIN");
    }
}
