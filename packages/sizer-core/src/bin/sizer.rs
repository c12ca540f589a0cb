//! Sizer CLI - Command line interface for position sizing and tracking.
//!
//! Responses are printed to stdout as JSON envelopes; logs go to stderr.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use sizer_core::{
    prices::HttpPriceSource, AddTradeRequest, ApiResponse, Session, Settings, SizeTradeRequest,
    SortKey,
};
use std::collections::BTreeSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sizer")]
#[command(about = "Sizer CLI - position sizing and portfolio risk tracking")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ~/.sizer/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Portfolio CSV file, overriding the settings
    #[arg(long, global = true)]
    portfolio: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend a share count for a candidate trade
    Size {
        /// Planned entry price
        #[arg(short, long)]
        entry: f64,
        /// Stop-loss price
        #[arg(short, long)]
        stop: f64,
        /// Target price
        #[arg(short, long)]
        target: f64,
        /// Capital base (defaults to settings)
        #[arg(short, long)]
        capital: Option<f64>,
        /// Percent of capital to risk (defaults to settings)
        #[arg(short, long)]
        risk_pct: Option<f64>,
    },
    /// Record a trade in the portfolio
    Add {
        /// Stock ticker
        #[arg(long)]
        stock: String,
        /// Buy price per share
        #[arg(short, long)]
        buy: f64,
        /// Stop-loss price
        #[arg(short, long)]
        stop: f64,
        /// Target price
        #[arg(short, long)]
        target: f64,
        /// Number of shares
        #[arg(short = 'n', long, default_value = "1")]
        quantity: u64,
        /// Risk budget; when positive it replaces --quantity
        #[arg(short, long, default_value = "0")]
        max_risk: f64,
        /// Date added (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Import positions from a CSV file ("-" reads stdin)
    Import {
        file: PathBuf,
    },
    /// Remove positions by index (as shown by `list`)
    Remove {
        #[arg(required = true)]
        indices: Vec<usize>,
    },
    /// List positions in display order
    List,
    /// Re-order positions
    Sort {
        #[arg(value_enum)]
        key: SortArg,
    },
    /// Portfolio totals
    Summary,
    /// Check live prices against stops and targets
    Alerts,
    /// Write the portfolio as CSV
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the externally supplied picks table
    Picks,
    /// Show effective settings
    Config,
}

impl Commands {
    /// Whether the command changes the portfolio and needs a final save.
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Add { .. }
                | Commands::Import { .. }
                | Commands::Remove { .. }
                | Commands::Sort { .. }
        )
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Stock,
    Date,
    Investment,
    Risk,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Stock => SortKey::Stock,
            SortArg::Date => SortKey::DateAdded,
            SortArg::Investment => SortKey::Investment,
            SortArg::Risk => SortKey::Risk,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging (stderr keeps stdout parseable)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from_path(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;
    if let Some(path) = cli.portfolio {
        settings.portfolio_file = Some(path);
    }

    let mut session = Session::init(settings);
    let mutates = cli.command.mutates();
    let output = run(cli.command, &mut session)?;
    println!("{}", output);

    // Read-only commands never rewrite the portfolio file
    if mutates {
        if let Err(e) = session.teardown() {
            tracing::warn!(error = %e, "Final save failed");
        }
    }
    Ok(())
}

fn run(command: Commands, session: &mut Session) -> Result<String> {
    let load_warning = session.persistence_warning().map(str::to_string);

    match command {
        Commands::Size {
            entry,
            stop,
            target,
            capital,
            risk_pct,
        } => {
            let request = SizeTradeRequest {
                entry,
                stop,
                target,
                capital,
                risk_percent: risk_pct,
            };
            render(respond(session.on_size_trade(&request)))
        }
        Commands::Add {
            stock,
            buy,
            stop,
            target,
            quantity,
            max_risk,
            date,
        } => {
            let request = AddTradeRequest {
                stock,
                buy_price: buy,
                stop_loss: stop,
                target,
                quantity,
                max_risk,
                date_added: date,
            };
            match session.on_add_trade(request) {
                Ok(outcome) => {
                    render(ApiResponse::ok(outcome.value).with_warning(outcome.warning))
                }
                Err(e) => render(ApiResponse::<()>::err(e.to_string())),
            }
        }
        Commands::Import { file } => {
            let data = match read_input(&file) {
                Ok(data) => data,
                Err(e) => return render(ApiResponse::<()>::err(format!("{:#}", e))),
            };
            let outcome = session.on_import_batch(&data);
            render(ApiResponse::ok(outcome.value).with_warning(outcome.warning))
        }
        Commands::Remove { indices } => {
            let indices: BTreeSet<usize> = indices.into_iter().collect();
            let outcome = session.on_delete_selected(&indices);
            render(
                ApiResponse::ok(json!({
                    "removed": outcome.value,
                    "remaining": session.store().len(),
                }))
                .with_warning(outcome.warning),
            )
        }
        Commands::List => {
            let positions: Vec<_> = session
                .store()
                .positions()
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    json!({
                        "index": index,
                        "position": p,
                        "investment": p.investment(),
                        "risk_if_stopped": p.risk_if_stopped(),
                        "potential_gain": p.potential_gain(),
                        "reward_to_risk": p.reward_to_risk(),
                    })
                })
                .collect();
            render(ApiResponse::ok(json!({ "positions": positions })).with_warning(load_warning))
        }
        Commands::Sort { key } => {
            let outcome = session.on_sort(key.into());
            render(
                ApiResponse::ok(json!({ "positions": session.store().positions() }))
                    .with_warning(outcome.warning),
            )
        }
        Commands::Summary => {
            let summary = session.on_summarize();
            render(
                ApiResponse::ok(json!({
                    "summary": summary,
                    "reward_to_risk": summary.reward_to_risk(),
                    "capital": session.settings().capital,
                }))
                .with_warning(load_warning),
            )
        }
        Commands::Alerts => {
            let source = match HttpPriceSource::from_settings(session.settings()) {
                Ok(source) => source,
                Err(e) => return render(ApiResponse::<()>::err(e.to_string())),
            };
            let alerts = session.on_check_alerts(&source);
            render(ApiResponse::ok(json!({ "alerts": alerts })))
        }
        Commands::Export { output } => {
            let csv = session.on_export()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &csv)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    render(ApiResponse::ok(json!({
                        "path": path,
                        "positions": session.store().len(),
                    })))
                }
                None => Ok(String::from_utf8(csv)?.trim_end().to_string()),
            }
        }
        Commands::Picks => match session.on_load_picks() {
            Some(table) => render(ApiResponse::ok(table)),
            None => render(ApiResponse::ok(json!({
                "message": "No picks available. Place a picks CSV at the configured picks_file.",
            }))),
        },
        Commands::Config => render(ApiResponse::ok(json!({
            "settings": session.settings(),
            "portfolio_path": session.settings().portfolio_path(),
            "picks_path": session.settings().picks_path(),
        }))),
    }
}

fn read_input(file: &Path) -> Result<Vec<u8>> {
    if file.as_os_str() == "-" {
        let mut data = Vec::new();
        io::stdin()
            .read_to_end(&mut data)
            .context("Failed to read stdin")?;
        return Ok(data);
    }
    std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn respond<T>(result: sizer_core::Result<T>) -> ApiResponse<T> {
    match result {
        Ok(value) => ApiResponse::ok(value),
        Err(e) => ApiResponse::err(e.to_string()),
    }
}

fn render<T: Serialize>(response: ApiResponse<T>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mutating_commands_save() {
        assert!(!Commands::List.mutates());
        assert!(!Commands::Summary.mutates());
        assert!(!Commands::Config.mutates());
        assert!(!Commands::Export { output: None }.mutates());
        assert!(Commands::Remove { indices: vec![0] }.mutates());
        assert!(Commands::Sort { key: SortArg::Stock }.mutates());
    }

    #[test]
    fn test_cli_parses_read_only_list() {
        let cli = Cli::try_parse_from(["sizer", "--portfolio", "p.csv", "list"]).unwrap();
        assert!(!cli.command.mutates());
        assert_eq!(cli.portfolio, Some(PathBuf::from("p.csv")));
    }
}
