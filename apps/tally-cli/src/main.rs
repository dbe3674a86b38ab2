//! # Tally CLI
//!
//! Operator command line for the commission ledger.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          tally <command>                                │
//! │                                                                         │
//! │  TallyConfig::load() ──► Database::new() ──► commands::<handler>       │
//! │   (TALLY_* env vars)      (migrations)          │                       │
//! │                                                 ▼                       │
//! │                                          stdout (text or --json)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logging
//! - `RUST_LOG=debug` - Show every statement the db layer issues
//! - `RUST_LOG=tally_db=trace` - Trace the db crate only
//! - Default: INFO level, written to stderr so `--json` output stays clean

mod commands;
mod config;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tally_core::summary::{DueMonth, InstallmentFilter};
use tally_core::validation::parse_date;
use tally_core::{InstallmentStatus, PaymentFlag};
use tally_db::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::TallyConfig;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Sales commission ledger")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Promote past-due installments to overdue and demote paid ones
    Reconcile,

    /// List sales with their commission
    Sales {
        /// Show every installment under its sale
        #[arg(short, long)]
        detailed: bool,

        #[arg(long)]
        json: bool,
    },

    /// Commission total, paid and pending
    Summary {
        /// Due month, YYYY-MM
        #[arg(short, long)]
        month: Option<String>,

        #[arg(long)]
        salesperson: Option<String>,

        #[arg(long)]
        product: Option<String>,

        #[arg(long)]
        campaign: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// One line per salesperson
        #[arg(long)]
        by_salesperson: bool,

        #[arg(long)]
        json: bool,
    },

    /// Replace an installment with a new one due on another date
    Renegotiate {
        id: String,

        /// New due date, YYYY-MM-DD
        #[arg(value_parser = parse_due_date)]
        due_date: NaiveDate,
    },

    /// Set the client or seller paid flag on installments
    Mark {
        #[arg(value_enum)]
        flag: FlagArg,

        #[arg(required = true)]
        ids: Vec<String>,

        /// Clear the flag instead of setting it
        #[arg(long)]
        unset: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FlagArg {
    Client,
    Seller,
}

impl From<FlagArg> for PaymentFlag {
    fn from(arg: FlagArg) -> Self {
        match arg {
            FlagArg::Client => PaymentFlag::Client,
            FlagArg::Seller => PaymentFlag::Seller,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StatusArg {
    Pending,
    Overdue,
    Renegotiated,
}

impl From<StatusArg> for InstallmentStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => InstallmentStatus::Pending,
            StatusArg::Overdue => InstallmentStatus::Overdue,
            StatusArg::Renegotiated => InstallmentStatus::Renegotiated,
        }
    }
}

fn parse_due_date(value: &str) -> Result<NaiveDate, String> {
    parse_date("due_date", value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = TallyConfig::load()?;
    let clock = config.clock()?;
    info!(
        path = %config.database_path.display(),
        utc_offset_minutes = config.utc_offset_minutes,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    let mut out = std::io::stdout().lock();
    let result = match cli.command {
        Command::Reconcile => commands::reconcile(&db, &clock, &mut out).await,
        Command::Sales { detailed, json } => {
            commands::list_sales(&db, &clock, detailed, json, &mut out).await
        }
        Command::Summary {
            month,
            salesperson,
            product,
            campaign,
            status,
            by_salesperson,
            json,
        } => {
            let filter = InstallmentFilter {
                due_month: month.as_deref().map(str::parse::<DueMonth>).transpose()?,
                salesperson_id: salesperson,
                product_id: product,
                campaign,
                status: status.map(Into::into),
            };
            commands::summary(&db, &clock, &filter, by_salesperson, json, &mut out).await
        }
        Command::Renegotiate { id, due_date } => {
            commands::renegotiate(&db, &id, due_date, &mut out).await
        }
        Command::Mark { flag, ids, unset } => {
            commands::mark(&db, &clock, flag.into(), !unset, &ids, &mut out).await
        }
    };

    db.close().await;
    result
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally_db=info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary_filters() {
        let cli = Cli::try_parse_from([
            "tally",
            "summary",
            "--month",
            "2026-03",
            "--status",
            "overdue",
            "--by-salesperson",
        ])
        .unwrap();

        match cli.command {
            Command::Summary {
                month,
                status,
                by_salesperson,
                json,
                ..
            } => {
                assert_eq!(month.as_deref(), Some("2026-03"));
                assert_eq!(status, Some(StatusArg::Overdue));
                assert!(by_salesperson);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_renegotiate_date() {
        let cli = Cli::try_parse_from(["tally", "renegotiate", "abc", "2026-05-31"]).unwrap();
        match cli.command {
            Command::Renegotiate { id, due_date } => {
                assert_eq!(id, "abc");
                assert_eq!(due_date, NaiveDate::from_ymd_opt(2026, 5, 31).unwrap());
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["tally", "renegotiate", "abc", "31/05/2026"]).is_err());
    }

    #[test]
    fn test_parse_mark() {
        let cli = Cli::try_parse_from(["tally", "mark", "seller", "a", "b", "--unset"]).unwrap();
        match cli.command {
            Command::Mark { flag, ids, unset } => {
                assert_eq!(PaymentFlag::from(flag), PaymentFlag::Seller);
                assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
                assert!(unset);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // at least one id
        assert!(Cli::try_parse_from(["tally", "mark", "client"]).is_err());
    }
}
