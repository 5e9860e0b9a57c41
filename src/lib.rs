//! # Finance Dashboard Engine
//!
//! A library for reshaping a personal-finance workbook (transactions,
//! budget, balances, debts, investments) into normalized monthly tables and
//! deriving the metrics a dashboard renders.
//!
//! ## Core Concepts
//!
//! - **Wide layout**: one row per entity, one column per calendar month, as
//!   the sheets arrive in the uploaded file
//! - **Normalized table**: one row per (entity, month) observation, with
//!   null and zero cells filtered out
//! - **Period**: a calendar month, the atomic time unit of every metric
//! - **Derived metric**: computed on demand from the normalized tables,
//!   never persisted
//! - **Undefined metric**: a result intentionally distinct from zero,
//!   signaling a zero-denominator ratio or insufficient history
//!
//! ## Example
//!
//! ```rust,ignore
//! use finance_dashboard_engine::*;
//!
//! let dashboard = Dashboard::from_workbook("finances.xlsx")?;
//!
//! let summary = dashboard.summary_kpis();
//! println!("Net balance: {:.2}", summary.net_balance);
//! match summary.savings_rate {
//!     Metric::Defined(rate) => println!("Savings rate: {:.2}%", rate),
//!     Metric::Undefined(_) => println!("Savings rate: n/a"),
//! }
//!
//! for comparison in dashboard.budget_vs_actual() {
//!     println!(
//!         "{} {}: budgeted {:.2}, actual {:.2}",
//!         comparison.period, comparison.category, comparison.budgeted, comparison.actual
//!     );
//! }
//! ```

pub mod error;
pub mod ingestion;
pub mod layout;
pub mod metrics;
pub mod normalize;
pub mod reshape;
pub mod schema;
pub mod table;
pub mod utils;

pub use error::{PipelineError, Result};
pub use ingestion::*;
pub use layout::ChartLayout;
pub use metrics::*;
pub use normalize::*;
pub use reshape::reshape;
pub use schema::*;
pub use table::*;
pub use utils::*;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-sheet drop/skip counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineStats {
    pub transactions: SheetStats,
    pub budget: SheetStats,
    pub balances: SheetStats,
    pub debts: SheetStats,
    pub investments: SheetStats,
}

/// One pipeline run's result set: a normalized table per sheet plus
/// diagnostics.
///
/// The run owns its tables; metric computations borrow them. A sheet
/// missing from the workbook yields an empty table, indistinguishable from
/// a present-but-empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dashboard {
    pub transactions: TransactionTable,
    pub budget: Table,
    pub balances: Table,
    pub debts: Table,
    pub investments: InvestmentTable,
    pub stats: PipelineStats,
}

impl Dashboard {
    /// Reads and normalizes an xlsx workbook. Only an unreadable file is an
    /// error; missing sheets and bad rows degrade into empty tables and
    /// stats counters.
    pub fn from_workbook<P: AsRef<Path>>(path: P) -> Result<Self> {
        let workbook = load_workbook(path)?;
        Ok(Self::from_sheets(&workbook))
    }

    /// Normalizes already-ingested sheets. Infallible: every failure mode
    /// below the file level degrades per sheet or per row.
    pub fn from_sheets(workbook: &Workbook) -> Self {
        info!("Normalizing workbook with {} sheets", workbook.sheets.len());

        let (transactions, transactions_stats) =
            normalize_transactions(workbook.sheet(TRANSACTIONS_SHEET));
        let (budget, budget_stats) = normalize_budget(workbook.sheet(BUDGET_SHEET));
        let (balances, balances_stats) = normalize_balances(workbook.sheet(BALANCES_SHEET));
        let (debts, debts_stats) = normalize_debts(workbook.sheet(DEBTS_SHEET));
        let (investments, investments_stats) =
            normalize_investments(workbook.sheet(INVESTMENTS_SHEET));

        debug!(
            "Normalized tables: {} transactions, {} budget rows, {} balance rows, {} debt rows, {} positions",
            transactions.len(),
            budget.len(),
            balances.len(),
            debts.len(),
            investments.len()
        );

        Self {
            transactions,
            budget,
            balances,
            debts,
            investments,
            stats: PipelineStats {
                transactions: transactions_stats,
                budget: budget_stats,
                balances: balances_stats,
                debts: debts_stats,
                investments: investments_stats,
            },
        }
    }

    pub fn summary_kpis(&self) -> SummaryKpis {
        SummaryKpis::compute(&self.transactions)
    }

    pub fn balance_kpis(&self) -> BalanceKpis {
        BalanceKpis::compute(&self.balances, &self.debts)
    }

    pub fn investment_kpis(&self) -> InvestmentKpis {
        InvestmentKpis::compute(&self.investments)
    }

    pub fn budget_vs_actual(&self) -> Vec<BudgetComparison> {
        metrics::budget_vs_actual(&self.budget, &self.transactions)
    }

    /// JSON Schema of the result set, for the external presentation layer.
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Dashboard)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Convenience wrapper around [`Dashboard::from_workbook`].
pub fn build_dashboard<P: AsRef<Path>>(path: P) -> Result<Dashboard> {
    Dashboard::from_workbook(path)
}
