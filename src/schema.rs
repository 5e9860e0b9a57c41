use crate::utils::{normalize_header, parse_date_string, parse_number_string, parse_period_label};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical entity-key names emitted by the normalizers, regardless of the
/// workbook's header language.
pub const KEY_NAME: &str = "Name";
pub const KEY_ACCOUNT: &str = "Account";
pub const KEY_CATEGORY: &str = "Category";
pub const KEY_TYPE: &str = "Type";
pub const KEY_ACCOUNT_TYPE: &str = "AccountType";
pub const KEY_DEBT_TYPE: &str = "DebtType";
pub const KEY_ASSET_TYPE: &str = "AssetType";
pub const KEY_METRIC: &str = "Metric";

/// A calendar month, the atomic time unit of every derived metric. Days are
/// discarded at normalization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Period {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses a wide-column label such as "ene-25", "Jan-25" or "feb-2025".
    pub fn parse_label(label: &str) -> Option<Self> {
        parse_period_label(label)
    }

    /// The calendar month immediately before this one.
    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    /// Display label in the original dashboard's "%b-%Y" style, e.g. "Jan-2025".
    pub fn month_label(self) -> String {
        self.first_day().format("%b-%Y").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A typed in-memory spreadsheet cell, converted once at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell. Text is coerced through the currency-aware
    /// number parser; dates and booleans are not numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number_string(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date_string(s),
            _ => None,
        }
    }

    /// Textual view of the cell for identifier columns.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(n) => {
                if n.fract() == 0.0 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Empty => None,
        }
    }
}

/// One spreadsheet tab as read from the uploaded file, before any
/// normalization. Produced once, consumed by exactly one normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header matching any alias, compared
    /// case- and diacritic-insensitively.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        let wanted: Vec<String> = aliases.iter().map(|a| normalize_header(a)).collect();
        self.headers
            .iter()
            .position(|h| wanted.contains(&normalize_header(h)))
    }
}

/// All sheets of one uploaded workbook, keyed by tab name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Workbook {
    pub sheets: BTreeMap<String, RawSheet>,
}

impl Workbook {
    pub fn insert(&mut self, sheet: RawSheet) {
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    /// Looks a sheet up by any of its accepted names ("Balances"/"Saldos").
    pub fn sheet(&self, aliases: &[&str]) -> Option<&RawSheet> {
        self.sheets
            .values()
            .find(|s| aliases.iter().any(|a| normalize_header(a) == normalize_header(&s.name)))
    }
}

/// One long-form row: who/what the value belongs to, in which month.
///
/// Invariants, enforced at creation: `value` is never zero (null and zero
/// cells produce no observation) and `period` is always a real calendar
/// month — rows with unparseable labels are dropped, never the whole sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Observation {
    /// Identifier-column name → value, under the canonical `KEY_*` names.
    pub entity: BTreeMap<String, String>,
    pub period: Period,
    pub value: f64,
}

impl Observation {
    pub fn entity_key(&self, name: &str) -> Option<&str> {
        self.entity.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionKind {
    #[schemars(description = "Money coming in; amounts are stored positive")]
    Income,
    #[schemars(description = "Money going out; amounts are stored negative")]
    Expense,
}

impl TransactionKind {
    /// Accepts the English labels and the Spanish ones used by the original
    /// workbook ("Ingreso"/"Gasto").
    pub fn parse(label: &str) -> Option<Self> {
        match normalize_header(label).as_str() {
            "income" | "ingreso" | "ingresos" => Some(Self::Income),
            "expense" | "gasto" | "gastos" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }

    /// Forces an amount's sign to agree with the kind. The sheet's sign is
    /// not trusted when a kind column is present.
    pub fn signed(self, amount: f64) -> f64 {
        match self {
            Self::Income => amount.abs(),
            Self::Expense => -amount.abs(),
        }
    }
}

/// One row of the long-form Transactions sheet after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub period: Period,
    pub category: String,
    pub name: String,
    pub kind: TransactionKind,
    pub account: String,
    /// Signed amount: positive income, negative expense.
    pub amount: f64,
}

/// The three per-position metrics carried by the Investments sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum InvestmentMetric {
    #[schemars(description = "Number of units held at the end of the month")]
    Units,
    #[schemars(description = "Average acquisition cost per unit")]
    AverageCost,
    #[schemars(description = "Market price per unit at the end of the month")]
    CurrentPrice,
}

impl InvestmentMetric {
    /// Accepts the English labels and the Spanish originals
    /// ("Títulos"/"Precio medio"/"Precio actual").
    pub fn parse(label: &str) -> Option<Self> {
        match normalize_header(label).as_str() {
            "units" | "titulos" => Some(Self::Units),
            "averagecost" | "preciomedio" => Some(Self::AverageCost),
            "currentprice" | "precioactual" => Some(Self::CurrentPrice),
            _ => None,
        }
    }
}

/// One investment position in one month, after pivoting the metric rows
/// together. A metric row missing from the sheet leaves its field at 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvestmentPosition {
    pub asset_type: String,
    pub name: String,
    pub category: String,
    pub period: Period,
    pub units: f64,
    pub average_cost: f64,
    pub current_price: f64,
    /// `units × current_price`
    pub current_value: f64,
    /// `units × average_cost`
    pub purchase_value: f64,
}

/// Per-sheet counters for rows and columns absorbed during normalization.
/// Non-fatal by design; exposed so callers can surface data-quality issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SheetStats {
    /// Rows dropped for unparseable dates/amounts or unrecognized metric labels.
    pub rows_dropped: usize,
    /// Wide columns skipped because their header is not a recognized period label.
    pub columns_skipped: usize,
}
