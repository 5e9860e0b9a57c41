use crate::reshape::reshape;
use crate::schema::{
    Cell, InvestmentMetric, InvestmentPosition, Period, RawSheet, SheetStats, TransactionKind,
    TransactionRecord, KEY_ACCOUNT, KEY_ACCOUNT_TYPE, KEY_ASSET_TYPE, KEY_CATEGORY, KEY_DEBT_TYPE,
    KEY_METRIC, KEY_NAME, KEY_TYPE,
};
use crate::table::{InvestmentTable, Table, TransactionTable};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Accepted tab names per sheet, English first, then the original Spanish.
pub const TRANSACTIONS_SHEET: &[&str] = &["Transactions", "Transacciones"];
pub const BUDGET_SHEET: &[&str] = &["Budget", "Presupuesto"];
pub const BALANCES_SHEET: &[&str] = &["Balances", "Saldos"];
pub const DEBTS_SHEET: &[&str] = &["Debts", "Deudas"];
pub const INVESTMENTS_SHEET: &[&str] = &["Investments", "Inversiones"];

/// An identifier column: the canonical key it is emitted under, and the
/// header spellings that map to it.
struct ColumnSpec {
    canonical: &'static str,
    aliases: &'static [&'static str],
}

const BUDGET_IDENTIFIERS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: KEY_ACCOUNT,
        aliases: &["Account", "Cuenta"],
    },
    ColumnSpec {
        canonical: KEY_CATEGORY,
        aliases: &["Category", "Categoria"],
    },
    ColumnSpec {
        canonical: KEY_TYPE,
        aliases: &["Type", "Tipo"],
    },
];

const BALANCE_IDENTIFIERS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: KEY_NAME,
        aliases: &["Name", "Nombre"],
    },
    ColumnSpec {
        canonical: KEY_ACCOUNT_TYPE,
        aliases: &["AccountType", "Tipo de Cuenta"],
    },
];

const DEBT_IDENTIFIERS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: KEY_NAME,
        aliases: &["Name", "Nombre"],
    },
    ColumnSpec {
        canonical: KEY_DEBT_TYPE,
        aliases: &["DebtType", "Tipo de Deuda"],
    },
];

const INVESTMENT_IDENTIFIERS: &[ColumnSpec] = &[
    ColumnSpec {
        canonical: KEY_ASSET_TYPE,
        aliases: &["AssetType", "Tipo de Activo"],
    },
    ColumnSpec {
        canonical: KEY_NAME,
        aliases: &["Name", "Nombre"],
    },
    ColumnSpec {
        canonical: KEY_CATEGORY,
        aliases: &["Category", "Categoria"],
    },
    ColumnSpec {
        canonical: KEY_METRIC,
        aliases: &["Metric", "Métrica"],
    },
];

/// Resolves the identifier columns actually present on the sheet. Missing
/// ones reduce grouping granularity; never fatal.
fn resolve_identifiers(sheet: &RawSheet, specs: &[ColumnSpec]) -> Vec<(String, usize)> {
    specs
        .iter()
        .filter_map(|spec| {
            sheet
                .column(spec.aliases)
                .map(|idx| (spec.canonical.to_string(), idx))
        })
        .collect()
}

fn normalize_wide(sheet: Option<&RawSheet>, specs: &[ColumnSpec]) -> (Table, SheetStats) {
    match sheet {
        None => (Table::default(), SheetStats::default()),
        Some(sheet) => {
            let identifiers = resolve_identifiers(sheet, specs);
            if identifiers.len() < specs.len() {
                warn!(
                    "Sheet '{}': {} of {} identifier columns found, grouping granularity reduced",
                    sheet.name,
                    identifiers.len(),
                    specs.len()
                );
            }
            let (observations, stats) = reshape(sheet, &identifiers);
            debug!(
                "Sheet '{}': {} observations, {} columns skipped",
                sheet.name,
                observations.len(),
                stats.columns_skipped
            );
            (Table::new(observations), stats)
        }
    }
}

pub fn normalize_budget(sheet: Option<&RawSheet>) -> (Table, SheetStats) {
    normalize_wide(sheet, BUDGET_IDENTIFIERS)
}

pub fn normalize_balances(sheet: Option<&RawSheet>) -> (Table, SheetStats) {
    normalize_wide(sheet, BALANCE_IDENTIFIERS)
}

pub fn normalize_debts(sheet: Option<&RawSheet>) -> (Table, SheetStats) {
    normalize_wide(sheet, DEBT_IDENTIFIERS)
}

fn text_at(row: &[Cell], col: Option<usize>) -> String {
    col.and_then(|idx| row.get(idx))
        .and_then(|cell| cell.as_text())
        .unwrap_or_default()
}

/// Normalizes the long-form Transactions sheet: date → period, amount
/// coerced to a number, sign reconciled against the kind column when one is
/// present. Rows with an unparseable date or amount are dropped and counted.
pub fn normalize_transactions(sheet: Option<&RawSheet>) -> (TransactionTable, SheetStats) {
    let sheet = match sheet {
        Some(sheet) => sheet,
        None => return (TransactionTable::default(), SheetStats::default()),
    };

    let mut stats = SheetStats::default();
    let date_col = sheet.column(&["Date", "Fecha"]);
    let amount_col = sheet.column(&["Amount", "Importe"]);
    let category_col = sheet.column(&["Category", "Categoria"]);
    let kind_col = sheet.column(&["Type", "Tipo"]);
    let name_col = sheet.column(&["Name", "Nombre"]);
    let account_col = sheet.column(&["Account", "Cuenta"]);

    let mut records = Vec::new();
    for row in &sheet.rows {
        let date = date_col
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_date());
        let amount = amount_col
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_number());

        let (date, amount) = match (date, amount) {
            (Some(date), Some(amount)) if amount != 0.0 => (date, amount),
            _ => {
                stats.rows_dropped += 1;
                continue;
            }
        };

        let declared = kind_col
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_text())
            .and_then(|label| TransactionKind::parse(&label));
        // The sheet's sign is only trusted when there is no kind column.
        let kind = declared.unwrap_or_else(|| TransactionKind::from_amount(amount));
        let amount = kind.signed(amount);

        records.push(TransactionRecord {
            date,
            period: Period::from_date(date),
            category: text_at(row, category_col),
            name: text_at(row, name_col),
            kind,
            account: text_at(row, account_col),
            amount,
        });
    }

    debug!(
        "Sheet '{}': {} transactions, {} rows dropped",
        sheet.name,
        records.len(),
        stats.rows_dropped
    );
    (TransactionTable::new(records), stats)
}

#[derive(Default)]
struct MetricAccumulator {
    units: f64,
    average_cost: f64,
    current_price: f64,
}

/// Normalizes the Investments sheet: forward-fills blank identifier cells,
/// melts to long form, then pivots the metric dimension so each
/// (asset, month) carries its three metrics in one record. A metric row
/// missing from the sheet stays 0.0 — an explicit fill, not incidental
/// null arithmetic.
pub fn normalize_investments(sheet: Option<&RawSheet>) -> (InvestmentTable, SheetStats) {
    let sheet = match sheet {
        Some(sheet) => sheet,
        None => return (InvestmentTable::default(), SheetStats::default()),
    };

    let mut filled = sheet.clone();
    forward_fill_identifiers(&mut filled, INVESTMENT_IDENTIFIERS);

    let identifiers = resolve_identifiers(&filled, INVESTMENT_IDENTIFIERS);
    let (observations, mut stats) = reshape(&filled, &identifiers);

    let mut grouped: BTreeMap<(String, String, String, Period), MetricAccumulator> =
        BTreeMap::new();
    for obs in observations {
        let metric = obs
            .entity_key(KEY_METRIC)
            .and_then(InvestmentMetric::parse);
        let metric = match metric {
            Some(metric) => metric,
            None => {
                stats.rows_dropped += 1;
                warn!(
                    "Sheet '{}': unrecognized metric label '{}', dropping row",
                    filled.name,
                    obs.entity_key(KEY_METRIC).unwrap_or("")
                );
                continue;
            }
        };

        let key = (
            obs.entity_key(KEY_ASSET_TYPE).unwrap_or_default().to_string(),
            obs.entity_key(KEY_NAME).unwrap_or_default().to_string(),
            obs.entity_key(KEY_CATEGORY).unwrap_or_default().to_string(),
            obs.period,
        );
        let acc = grouped.entry(key).or_default();
        match metric {
            InvestmentMetric::Units => acc.units += obs.value,
            InvestmentMetric::AverageCost => acc.average_cost += obs.value,
            InvestmentMetric::CurrentPrice => acc.current_price += obs.value,
        }
    }

    let positions = grouped
        .into_iter()
        .map(|((asset_type, name, category, period), acc)| InvestmentPosition {
            asset_type,
            name,
            category,
            period,
            units: acc.units,
            average_cost: acc.average_cost,
            current_price: acc.current_price,
            current_value: acc.units * acc.current_price,
            purchase_value: acc.units * acc.average_cost,
        })
        .collect();

    (InvestmentTable::new(positions), stats)
}

/// Blank identifier cells inherit the value above them; workbooks exported
/// from merged-cell layouts leave repeated identifiers blank.
fn forward_fill_identifiers(sheet: &mut RawSheet, specs: &[ColumnSpec]) {
    for spec in specs {
        let idx = match sheet.column(spec.aliases) {
            Some(idx) => idx,
            None => continue,
        };
        let mut last: Option<Cell> = None;
        for row in &mut sheet.rows {
            match row.get_mut(idx) {
                Some(cell) if cell.is_blank() => {
                    if let Some(previous) = &last {
                        *cell = previous.clone();
                    }
                }
                Some(cell) => last = Some(cell.clone()),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn transactions_sheet() -> RawSheet {
        RawSheet {
            name: "Transacciones".to_string(),
            headers: vec![
                "Fecha".to_string(),
                "Categoria".to_string(),
                "Nombre".to_string(),
                "Tipo".to_string(),
                "Importe".to_string(),
                "Cuenta".to_string(),
            ],
            rows: vec![
                vec![
                    Cell::Date(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()),
                    text("Nomina"),
                    text("Empresa"),
                    text("Ingreso"),
                    Cell::Number(2000.0),
                    text("Banco A"),
                ],
                vec![
                    Cell::Date(NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()),
                    text("Vivienda"),
                    text("Alquiler"),
                    text("Gasto"),
                    // Positive in the sheet; the kind column wins.
                    Cell::Number(800.0),
                    text("Banco A"),
                ],
                vec![
                    text("not a date"),
                    text("Ocio"),
                    text("Cine"),
                    text("Gasto"),
                    Cell::Number(30.0),
                    text("Banco A"),
                ],
            ],
        }
    }

    #[test]
    fn test_normalize_transactions_reconciles_signs() {
        let sheet = transactions_sheet();
        let (table, stats) = normalize_transactions(Some(&sheet));
        assert_eq!(table.len(), 2);
        assert_eq!(stats.rows_dropped, 1);

        let jan = Period::new(2025, 1).unwrap();
        assert_eq!(table.income_at(jan), 2000.0);
        assert_eq!(table.expense_at(jan), 800.0);
    }

    #[test]
    fn test_normalize_transactions_infers_kind_without_type_column() {
        let mut sheet = transactions_sheet();
        sheet.headers[3] = "Notes".to_string();
        let (table, _) = normalize_transactions(Some(&sheet));
        // Without a kind column the sheet's sign stands: both amounts positive.
        let jan = Period::new(2025, 1).unwrap();
        assert_eq!(table.income_at(jan), 2800.0);
        assert_eq!(table.expense_at(jan), 0.0);
    }

    #[test]
    fn test_normalize_transactions_missing_sheet_is_empty() {
        let (table, stats) = normalize_transactions(None);
        assert!(table.is_empty());
        assert_eq!(stats, SheetStats::default());
    }

    #[test]
    fn test_normalize_balances_spanish_headers() {
        let sheet = RawSheet {
            name: "Saldos".to_string(),
            headers: vec![
                "Nombre".to_string(),
                "Tipo de Cuenta".to_string(),
                "ene-25".to_string(),
            ],
            rows: vec![vec![text("Cuenta A"), text("Corriente"), Cell::Number(1500.0)]],
        };
        let (table, _) = normalize_balances(Some(&sheet));
        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.entity_key(KEY_NAME), Some("Cuenta A"));
        assert_eq!(row.entity_key(KEY_ACCOUNT_TYPE), Some("Corriente"));
    }

    #[test]
    fn test_normalize_debts_missing_identifier_degrades() {
        let sheet = RawSheet {
            name: "Debts".to_string(),
            headers: vec!["Name".to_string(), "ene-25".to_string()],
            rows: vec![vec![text("Mortgage"), Cell::Number(90000.0)]],
        };
        let (table, _) = normalize_debts(Some(&sheet));
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].entity_key(KEY_DEBT_TYPE), None);
    }

    fn investments_sheet() -> RawSheet {
        RawSheet {
            name: "Inversiones".to_string(),
            headers: vec![
                "Tipo de Activo".to_string(),
                "Nombre".to_string(),
                "Categoría".to_string(),
                "Métrica".to_string(),
                "ene-25".to_string(),
            ],
            rows: vec![
                vec![
                    text("Fondo"),
                    text("Indexado Global"),
                    text("Renta Variable"),
                    text("Títulos"),
                    Cell::Number(10.0),
                ],
                vec![
                    Cell::Empty,
                    Cell::Empty,
                    Cell::Empty,
                    text("Precio medio"),
                    Cell::Number(5.0),
                ],
                vec![
                    Cell::Empty,
                    Cell::Empty,
                    Cell::Empty,
                    text("Precio actual"),
                    Cell::Number(8.0),
                ],
            ],
        }
    }

    #[test]
    fn test_normalize_investments_pivots_metrics() {
        let sheet = investments_sheet();
        let (table, stats) = normalize_investments(Some(&sheet));
        assert_eq!(table.len(), 1);
        assert_eq!(stats.rows_dropped, 0);

        let position = &table.positions()[0];
        assert_eq!(position.name, "Indexado Global");
        assert_eq!(position.units, 10.0);
        assert_eq!(position.purchase_value, 50.0);
        assert_eq!(position.current_value, 80.0);
    }

    #[test]
    fn test_normalize_investments_forward_fills_identifiers() {
        let sheet = investments_sheet();
        let (table, _) = normalize_investments(Some(&sheet));
        // The blank identifier cells of rows 2-3 inherited row 1's values,
        // so all three metrics landed on the same position.
        let position = &table.positions()[0];
        assert_eq!(position.asset_type, "Fondo");
        assert_eq!(position.category, "Renta Variable");
    }

    #[test]
    fn test_normalize_investments_missing_metric_is_zero() {
        let mut sheet = investments_sheet();
        sheet.rows.remove(1); // drop the AverageCost row
        let (table, _) = normalize_investments(Some(&sheet));
        let position = &table.positions()[0];
        assert_eq!(position.average_cost, 0.0);
        assert_eq!(position.purchase_value, 0.0);
        assert_eq!(position.current_value, 80.0);
    }

    #[test]
    fn test_normalize_investments_unknown_metric_dropped() {
        let mut sheet = investments_sheet();
        sheet.rows.push(vec![
            text("Fondo"),
            text("Indexado Global"),
            text("Renta Variable"),
            text("Dividendos"),
            Cell::Number(3.0),
        ]);
        let (table, stats) = normalize_investments(Some(&sheet));
        assert_eq!(table.len(), 1);
        assert_eq!(stats.rows_dropped, 1);
    }
}
