use crate::schema::{Observation, Period, RawSheet, SheetStats};
use crate::utils::parse_period_label;
use log::warn;
use std::collections::BTreeMap;

/// Melts a wide sheet (entities as rows, months as columns) into long-form
/// observations.
///
/// `identifiers` pairs each canonical entity-key name with its column index;
/// every other column is treated as a period column. Headers that do not
/// parse as a period label are skipped for all rows and counted, never
/// fatal. Null and zero cells produce no observation.
///
/// Pure function of its inputs; result ordering is unspecified and consumers
/// re-sort by period when they need an order.
pub fn reshape(sheet: &RawSheet, identifiers: &[(String, usize)]) -> (Vec<Observation>, SheetStats) {
    let mut stats = SheetStats::default();
    let id_indices: Vec<usize> = identifiers.iter().map(|(_, idx)| *idx).collect();

    let mut period_columns: Vec<(usize, Period)> = Vec::new();
    for (idx, header) in sheet.headers.iter().enumerate() {
        if id_indices.contains(&idx) {
            continue;
        }
        match parse_period_label(header) {
            Some(period) => period_columns.push((idx, period)),
            None => {
                stats.columns_skipped += 1;
                warn!(
                    "Sheet '{}': column '{}' is not a recognized period label, skipping",
                    sheet.name, header
                );
            }
        }
    }

    let mut observations = Vec::new();
    for row in &sheet.rows {
        let entity: BTreeMap<String, String> = identifiers
            .iter()
            .filter_map(|(key, idx)| {
                row.get(*idx)
                    .and_then(|cell| cell.as_text())
                    .map(|value| (key.clone(), value))
            })
            .collect();

        for &(idx, period) in &period_columns {
            if let Some(value) = row.get(idx).and_then(|cell| cell.as_number()) {
                if value != 0.0 {
                    observations.push(Observation {
                        entity: entity.clone(),
                        period,
                        value,
                    });
                }
            }
        }
    }

    (observations, stats)
}
