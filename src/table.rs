use crate::schema::{InvestmentPosition, Observation, Period, TransactionRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A normalized long-form table.
///
/// All aggregates are total functions: a sum over an empty table, or over a
/// period with no rows, is 0.0. A missing sheet and an empty sheet are the
/// same thing here, so callers never branch on sheet presence; ratios over
/// these zero sums become undefined through the usual zero-denominator rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    rows: Vec<Observation>,
}

impl Table {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Distinct periods, oldest first.
    pub fn periods(&self) -> Vec<Period> {
        let set: BTreeSet<Period> = self.rows.iter().map(|r| r.period).collect();
        set.into_iter().collect()
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.rows.iter().map(|r| r.period).max()
    }

    pub fn has_period(&self, period: Period) -> bool {
        self.rows.iter().any(|r| r.period == period)
    }

    /// Sum of all values in the period; 0.0 when the period has no rows.
    pub fn sum_at(&self, period: Period) -> f64 {
        self.rows
            .iter()
            .filter(|r| r.period == period)
            .map(|r| r.value)
            .sum()
    }

    /// Per-period totals, oldest first.
    pub fn totals_by_period(&self) -> BTreeMap<Period, f64> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            *totals.entry(row.period).or_insert(0.0) += row.value;
        }
        totals
    }

    /// One period series per distinct value of the given entity key. Rows
    /// missing the key group under the empty string.
    pub fn series_by_entity(&self, key: &str) -> BTreeMap<String, BTreeMap<Period, f64>> {
        let mut series: BTreeMap<String, BTreeMap<Period, f64>> = BTreeMap::new();
        for row in &self.rows {
            let name = row.entity_key(key).unwrap_or_default().to_string();
            *series
                .entry(name)
                .or_default()
                .entry(row.period)
                .or_insert(0.0) += row.value;
        }
        series
    }

    /// Totals grouped by (period, entity-key value).
    pub fn totals_by_period_and_key(&self, key: &str) -> BTreeMap<(Period, String), f64> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            let name = row.entity_key(key).unwrap_or_default().to_string();
            *totals.entry((row.period, name)).or_insert(0.0) += row.value;
        }
        totals
    }
}

/// Income and expense totals for one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyFlow {
    pub period: Period,
    pub income: f64,
    /// Absolute value of the month's expenses.
    pub expense: f64,
}

/// The normalized Transactions sheet. Amounts are signed: positive income,
/// negative expense. Aggregates follow the same zero-default rule as
/// [`Table`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionTable {
    records: Vec<TransactionRecord>,
}

impl TransactionTable {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Distinct periods, oldest first.
    pub fn periods(&self) -> Vec<Period> {
        let set: BTreeSet<Period> = self.records.iter().map(|r| r.period).collect();
        set.into_iter().collect()
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.records.iter().map(|r| r.period).max()
    }

    pub fn has_period(&self, period: Period) -> bool {
        self.records.iter().any(|r| r.period == period)
    }

    /// Sum of positive amounts in the period.
    pub fn income_at(&self, period: Period) -> f64 {
        self.records
            .iter()
            .filter(|r| r.period == period && r.amount > 0.0)
            .map(|r| r.amount)
            .sum()
    }

    /// Absolute sum of negative amounts in the period.
    pub fn expense_at(&self, period: Period) -> f64 {
        let total: f64 = self
            .records
            .iter()
            .filter(|r| r.period == period && r.amount < 0.0)
            .map(|r| r.amount)
            .sum();
        total.abs()
    }

    pub fn net_at(&self, period: Period) -> f64 {
        self.income_at(period) - self.expense_at(period)
    }

    /// Per-period income and expense totals, oldest first.
    pub fn monthly_flows(&self) -> Vec<MonthlyFlow> {
        self.periods()
            .into_iter()
            .map(|period| MonthlyFlow {
                period,
                income: self.income_at(period),
                expense: self.expense_at(period),
            })
            .collect()
    }

    /// Signed totals grouped by (period, category) — the actual side of
    /// budget-vs-actual.
    pub fn totals_by_period_and_category(&self) -> BTreeMap<(Period, String), f64> {
        let mut totals = BTreeMap::new();
        for record in &self.records {
            *totals
                .entry((record.period, record.category.clone()))
                .or_insert(0.0) += record.amount;
        }
        totals
    }

    /// Absolute expense totals by category across all periods.
    pub fn expenses_by_category(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.amount < 0.0) {
            *totals.entry(record.category.clone()).or_insert(0.0) += record.amount.abs();
        }
        totals
    }
}

/// Current and purchase valuation totals for one month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvestmentTotals {
    pub period: Period,
    pub current_value: f64,
    pub purchase_value: f64,
}

/// The pivoted Investments sheet: one position per (asset, month).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvestmentTable {
    positions: Vec<InvestmentPosition>,
}

impl InvestmentTable {
    pub fn new(positions: Vec<InvestmentPosition>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[InvestmentPosition] {
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Distinct periods, oldest first.
    pub fn periods(&self) -> Vec<Period> {
        let set: BTreeSet<Period> = self.positions.iter().map(|p| p.period).collect();
        set.into_iter().collect()
    }

    pub fn latest_period(&self) -> Option<Period> {
        self.positions.iter().map(|p| p.period).max()
    }

    pub fn has_period(&self, period: Period) -> bool {
        self.positions.iter().any(|p| p.period == period)
    }

    pub fn current_value_at(&self, period: Period) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.period == period)
            .map(|p| p.current_value)
            .sum()
    }

    pub fn purchase_value_at(&self, period: Period) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.period == period)
            .map(|p| p.purchase_value)
            .sum()
    }

    /// Current/purchase totals per period, oldest first — the investment
    /// evolution chart series.
    pub fn totals_by_period(&self) -> Vec<InvestmentTotals> {
        self.periods()
            .into_iter()
            .map(|period| InvestmentTotals {
                period,
                current_value: self.current_value_at(period),
                purchase_value: self.purchase_value_at(period),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TransactionKind;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn observation(name: &str, period: Period, value: f64) -> Observation {
        let mut entity = BTreeMap::new();
        entity.insert("Name".to_string(), name.to_string());
        Observation {
            entity,
            period,
            value,
        }
    }

    fn transaction(period: Period, category: &str, amount: f64) -> TransactionRecord {
        TransactionRecord {
            date: NaiveDate::from_ymd_opt(period.year, period.month, 15).unwrap(),
            period,
            category: category.to_string(),
            name: String::new(),
            kind: TransactionKind::from_amount(amount),
            account: String::new(),
            amount,
        }
    }

    #[test]
    fn test_empty_table_aggregates_are_zero() {
        let table = Table::default();
        let period = Period::new(2025, 1).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.sum_at(period), 0.0);
        assert_eq!(table.latest_period(), None);
        assert!(table.periods().is_empty());
    }

    #[test]
    fn test_periods_are_distinct_and_sorted() {
        let jan = Period::new(2025, 1).unwrap();
        let feb = Period::new(2025, 2).unwrap();
        let table = Table::new(vec![
            observation("A", feb, 10.0),
            observation("B", jan, 5.0),
            observation("A", jan, 7.0),
        ]);
        assert_eq!(table.periods(), vec![jan, feb]);
        assert_eq!(table.latest_period(), Some(feb));
        assert_eq!(table.sum_at(jan), 12.0);
    }

    #[test]
    fn test_series_by_entity_groups_and_sums() {
        let jan = Period::new(2025, 1).unwrap();
        let table = Table::new(vec![
            observation("A", jan, 10.0),
            observation("A", jan, 2.0),
            observation("B", jan, 5.0),
        ]);
        let series = table.series_by_entity("Name");
        assert_eq!(series["A"][&jan], 12.0);
        assert_eq!(series["B"][&jan], 5.0);
    }

    #[test]
    fn test_transaction_income_expense_split() {
        let jan = Period::new(2025, 1).unwrap();
        let table = TransactionTable::new(vec![
            transaction(jan, "Salary", 2000.0),
            transaction(jan, "Rent", -800.0),
            transaction(jan, "Food", -400.0),
        ]);
        assert_eq!(table.income_at(jan), 2000.0);
        assert_eq!(table.expense_at(jan), 1200.0);
        assert_eq!(table.net_at(jan), 800.0);
    }

    #[test]
    fn test_monthly_flows_sorted_oldest_first() {
        let jan = Period::new(2025, 1).unwrap();
        let feb = Period::new(2025, 2).unwrap();
        let table = TransactionTable::new(vec![
            transaction(feb, "Salary", 2100.0),
            transaction(jan, "Salary", 2000.0),
        ]);
        let flows = table.monthly_flows();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].period, jan);
        assert_eq!(flows[1].period, feb);
        assert_eq!(flows[1].income, 2100.0);
    }

    #[test]
    fn test_expenses_by_category_absolute() {
        let jan = Period::new(2025, 1).unwrap();
        let feb = Period::new(2025, 2).unwrap();
        let table = TransactionTable::new(vec![
            transaction(jan, "Food", -400.0),
            transaction(feb, "Food", -350.0),
            transaction(jan, "Salary", 2000.0),
        ]);
        let by_category = table.expenses_by_category();
        assert_eq!(by_category["Food"], 750.0);
        assert!(!by_category.contains_key("Salary"));
    }
}
