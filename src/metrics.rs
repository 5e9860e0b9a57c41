use crate::schema::{Period, KEY_CATEGORY};
use crate::table::{InvestmentTable, Table, TransactionTable};
use crate::utils::normalize_header;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The outcome of a derived-metric computation.
///
/// Ratios with a zero denominator and comparisons without a prior month are
/// `Undefined` — a state the display layer renders as such, never 0,
/// infinity or NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Defined(f64),
    Undefined(UndefinedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    #[schemars(description = "The ratio's denominator was zero, e.g. no income in the period")]
    ZeroDenominator,
    #[schemars(description = "No prior month exists in the data to compare against")]
    InsufficientHistory,
}

impl Metric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }
}

/// `numerator / denominator × 100`, undefined on a zero denominator.
pub fn ratio(numerator: f64, denominator: f64) -> Metric {
    if denominator == 0.0 {
        Metric::Undefined(UndefinedReason::ZeroDenominator)
    } else {
        Metric::Defined(numerator / denominator * 100.0)
    }
}

/// Month-over-month growth in percent, undefined on a zero base.
pub fn growth(current: f64, prior: f64) -> Metric {
    if prior == 0.0 {
        Metric::Undefined(UndefinedReason::ZeroDenominator)
    } else {
        Metric::Defined((current - prior) / prior * 100.0)
    }
}

/// Percentage-point difference between two already-relative metrics, used
/// where the dashboard compares rates rather than totals. Undefined when
/// either side is.
fn delta(current: Metric, prior: Metric) -> Metric {
    match (current, prior) {
        (Metric::Defined(cur), Metric::Defined(prev)) => Metric::Defined(cur - prev),
        (Metric::Undefined(reason), _) | (_, Metric::Undefined(reason)) => {
            Metric::Undefined(reason)
        }
    }
}

pub fn total_income(transactions: &TransactionTable, period: Period) -> f64 {
    transactions.income_at(period)
}

pub fn total_expense(transactions: &TransactionTable, period: Period) -> f64 {
    transactions.expense_at(period)
}

pub fn net_balance(transactions: &TransactionTable, period: Period) -> f64 {
    transactions.net_at(period)
}

/// Net balance over income, in percent. Undefined when the period has no
/// income — the distinguishable "no income" state.
pub fn savings_rate(transactions: &TransactionTable, period: Period) -> Metric {
    ratio(
        transactions.net_at(period),
        transactions.income_at(period),
    )
}

/// Sum over all accounts at the period; 0.0 over an empty or missing sheet.
pub fn total_balance(balances: &Table, period: Period) -> f64 {
    balances.sum_at(period)
}

/// Sum over all debts at the period; 0.0 over an empty or missing sheet —
/// a sum, distinct from a ratio's zero-denominator case.
pub fn total_debt(debts: &Table, period: Period) -> f64 {
    debts.sum_at(period)
}

pub fn debt_to_balance_ratio(balances: &Table, debts: &Table, period: Period) -> Metric {
    ratio(debts.sum_at(period), balances.sum_at(period))
}

/// Unrealized gain over the purchase value, in percent.
pub fn portfolio_return(investments: &InvestmentTable, period: Period) -> Metric {
    let current = investments.current_value_at(period);
    let purchase = investments.purchase_value_at(period);
    ratio(current - purchase, purchase)
}

/// Matches the equity category under its English and Spanish names.
pub fn is_equity_category(label: &str) -> bool {
    matches!(normalize_header(label).as_str(), "equity" | "rentavariable")
}

fn equity_value_at(investments: &InvestmentTable, period: Period) -> f64 {
    investments
        .positions()
        .iter()
        .filter(|p| p.period == period && is_equity_category(&p.category))
        .map(|p| p.current_value)
        .sum()
}

/// Share of the portfolio's current value held in equity, in percent.
pub fn equity_share(investments: &InvestmentTable, period: Period) -> Metric {
    ratio(
        equity_value_at(investments, period),
        investments.current_value_at(period),
    )
}

/// Budgeted vs actual totals for one (month, category) pair. A category
/// present on only one side keeps the pair with 0.0 on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetComparison {
    pub period: Period,
    pub category: String,
    pub budgeted: f64,
    pub actual: f64,
}

/// Pairs budgeted amounts with actual transaction sums by (period,
/// category), zero-filling whichever side is missing. Sorted by period,
/// then category.
pub fn budget_vs_actual(budget: &Table, transactions: &TransactionTable) -> Vec<BudgetComparison> {
    let budgeted = budget.totals_by_period_and_key(KEY_CATEGORY);
    let actual = transactions.totals_by_period_and_category();

    let keys: BTreeSet<(Period, String)> = budgeted.keys().chain(actual.keys()).cloned().collect();
    keys.into_iter()
        .map(|key| {
            let budgeted = budgeted.get(&key).copied().unwrap_or(0.0);
            let actual = actual.get(&key).copied().unwrap_or(0.0);
            let (period, category) = key;
            BudgetComparison {
                period,
                category,
                budgeted,
                actual,
            }
        })
        .collect()
}

/// Budget-vs-actual restricted to one month.
pub fn budget_vs_actual_at(
    budget: &Table,
    transactions: &TransactionTable,
    period: Period,
) -> Vec<BudgetComparison> {
    budget_vs_actual(budget, transactions)
        .into_iter()
        .filter(|c| c.period == period)
        .collect()
}

/// Budget compliance summed per category across every month — the budget
/// chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryBudget {
    pub category: String,
    pub budgeted: f64,
    pub actual: f64,
}

pub fn budget_summary_by_category(comparisons: &[BudgetComparison]) -> Vec<CategoryBudget> {
    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for comparison in comparisons {
        let entry = totals.entry(comparison.category.clone()).or_insert((0.0, 0.0));
        entry.0 += comparison.budgeted;
        entry.1 += comparison.actual;
    }
    totals
        .into_iter()
        .map(|(category, (budgeted, actual))| CategoryBudget {
            category,
            budgeted,
            actual,
        })
        .collect()
}

/// The headline cards: transaction totals at the latest month with
/// month-over-month growth against the immediately preceding calendar
/// month. The prior month is looked up by value; a gap in the data makes
/// the comparisons undefined rather than comparing across the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SummaryKpis {
    pub period: Option<Period>,
    pub total_income: f64,
    pub total_expense: f64,
    pub net_balance: f64,
    pub savings_rate: Metric,
    pub income_growth: Metric,
    pub expense_growth: Metric,
    pub net_balance_growth: Metric,
    /// Percentage-point change of the savings rate, not a relative growth.
    pub savings_rate_delta: Metric,
}

impl SummaryKpis {
    pub fn compute(transactions: &TransactionTable) -> Self {
        let latest = match transactions.latest_period() {
            Some(latest) => latest,
            None => return Self::empty(),
        };

        let total_income = transactions.income_at(latest);
        let total_expense = transactions.expense_at(latest);
        let net = total_income - total_expense;
        let current_rate = savings_rate(transactions, latest);

        let prior = latest.prev();
        let (income_growth, expense_growth, net_balance_growth, savings_rate_delta) =
            if transactions.has_period(prior) {
                let prior_income = transactions.income_at(prior);
                let prior_expense = transactions.expense_at(prior);
                (
                    growth(total_income, prior_income),
                    growth(total_expense, prior_expense),
                    growth(net, prior_income - prior_expense),
                    delta(current_rate, savings_rate(transactions, prior)),
                )
            } else {
                let missing = Metric::Undefined(UndefinedReason::InsufficientHistory);
                (missing, missing, missing, missing)
            };

        Self {
            period: Some(latest),
            total_income,
            total_expense,
            net_balance: net,
            savings_rate: current_rate,
            income_growth,
            expense_growth,
            net_balance_growth,
            savings_rate_delta,
        }
    }

    fn empty() -> Self {
        Self {
            period: None,
            total_income: 0.0,
            total_expense: 0.0,
            net_balance: 0.0,
            savings_rate: Metric::Undefined(UndefinedReason::ZeroDenominator),
            income_growth: Metric::Undefined(UndefinedReason::InsufficientHistory),
            expense_growth: Metric::Undefined(UndefinedReason::InsufficientHistory),
            net_balance_growth: Metric::Undefined(UndefinedReason::InsufficientHistory),
            savings_rate_delta: Metric::Undefined(UndefinedReason::InsufficientHistory),
        }
    }
}

/// Balance and debt cards. Evaluated at the most recent month either table
/// knows about, so a debts sheet that lags the balances sheet by a month
/// still yields a current net-worth view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceKpis {
    pub period: Option<Period>,
    pub total_balance: f64,
    pub total_debt: f64,
    pub balance_growth: Metric,
    pub debt_growth: Metric,
    pub debt_to_balance: Metric,
    /// Percentage-point change of the debt-to-balance ratio.
    pub debt_to_balance_delta: Metric,
}

impl BalanceKpis {
    pub fn compute(balances: &Table, debts: &Table) -> Self {
        let latest = match (balances.latest_period(), debts.latest_period()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let latest = match latest {
            Some(latest) => latest,
            None => return Self::empty(),
        };

        let total_balance = balances.sum_at(latest);
        let total_debt = debts.sum_at(latest);
        let current_ratio = ratio(total_debt, total_balance);

        let prior = latest.prev();
        let missing = Metric::Undefined(UndefinedReason::InsufficientHistory);
        let balance_growth = if balances.has_period(prior) {
            growth(total_balance, balances.sum_at(prior))
        } else {
            missing
        };
        let debt_growth = if debts.has_period(prior) {
            growth(total_debt, debts.sum_at(prior))
        } else {
            missing
        };
        let debt_to_balance_delta = if balances.has_period(prior) || debts.has_period(prior) {
            delta(
                current_ratio,
                ratio(debts.sum_at(prior), balances.sum_at(prior)),
            )
        } else {
            missing
        };

        Self {
            period: Some(latest),
            total_balance,
            total_debt,
            balance_growth,
            debt_growth,
            debt_to_balance: current_ratio,
            debt_to_balance_delta,
        }
    }

    fn empty() -> Self {
        let missing = Metric::Undefined(UndefinedReason::InsufficientHistory);
        Self {
            period: None,
            total_balance: 0.0,
            total_debt: 0.0,
            balance_growth: missing,
            debt_growth: missing,
            debt_to_balance: Metric::Undefined(UndefinedReason::ZeroDenominator),
            debt_to_balance_delta: missing,
        }
    }
}

/// Investment cards: portfolio valuation at the latest month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvestmentKpis {
    pub period: Option<Period>,
    pub current_value: f64,
    pub purchase_value: f64,
    pub portfolio_return: Metric,
    pub equity_share: Metric,
    /// Percentage-point change of the equity share.
    pub equity_share_delta: Metric,
}

impl InvestmentKpis {
    pub fn compute(investments: &InvestmentTable) -> Self {
        let latest = match investments.latest_period() {
            Some(latest) => latest,
            None => return Self::empty(),
        };

        let current_value = investments.current_value_at(latest);
        let purchase_value = investments.purchase_value_at(latest);
        let current_share = equity_share(investments, latest);

        let prior = latest.prev();
        let equity_share_delta = if investments.has_period(prior) {
            delta(current_share, equity_share(investments, prior))
        } else {
            Metric::Undefined(UndefinedReason::InsufficientHistory)
        };

        Self {
            period: Some(latest),
            current_value,
            purchase_value,
            portfolio_return: ratio(current_value - purchase_value, purchase_value),
            equity_share: current_share,
            equity_share_delta,
        }
    }

    fn empty() -> Self {
        Self {
            period: None,
            current_value: 0.0,
            purchase_value: 0.0,
            portfolio_return: Metric::Undefined(UndefinedReason::ZeroDenominator),
            equity_share: Metric::Undefined(UndefinedReason::ZeroDenominator),
            equity_share_delta: Metric::Undefined(UndefinedReason::InsufficientHistory),
        }
    }
}
