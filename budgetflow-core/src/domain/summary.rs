//! Financial summaries derived from synchronized records
//!
//! Everything here is pure and recomputed from scratch on each call, so the
//! output can never drift from its inputs.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::record::{Expense, FinancialRecord, Income};

/// Totals shown on the dashboard header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    /// Sum of incomes plus the starting balance offset
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// May be negative
    pub savings: Decimal,
    /// Percentage of income saved; zero when there is no positive income
    pub savings_rate: Decimal,
}

/// Compute the summary for a set of incomes and expenses
pub fn compute_summary<I, E>(incomes: &[I], expenses: &[E], starting_balance: Decimal) -> FinancialSummary
where
    I: FinancialRecord,
    E: FinancialRecord,
{
    let total_income = incomes.iter().map(|r| r.amount()).sum::<Decimal>() + starting_balance;
    let total_expenses = expenses.iter().map(|r| r.amount()).sum::<Decimal>();
    let savings = total_income - total_expenses;

    let savings_rate = if total_income > Decimal::ZERO {
        savings
            .checked_div(total_income)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    FinancialSummary {
        total_income,
        total_expenses,
        savings,
        savings_rate,
    }
}

/// One slice of a category chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Sum of amounts for records tagged `category`
pub fn category_total<R: FinancialRecord>(records: &[R], category: &str) -> Decimal {
    records
        .iter()
        .filter(|r| r.tag() == category)
        .map(|r| r.amount())
        .sum()
}

/// Per-tag totals for chart series.
///
/// Tags whose total is zero are left out of the series. Sorted by total,
/// largest first, ties broken by name.
pub fn category_series<R: FinancialRecord>(records: &[R]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for record in records {
        *totals.entry(record.tag()).or_insert(Decimal::ZERO) += record.amount();
    }

    let mut series: Vec<CategoryTotal> = totals
        .into_iter()
        .filter(|(_, total)| !total.is_zero())
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();

    series.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    series
}

/// Per-source totals of incomes, same rules as [`category_series`]
pub fn income_source_series(incomes: &[Income]) -> Vec<CategoryTotal> {
    category_series(incomes)
}

/// Income and expenses for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotals {
    /// `YYYY-MM`
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

/// Month-by-month income vs expenses, oldest month first
pub fn monthly_trend<I, E>(incomes: &[I], expenses: &[E]) -> Vec<MonthlyTotals>
where
    I: FinancialRecord,
    E: FinancialRecord,
{
    let mut months: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();

    for income in incomes {
        let date = income.date();
        months.entry((date.year(), date.month())).or_default().0 += income.amount();
    }
    for expense in expenses {
        let date = expense.date();
        months.entry((date.year(), date.month())).or_default().1 += expense.amount();
    }

    months
        .into_iter()
        .map(|((year, month), (income, expenses))| MonthlyTotals {
            month: format!("{:04}-{:02}", year, month),
            income,
            expenses,
            net: income - expenses,
        })
        .collect()
}

/// Recurring expenses falling due within `horizon_days` of `today`,
/// soonest first
pub fn upcoming_expenses(expenses: &[Expense], today: NaiveDate, horizon_days: i64) -> Vec<&Expense> {
    let until = today + Duration::days(horizon_days.max(0));

    let mut upcoming: Vec<&Expense> = expenses
        .iter()
        .filter(|e| e.is_recurring)
        .filter(|e| matches!(e.next_due_date, Some(due) if due >= today && due <= until))
        .collect();

    upcoming.sort_by_key(|e| e.next_due_date);
    upcoming
}
