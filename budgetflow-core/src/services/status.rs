//! Status - what the session currently holds

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::SyncError;
use crate::domain::{BankAccount, Expense, FinancialRecord, Income};
use crate::services::session::LedgerSession;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub user_id: Option<String>,
    pub selected_account_id: Option<String>,
    pub total_accounts: usize,
    pub total_incomes: usize,
    pub total_expenses: usize,
    pub accounts: Vec<AccountSummary>,
    pub date_range: DateRange,
    /// Sync failures currently reported by the stores
    pub errors: Vec<SyncError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub starting_balance: Decimal,
    pub current_balance: Decimal,
    pub incomes: usize,
    pub expenses: usize,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

/// Summarize the session's current snapshots
pub fn get_status(session: &LedgerSession) -> StatusSummary {
    let accounts = session.accounts();
    let incomes = session.incomes();
    let expenses = session.expenses();

    let errors = [accounts.error.clone(), incomes.error.clone(), expenses.error.clone()]
        .into_iter()
        .flatten()
        .collect();

    StatusSummary {
        user_id: session.user_id().map(str::to_string),
        selected_account_id: session.selected_account_id().map(str::to_string),
        total_accounts: accounts.items.len(),
        total_incomes: incomes.items.len(),
        total_expenses: expenses.items.len(),
        accounts: summarize_accounts(&accounts.items, &incomes.items, &expenses.items),
        date_range: date_range(&incomes.items, &expenses.items),
        errors,
    }
}

fn summarize_accounts(accounts: &[BankAccount], incomes: &[Income], expenses: &[Expense]) -> Vec<AccountSummary> {
    accounts
        .iter()
        .map(|a| AccountSummary {
            id: a.id.clone(),
            name: a.name.clone(),
            starting_balance: a.starting_balance,
            current_balance: a.current_balance(),
            incomes: incomes.iter().filter(|i| i.account_id() == a.id).count(),
            expenses: expenses.iter().filter(|e| e.account_id() == a.id).count(),
        })
        .collect()
}

fn date_range(incomes: &[Income], expenses: &[Expense]) -> DateRange {
    let dates = incomes
        .iter()
        .map(FinancialRecord::date)
        .chain(expenses.iter().map(FinancialRecord::date));

    let (earliest, latest) = dates.fold(
        (None::<NaiveDate>, None::<NaiveDate>),
        |(lo, hi), d| (Some(lo.map_or(d, |lo| lo.min(d))), Some(hi.map_or(d, |hi| hi.max(d)))),
    );

    DateRange {
        earliest: earliest.map(|d| d.to_string()),
        latest: latest.map(|d| d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_date_range_spans_both_kinds() {
        let incomes = vec![Income::new("a", Decimal::ONE, date(10), "salary")];
        let expenses = vec![
            Expense::new("a", Decimal::ONE, date(2), "food"),
            Expense::new("a", Decimal::ONE, date(20), "food"),
        ];

        let range = date_range(&incomes, &expenses);
        assert_eq!(range.earliest.as_deref(), Some("2024-03-02"));
        assert_eq!(range.latest.as_deref(), Some("2024-03-20"));
    }

    #[test]
    fn test_empty_date_range() {
        assert_eq!(date_range(&[], &[]), DateRange::default());
    }

    #[test]
    fn test_account_rows_count_their_records() {
        let mut account = BankAccount::new("u1", "Checking", Decimal::TEN);
        account.id = "a".to_string();
        let incomes = vec![
            Income::new("a", Decimal::ONE, date(1), "salary"),
            Income::new("b", Decimal::ONE, date(1), "salary"),
        ];

        let rows = summarize_accounts(&[account], &incomes, &[]);
        assert_eq!(rows[0].incomes, 1);
        assert_eq!(rows[0].current_balance, Decimal::TEN);
    }
}
