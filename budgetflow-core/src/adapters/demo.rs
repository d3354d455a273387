//! Demo data for trying the app without real records
//!
//! Generates a realistic half year for one user:
//! - 3 bank accounts with starting balances
//! - salary twice a month, a side-gig payment monthly
//! - rent, utilities and subscriptions as recurring expenses
//! - groceries and dining scattered through the month

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::adapters::memory::MemoryStore;
use crate::domain::document::encode;
use crate::domain::result::{Error, Result};
use crate::domain::{BankAccount, CollectionKind, Entity, Expense, Income, Scope};

pub const DEMO_USER_ID: &str = "demo-user";

const CHECKING_ID: &str = "demo-checking";
const SAVINGS_ID: &str = "demo-savings";
const TRAVEL_ID: &str = "demo-travel";

const DAYS: i64 = 180;

/// Generate demo bank accounts
pub fn generate_demo_accounts(user_id: &str) -> Vec<BankAccount> {
    let account = |id: &str, name: &str, starting: Decimal| {
        let mut account = BankAccount::new(user_id, name, starting);
        account.id = id.to_string();
        account
    };

    vec![
        account(CHECKING_ID, "Everyday Checking", Decimal::new(250000, 2)), // $2,500.00
        account(SAVINGS_ID, "Emergency Savings", Decimal::new(1000000, 2)), // $10,000.00
        account(TRAVEL_ID, "Travel Fund", Decimal::ZERO),
    ]
}

/// Generate demo incomes for the half year ending `today`
pub fn generate_demo_incomes(today: NaiveDate) -> Vec<Income> {
    let mut incomes = Vec::new();

    for days_ago in (0..DAYS).rev() {
        let date = today - Duration::days(days_ago);
        let day = date.day();

        // Paycheck on 1st and 15th
        if day == 1 || day == 15 {
            incomes.push(income(
                CHECKING_ID,
                date,
                Decimal::new(325000, 2), // $3,250.00
                "salary",
                "ACME Corp payroll",
            ));
        }

        // Freelance payment on the 22nd
        if day == 22 {
            incomes.push(income(
                TRAVEL_ID,
                date,
                Decimal::new(48000, 2), // $480.00
                "freelance",
                "Logo design invoice",
            ));
        }

        // Interest at month end
        if date.succ_opt().map_or(false, |next| next.day() == 1) {
            incomes.push(income(
                SAVINGS_ID,
                date,
                Decimal::new(3125, 2), // $31.25
                "interest",
                "Savings interest",
            ));
        }
    }

    incomes
}

/// Generate demo expenses for the half year ending `today`
pub fn generate_demo_expenses(today: NaiveDate) -> Vec<Expense> {
    let mut expenses = Vec::new();

    for days_ago in (0..DAYS).rev() {
        let date = today - Duration::days(days_ago);
        let day = date.day();

        // Rent on the 3rd
        if day == 3 {
            expenses.push(recurring(
                CHECKING_ID,
                date,
                Decimal::new(145000, 2), // $1,450.00
                "housing",
                "Apartment rent",
            ));
        }

        // Utilities on the 10th
        if day == 10 {
            expenses.push(recurring(
                CHECKING_ID,
                date,
                Decimal::new(11250, 2), // $112.50
                "utilities",
                "Electric & water",
            ));
            expenses.push(recurring(
                CHECKING_ID,
                date,
                Decimal::new(5999, 2), // $59.99
                "utilities",
                "Internet",
            ));
        }

        // Streaming subscription on the 18th
        if day == 18 {
            expenses.push(recurring(
                CHECKING_ID,
                date,
                Decimal::new(1599, 2), // $15.99
                "entertainment",
                "Streaming subscription",
            ));
        }

        // Groceries every 4 days
        if days_ago % 4 == 0 {
            let amounts = [8423i64, 6712, 9340, 7105, 5899];
            let amount = amounts[(days_ago / 4) as usize % amounts.len()];
            expenses.push(expense(
                CHECKING_ID,
                date,
                Decimal::new(amount, 2),
                "groceries",
                "Corner market",
            ));
        }

        // Dining out on weekends
        if date.weekday().number_from_monday() == 6 {
            expenses.push(expense(
                CHECKING_ID,
                date,
                Decimal::new(4250, 2), // $42.50
                "dining",
                "Dinner out",
            ));
        }

        // A flight every other month, paid from the travel fund
        if day == 12 && date.month() % 2 == 0 {
            expenses.push(expense(
                TRAVEL_ID,
                date,
                Decimal::new(38900, 2), // $389.00
                "travel",
                "Flight tickets",
            ));
        }
    }

    expenses
}

fn income(account: &str, date: NaiveDate, amount: Decimal, source: &str, description: &str) -> Income {
    let mut income = Income::new(account, amount, date, source).with_description(description);
    income.id = format!("{}-inc-{}-{}", account, date, source);
    income
}

fn expense(account: &str, date: NaiveDate, amount: Decimal, category: &str, description: &str) -> Expense {
    let mut expense = Expense::new(account, amount, date, category).with_description(description);
    expense.id = format!("{}-exp-{}-{}", account, date, description.to_lowercase().replace(' ', "-"));
    expense
}

fn recurring(account: &str, date: NaiveDate, amount: Decimal, category: &str, description: &str) -> Expense {
    let next_due = date.checked_add_months(chrono::Months::new(1));
    expense(account, date, amount, category, description).recurring(next_due)
}

/// Write the demo data set for `user_id` into `store`, replacing any
/// previous demo documents with the same ids
pub fn seed_demo_data(store: &MemoryStore, user_id: &str, today: NaiveDate) -> Result<()> {
    let (_, accounts_path) = CollectionKind::BankAccounts
        .resolve(&Scope::user(user_id))
        .ok_or_else(|| Error::validation("demo user id cannot be empty"))?;

    for account in generate_demo_accounts(user_id) {
        store.insert(&accounts_path, encode(&account)?);
    }
    for income in generate_demo_incomes(today) {
        write_record(store, user_id, &income.bank_account_id, &income)?;
    }
    for expense in generate_demo_expenses(today) {
        write_record(store, user_id, &expense.bank_account_id, &expense)?;
    }
    Ok(())
}

fn write_record<T: Entity>(store: &MemoryStore, user_id: &str, account_id: &str, record: &T) -> Result<()> {
    let (_, path) = T::KIND
        .resolve(&Scope::account(user_id, account_id))
        .ok_or_else(|| Error::validation("demo record has no account"))?;
    store.insert(&path, encode(record)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_demo_records_are_valid_and_reference_demo_accounts() {
        let accounts = generate_demo_accounts(DEMO_USER_ID);
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();

        for income in generate_demo_incomes(today()) {
            assert!(income.validate().is_ok());
            assert!(ids.contains(&income.bank_account_id.as_str()));
        }
        for expense in generate_demo_expenses(today()) {
            assert!(expense.validate().is_ok());
            assert!(ids.contains(&expense.bank_account_id.as_str()));
        }
    }

    #[test]
    fn test_demo_record_ids_are_unique() {
        let incomes = generate_demo_incomes(today());
        let mut ids: Vec<&str> = incomes.iter().map(|i| i.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), incomes.len());
    }

    #[test]
    fn test_seed_populates_store() {
        let store = MemoryStore::new();
        seed_demo_data(&store, DEMO_USER_ID, today()).unwrap();

        let (_, accounts_path) = CollectionKind::BankAccounts
            .resolve(&Scope::user(DEMO_USER_ID))
            .unwrap();
        assert_eq!(store.documents(&accounts_path).len(), 3);

        let (_, checking_expenses) = CollectionKind::Expenses
            .resolve(&Scope::account(DEMO_USER_ID, CHECKING_ID))
            .unwrap();
        assert!(!store.documents(&checking_expenses).is_empty());
    }
}
