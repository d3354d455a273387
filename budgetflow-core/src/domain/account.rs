//! Bank account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::document::Entity;
use crate::domain::scope::{CollectionKind, ResolvedScope};

/// A bank account owned by one user.
///
/// `total_income` and `total_expenses` are running totals written by the
/// app alongside each record. They are informational and may lag the true
/// aggregate, so summaries are always computed from the records themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub starting_balance: Decimal,
    #[serde(default)]
    pub total_income: Decimal,
    #[serde(default)]
    pub total_expenses: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl BankAccount {
    /// Create a new active account with a fresh id
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, starting_balance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: name.into(),
            starting_balance,
            total_income: Decimal::ZERO,
            total_expenses: Decimal::ZERO,
            is_active: true,
            created_at: Some(Utc::now()),
        }
    }

    /// Balance as tracked by the running totals
    pub fn current_balance(&self) -> Decimal {
        self.starting_balance + self.total_income - self.total_expenses
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.user_id.trim().is_empty() {
            return Err("account must belong to a user");
        }
        Ok(())
    }
}

impl Entity for BankAccount {
    const KIND: CollectionKind = CollectionKind::BankAccounts;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn adopt_scope(&mut self, scope: &ResolvedScope) {
        if self.user_id.is_empty() {
            self.user_id = scope.user_id.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_validation() {
        let mut account = BankAccount::new("u1", "Checking", Decimal::new(100000, 2));
        assert!(account.validate().is_ok());

        account.name = "  ".to_string();
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_current_balance_uses_running_totals() {
        let mut account = BankAccount::new("u1", "Checking", Decimal::new(1000, 0));
        account.total_income = Decimal::new(500, 0);
        account.total_expenses = Decimal::new(200, 0);
        assert_eq!(account.current_balance(), Decimal::new(1300, 0));
    }

    #[test]
    fn test_missing_flags_default_to_active() {
        let account: BankAccount =
            serde_json::from_value(serde_json::json!({ "name": "Savings" })).unwrap();
        assert!(account.is_active);
        assert_eq!(account.starting_balance, Decimal::ZERO);
    }
}
