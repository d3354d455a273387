//! Scopes and collection paths
//!
//! A scope is the tuple of identifiers that decides which remote collection a
//! sync store tracks. Paths follow the remote layout:
//!
//! - `users/{userId}/bankAccounts`
//! - `users/{userId}/bankAccounts/{bankAccountId}/incomes`
//! - `users/{userId}/bankAccounts/{bankAccountId}/expenses`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Possibly incomplete scope as seen by consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub user_id: Option<String>,
    pub bank_account_id: Option<String>,
}

impl Scope {
    /// Scope with nothing selected
    pub fn none() -> Self {
        Self::default()
    }

    /// Scope covering a user's account list
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            bank_account_id: None,
        }
    }

    /// Scope covering one bank account of a user
    pub fn account(user_id: impl Into<String>, bank_account_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            bank_account_id: Some(bank_account_id.into()),
        }
    }

    fn user_part(&self) -> Option<&str> {
        non_blank(self.user_id.as_deref())
    }

    fn account_part(&self) -> Option<&str> {
        non_blank(self.bank_account_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A scope with every identifier its collection kind requires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedScope {
    pub user_id: String,
    pub bank_account_id: Option<String>,
}

/// Entity kinds that live in their own remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKind {
    BankAccounts,
    Incomes,
    Expenses,
}

impl CollectionKind {
    /// Last path segment of the collection
    pub fn segment(&self) -> &'static str {
        match self {
            CollectionKind::BankAccounts => "bankAccounts",
            CollectionKind::Incomes => "incomes",
            CollectionKind::Expenses => "expenses",
        }
    }

    /// Whether the collection is nested under a bank account
    pub fn requires_account(&self) -> bool {
        !matches!(self, CollectionKind::BankAccounts)
    }

    /// Resolve a scope for this kind.
    ///
    /// Returns `None` when a required identifier is missing or blank, which
    /// callers treat as "nothing to synchronize yet".
    pub fn resolve(&self, scope: &Scope) -> Option<(ResolvedScope, CollectionPath)> {
        let user_id = scope.user_part()?;

        if !self.requires_account() {
            let resolved = ResolvedScope {
                user_id: user_id.to_string(),
                bank_account_id: None,
            };
            let path = CollectionPath::new(format!("users/{}/{}", user_id, self.segment()));
            return Some((resolved, path));
        }

        let account_id = scope.account_part()?;
        let resolved = ResolvedScope {
            user_id: user_id.to_string(),
            bank_account_id: Some(account_id.to_string()),
        };
        let path = CollectionPath::new(format!(
            "users/{}/bankAccounts/{}/{}",
            user_id,
            account_id,
            self.segment()
        ));
        Some((resolved, path))
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Fully qualified remote collection path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_list_path() {
        let (resolved, path) = CollectionKind::BankAccounts
            .resolve(&Scope::user("u1"))
            .unwrap();
        assert_eq!(path.as_str(), "users/u1/bankAccounts");
        assert_eq!(resolved.bank_account_id, None);
    }

    #[test]
    fn test_record_paths() {
        let scope = Scope::account("u1", "acc9");
        let (_, incomes) = CollectionKind::Incomes.resolve(&scope).unwrap();
        let (_, expenses) = CollectionKind::Expenses.resolve(&scope).unwrap();
        assert_eq!(incomes.as_str(), "users/u1/bankAccounts/acc9/incomes");
        assert_eq!(expenses.as_str(), "users/u1/bankAccounts/acc9/expenses");
    }

    #[test]
    fn test_missing_identifiers_do_not_resolve() {
        assert!(CollectionKind::BankAccounts.resolve(&Scope::none()).is_none());
        assert!(CollectionKind::Incomes.resolve(&Scope::user("u1")).is_none());

        // Blank ids count as absent
        assert!(CollectionKind::Expenses
            .resolve(&Scope::account("u1", "  "))
            .is_none());
        assert!(CollectionKind::BankAccounts
            .resolve(&Scope::user(""))
            .is_none());
    }
}
