//! Ledger session - one user's synchronized collections and dashboard view
//!
//! Wires the bank-account store, the per-account income and expense
//! collections and the view composer for the signed-in user, and routes
//! writes through the remote client so every open store sees them pushed.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::domain::document::{decode, encode};
use crate::domain::result::{Error, Result};
use crate::domain::{BankAccount, CollectionPath, Entity, Expense, Income, Scope};
use crate::ports::RemoteCollectionClient;
use crate::services::composer::{AccountView, AccountViewComposer};
use crate::services::fanout::AccountCollections;
use crate::services::sync::{CollectionSnapshot, CollectionSyncStore};

/// Synchronized state of one user
pub struct LedgerSession {
    client: Arc<dyn RemoteCollectionClient>,
    user_id: Option<String>,
    selected_account_id: Option<String>,
    accounts: CollectionSyncStore<BankAccount>,
    incomes: AccountCollections<Income>,
    expenses: AccountCollections<Expense>,
    composer: AccountViewComposer,
}

impl LedgerSession {
    /// Session with nobody signed in. Must be called within a tokio runtime.
    pub fn new(client: Arc<dyn RemoteCollectionClient>) -> Self {
        Self::with_user(client, None, None)
    }

    /// Session for `user_id` with an optional initial account selection
    pub fn with_user(
        client: Arc<dyn RemoteCollectionClient>,
        user_id: Option<String>,
        selected_account_id: Option<String>,
    ) -> Self {
        let user_id = user_id.filter(|u| !u.trim().is_empty());
        let selected_account_id = selected_account_id.filter(|a| !a.trim().is_empty());
        let scope = user_scope(&user_id);

        let accounts = CollectionSyncStore::<BankAccount>::new(Arc::clone(&client), scope);
        let incomes = AccountCollections::new(Arc::clone(&client), accounts.watch(), user_id.clone());
        let expenses = AccountCollections::new(Arc::clone(&client), accounts.watch(), user_id.clone());
        let composer = AccountViewComposer::new(
            accounts.watch(),
            incomes.watch(),
            expenses.watch(),
            selected_account_id.clone(),
        );

        tracing::info!(user = ?user_id, "session started");

        Self {
            client,
            user_id,
            selected_account_id,
            accounts,
            incomes,
            expenses,
            composer,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn selected_account_id(&self) -> Option<&str> {
        self.selected_account_id.as_deref()
    }

    /// Switch user. Clears the account selection, since it belonged to the
    /// previous user.
    pub fn set_user(&mut self, user_id: Option<String>) {
        let user_id = user_id.filter(|u| !u.trim().is_empty());
        if user_id == self.user_id {
            return;
        }
        tracing::info!(user = ?user_id, "switching user");

        self.select_account(None);
        self.incomes.set_user(user_id.clone());
        self.expenses.set_user(user_id.clone());
        self.accounts.set_scope(user_scope(&user_id));
        self.user_id = user_id;
    }

    /// Narrow the view to one account, or show all with `None`
    pub fn select_account(&mut self, account_id: Option<String>) {
        let account_id = account_id.filter(|a| !a.trim().is_empty());
        self.selected_account_id = account_id.clone();
        self.composer.select_account(account_id);
    }

    pub fn accounts(&self) -> CollectionSnapshot<BankAccount> {
        self.accounts.snapshot()
    }

    pub fn incomes(&self) -> CollectionSnapshot<Income> {
        self.incomes.snapshot()
    }

    pub fn expenses(&self) -> CollectionSnapshot<Expense> {
        self.expenses.snapshot()
    }

    /// Latest composed view
    pub fn view(&self) -> AccountView {
        self.composer.current()
    }

    pub fn watch_view(&self) -> watch::Receiver<AccountView> {
        self.composer.watch()
    }

    /// Refresh every collection of the user concurrently
    pub async fn refresh_all(&self) {
        tokio::join!(
            self.accounts.refresh(),
            self.incomes.refresh(),
            self.expenses.refresh()
        );
    }

    /// Wait until every collection has finished loading and the view
    /// reflects them
    pub async fn wait_until_synced(&self, limit: Duration) -> Result<AccountView> {
        let work = async {
            self.accounts.settled().await;
            self.incomes.settled().await;
            self.expenses.settled().await;
            self.composer.synced().await
        };
        tokio::time::timeout(limit, work).await.map_err(|_| {
            Error::store(format!("sync did not finish within {} ms", limit.as_millis()))
        })
    }

    /// Stop all synchronization. Dropping the session has the same effect.
    pub fn dispose(&self) {
        tracing::debug!("session disposed");
        self.accounts.dispose();
        self.incomes.set_user(None);
        self.expenses.set_user(None);
    }

    fn require_user(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| Error::validation("no user is signed in"))
    }

    fn path_for<T: Entity>(&self, account_id: Option<&str>) -> Result<CollectionPath> {
        let user_id = self.require_user()?;
        let scope = match account_id {
            Some(account_id) => Scope::account(user_id, account_id),
            None => Scope::user(user_id),
        };
        T::KIND
            .resolve(&scope)
            .map(|(_, path)| path)
            .ok_or_else(|| Error::validation(format!("{} need an account", T::KIND)))
    }

    /// Read an account straight from the remote store. Running totals are
    /// bumped from this copy, since the local mirror may not have seen the
    /// previous write yet.
    async fn stored_account(&self, account_id: &str) -> Result<BankAccount> {
        let (scope, path) = BankAccount::KIND
            .resolve(&Scope::user(self.require_user()?))
            .ok_or_else(|| Error::validation("bank accounts need a user"))?;
        let doc = self
            .client
            .query(&path)
            .await?
            .into_iter()
            .find(|d| d.id == account_id)
            .ok_or_else(|| Error::not_found(format!("Account not found: {}", account_id)))?;
        decode(&doc, &scope)
    }

    async fn write<T: Entity>(&self, account_id: Option<&str>, entity: &T) -> Result<()> {
        let path = self.path_for::<T>(account_id)?;
        self.client.upsert(&path, encode(entity)?).await
    }

    /// Create a bank account for the signed-in user
    pub async fn create_account(&self, name: &str, starting_balance: Decimal) -> Result<BankAccount> {
        let account = BankAccount::new(self.require_user()?, name, starting_balance);
        account.validate().map_err(Error::validation)?;
        self.write(None, &account).await?;
        tracing::info!(account = %account.id, "account created");
        Ok(account)
    }

    /// Record an income and bump the account's running total
    pub async fn add_income(&self, income: Income) -> Result<Income> {
        income.validate().map_err(Error::validation)?;
        let mut account = self.stored_account(&income.bank_account_id).await?;
        self.write(Some(&income.bank_account_id), &income).await?;

        account.total_income += income.amount;
        self.write(None, &account).await?;
        tracing::info!(income = %income.id, account = %account.id, "income added");
        Ok(income)
    }

    /// Record an expense and bump the account's running total
    pub async fn add_expense(&self, expense: Expense) -> Result<Expense> {
        expense.validate().map_err(Error::validation)?;
        let mut account = self.stored_account(&expense.bank_account_id).await?;
        self.write(Some(&expense.bank_account_id), &expense).await?;

        account.total_expenses += expense.amount;
        self.write(None, &account).await?;
        tracing::info!(expense = %expense.id, account = %account.id, "expense added");
        Ok(expense)
    }

    /// Delete an income by id
    pub async fn remove_income(&self, id: &str) -> Result<Income> {
        let income = self
            .incomes
            .snapshot()
            .items
            .into_iter()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::not_found(format!("Income not found: {}", id)))?;

        let path = self.path_for::<Income>(Some(&income.bank_account_id))?;
        self.client.delete(&path, id).await?;

        if let Ok(mut account) = self.stored_account(&income.bank_account_id).await {
            account.total_income -= income.amount;
            self.write(None, &account).await?;
        }
        tracing::info!(income = %id, "income removed");
        Ok(income)
    }

    /// Delete an expense by id
    pub async fn remove_expense(&self, id: &str) -> Result<Expense> {
        let expense = self
            .expenses
            .snapshot()
            .items
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::not_found(format!("Expense not found: {}", id)))?;

        let path = self.path_for::<Expense>(Some(&expense.bank_account_id))?;
        self.client.delete(&path, id).await?;

        if let Ok(mut account) = self.stored_account(&expense.bank_account_id).await {
            account.total_expenses -= expense.amount;
            self.write(None, &account).await?;
        }
        tracing::info!(expense = %id, "expense removed");
        Ok(expense)
    }

    /// Delete an account together with its incomes and expenses
    pub async fn remove_account(&self, id: &str) -> Result<BankAccount> {
        let account = self.stored_account(id).await?;

        let incomes_path = self.path_for::<Income>(Some(id))?;
        for doc in self.client.query(&incomes_path).await? {
            self.client.delete(&incomes_path, &doc.id).await?;
        }
        let expenses_path = self.path_for::<Expense>(Some(id))?;
        for doc in self.client.query(&expenses_path).await? {
            self.client.delete(&expenses_path, &doc.id).await?;
        }

        let accounts_path = self.path_for::<BankAccount>(None)?;
        self.client.delete(&accounts_path, id).await?;
        tracing::info!(account = %id, "account removed");
        Ok(account)
    }
}

fn user_scope(user_id: &Option<String>) -> Scope {
    match user_id {
        Some(user_id) => Scope::user(user_id.clone()),
        None => Scope::none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use chrono::NaiveDate;

    const WAIT: Duration = Duration::from_secs(5);

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_no_user_is_empty_and_synced() {
        let session = LedgerSession::new(Arc::new(MemoryStore::new()));
        let view = session.wait_until_synced(WAIT).await.unwrap();

        assert!(view.incomes.is_empty());
        assert!(!view.loading);
        assert!(session.create_account("x", Decimal::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_writes_flow_back_into_the_view() {
        let client = Arc::new(MemoryStore::new());
        let mut session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
        session.wait_until_synced(WAIT).await.unwrap();

        let account = session.create_account("Checking", Decimal::new(500, 0)).await.unwrap();
        session.wait_until_synced(WAIT).await.unwrap();

        session
            .add_income(Income::new(&account.id, Decimal::new(1000, 0), date(), "salary"))
            .await
            .unwrap();
        session
            .add_expense(Expense::new(&account.id, Decimal::new(250, 0), date(), "food"))
            .await
            .unwrap();

        let view = session.wait_until_synced(WAIT).await.unwrap();
        assert_eq!(view.summary.total_income, Decimal::new(1000, 0));
        assert_eq!(view.summary.total_expenses, Decimal::new(250, 0));

        session.select_account(Some(account.id.clone()));
        let view = session.wait_until_synced(WAIT).await.unwrap();
        assert_eq!(view.summary.total_income, Decimal::new(1500, 0));
        assert_eq!(view.account.unwrap().total_income, Decimal::new(1000, 0));
    }

    fn stored_account(client: &MemoryStore, id: &str) -> BankAccount {
        let (scope, path) = BankAccount::KIND.resolve(&Scope::user("u1")).unwrap();
        let doc = client.documents(&path).into_iter().find(|d| d.id == id).unwrap();
        decode(&doc, &scope).unwrap()
    }

    #[tokio::test]
    async fn test_back_to_back_writes_keep_both_totals() {
        let client = Arc::new(MemoryStore::new());
        let session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
        session.wait_until_synced(WAIT).await.unwrap();
        let account = session.create_account("Checking", Decimal::ZERO).await.unwrap();
        session.wait_until_synced(WAIT).await.unwrap();

        // No waiting between writes: the local mirror still holds zero totals
        session
            .add_income(Income::new(&account.id, Decimal::new(1000, 0), date(), "salary"))
            .await
            .unwrap();
        let expense = session
            .add_expense(Expense::new(&account.id, Decimal::new(250, 0), date(), "food"))
            .await
            .unwrap();
        session
            .add_expense(Expense::new(&account.id, Decimal::new(50, 0), date(), "fuel"))
            .await
            .unwrap();

        let stored = stored_account(&client, &account.id);
        assert_eq!(stored.total_income, Decimal::new(1000, 0));
        assert_eq!(stored.total_expenses, Decimal::new(300, 0));

        session.wait_until_synced(WAIT).await.unwrap();
        session.remove_expense(&expense.id).await.unwrap();
        let stored = stored_account(&client, &account.id);
        assert_eq!(stored.total_income, Decimal::new(1000, 0));
        assert_eq!(stored.total_expenses, Decimal::new(50, 0));
    }

    #[tokio::test]
    async fn test_income_for_unknown_account_is_rejected() {
        let session = LedgerSession::with_user(Arc::new(MemoryStore::new()), Some("u1".into()), None);
        session.wait_until_synced(WAIT).await.unwrap();

        let err = session
            .add_income(Income::new("nope", Decimal::ONE, date(), "salary"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_account_removes_records() {
        let client = Arc::new(MemoryStore::new());
        let session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
        session.wait_until_synced(WAIT).await.unwrap();

        let account = session.create_account("Checking", Decimal::ZERO).await.unwrap();
        session.wait_until_synced(WAIT).await.unwrap();
        session
            .add_income(Income::new(&account.id, Decimal::TEN, date(), "salary"))
            .await
            .unwrap();

        session.remove_account(&account.id).await.unwrap();
        let view = session.wait_until_synced(WAIT).await.unwrap();
        assert!(view.incomes.is_empty());
        assert!(session.accounts().items.is_empty());
    }

    #[tokio::test]
    async fn test_set_user_clears_selection() {
        let client = Arc::new(MemoryStore::new());
        let mut session = LedgerSession::with_user(client, Some("u1".into()), Some("acc".into()));
        session.set_user(Some("u2".into()));

        assert_eq!(session.user_id(), Some("u2"));
        assert!(session.selected_account_id().is_none());
        let view = session.wait_until_synced(WAIT).await.unwrap();
        assert!(view.selected_account_id.is_none());
    }
}
