//! Integration tests for budgetflow-core
//!
//! These drive full sessions against the in-memory remote store, using its
//! fault and latency injection to reproduce cache-before-sync empty pushes,
//! slow fallback fetches and dropped push channels.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::time::timeout;

use budgetflow_core::adapters::demo::{seed_demo_data, DEMO_USER_ID};
use budgetflow_core::adapters::json_file;
use budgetflow_core::adapters::memory::{MemoryStore, MemoryStoreOptions};
use budgetflow_core::domain::document::encode;
use budgetflow_core::domain::{CollectionPath, Document};
use budgetflow_core::services::{AccountView, LedgerSession};
use budgetflow_core::{BankAccount, BudgetflowContext, Expense, Income, SyncErrorKind};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Helpers
// ============================================================================

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

fn accounts_path(user: &str) -> CollectionPath {
    CollectionPath::new(format!("users/{}/bankAccounts", user))
}

fn records_path(user: &str, account: &str, kind: &str) -> CollectionPath {
    CollectionPath::new(format!("users/{}/bankAccounts/{}/{}", user, account, kind))
}

fn put_account(store: &MemoryStore, user: &str, id: &str, starting: i64) {
    let mut account = BankAccount::new(user, id.to_uppercase(), Decimal::new(starting, 0));
    account.id = id.to_string();
    store.insert(&accounts_path(user), encode(&account).unwrap());
}

fn put_income(store: &MemoryStore, user: &str, account: &str, id: &str, amount: i64) {
    let mut income = Income::new(account, Decimal::new(amount, 0), date(1), "salary");
    income.id = id.to_string();
    store.insert(&records_path(user, account, "incomes"), encode(&income).unwrap());
}

fn put_expense(store: &MemoryStore, user: &str, account: &str, id: &str, amount: i64) {
    let mut expense = Expense::new(account, Decimal::new(amount, 0), date(2), "food");
    expense.id = id.to_string();
    store.insert(&records_path(user, account, "expenses"), encode(&expense).unwrap());
}

/// Two accounts for u1 (A and B), one for u2
fn two_account_store(options: MemoryStoreOptions) -> Arc<MemoryStore> {
    let store = MemoryStore::with_options(options);
    put_account(&store, "u1", "a", 100);
    put_account(&store, "u1", "b", 0);
    put_income(&store, "u1", "a", "ia", 1000);
    put_income(&store, "u1", "b", "ib", 2000);
    put_expense(&store, "u1", "a", "ea", 300);
    put_expense(&store, "u1", "b", "eb", 500);
    put_account(&store, "u2", "c", 0);
    put_income(&store, "u2", "c", "ic", 7);
    Arc::new(store)
}

fn stale_cache() -> MemoryStoreOptions {
    MemoryStoreOptions {
        stale_first_snapshot: true,
    }
}

// ============================================================================
// Aggregates Through the Session
// ============================================================================

#[tokio::test]
async fn test_unselected_view_combines_all_accounts() {
    let client = two_account_store(MemoryStoreOptions::default());
    let session = LedgerSession::with_user(client, Some("u1".into()), None);

    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.summary.total_income, Decimal::new(3000, 0));
    assert_eq!(view.summary.total_expenses, Decimal::new(800, 0));
    assert_eq!(view.starting_balance, Decimal::ZERO);
}

#[tokio::test]
async fn test_selected_view_uses_account_offset() {
    let client = two_account_store(MemoryStoreOptions::default());
    let session = LedgerSession::with_user(client, Some("u1".into()), Some("a".into()));

    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.incomes.len(), 1);
    assert_eq!(view.summary.total_income, Decimal::new(1100, 0));
    assert_eq!(view.summary.savings, Decimal::new(800, 0));
}

#[tokio::test]
async fn test_stale_cache_resolves_through_fallback() {
    let client = two_account_store(stale_cache());
    let session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);

    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.incomes.len(), 2);
    assert_eq!(view.expenses.len(), 2);
    assert!(client.query_count(&accounts_path("u1")) >= 1);
}

// ============================================================================
// Switching Accounts and Users
// ============================================================================

fn mixes_accounts(view: &AccountView) -> bool {
    let Some(selected) = view.selected_account_id.as_deref() else {
        return false;
    };
    view.incomes.iter().any(|i| i.bank_account_id != selected)
        || view.expenses.iter().any(|e| e.bank_account_id != selected)
}

#[tokio::test]
async fn test_switching_accounts_never_shows_mixed_records() {
    let client = two_account_store(MemoryStoreOptions::default());
    let mut session = LedgerSession::with_user(client, Some("u1".into()), Some("a".into()));
    session.wait_until_synced(WAIT).await.unwrap();

    let mut rx = session.watch_view();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    });

    session.select_account(Some("b".into()));
    session.wait_until_synced(WAIT).await.unwrap();
    session.select_account(Some("a".into()));
    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.summary.total_income, Decimal::new(1100, 0));

    drop(session);
    let seen = timeout(WAIT, observer).await.unwrap().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|v| !mixes_accounts(v)));
}

#[tokio::test]
async fn test_user_switch_drops_previous_user_data() {
    let client = two_account_store(MemoryStoreOptions::default());
    let mut session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
    session.wait_until_synced(WAIT).await.unwrap();

    session.set_user(Some("u2".into()));
    let view = session.wait_until_synced(WAIT).await.unwrap();

    let ids: Vec<&str> = view.incomes.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["ic"]);

    // Give disposed stores a moment to release their channels
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.subscriber_count(&records_path("u1", "a", "incomes")), 0);
    assert_eq!(client.subscriber_count(&accounts_path("u1")), 0);
}

#[tokio::test]
async fn test_slow_fallback_for_previous_user_is_ignored() {
    let client = two_account_store(stale_cache());
    client.hold_queries(&accounts_path("u1"));

    let mut session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
    // The accounts fallback for u1 is parked; move on to u2
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.set_user(Some("u2".into()));
    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.incomes.len(), 1);

    client.release_queries(&accounts_path("u1"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let accounts = session.accounts();
    assert_eq!(accounts.items.len(), 1);
    assert_eq!(accounts.items[0].id, "c");
    assert_eq!(session.view().incomes.len(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_push_failure_keeps_view_and_reports_error() {
    let client = two_account_store(MemoryStoreOptions::default());
    let session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
    session.wait_until_synced(WAIT).await.unwrap();

    client.fail_subscriptions(&records_path("u1", "a", "incomes"), "permission denied");
    let mut rx = session.watch_view();
    let view = timeout(WAIT, rx.wait_for(|v| v.error.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(view.incomes.len(), 2);
    assert_eq!(view.error.unwrap().kind, SyncErrorKind::Subscription);
}

#[tokio::test]
async fn test_refresh_recovers_from_push_failure() {
    let client = two_account_store(MemoryStoreOptions::default());
    let session = LedgerSession::with_user(client.clone(), Some("u1".into()), None);
    session.wait_until_synced(WAIT).await.unwrap();

    client.fail_subscriptions(&records_path("u1", "a", "incomes"), "disconnected");
    let mut rx = session.watch_view();
    timeout(WAIT, rx.wait_for(|v| v.error.is_some())).await.unwrap().unwrap();

    timeout(WAIT, session.refresh_all()).await.unwrap();
    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert!(view.error.is_none());
    assert_eq!(client.subscriber_count(&records_path("u1", "a", "incomes")), 1);

    // The reopened channel delivers new records again
    put_income(&client, "u1", "a", "ia2", 10);
    timeout(WAIT, rx.wait_for(|v| v.incomes.len() == 3)).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fallback_failure_is_reported() {
    let client = two_account_store(stale_cache());
    client.fail_next_query(&records_path("u1", "b", "expenses"), "unavailable");
    let session = LedgerSession::with_user(client, Some("u1".into()), Some("b".into()));

    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert!(view.expenses.is_empty());
    assert_eq!(view.error.unwrap().kind, SyncErrorKind::FallbackFetch);
}

#[tokio::test]
async fn test_undecodable_documents_are_skipped() {
    let client = two_account_store(MemoryStoreOptions::default());
    client.insert(
        &records_path("u1", "a", "incomes"),
        Document::new("broken", serde_json::json!({ "amount": "lots" })),
    );
    let session = LedgerSession::with_user(client, Some("u1".into()), Some("a".into()));

    let view = session.wait_until_synced(WAIT).await.unwrap();
    assert_eq!(view.incomes.len(), 1);
    assert!(view.error.is_none());
}

// ============================================================================
// Context and Persistence
// ============================================================================

#[tokio::test]
async fn test_context_round_trips_writes_through_store_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{ "session": { "userId": "u9" } }"#,
    )
    .unwrap();

    let account_id = {
        let ctx = BudgetflowContext::new(dir.path()).unwrap();
        ctx.wait_until_synced().await.unwrap();
        let account = ctx
            .session
            .create_account("Checking", Decimal::new(50, 0))
            .await
            .unwrap();
        ctx.save_store().unwrap();
        account.id
    };

    let ctx = BudgetflowContext::new(dir.path()).unwrap();
    ctx.wait_until_synced().await.unwrap();
    let accounts = ctx.session.accounts();
    assert_eq!(accounts.items.len(), 1);
    assert_eq!(accounts.items[0].id, account_id);
}

#[tokio::test]
async fn test_demo_data_produces_positive_summary() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::new();
    seed_demo_data(&store, DEMO_USER_ID, date(31)).unwrap();
    let file = dir.path().join("demo-store.json");
    json_file::save(&store, &file).unwrap();

    let client = Arc::new(json_file::load(&file, MemoryStoreOptions::default()).unwrap());
    let session = LedgerSession::with_user(client, Some(DEMO_USER_ID.into()), None);
    let view = session.wait_until_synced(WAIT).await.unwrap();

    assert_eq!(session.accounts().items.len(), 3);
    assert!(!view.incomes.is_empty());
    assert!(view.summary.total_income > Decimal::ZERO);
}
