//! Per-account record collections merged across a user's accounts
//!
//! Incomes and expenses live under each bank account, so the unfiltered
//! collection of a user is the union of one [`CollectionSyncStore`] per
//! account. [`AccountCollections`] follows the bank-account store: it opens a
//! child store for every account that appears, drops the ones that vanish and
//! republishes a merged snapshot whenever any child changes.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::domain::{BankAccount, Entity, Scope};
use crate::ports::RemoteCollectionClient;
use crate::services::sync::{CollectionSnapshot, CollectionSyncStore, SyncPhase};

type Settle = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Command {
    SetUser(Option<String>),
    Refresh(oneshot::Sender<()>),
    /// Reconcile with the latest account list and hand back one settle
    /// future per child store
    Barrier(oneshot::Sender<Vec<Settle>>),
    /// Republish from the children's current state
    Flush(oneshot::Sender<()>),
}

/// Merged view of one record kind across all accounts of a user
pub struct AccountCollections<T> {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CollectionSnapshot<T>>,
}

impl<T: Entity> AccountCollections<T> {
    /// Start following `accounts` for `user_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        client: Arc<dyn RemoteCollectionClient>,
        accounts: watch::Receiver<CollectionSnapshot<BankAccount>>,
        user_id: Option<String>,
    ) -> Self {
        let (publisher, state) = watch::channel(CollectionSnapshot::idle());
        let (commands, inbox) = mpsc::unbounded_channel();
        let (notify, changes) = mpsc::unbounded_channel();

        let mut driver = FanOut {
            client,
            user_id: user_id.filter(|u| !u.trim().is_empty()),
            user_generation: 0,
            accounts,
            inbox,
            notify,
            changes,
            children: HashMap::new(),
            order: Vec::new(),
            accounts_revision: None,
            publisher,
            revision: 0,
        };
        driver.reconcile();
        driver.publish();
        tokio::spawn(driver.run());

        Self { commands, state }
    }

    /// Follow another user. Child stores of the previous user are disposed
    /// before any store of the new one is opened.
    pub fn set_user(&self, user_id: Option<String>) {
        let _ = self.commands.send(Command::SetUser(user_id));
    }

    pub fn snapshot(&self) -> CollectionSnapshot<T> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CollectionSnapshot<T>> {
        self.state.clone()
    }

    /// Refresh every child store and wait for all of them
    pub async fn refresh(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Refresh(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Wait until the latest account list is reflected and every child store
    /// has settled, then return the merged state
    pub async fn settled(&self) -> CollectionSnapshot<T> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Barrier(tx)).is_err() {
            return self.snapshot();
        }
        if let Ok(children) = rx.await {
            for child in children {
                child.await;
            }
        }

        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
        let mut state = self.state.clone();
        let result = state.wait_for(|s| !s.loading).await.map(|s| s.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }
}

struct Child<T> {
    store: CollectionSyncStore<T>,
    forward: JoinHandle<()>,
}

struct FanOut<T> {
    client: Arc<dyn RemoteCollectionClient>,
    user_id: Option<String>,
    user_generation: u64,
    accounts: watch::Receiver<CollectionSnapshot<BankAccount>>,
    inbox: mpsc::UnboundedReceiver<Command>,
    notify: mpsc::UnboundedSender<()>,
    changes: mpsc::UnboundedReceiver<()>,
    children: HashMap<String, Child<T>>,
    order: Vec<String>,
    accounts_revision: Option<(u64, u64)>,
    publisher: watch::Sender<CollectionSnapshot<T>>,
    revision: u64,
}

impl<T: Entity> FanOut<T> {
    async fn run(mut self) {
        let mut accounts_open = true;

        loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    None => break,
                    Some(Command::SetUser(user_id)) => self.set_user(user_id),
                    Some(Command::Refresh(waiter)) => self.refresh_children(waiter),
                    Some(Command::Barrier(reply)) => {
                        self.reconcile();
                        let children: Vec<Settle> = self
                            .children
                            .values()
                            .map(|child| Box::pin(child.store.request_settle()) as Settle)
                            .collect();
                        let _ = reply.send(children);
                    }
                    Some(Command::Flush(done)) => {
                        self.publish();
                        let _ = done.send(());
                        continue;
                    }
                },
                changed = self.accounts.changed(), if accounts_open => {
                    if changed.is_err() {
                        // Account store gone; keep the children we have
                        accounts_open = false;
                        continue;
                    }
                    self.reconcile();
                }
                Some(()) = self.changes.recv() => {
                    // Coalesce bursts from several children
                    while self.changes.try_recv().is_ok() {}
                }
            }
            self.publish();
        }

        self.clear_children();
        tracing::debug!(kind = T::KIND.segment(), "account fan-out disposed");
    }

    fn set_user(&mut self, user_id: Option<String>) {
        let user_id = user_id.filter(|u| !u.trim().is_empty());
        if user_id == self.user_id {
            return;
        }
        tracing::debug!(kind = T::KIND.segment(), "user changed, closing account stores");
        self.clear_children();
        self.user_id = user_id;
        self.user_generation += 1;
        self.accounts_revision = None;
        self.reconcile();
    }

    fn clear_children(&mut self) {
        for (_, child) in self.children.drain() {
            child.forward.abort();
            child.store.dispose();
        }
        self.order.clear();
    }

    /// Align the child stores with the current account list
    fn reconcile(&mut self) {
        let accounts = self.accounts.borrow_and_update().clone();
        let key = (accounts.generation, accounts.revision);
        if self.accounts_revision == Some(key) {
            return;
        }
        self.accounts_revision = Some(key);

        // The account store may still hold the previous user's list
        let wanted: Vec<String> = match &self.user_id {
            Some(user_id) => {
                let mut ids: Vec<String> = Vec::new();
                for account in accounts.items.iter().filter(|a| &a.user_id == user_id) {
                    if !account.id.is_empty() && !ids.contains(&account.id) {
                        ids.push(account.id.clone());
                    }
                }
                ids
            }
            None => Vec::new(),
        };

        let stale: Vec<String> = self
            .children
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(child) = self.children.remove(&id) {
                tracing::debug!(kind = T::KIND.segment(), account = %id, "closing account store");
                child.forward.abort();
                child.store.dispose();
            }
        }

        if let Some(user_id) = self.user_id.clone() {
            for id in &wanted {
                if self.children.contains_key(id) {
                    continue;
                }
                let store = CollectionSyncStore::<T>::new(
                    Arc::clone(&self.client),
                    Scope::account(user_id.clone(), id.clone()),
                );
                let forward = forward_changes(store.watch(), self.notify.clone());
                self.children.insert(id.clone(), Child { store, forward });
            }
        }

        self.order = wanted;
    }

    fn refresh_children(&self, waiter: oneshot::Sender<()>) {
        let mut pending = JoinSet::new();
        for child in self.children.values() {
            pending.spawn(child.store.request_refresh());
        }
        tokio::spawn(async move {
            while pending.join_next().await.is_some() {}
            let _ = waiter.send(());
        });
    }

    fn merged(&self) -> CollectionSnapshot<T> {
        let mut items = Vec::new();
        let mut loading = false;
        let mut error = None;

        for id in &self.order {
            if let Some(child) = self.children.get(id) {
                let snapshot = child.store.snapshot();
                loading |= snapshot.loading;
                if error.is_none() {
                    error = snapshot.error;
                }
                items.extend(snapshot.items);
            }
        }

        let accounts = self.accounts.borrow();
        if self.user_id.is_some() && accounts.loading {
            loading = true;
        }

        let phase = if self.user_id.is_none() {
            SyncPhase::Idle
        } else if loading {
            SyncPhase::Loading
        } else if error.is_some() {
            SyncPhase::Errored
        } else {
            SyncPhase::Synced
        };

        CollectionSnapshot {
            items,
            loading,
            error,
            phase,
            path: None,
            generation: self.user_generation,
            revision: self.revision,
        }
    }

    fn publish(&mut self) {
        let mut merged = self.merged();
        let next = self.revision + 1;
        let modified = self.publisher.send_if_modified(|current| {
            merged.revision = current.revision;
            if *current == merged {
                return false;
            }
            merged.revision = next;
            *current = merged;
            true
        });
        if modified {
            self.revision = next;
        }
    }
}

fn forward_changes<T: Entity>(
    mut rx: watch::Receiver<CollectionSnapshot<T>>,
    notify: mpsc::UnboundedSender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The initial value counts as a change
        if notify.send(()).is_err() {
            return;
        }
        while rx.changed().await.is_ok() {
            if notify.send(()).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::document::encode;
    use crate::domain::{CollectionPath, Document, Income};
    use rust_decimal::Decimal;
    use serde_json::json;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn accounts_path(user: &str) -> CollectionPath {
        CollectionPath::new(format!("users/{}/bankAccounts", user))
    }

    fn incomes_path(user: &str, account: &str) -> CollectionPath {
        CollectionPath::new(format!("users/{}/bankAccounts/{}/incomes", user, account))
    }

    fn add_account(store: &MemoryStore, user: &str, id: &str) {
        let mut account = BankAccount::new(user, id, Decimal::ZERO);
        account.id = id.to_string();
        store.insert(&accounts_path(user), encode(&account).unwrap());
    }

    fn income_doc(id: &str, amount: i64) -> Document {
        Document::new(id, json!({ "amount": amount, "date": "2024-04-01", "source": "salary" }))
    }

    fn setup() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        add_account(&store, "u1", "a");
        add_account(&store, "u1", "b");
        store.insert(&incomes_path("u1", "a"), income_doc("a1", 100));
        store.insert(&incomes_path("u1", "b"), income_doc("b1", 200));
        store.insert(&incomes_path("u1", "b"), income_doc("b2", 300));
        add_account(&store, "u2", "c");
        store.insert(&incomes_path("u2", "c"), income_doc("c1", 999));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_merges_all_accounts_in_order() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::user("u1"));
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), Some("u1".into()));

        timeout(WAIT, accounts.settled()).await.unwrap();
        let merged = timeout(WAIT, incomes.settled()).await.unwrap();

        let ids: Vec<&str> = merged.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1", "b2"]);
        assert_eq!(merged.items[1].bank_account_id, "b");
        assert_eq!(merged.phase, SyncPhase::Synced);
    }

    #[tokio::test]
    async fn test_new_account_opens_child_store() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::user("u1"));
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), Some("u1".into()));
        timeout(WAIT, accounts.settled()).await.unwrap();
        timeout(WAIT, incomes.settled()).await.unwrap();

        client.insert(&incomes_path("u1", "new"), income_doc("n1", 5));
        add_account(&client, "u1", "new");

        let mut rx = incomes.watch();
        timeout(WAIT, rx.wait_for(|s| s.items.len() == 4)).await.unwrap().unwrap();
        assert_eq!(client.subscriber_count(&incomes_path("u1", "new")), 1);
    }

    #[tokio::test]
    async fn test_removed_account_closes_child_store() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::user("u1"));
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), Some("u1".into()));
        timeout(WAIT, accounts.settled()).await.unwrap();
        timeout(WAIT, incomes.settled()).await.unwrap();

        client.remove(&accounts_path("u1"), "b");
        let mut rx = incomes.watch();
        timeout(WAIT, rx.wait_for(|s| s.items.len() == 1)).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.subscriber_count(&incomes_path("u1", "b")), 0);
    }

    #[tokio::test]
    async fn test_user_switch_never_mixes_users() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::user("u1"));
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), Some("u1".into()));
        timeout(WAIT, accounts.settled()).await.unwrap();
        timeout(WAIT, incomes.settled()).await.unwrap();

        let mut rx = incomes.watch();
        incomes.set_user(Some("u2".into()));
        accounts.set_scope(Scope::user("u2"));

        timeout(WAIT, accounts.settled()).await.unwrap();
        let merged = timeout(WAIT, incomes.settled()).await.unwrap();
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].id, "c1");

        let seen = rx.borrow_and_update().clone();
        assert!(seen.items.iter().all(|i| i.id == "c1"));
    }

    #[tokio::test]
    async fn test_no_user_is_idle() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::none());
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), None);

        let merged = timeout(WAIT, incomes.settled()).await.unwrap();
        assert!(merged.items.is_empty());
        assert_eq!(merged.phase, SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_refresh_reaches_every_child() {
        let client = setup();
        let accounts = CollectionSyncStore::<BankAccount>::new(client.clone(), Scope::user("u1"));
        let incomes = AccountCollections::<Income>::new(client.clone(), accounts.watch(), Some("u1".into()));
        timeout(WAIT, accounts.settled()).await.unwrap();
        timeout(WAIT, incomes.settled()).await.unwrap();

        timeout(WAIT, incomes.refresh()).await.unwrap();
        assert_eq!(client.query_count(&incomes_path("u1", "a")), 1);
        assert_eq!(client.query_count(&incomes_path("u1", "b")), 1);
    }
}
