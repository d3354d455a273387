//! Collection sync store - async driver around [`SyncMachine`]
//!
//! Each store owns one task that serializes every input (commands from the
//! handle, push events, fetch completions) through the state machine, performs
//! the requested effects and publishes the resulting snapshot on a
//! `tokio::sync::watch` channel.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use super::machine::{CollectionSnapshot, Effect, FetchTicket, RefreshStatus, SyncMachine};
use crate::domain::result::{Error, Result};
use crate::domain::{Document, Entity, Scope};
use crate::ports::{RemoteCollectionClient, SnapshotEvent, Subscription};

enum Command {
    SetScope(Scope),
    Refresh(oneshot::Sender<()>),
    Barrier(oneshot::Sender<()>),
    Dispose,
}

/// Reactive, scope-driven mirror of one remote collection.
///
/// Dropping the handle disposes the store: the driver task unsubscribes and
/// exits.
pub struct CollectionSyncStore<T> {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CollectionSnapshot<T>>,
}

impl<T: Entity> CollectionSyncStore<T> {
    /// Create a store for `scope` and start synchronizing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(client: Arc<dyn RemoteCollectionClient>, scope: Scope) -> Self {
        let mut machine = SyncMachine::<T>::new();
        let initial_effects = machine.set_scope(&scope);

        let (publisher, state) = watch::channel(machine.snapshot());
        let (commands, inbox) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            client,
            inbox,
            publisher,
            subscription: None,
            fetches: JoinSet::new(),
            refresh_waiters: Vec::new(),
        };
        tokio::spawn(driver.run(initial_effects));

        Self { commands, state }
    }

    /// Point the store at another scope
    pub fn set_scope(&self, scope: Scope) {
        let _ = self.commands.send(Command::SetScope(scope));
    }

    /// Latest published state
    pub fn snapshot(&self) -> CollectionSnapshot<T> {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes
    pub fn watch(&self) -> watch::Receiver<CollectionSnapshot<T>> {
        self.state.clone()
    }

    /// Re-fetch the collection and wait for the result to be applied.
    ///
    /// Calls made while a refresh is pending share it. Failures are reported
    /// through the snapshot's `error`, never to the caller.
    pub async fn refresh(&self) {
        self.request_refresh().await
    }

    /// Queue a refresh now and return a future that resolves when it has
    /// been applied. The future does not borrow the store.
    pub fn request_refresh(&self) -> impl Future<Output = ()> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let sent = self.commands.send(Command::Refresh(tx)).is_ok();
        async move {
            if sent {
                let _ = rx.await;
            }
        }
    }

    /// Wait until every command and push received so far has been processed
    /// and the store is no longer loading, then return the state.
    pub async fn settled(&self) -> CollectionSnapshot<T> {
        self.request_settle().await;
        self.snapshot()
    }

    /// Like [`Self::settled`], as a future that does not borrow the store
    pub fn request_settle(&self) -> impl Future<Output = ()> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let sent = self.commands.send(Command::Barrier(tx)).is_ok();
        let mut state = self.state.clone();
        async move {
            if sent {
                let _ = rx.await;
            }
            // Errors only when the driver is gone, and then nothing will change
            let _ = state.wait_for(|s| !s.loading).await;
        }
    }

    /// Stop synchronizing. Idempotent.
    pub fn dispose(&self) {
        let _ = self.commands.send(Command::Dispose);
    }
}

/// Aborts the wrapped task when dropped, so aborting a fetch also stops the
/// query it spawned
struct AbortOnDrop<R>(JoinHandle<R>);

impl<R> Drop for AbortOnDrop<R> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Wake {
    Command(Option<Command>),
    Push(u64, Option<SnapshotEvent>),
    Fetched(std::result::Result<(FetchTicket, Result<Vec<Document>>), JoinError>),
}

struct Driver<T> {
    machine: SyncMachine<T>,
    client: Arc<dyn RemoteCollectionClient>,
    inbox: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<CollectionSnapshot<T>>,
    subscription: Option<(u64, Subscription)>,
    fetches: JoinSet<(FetchTicket, Result<Vec<Document>>)>,
    refresh_waiters: Vec<oneshot::Sender<()>>,
}

async fn next_push(subscription: &mut Option<(u64, Subscription)>) -> (u64, Option<SnapshotEvent>) {
    match subscription {
        Some((generation, sub)) => (*generation, sub.next().await),
        None => std::future::pending().await,
    }
}

impl<T: Entity> Driver<T> {
    async fn run(mut self, initial_effects: Vec<Effect>) {
        self.apply(initial_effects).await;
        self.publish();

        loop {
            // Pushes and fetch results drain before commands, so a barrier
            // observes everything the remote delivered before it was sent
            let wake = tokio::select! {
                biased;
                (generation, event) = next_push(&mut self.subscription) => Wake::Push(generation, event),
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => Wake::Fetched(joined),
                command = self.inbox.recv() => Wake::Command(command),
            };

            let effects = match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Dispose)) => {
                    let effects = self.machine.dispose();
                    self.apply(effects).await;
                    self.fetches.abort_all();
                    self.publish();
                    tracing::debug!(kind = T::KIND.segment(), "sync store disposed");
                    break;
                }
                Wake::Command(Some(Command::SetScope(scope))) => self.machine.set_scope(&scope),
                Wake::Command(Some(Command::Refresh(waiter))) => {
                    let (status, effects) = self.machine.request_refresh();
                    match status {
                        RefreshStatus::NoScope => {
                            let _ = waiter.send(());
                        }
                        RefreshStatus::Started | RefreshStatus::Joined => self.refresh_waiters.push(waiter),
                    }
                    effects
                }
                Wake::Command(Some(Command::Barrier(done))) => {
                    let _ = done.send(());
                    Vec::new()
                }
                Wake::Push(generation, Some(SnapshotEvent::Snapshot(docs))) => {
                    self.machine.on_snapshot(generation, docs)
                }
                Wake::Push(generation, Some(SnapshotEvent::Error(message))) => {
                    self.machine.on_subscription_error(generation, message)
                }
                Wake::Push(generation, None) => {
                    self.machine.on_subscription_error(generation, "push channel closed")
                }
                Wake::Fetched(Ok((ticket, result))) => self.machine.on_fetch_complete(ticket, result),
                Wake::Fetched(Err(e)) => {
                    if !e.is_cancelled() {
                        tracing::error!(kind = T::KIND.segment(), error = %e, "fetch task failed");
                    }
                    Vec::new()
                }
            };

            self.apply(effects).await;
            self.publish();
        }

        // Anyone still waiting gets released
        self.settle_refreshes();
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Unsubscribe => {
                    if let Some((_, subscription)) = self.subscription.take() {
                        subscription.unsubscribe();
                    }
                }
                Effect::Subscribe { path, generation } => {
                    if let Some((_, old)) = self.subscription.take() {
                        old.unsubscribe();
                    }
                    match self.client.subscribe(&path).await {
                        Ok(subscription) => {
                            tracing::info!(kind = T::KIND.segment(), path = %path, "subscribed");
                            self.subscription = Some((generation, subscription));
                        }
                        Err(e) => {
                            queue.extend(self.machine.on_subscription_error(generation, e.to_string()));
                        }
                    }
                }
                Effect::Fetch { path, ticket, purpose } => {
                    tracing::debug!(kind = T::KIND.segment(), path = %path, ?purpose, seq = ticket.seq, "fetching");
                    let client = Arc::clone(&self.client);
                    self.fetches.spawn(async move {
                        // A panicking client fails this fetch instead of
                        // leaving the slot occupied
                        let mut query = AbortOnDrop(tokio::spawn(async move { client.query(&path).await }));
                        let result = match (&mut query.0).await {
                            Ok(result) => result,
                            Err(e) => Err(Error::store(format!("fetch task failed: {}", e))),
                        };
                        (ticket, result)
                    });
                }
                Effect::RefreshSettled => self.settle_refreshes(),
            }
        }
    }

    fn settle_refreshes(&mut self) {
        for waiter in self.refresh_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn publish(&self) {
        let machine = &self.machine;
        self.publisher.send_if_modified(|current| {
            if current.revision == machine.revision() && current.generation == machine.generation() {
                return false;
            }
            *current = machine.snapshot();
            true
        });
    }
}
