//! Sync state machine
//!
//! Pure transitions for one collection sync store. Every input (scope change,
//! push event, fetch completion, refresh request) is a method that updates the
//! state and returns the [`Effect`]s the driver must perform. Nothing here
//! awaits or touches the network, so each rule is testable on its own:
//!
//! - an empty push is ambiguous and triggers one fallback fetch
//! - fetch results are applied only if their ticket is still the one in flight
//! - a scope change bumps the generation, dropping everything tied to the old one
//!
//! ```text
//! Idle --scope--> Loading --push/fetch--> Synced <--> Errored
//!   ^                                       |            |
//!   +----------------- scope cleared -------+------------+
//! ```

use serde::Serialize;

use crate::domain::document::decode_all;
use crate::domain::result::{SyncError, SyncErrorKind};
use crate::domain::{CollectionPath, Document, Entity, ResolvedScope, Scope};

/// Lifecycle phase of a sync store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    /// No complete scope, nothing to synchronize
    Idle,
    /// Scope set, waiting for the first usable snapshot
    Loading,
    /// Items populated from the push channel or a fetch
    Synced,
    /// Last operation failed; items are the last known ones
    Errored,
}

/// Why a point query was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Disambiguate an empty push
    Fallback,
    /// Manual re-sync
    Refresh,
}

/// Identity of one point query. Results carrying any other ticket than the
/// one currently in flight are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    pub generation: u64,
    pub seq: u64,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a push channel, replacing any open one
    Subscribe {
        path: CollectionPath,
        generation: u64,
    },
    /// Close the open push channel
    Unsubscribe,
    /// Issue a point query
    Fetch {
        path: CollectionPath,
        ticket: FetchTicket,
        purpose: FetchPurpose,
    },
    /// Wake everyone awaiting the pending refresh
    RefreshSettled,
}

/// Result of asking for a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// No scope; the refresh resolves immediately
    NoScope,
    /// A new refresh fetch was issued
    Started,
    /// A refresh was already pending; the caller shares its completion
    Joined,
}

/// Materialized state of one sync store, as published to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSnapshot<T> {
    /// Records in arrival order
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<SyncError>,
    pub phase: SyncPhase,
    /// Collection being tracked, if any
    pub path: Option<CollectionPath>,
    /// Bumped on every scope change
    pub generation: u64,
    /// Bumped on every published change
    pub revision: u64,
}

impl<T> CollectionSnapshot<T> {
    /// Snapshot of a store with no scope
    pub fn idle() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            phase: SyncPhase::Idle,
            path: None,
            generation: 0,
            revision: 0,
        }
    }
}

/// Health of the push channel for the current scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushState {
    /// Opened, nothing delivered yet
    Opening,
    /// At least one snapshot delivered
    Live,
    /// Failed or closed; a refresh reopens it
    Failed,
    /// Reopened by a refresh after a failure, nothing delivered yet
    Reopening,
}

/// State machine behind a [`super::CollectionSyncStore`]
#[derive(Debug)]
pub struct SyncMachine<T> {
    scope: Option<(ResolvedScope, CollectionPath)>,
    generation: u64,
    next_seq: u64,
    phase: SyncPhase,
    items: Vec<T>,
    error: Option<SyncError>,
    revision: u64,
    in_flight: Option<(FetchTicket, FetchPurpose)>,
    push: PushState,
}

impl<T: Entity> Default for SyncMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> SyncMachine<T> {
    pub fn new() -> Self {
        Self {
            scope: None,
            generation: 0,
            next_seq: 0,
            phase: SyncPhase::Idle,
            items: Vec::new(),
            error: None,
            revision: 0,
            in_flight: None,
            push: PushState::Opening,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn path(&self) -> Option<&CollectionPath> {
        self.scope.as_ref().map(|(_, path)| path)
    }

    /// Build the consumer-facing snapshot
    pub fn snapshot(&self) -> CollectionSnapshot<T> {
        CollectionSnapshot {
            items: self.items.clone(),
            loading: self.phase == SyncPhase::Loading,
            error: self.error.clone(),
            phase: self.phase,
            path: self.path().cloned(),
            generation: self.generation,
            revision: self.revision,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn issue_ticket(&mut self) -> FetchTicket {
        self.next_seq += 1;
        FetchTicket {
            generation: self.generation,
            seq: self.next_seq,
        }
    }

    fn refresh_pending(&self) -> bool {
        matches!(self.in_flight, Some((_, FetchPurpose::Refresh)))
    }

    /// Point the store at a new scope.
    ///
    /// Re-setting the current scope is a no-op. Anything else tears down the
    /// old subscription, invalidates in-flight fetches and clears the items
    /// so no data leaks across users or accounts.
    pub fn set_scope(&mut self, scope: &Scope) -> Vec<Effect> {
        let next = T::KIND.resolve(scope);
        if next.as_ref().map(|(_, p)| p) == self.path() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.scope.is_some() {
            effects.push(Effect::Unsubscribe);
        }
        if self.refresh_pending() {
            effects.push(Effect::RefreshSettled);
        }

        self.generation += 1;
        self.in_flight = None;
        self.push = PushState::Opening;
        self.items.clear();
        self.error = None;

        match next {
            Some((resolved, path)) => {
                tracing::debug!(kind = T::KIND.segment(), path = %path, generation = self.generation, "scope set");
                effects.push(Effect::Subscribe {
                    path: path.clone(),
                    generation: self.generation,
                });
                self.scope = Some((resolved, path));
                self.phase = SyncPhase::Loading;
            }
            None => {
                tracing::debug!(kind = T::KIND.segment(), generation = self.generation, "scope cleared");
                self.scope = None;
                self.phase = SyncPhase::Idle;
            }
        }

        self.touch();
        effects
    }

    /// Tear down: equivalent to clearing the scope
    pub fn dispose(&mut self) -> Vec<Effect> {
        self.set_scope(&Scope::none())
    }

    /// Apply a pushed snapshot delivered by the subscription of `generation`
    pub fn on_snapshot(&mut self, generation: u64, docs: Vec<Document>) -> Vec<Effect> {
        if generation != self.generation {
            tracing::debug!(kind = T::KIND.segment(), generation, current = self.generation, "discarding push from old scope");
            return Vec::new();
        }
        let Some((resolved, path)) = self.scope.clone() else {
            return Vec::new();
        };

        self.push = PushState::Live;
        self.error = None;
        self.touch();

        if !docs.is_empty() {
            self.items = decode_all(&docs, &resolved);
            self.phase = SyncPhase::Synced;
            // An authoritative push makes a pending disambiguation pointless
            if matches!(self.in_flight, Some((_, FetchPurpose::Fallback))) {
                self.in_flight = None;
            }
            tracing::debug!(kind = T::KIND.segment(), path = %path, count = self.items.len(), "applied push");
            return Vec::new();
        }

        // Empty push: could be truly empty or a cache that has not synced yet
        self.items.clear();
        self.phase = SyncPhase::Loading;

        if self.in_flight.is_some() {
            // The pending fetch will settle it
            return Vec::new();
        }

        let ticket = self.issue_ticket();
        self.in_flight = Some((ticket, FetchPurpose::Fallback));
        tracing::debug!(kind = T::KIND.segment(), path = %path, seq = ticket.seq, "empty push, issuing fallback fetch");
        vec![Effect::Fetch {
            path,
            ticket,
            purpose: FetchPurpose::Fallback,
        }]
    }

    /// Record a push channel failure (including failure to open it)
    pub fn on_subscription_error(&mut self, generation: u64, message: impl Into<String>) -> Vec<Effect> {
        if generation != self.generation || self.scope.is_none() {
            return Vec::new();
        }

        let error = SyncError::new(SyncErrorKind::Subscription, message);
        tracing::warn!(kind = T::KIND.segment(), path = ?self.path(), error = %error, "push channel failed");

        self.push = PushState::Failed;
        self.error = Some(error);
        self.phase = SyncPhase::Errored;
        self.touch();
        vec![Effect::Unsubscribe]
    }

    /// Ask for a manual re-sync.
    ///
    /// At most one fetch is in flight per store: a refresh supersedes a
    /// pending fallback, and a refresh requested while another is pending
    /// joins it. If the push channel is down, it is reopened as well.
    pub fn request_refresh(&mut self) -> (RefreshStatus, Vec<Effect>) {
        let Some((_, path)) = self.scope.clone() else {
            return (RefreshStatus::NoScope, Vec::new());
        };

        if self.refresh_pending() {
            tracing::debug!(kind = T::KIND.segment(), path = %path, "refresh already pending, joining");
            return (RefreshStatus::Joined, Vec::new());
        }

        let ticket = self.issue_ticket();
        self.in_flight = Some((ticket, FetchPurpose::Refresh));

        let mut effects = vec![Effect::Fetch {
            path: path.clone(),
            ticket,
            purpose: FetchPurpose::Refresh,
        }];
        if self.push == PushState::Failed {
            self.push = PushState::Reopening;
            effects.push(Effect::Subscribe {
                path,
                generation: self.generation,
            });
        }
        (RefreshStatus::Started, effects)
    }

    /// Apply the result of a point query
    pub fn on_fetch_complete(
        &mut self,
        ticket: FetchTicket,
        result: crate::domain::result::Result<Vec<Document>>,
    ) -> Vec<Effect> {
        let purpose = match self.in_flight {
            Some((current, purpose)) if current == ticket && ticket.generation == self.generation => purpose,
            _ => {
                tracing::debug!(kind = T::KIND.segment(), seq = ticket.seq, generation = ticket.generation, "discarding stale fetch result");
                return Vec::new();
            }
        };
        let Some((resolved, _)) = self.scope.clone() else {
            return Vec::new();
        };
        self.in_flight = None;

        match result {
            Ok(docs) => {
                self.items = decode_all(&docs, &resolved);
                // A dead push channel stays reported until a push arrives
                let push_down = matches!(self.push, PushState::Failed | PushState::Reopening);
                self.error = self
                    .error
                    .take()
                    .filter(|e| push_down && e.kind == SyncErrorKind::Subscription);
                self.phase = if self.error.is_some() {
                    SyncPhase::Errored
                } else {
                    SyncPhase::Synced
                };
                tracing::debug!(kind = T::KIND.segment(), ?purpose, count = self.items.len(), "applied fetch result");
            }
            Err(e) => {
                let kind = match purpose {
                    FetchPurpose::Fallback => SyncErrorKind::FallbackFetch,
                    FetchPurpose::Refresh => SyncErrorKind::Refresh,
                };
                let error = SyncError::new(kind, e.to_string());
                tracing::warn!(kind = T::KIND.segment(), error = %error, "fetch failed");
                // Items stay as last known
                self.error = Some(error);
                self.phase = SyncPhase::Errored;
            }
        }
        self.touch();

        match purpose {
            FetchPurpose::Refresh => vec![Effect::RefreshSettled],
            FetchPurpose::Fallback => Vec::new(),
        }
    }
}
