//! Account-scoped view composer
//!
//! Narrows the user's incomes and expenses to the selected bank account and
//! derives the dashboard summary from them. The account's starting balance
//! counts as income for the selected account only; with no selection the
//! offset is zero.

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::domain::result::SyncError;
use crate::domain::summary::compute_summary;
use crate::domain::{BankAccount, Expense, FinancialRecord, FinancialSummary, Income};
use crate::services::sync::CollectionSnapshot;

/// Everything the dashboard renders for one selection, published as a unit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    /// Selection this view was computed for
    pub selected_account_id: Option<String>,
    /// The selected account, if it is known
    pub account: Option<BankAccount>,
    pub incomes: Vec<Income>,
    pub expenses: Vec<Expense>,
    pub starting_balance: Decimal,
    pub summary: FinancialSummary,
    /// Any input still loading
    pub loading: bool,
    /// First error among the inputs
    pub error: Option<SyncError>,
    pub revision: u64,
}

impl AccountView {
    pub fn empty() -> Self {
        compose_view(&[], &[], &[], None)
    }
}

/// Filter records down to `selected` and summarize them.
///
/// - `None` keeps everything with a zero offset
/// - a known account keeps its records and uses its starting balance
/// - an unknown account yields no records and a zero offset
pub fn compose_view(
    incomes: &[Income],
    expenses: &[Expense],
    accounts: &[BankAccount],
    selected: Option<&str>,
) -> AccountView {
    let selected = selected.filter(|id| !id.trim().is_empty());

    let (account, incomes, expenses, starting_balance) = match selected {
        None => (None, incomes.to_vec(), expenses.to_vec(), Decimal::ZERO),
        Some(id) => match accounts.iter().find(|a| a.id == id) {
            Some(account) => (
                Some(account.clone()),
                for_account(incomes, id),
                for_account(expenses, id),
                account.starting_balance,
            ),
            None => {
                tracing::debug!(account = %id, "selected account is unknown, view is empty");
                (None, Vec::new(), Vec::new(), Decimal::ZERO)
            }
        },
    };

    let summary = compute_summary(&incomes, &expenses, starting_balance);

    AccountView {
        selected_account_id: selected.map(str::to_string),
        account,
        incomes,
        expenses,
        starting_balance,
        summary,
        loading: false,
        error: None,
        revision: 0,
    }
}

fn for_account<R: FinancialRecord + Clone>(records: &[R], account_id: &str) -> Vec<R> {
    records
        .iter()
        .filter(|r| r.account_id() == account_id)
        .cloned()
        .collect()
}

enum Command {
    Select(Option<String>),
    Barrier(oneshot::Sender<()>),
}

/// Reactive [`compose_view`] over live collections
pub struct AccountViewComposer {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AccountView>,
}

impl AccountViewComposer {
    /// Must be called from within a tokio runtime.
    pub fn new(
        accounts: watch::Receiver<CollectionSnapshot<BankAccount>>,
        incomes: watch::Receiver<CollectionSnapshot<Income>>,
        expenses: watch::Receiver<CollectionSnapshot<Expense>>,
        selected: Option<String>,
    ) -> Self {
        let (publisher, state) = watch::channel(AccountView::empty());
        let (commands, inbox) = mpsc::unbounded_channel();

        let driver = Composer {
            accounts,
            incomes,
            expenses,
            selected,
            inbox,
            publisher,
            revision: 0,
        };
        driver.recompute_and_publish_initial();
        tokio::spawn(driver.run());

        Self { commands, state }
    }

    /// Change the selected account; `None` shows all accounts
    pub fn select_account(&self, account_id: Option<String>) {
        let _ = self.commands.send(Command::Select(account_id));
    }

    pub fn current(&self) -> AccountView {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AccountView> {
        self.state.clone()
    }

    /// Recompute from the latest inputs and return the result
    pub async fn synced(&self) -> AccountView {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
        self.current()
    }
}

struct Composer {
    accounts: watch::Receiver<CollectionSnapshot<BankAccount>>,
    incomes: watch::Receiver<CollectionSnapshot<Income>>,
    expenses: watch::Receiver<CollectionSnapshot<Expense>>,
    selected: Option<String>,
    inbox: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<AccountView>,
    revision: u64,
}

impl Composer {
    fn recompute_and_publish_initial(&self) {
        let view = self.compose();
        self.publisher.send_replace(view);
    }

    async fn run(mut self) {
        let (mut accounts_open, mut incomes_open, mut expenses_open) = (true, true, true);

        loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    None => break,
                    Some(Command::Select(account_id)) => {
                        tracing::debug!(account = ?account_id, "account selected");
                        self.selected = account_id;
                    }
                    Some(Command::Barrier(done)) => {
                        self.publish();
                        let _ = done.send(());
                        continue;
                    }
                },
                changed = self.accounts.changed(), if accounts_open => {
                    accounts_open = changed.is_ok();
                }
                changed = self.incomes.changed(), if incomes_open => {
                    incomes_open = changed.is_ok();
                }
                changed = self.expenses.changed(), if expenses_open => {
                    expenses_open = changed.is_ok();
                }
            }
            self.publish();
        }
    }

    fn compose(&self) -> AccountView {
        let accounts = self.accounts.borrow();
        let incomes = self.incomes.borrow();
        let expenses = self.expenses.borrow();

        let mut view = compose_view(
            &incomes.items,
            &expenses.items,
            &accounts.items,
            self.selected.as_deref(),
        );
        view.loading = accounts.loading || incomes.loading || expenses.loading;
        view.error = [&accounts.error, &incomes.error, &expenses.error]
            .into_iter()
            .find_map(|e| e.clone());
        view.revision = self.revision;
        view
    }

    fn publish(&mut self) {
        let mut view = self.compose();
        let next = self.revision + 1;
        let modified = self.publisher.send_if_modified(|current| {
            view.revision = current.revision;
            if *current == view {
                return false;
            }
            view.revision = next;
            *current = view;
            true
        });
        if modified {
            self.revision = next;
        }
    }
}
