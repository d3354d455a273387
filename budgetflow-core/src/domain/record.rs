//! Income and expense records

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::document::Entity;
use crate::domain::scope::{CollectionKind, ResolvedScope};

/// Shared view of an income or expense
pub trait FinancialRecord {
    /// Bank account this record belongs to
    fn account_id(&self) -> &str;

    fn amount(&self) -> Decimal;

    fn date(&self) -> NaiveDate;

    /// Category (expenses) or source (incomes)
    fn tag(&self) -> &str;
}

/// Money coming into a bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub bank_account_id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    pub source: String,
}

impl Income {
    pub fn new(
        bank_account_id: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bank_account_id: bank_account_id.into(),
            amount,
            date,
            description: String::new(),
            source: source.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate income data
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_amount_and_tag(self.amount, &self.source)
    }
}

/// Money leaving a bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub bank_account_id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub next_due_date: Option<NaiveDate>,
}

impl Expense {
    pub fn new(
        bank_account_id: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bank_account_id: bank_account_id.into(),
            amount,
            date,
            description: String::new(),
            category: category.into(),
            is_recurring: false,
            next_due_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark as recurring, due again on `next_due_date`
    pub fn recurring(mut self, next_due_date: Option<NaiveDate>) -> Self {
        self.is_recurring = true;
        self.next_due_date = next_due_date;
        self
    }

    /// Validate expense data
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_amount_and_tag(self.amount, &self.category)?;
        if !self.is_recurring && self.next_due_date.is_some() {
            return Err("only recurring expenses can have a next due date");
        }
        Ok(())
    }
}

fn validate_amount_and_tag(amount: Decimal, tag: &str) -> Result<(), &'static str> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err("amount cannot be negative");
    }
    if tag.trim().is_empty() {
        return Err("category cannot be empty");
    }
    Ok(())
}

impl FinancialRecord for Income {
    fn account_id(&self) -> &str {
        &self.bank_account_id
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn tag(&self) -> &str {
        &self.source
    }
}

impl FinancialRecord for Expense {
    fn account_id(&self) -> &str {
        &self.bank_account_id
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn tag(&self) -> &str {
        &self.category
    }
}

impl Entity for Income {
    const KIND: CollectionKind = CollectionKind::Incomes;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn adopt_scope(&mut self, scope: &ResolvedScope) {
        adopt_account(&mut self.bank_account_id, scope);
    }
}

impl Entity for Expense {
    const KIND: CollectionKind = CollectionKind::Expenses;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn adopt_scope(&mut self, scope: &ResolvedScope) {
        adopt_account(&mut self.bank_account_id, scope);
    }
}

fn adopt_account(account_id: &mut String, scope: &ResolvedScope) {
    if account_id.is_empty() {
        if let Some(id) = &scope.bank_account_id {
            *account_id = id.clone();
        }
    }
}
