//! Shared expense ledger.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::{Expense, ExpenseCategory};
use crate::model::record::{FeatureRecord, RecordId};
use crate::session::AppSession;
use crate::view::{required_text, ScopedView, ViewError, ViewResult, ViewState};

/// Most-recent-first ledger with a compose form.
pub struct ExpensesView {
    view: ScopedView<Expense>,
    title: String,
    amount: String,
    category: ExpenseCategory,
}

impl ExpensesView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            view: ScopedView::new(store),
            title: String::new(),
            amount: String::new(),
            category: ExpenseCategory::default(),
        }
    }

    pub fn sync_scope(&mut self, session: &AppSession) -> ViewState {
        self.view.sync_scope(session)
    }

    pub fn dispose(&mut self) {
        self.view.dispose();
    }

    pub fn state(&self) -> ViewState {
        self.view.state()
    }

    pub fn status(&self) -> Option<BindingStatus> {
        self.view.status()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Raw amount text; parsed on submit.
    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.amount = amount.into();
    }

    pub fn category(&self) -> ExpenseCategory {
        self.category
    }

    pub fn set_category(&mut self, category: ExpenseCategory) {
        self.category = category;
    }

    /// Records the form as a new expense and clears title and amount.
    pub fn add_expense(&mut self) -> ViewResult<RecordId> {
        let title = required_text(&self.title, "title")?;
        let amount = parse_amount(&self.amount)?;
        let (binding, me) = self.view.author()?;
        let id = binding.create(&Expense {
            title,
            amount,
            category: self.category,
            user: me.clone(),
        })?;
        self.title.clear();
        self.amount.clear();
        Ok(id)
    }

    pub fn expenses(&self) -> Vec<FeatureRecord<Expense>> {
        self.view.records()
    }

    pub fn total(&self) -> f64 {
        self.view.records().iter().map(|expense| expense.data.amount).sum()
    }

    /// Amounts oldest first, for the spending chart.
    pub fn amount_series(&self) -> Vec<f64> {
        let mut expenses = self.view.records();
        expenses.sort_by_key(|expense| expense.timestamp);
        expenses.iter().map(|expense| expense.data.amount).collect()
    }
}

fn parse_amount(raw: &str) -> ViewResult<f64> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(ViewError::InvalidInput(format!(
            "amount `{trimmed}` is not a number"
        ))),
    }
}
