//! Shared to-do list.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::{Assignee, Task};
use crate::model::record::{FeatureRecord, Fields, RecordId};
use crate::session::AppSession;
use crate::view::{required_text, ScopedView, ViewError, ViewResult, ViewState};
use serde_json::Value;

/// Totals shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
}

/// Most-recent-first task list with a compose form.
pub struct TasksView {
    view: ScopedView<Task>,
    input: String,
    assignee: Assignee,
}

impl TasksView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            view: ScopedView::new(store),
            input: String::new(),
            assignee: Assignee::default(),
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

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn assignee(&self) -> Assignee {
        self.assignee
    }

    pub fn set_assignee(&mut self, assignee: Assignee) {
        self.assignee = assignee;
    }

    /// Creates an open task from the input; the assignee choice is kept.
    pub fn add_task(&mut self) -> ViewResult<RecordId> {
        let text = required_text(&self.input, "task")?;
        let (binding, me) = self.view.author()?;
        let id = binding.create(&Task {
            text,
            completed: false,
            assignee: self.assignee,
            created_by: me.clone(),
        })?;
        self.input.clear();
        Ok(id)
    }

    /// Flips the completed flag of a listed task.
    pub fn toggle_complete(&self, id: &RecordId) -> ViewResult<()> {
        let binding = self.view.binding()?;
        let task = binding
            .record(id)
            .ok_or_else(|| ViewError::UnknownRecord(id.clone()))?;
        let mut fields = Fields::new();
        fields.insert("completed".to_string(), Value::Bool(!task.data.completed));
        binding.update_fields(id, fields)?;
        Ok(())
    }

    pub fn delete_task(&self, id: &RecordId) -> ViewResult<()> {
        self.view.binding()?.delete(id)?;
        Ok(())
    }

    pub fn tasks(&self) -> Vec<FeatureRecord<Task>> {
        self.view.records()
    }

    pub fn stats(&self) -> TaskStats {
        let tasks = self.view.records();
        TaskStats {
            total: tasks.len(),
            completed: tasks.iter().filter(|task| task.data.completed).count(),
        }
    }
}
