//! Chat feed.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::ChatMessage;
use crate::model::record::{FeatureRecord, RecordId};
use crate::session::AppSession;
use crate::view::{required_text, ScopedView, ViewResult, ViewState};

/// Chronological message feed with a compose draft.
pub struct ChatView {
    view: ScopedView<ChatMessage>,
    draft: String,
}

impl ChatView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            view: ScopedView::new(store),
            draft: String::new(),
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

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Sends the draft as a new message, oldest first in the feed.
    pub fn send(&mut self) -> ViewResult<RecordId> {
        let text = required_text(&self.draft, "message")?;
        let (binding, me) = self.view.author()?;
        let id = binding.create(&ChatMessage {
            text,
            sender_id: me.clone(),
        })?;
        self.draft.clear();
        Ok(id)
    }

    pub fn messages(&self) -> Vec<FeatureRecord<ChatMessage>> {
        self.view.records()
    }

    /// Whether the signed-in user sent `message`.
    pub fn is_mine(&self, message: &FeatureRecord<ChatMessage>) -> bool {
        self.view.me() == Some(&message.data.sender_id)
    }
}
