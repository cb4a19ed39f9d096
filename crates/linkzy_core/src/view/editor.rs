//! Shared code editor.
//!
//! One document per pair scope under the fixed id `editor`. Every edit
//! merge-writes the whole content; simultaneous typists overwrite each other.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::{EditorDocument, EDITOR_DOC_KEY};
use crate::model::pair::PairKey;
use crate::model::record::RecordId;
use crate::session::AppSession;
use crate::view::{ScopedView, ViewResult, ViewState};

pub struct EditorView {
    view: ScopedView<EditorDocument>,
    content: String,
    /// Scope and binding revision last folded into `content`.
    seen: Option<(PairKey, u64)>,
}

impl EditorView {
    pub fn new(store: SharedStore, initial_content: impl Into<String>) -> Self {
        Self {
            view: ScopedView::new(store),
            content: initial_content.into(),
            seen: None,
        }
    }

    pub fn sync_scope(&mut self, session: &AppSession) -> ViewState {
        let state = self.view.sync_scope(session);
        self.pull_remote();
        state
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

    /// Current text, after folding in any newer remote snapshot.
    pub fn content(&mut self) -> &str {
        self.pull_remote();
        &self.content
    }

    /// Replaces the local text and writes it to the shared document.
    ///
    /// The local text changes even when the write fails or there is no scope.
    pub fn edit(&mut self, next: impl Into<String>) -> ViewResult<()> {
        self.pull_remote();
        self.content = next.into();

        let (binding, me) = self.view.author()?;
        let document = EditorDocument {
            content: self.content.clone(),
            edited_by: Some(me.clone()),
        };
        binding.upsert(&RecordId::fixed(EDITOR_DOC_KEY), &document)?;
        Ok(())
    }

    fn pull_remote(&mut self) {
        let (Some(scope), Some(revision)) = (self.view.scope(), self.view.revision()) else {
            return;
        };
        let stale = match &self.seen {
            Some((seen_scope, seen_revision)) => seen_scope != scope || *seen_revision < revision,
            None => true,
        };
        if !stale {
            return;
        }
        let scope = scope.clone();
        if let Some(document) = self.view.record(&RecordId::fixed(EDITOR_DOC_KEY)) {
            self.content = document.data.content;
        }
        self.seen = Some((scope, revision));
    }
}
