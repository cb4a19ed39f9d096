//! Shared playlist.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::{Platform, PlaylistEntry};
use crate::model::record::{FeatureRecord, RecordId};
use crate::session::AppSession;
use crate::view::{required_text, ScopedView, ViewResult, ViewState};

/// Append-order playlist; entries link to a platform search.
pub struct PlaylistView {
    view: ScopedView<PlaylistEntry>,
    platform: Platform,
    query: String,
}

impl PlaylistView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            view: ScopedView::new(store),
            platform: Platform::default(),
            query: String::new(),
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

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn add_entry(&mut self) -> ViewResult<RecordId> {
        let query = required_text(&self.query, "song")?;
        let (binding, me) = self.view.author()?;
        let id = binding.create(&PlaylistEntry::search(self.platform, &query, me.clone()))?;
        self.query.clear();
        Ok(id)
    }

    pub fn entries(&self) -> Vec<FeatureRecord<PlaylistEntry>> {
        self.view.records()
    }
}
