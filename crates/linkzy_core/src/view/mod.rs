//! Feature views over live pair-scoped collections.
//!
//! # Responsibility
//! - Drive the `NoScope -> Subscribed -> Unsubscribed` lifecycle per feature.
//! - Hold transient compose state and turn submits into single store writes.
//!
//! # Invariants
//! - A scope change releases the previous binding before a new one opens.
//! - `Unsubscribed` is terminal.
//! - Compose input is cleared only after a successful write.

use crate::binding::{BindingStatus, LiveCollection, SharedStore};
use crate::model::identity::UserId;
use crate::model::pair::PairKey;
use crate::model::record::{FeatureRecord, FeatureSchema, RecordId, SchemaError};
use crate::session::AppSession;
use crate::store::{Clock, StoreError};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod chat;
pub mod editor;
pub mod expenses;
pub mod memories;
pub mod mood;
pub mod playlist;
pub mod tasks;

pub use chat::ChatView;
pub use editor::EditorView;
pub use expenses::ExpensesView;
pub use memories::{MemoriesView, SharedBlobStore};
pub use mood::MoodView;
pub use playlist::PlaylistView;
pub use tasks::{TaskStats, TasksView};

/// Lifecycle state of one feature view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Either participant is unknown; nothing is subscribed.
    NoScope,
    Subscribed,
    /// Disposed; terminal.
    Unsubscribed,
}

/// Failure of a view action. Compose input is left untouched.
#[derive(Debug)]
pub enum ViewError {
    /// No pair scope yet; the view should prompt to connect a partner.
    NoScope,
    Disposed,
    InvalidInput(String),
    UnknownRecord(RecordId),
    Mutation(StoreError),
}

impl Display for ViewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoScope => write!(f, "connect with your partner first"),
            Self::Disposed => write!(f, "view has been disposed"),
            Self::InvalidInput(message) => write!(f, "{message}"),
            Self::UnknownRecord(id) => write!(f, "record `{id}` is not in the current list"),
            Self::Mutation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ViewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mutation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ViewError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Schema(err) => Self::from(err),
            other => Self::Mutation(other),
        }
    }
}

impl From<SchemaError> for ViewError {
    fn from(value: SchemaError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

pub type ViewResult<T> = Result<T, ViewError>;

/// Scope-tracking core shared by every feature view.
pub struct ScopedView<T: FeatureSchema> {
    store: SharedStore,
    binding: Option<LiveCollection<T>>,
    me: Option<UserId>,
    partner: Option<UserId>,
    disposed: bool,
}

impl<T: FeatureSchema> ScopedView<T> {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            binding: None,
            me: None,
            partner: None,
            disposed: false,
        }
    }

    pub fn state(&self) -> ViewState {
        if self.disposed {
            ViewState::Unsubscribed
        } else if self.binding.is_some() {
            ViewState::Subscribed
        } else {
            ViewState::NoScope
        }
    }

    /// Re-reads participants from the session and (re)binds when the scope moved.
    pub fn sync_scope(&mut self, session: &AppSession) -> ViewState {
        if self.disposed {
            return ViewState::Unsubscribed;
        }
        self.me = session.me().cloned();
        self.partner = session.partner().cloned();

        let next = session.pair_key();
        let current = self.binding.as_ref().map(LiveCollection::scope);
        if current == next.as_ref() {
            return self.state();
        }

        if let Some(mut previous) = self.binding.take() {
            previous.close();
        }
        if let Some(scope) = next {
            self.binding = Some(LiveCollection::open(self.store.clone(), scope));
        }
        debug!(
            "event=view_scope module=view status=ok collection={} state={:?}",
            T::COLLECTION,
            self.state()
        );
        self.state()
    }

    /// Releases the binding; the view stays `Unsubscribed` from now on.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(mut binding) = self.binding.take() {
            binding.close();
        }
        self.disposed = true;
        info!(
            "event=view_dispose module=view status=ok collection={}",
            T::COLLECTION
        );
    }

    pub fn scope(&self) -> Option<&PairKey> {
        self.binding.as_ref().map(LiveCollection::scope)
    }

    pub fn me(&self) -> Option<&UserId> {
        self.me.as_ref()
    }

    pub fn partner(&self) -> Option<&UserId> {
        self.partner.as_ref()
    }

    /// Connection status; `None` without a scope.
    pub fn status(&self) -> Option<BindingStatus> {
        self.binding.as_ref().map(LiveCollection::status)
    }

    /// Current snapshot; empty without a scope.
    pub fn records(&self) -> Vec<FeatureRecord<T>> {
        self.binding
            .as_ref()
            .map(LiveCollection::records)
            .unwrap_or_default()
    }

    pub fn record(&self, id: &RecordId) -> Option<FeatureRecord<T>> {
        self.binding.as_ref().and_then(|binding| binding.record(id))
    }

    /// Active binding, or the reason a write cannot be issued.
    pub fn binding(&self) -> ViewResult<&LiveCollection<T>> {
        if self.disposed {
            return Err(ViewError::Disposed);
        }
        self.binding.as_ref().ok_or(ViewError::NoScope)
    }

    /// Binding plus the signed-in author, for create-style submits.
    pub fn author(&self) -> ViewResult<(&LiveCollection<T>, &UserId)> {
        let binding = self.binding()?;
        let me = self.me.as_ref().ok_or(ViewError::NoScope)?;
        Ok((binding, me))
    }

    pub(crate) fn revision(&self) -> Option<u64> {
        self.binding.as_ref().map(LiveCollection::revision)
    }
}

impl<T: FeatureSchema> Drop for ScopedView<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Trims compose text, rejecting blank input.
pub(crate) fn required_text(value: &str, what: &str) -> ViewResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ViewError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Every feature view of one signed-in client.
pub struct FeatureViews {
    pub chat: ChatView,
    pub tasks: TasksView,
    pub mood: MoodView,
    pub expenses: ExpensesView,
    pub playlist: PlaylistView,
    pub memories: MemoriesView,
    pub editor: EditorView,
}

impl FeatureViews {
    pub fn new(
        store: SharedStore,
        blobs: SharedBlobStore,
        clock: Arc<dyn Clock>,
        editor_initial: impl Into<String>,
    ) -> Self {
        Self {
            chat: ChatView::new(store.clone()),
            tasks: TasksView::new(store.clone()),
            mood: MoodView::new(store.clone()),
            expenses: ExpensesView::new(store.clone()),
            playlist: PlaylistView::new(store.clone()),
            memories: MemoriesView::new(store.clone(), blobs, clock),
            editor: EditorView::new(store, editor_initial),
        }
    }

    /// Propagates a session change to every view.
    pub fn sync_scope(&mut self, session: &AppSession) {
        self.chat.sync_scope(session);
        self.tasks.sync_scope(session);
        self.mood.sync_scope(session);
        self.expenses.sync_scope(session);
        self.playlist.sync_scope(session);
        self.memories.sync_scope(session);
        self.editor.sync_scope(session);
    }

    pub fn dispose(&mut self) {
        self.chat.dispose();
        self.tasks.dispose();
        self.mood.dispose();
        self.expenses.dispose();
        self.playlist.dispose();
        self.memories.dispose();
        self.editor.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::{ScopedView, ViewError, ViewState};
    use crate::binding::SharedStore;
    use crate::model::feature::ChatMessage;
    use crate::model::identity::{Identity, UserId};
    use crate::session::AppSession;
    use crate::store::SqliteLiveStore;
    use std::sync::Arc;

    fn session(me: &str, partner: Option<&str>) -> AppSession {
        let mut session = AppSession::new();
        session.set_user(Some(Identity::new(UserId::parse(me).unwrap(), None)));
        if let Some(partner) = partner {
            session.set_partner(UserId::parse(partner).unwrap());
        }
        session
    }

    #[test]
    fn lifecycle_follows_session_scope() {
        let store = Arc::new(SqliteLiveStore::open_in_memory().unwrap());
        let mut view: ScopedView<ChatMessage> = ScopedView::new(store.clone() as SharedStore);
        assert_eq!(view.state(), ViewState::NoScope);

        assert_eq!(view.sync_scope(&session("u1", None)), ViewState::NoScope);
        assert_eq!(store.listener_count(), 0);
        assert!(matches!(view.binding(), Err(ViewError::NoScope)));

        assert_eq!(
            view.sync_scope(&session("u1", Some("u2"))),
            ViewState::Subscribed
        );
        assert_eq!(view.scope().unwrap().as_str(), "u1_u2");
        assert_eq!(store.listener_count(), 1);

        // Same scope keeps the same subscription.
        view.sync_scope(&session("u1", Some("u2")));
        assert_eq!(store.listener_count(), 1);

        assert_eq!(view.sync_scope(&session("u1", None)), ViewState::NoScope);
        assert_eq!(store.listener_count(), 0);

        view.sync_scope(&session("u1", Some("u3")));
        view.dispose();
        assert_eq!(view.state(), ViewState::Unsubscribed);
        assert_eq!(store.listener_count(), 0);
        assert_eq!(
            view.sync_scope(&session("u1", Some("u2"))),
            ViewState::Unsubscribed
        );
        assert!(matches!(view.binding(), Err(ViewError::Disposed)));
    }
}
