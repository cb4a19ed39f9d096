//! Mood status for both partners.
//!
//! Each partner owns one record in `status`, keyed by their user id.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::{Mood, MoodStatus};
use crate::model::identity::UserId;
use crate::model::record::RecordId;
use crate::session::AppSession;
use crate::view::{ScopedView, ViewError, ViewResult, ViewState};

pub struct MoodView {
    view: ScopedView<MoodStatus>,
}

impl MoodView {
    pub fn new(store: SharedStore) -> Self {
        Self {
            view: ScopedView::new(store),
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

    /// Writes the signed-in user's mood over any previous value.
    pub fn set_my_mood(&self, mood: Mood) -> ViewResult<()> {
        let (binding, me) = self.view.author()?;
        binding.upsert(
            &RecordId::fixed(me.as_str()),
            &MoodStatus {
                mood,
                user: me.clone(),
            },
        )?;
        Ok(())
    }

    pub fn my_mood(&self) -> Mood {
        self.mood_of(self.view.me())
    }

    pub fn partner_mood(&self) -> Mood {
        self.mood_of(self.view.partner())
    }

    /// Partner id, for rendering next to the partner's mood.
    pub fn partner(&self) -> ViewResult<&UserId> {
        self.view.partner().ok_or(ViewError::NoScope)
    }

    fn mood_of(&self, user: Option<&UserId>) -> Mood {
        user.and_then(|user| self.view.record(&RecordId::fixed(user.as_str())))
            .map(|record| record.data.mood)
            .unwrap_or_default()
    }
}
