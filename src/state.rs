use std::sync::Arc;

use talk_to_core::TalkTo;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    talk_to: Arc<TalkTo>,
}

impl AppState {
    pub fn new(talk_to: Arc<TalkTo>) -> Self {
        AppState { talk_to }
    }

    pub fn talk_to(&self) -> &TalkTo {
        &self.talk_to
    }
}
