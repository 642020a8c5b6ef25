use std::sync::Arc;

use crate::{mailer::Mailer, speech::SpeechProvider};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) speech: Arc<dyn SpeechProvider>,
    pub(crate) mailer: Arc<dyn Mailer>,
}
