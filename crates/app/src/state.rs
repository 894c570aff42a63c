use docqa_core::{AnswerCoordinator, CompletionClient};
use std::sync::Arc;

pub type Coordinator = AnswerCoordinator<Box<dyn CompletionClient>>;

/// Shared handle passed to every route.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}
