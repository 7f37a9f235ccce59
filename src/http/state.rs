use crate::session::CoordinatorHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Mailbox of the single session coordinator
    pub coordinator: CoordinatorHandle,
}

impl AppState {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }
}
