//! # Web API Application State

use std::sync::Arc;

use crate::hub::DeviceHub;
use crate::messaging::MessagingProvider;
use crate::orchestration::ExaminationDispatcher;

/// Handles shared by every request and websocket connection
#[derive(Clone, Debug)]
pub struct AppState {
    pub hub: Arc<DeviceHub>,
    pub dispatcher: Arc<ExaminationDispatcher>,
    pub messaging: Arc<MessagingProvider>,
}

impl AppState {
    pub fn new(
        hub: Arc<DeviceHub>,
        dispatcher: Arc<ExaminationDispatcher>,
        messaging: Arc<MessagingProvider>,
    ) -> Self {
        Self {
            hub,
            dispatcher,
            messaging,
        }
    }
}
