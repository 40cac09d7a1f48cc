use crate::configuration::ChatSettings;
use chatbridge::providers::configs::ProviderConfig;

/// Shared application state, built once at startup and cloned into each request
#[derive(Clone)]
pub struct AppState {
    pub provider_config: ProviderConfig,
    pub chat: ChatSettings,
}
