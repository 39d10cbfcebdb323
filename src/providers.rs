use std::sync::Arc;
use std::time::Duration;

use completion_provider::CompletionProvider;
use completion_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use completion_provider_openai::{OpenAiProvider, OpenAiProviderConfig, OPENAI_PROVIDER_ID};

use crate::config::EnvConfig;

pub const DEFAULT_PROVIDER_ID: &str = OPENAI_PROVIDER_ID;
pub const PROVIDER_ENV_VAR: &str = "GPTREPL_PROVIDER";
/// Bound on TCP and TLS setup for each request attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether `provider_id` talks to a remote service and so needs a key.
pub fn requires_api_key(provider_id: &str) -> bool {
    provider_id == OPENAI_PROVIDER_ID
}

pub fn openai_config(api_key: Option<&str>, env: &EnvConfig) -> OpenAiProviderConfig {
    let mut config = OpenAiProviderConfig::new(api_key.unwrap_or_default())
        .with_connect_timeout(DEFAULT_CONNECT_TIMEOUT);
    if let Some(base_url) = env.base_url.as_deref() {
        config = config.with_base_url(base_url);
    }
    if let Some(organization) = env.organization.as_deref() {
        config = config.with_organization(organization);
    }
    config
}

pub fn provider_for_id(
    provider_id: &str,
    api_key: Option<&str>,
    env: &EnvConfig,
) -> Result<Arc<dyn CompletionProvider>, String> {
    match provider_id {
        OPENAI_PROVIDER_ID => {
            let provider = OpenAiProvider::new(openai_config(api_key, env))
                .map_err(|error| error.to_string())?;
            Ok(Arc::new(provider))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::new())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {OPENAI_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
