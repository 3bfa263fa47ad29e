use crate::config::Settings;

/// Provider credentials for a single request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ClientConfig {
    /// Request values win over the process defaults. Empty strings count as
    /// not supplied. Nothing is validated here; a bad key only fails once the
    /// provider is called.
    pub fn resolve(api_key: Option<&str>, base_url: Option<&str>, defaults: &Settings) -> Self {
        Self {
            api_key: pick(api_key, defaults.api_key.as_deref()),
            base_url: pick(base_url, defaults.base_url.as_deref()),
        }
    }
}

fn pick(requested: Option<&str>, default: Option<&str>) -> Option<String> {
    requested
        .filter(|value| !value.is_empty())
        .or(default)
        .map(str::to_owned)
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
