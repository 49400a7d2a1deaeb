//! Database URL resolution.
//!
//! Config stores only the env var NAME; the URL is read once here and passed
//! to constructors. `Debug` redacts the value and error messages name the
//! variable, never its content.

use anyhow::{bail, Result};

use crate::EngineSettings;

#[derive(Clone)]
pub struct DatabaseUrl {
    env_name: String,
    url: String,
}

impl DatabaseUrl {
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn expose(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseUrl")
            .field("env_name", &self.env_name)
            .field("url", &"<REDACTED>")
            .finish()
    }
}

/// Read the database URL from the env var named in `settings`.
pub fn resolve_database_url(settings: &EngineSettings) -> Result<DatabaseUrl> {
    resolve_with(settings, |name| std::env::var(name).ok())
}

fn resolve_with<F>(settings: &EngineSettings, lookup: F) -> Result<DatabaseUrl>
where
    F: Fn(&str) -> Option<String>,
{
    let name = settings.database_url_env.as_str();
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(DatabaseUrl {
            env_name: name.to_string(),
            url: v,
        }),
        Some(_) => bail!("CONFIG_SECRET_EMPTY: env var {name} is set but empty"),
        None => bail!("CONFIG_SECRET_MISSING: env var {name} is not set"),
    }
}
