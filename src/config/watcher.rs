//! Configuration file watcher for hot reload of API keys.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::config::schema::{AuthConfig, WalletApiConfig};

/// Watches the config file and swaps in new `[auth]` keys.
///
/// Other sections are read once at startup; edits to them are logged and
/// otherwise ignored until restart.
pub struct ConfigWatcher {
    path: PathBuf,
    auth: Arc<ArcSwap<AuthConfig>>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, auth: Arc<ArcSwap<AuthConfig>>) -> Self {
        Self {
            path: path.to_path_buf(),
            auth,
        }
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for notifications to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let auth = self.auth.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => match load_config(&path) {
                    Ok(config) => {
                        if apply_auth(&auth, &config) {
                            tracing::info!(path = %path.display(), "API keys reloaded");
                        } else {
                            tracing::info!(
                                path = %path.display(),
                                "Config changed; only [auth] is reloaded, other sections need a restart"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current keys");
                    }
                },
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Swap in the keys of `config` if they differ. Returns whether they did.
pub fn apply_auth(current: &ArcSwap<AuthConfig>, config: &WalletApiConfig) -> bool {
    if **current.load() == config.auth {
        return false;
    }
    current.store(Arc::new(config.auth.clone()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_auth_only_on_change() {
        let current = ArcSwap::from_pointee(AuthConfig::default());
        let mut config = WalletApiConfig::default();
        assert!(!apply_auth(&current, &config));

        config.auth.user_api_key = "rotated".to_string();
        assert!(apply_auth(&current, &config));
        assert_eq!(current.load().user_api_key, "rotated");
        assert!(!apply_auth(&current, &config));
    }
}
