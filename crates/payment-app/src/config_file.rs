use std::path::{Path, PathBuf};

use payment_model::ConfigDiscovery;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("no configuration file found (tried {0})")]
    NotFound(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Finds and reads the configuration, returning its path and contents.
pub async fn load(
    discovery: ConfigDiscovery,
    explicit: Option<String>,
) -> Result<(String, String), ConfigFileError> {
    let from_env = std::env::var(discovery.env_var)
        .ok()
        .filter(|v| !v.trim().is_empty());
    // an explicitly named file must exist; fallbacks are tried in order
    let pinned = explicit.is_some() || from_env.is_some();
    let paths = candidates(&discovery, explicit, from_env, dirs::home_dir());

    for path in &paths {
        if !pinned && !tokio::fs::try_exists(path).await.unwrap_or(false) {
            continue;
        }
        let display = path.display().to_string();
        return match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok((display, contents)),
            Err(source) => Err(ConfigFileError::Read {
                path: display,
                source,
            }),
        };
    }
    let tried: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Err(ConfigFileError::NotFound(tried.join(", ")))
}

fn candidates(
    discovery: &ConfigDiscovery,
    explicit: Option<String>,
    from_env: Option<String>,
    home: Option<PathBuf>,
) -> Vec<PathBuf> {
    if let Some(path) = explicit.or(from_env) {
        return vec![expand_home(&path, home.as_deref())];
    }
    discovery
        .fallback_paths
        .iter()
        .map(|path| expand_home(path, home.as_deref()))
        .collect()
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
