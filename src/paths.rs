use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};

fn home_dir() -> anyhow::Result<PathBuf> {
    // On Unix, HOME is standard. (Windows support can be expanded later.)
    let home = env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home))
}

fn ensure_dir(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))?;
    Ok(path.to_path_buf())
}

fn app_home() -> Option<PathBuf> {
    env::var_os("GEMINI_CHAT_HOME").map(PathBuf::from)
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    if let Some(base) = app_home() {
        return ensure_dir(&base.join("config"));
    }

    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return ensure_dir(&xdg.join("gemini-chat"));
    }

    ensure_dir(&home_dir()?.join(".config").join("gemini-chat"))
}

/// Directory for generated images; the system temp dir unless configured.
pub fn artifact_dir(configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    match configured {
        Some(dir) => ensure_dir(dir),
        None => Ok(env::temp_dir()),
    }
}
