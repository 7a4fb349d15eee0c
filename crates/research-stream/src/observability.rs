use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    for key in ["RESEARCH_OBSERVABILITY_ENABLED", "RESEARCH_OBSERVABILITY"] {
        if let Ok(value) = std::env::var(key) {
            return parse_bool_env(&value).unwrap_or(true);
        }
    }
    true
}

fn resolve_env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var("RESEARCH_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `RESEARCH_OBSERVABILITY_ENABLED` / `RESEARCH_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `RESEARCH_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `RESEARCH_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, or its directory cannot be created, logs go to stderr in a compact console
///   format; stdout is left to the caller.
/// - `RUST_LOG`: optional filter override.
///
/// `default_level` applies when neither filter variable is set.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter(default_level);
        let target = std::env::var("RESEARCH_JSON_LOG_PATH")
            .ok()
            .map(|raw| json_log_target(Path::new(&raw)));
        match target {
            Some(Ok((dir, file_name))) => {
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            fallback => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
                if let Some(Err(err)) = fallback {
                    tracing::warn!(error = %err, "JSON log file unavailable, logging to stderr");
                }
            }
        }
    });
}

/// Directory and file name for the JSONL log, creating the directory.
fn json_log_target(path: &Path) -> std::io::Result<(PathBuf, String)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("research.logs.jsonl");
    Ok((dir.to_path_buf(), file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_flags() {
        assert_eq!(parse_bool_env(" Enabled "), Some(true));
        assert_eq!(parse_bool_env("off"), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn json_log_target_creates_the_directory() {
        let root = std::env::temp_dir().join(format!("research-logs-{}", uuid::Uuid::new_v4()));
        let (dir, file_name) =
            json_log_target(&root.join("nested").join("run.jsonl")).expect("target");
        assert!(dir.is_dir());
        assert_eq!(file_name, "run.jsonl");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn json_log_target_reports_unusable_directory() {
        let blocker = std::env::temp_dir().join(format!("research-logs-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").expect("write");
        assert!(json_log_target(&blocker.join("run.jsonl")).is_err());
        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn init_is_idempotent() {
        init_observability("warn");
        init_observability("debug");
    }
}
