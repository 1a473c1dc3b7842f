//! Driver configuration: CLI flags layered over an optional `loom.toml`
//! (§6's CLI surface). Flags always win over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// On-disk configuration, merged with CLI flags in [`Config::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub trace: Option<u32>,
    pub tracestack: Option<bool>,
    pub dbg: Option<bool>,
    pub appname: Option<String>,
}

impl FileConfig {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("failed to parse loom.toml: {e}"))
    }

    /// `~/.loom/loom.toml`, the default config path if none is given
    /// explicitly. Returns `None` if the home directory can't be found.
    pub fn default_path() -> Option<PathBuf> {
        home::home_dir().map(|dir| dir.join(".loom").join("loom.toml"))
    }
}

/// The fully-resolved driver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub trace_level: u32,
    pub trace_stack: bool,
    pub record_debug: bool,
    pub appname: Option<String>,
}

impl Config {
    /// Merge an optional on-disk file with the CLI's explicitly-set flags.
    /// `trace`/`tracestack`/`dbg`/`appname` from the CLI override the file
    /// only when the user actually passed them.
    pub fn resolve(
        file: Option<FileConfig>,
        trace: Option<u32>,
        tracestack: bool,
        dbg: bool,
        appname: Option<String>,
    ) -> Self {
        let file = file.unwrap_or_default();
        Config {
            trace_level: trace.or(file.trace).unwrap_or(0),
            trace_stack: tracestack || file.tracestack.unwrap_or(false),
            record_debug: dbg || file.dbg.unwrap_or(false),
            appname: appname.or(file.appname),
        }
    }

    pub fn load_file(path: &Path) -> Result<Option<FileConfig>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        FileConfig::from_toml(&text).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_file_config() {
        let file = FileConfig {
            trace: Some(1),
            tracestack: Some(true),
            dbg: Some(false),
            appname: Some("from-file".into()),
        };
        let config = Config::resolve(Some(file), Some(3), false, true, None);
        assert_eq!(config.trace_level, 3);
        assert!(config.trace_stack, "file's tracestack should still apply when the flag is absent");
        assert!(config.record_debug);
        assert_eq!(config.appname.as_deref(), Some("from-file"));
    }

    #[test]
    fn defaults_with_no_file_and_no_flags() {
        let config = Config::resolve(None, None, false, false, None);
        assert_eq!(config.trace_level, 0);
        assert!(!config.trace_stack);
        assert!(!config.record_debug);
        assert_eq!(config.appname, None);
    }
}
