use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::rules::{LoadMode, RuleConfiguration};
use crate::{Panel, StorageError};

const RULES_FILE: &str = "rules.json";
const RESULTS_DIR: &str = "results";

/// Overrides the store root when set.
pub const HOME_ENV: &str = "PANELQC_HOME";

/// File layout for rules and review results:
///
/// ```text
/// <root>/rules.json
/// <root>/results/<panel_id>.<ext>
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.panelqc/`, or `./.panelqc/` when there is no home directory.
    pub fn default_location() -> Self {
        Self::new(
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".panelqc"),
        )
    }

    /// `$PANELQC_HOME` if set, otherwise [`Store::default_location`].
    pub fn from_env() -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(root) if !root.is_empty() => Self::new(root),
            _ => Self::default_location(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules_path(&self) -> PathBuf {
        self.root.join(RULES_FILE)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    /// Load the rule set, falling back to the defaults when no file exists.
    pub fn read_rules(&self, mode: LoadMode) -> Result<RuleConfiguration, StorageError> {
        let path = self.rules_path();
        if !path.exists() {
            return Ok(RuleConfiguration::default());
        }
        let raw = fs::read_to_string(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        RuleConfiguration::from_json(&raw, mode)
            .map_err(|source| StorageError::Config { path, source })
    }

    pub fn write_rules(&self, config: &RuleConfiguration) -> Result<(), StorageError> {
        let path = self.rules_path();
        let json = serde_json::to_string_pretty(config).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&self.root, RULES_FILE, &json)?;
        Ok(())
    }

    pub fn read_panel(path: &Path) -> Result<Panel, StorageError> {
        let raw = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write `results/<panel_id>.<extension>` and return its path.
    pub fn write_result(
        &self,
        panel_id: &str,
        extension: &str,
        data: &str,
    ) -> Result<PathBuf, StorageError> {
        let name = format!("{}.{}", file_stem(panel_id), extension);
        write_atomic(&self.results_dir(), &name, data)
    }

    /// File stems with at least one stored result, sorted. A stem is the
    /// panel id itself unless the id needed sanitizing (see `file_stem`).
    pub fn list_results(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.results_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let entries = fs::read_dir(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    return None;
                }
                Path::new(&name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

/// Temp file + rename, so readers never see a half-written file.
fn write_atomic(dir: &Path, name: &str, data: &str) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let tmp = dir.join(format!(".{}.tmp", name));
    let path = dir.join(name);
    fs::write(&tmp, data).map_err(io_error(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_error(&path))?;
    Ok(path)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

fn is_file_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Keep panel ids usable as file names. An id that needs sanitizing gets a
/// `~` and a short hash of the raw id appended, so it never lands on the
/// file of another panel.
fn file_stem(panel_id: &str) -> String {
    if !panel_id.is_empty() && panel_id.chars().all(is_file_safe) {
        return panel_id.to_string();
    }
    let mut stem: String = panel_id
        .chars()
        .map(|c| if is_file_safe(c) { c } else { '_' })
        .collect();
    stem.push('~');
    for b in &Sha256::digest(panel_id.as_bytes())[..4] {
        stem.push_str(&format!("{:02x}", b));
    }
    stem
}
