//! On-disk mock store.
//!
//! Layout under the environment root:
//!
//! ```text
//! <root>/hot_mocks.yml                     canonical collection
//! <root>/**/*.{yml,yaml}                   extra read-only fixtures
//! <root>/scenarios/<name>/hot_mocks.yml    canonical collection of a scenario
//! <root>/scenarios/<name>/**/*.{yml,yaml}  extra fixtures of a scenario
//! ```
//!
//! Writes always target the canonical file of a scope and rewrite it in full.
//! There is no locking: concurrent writers race and the last one wins.
//! Callers that need isolation should use distinct roots.

use crate::config::{DEFAULT_FILE_NAME, SCENARIOS_DIR};
use crate::error::{HotMockError, Result};
use crate::mock::{HttpMethod, MockRecord};
use globset::{Glob, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const COLLECTION_GLOB: &str = "*.{yml,yaml}";

fn collection_matcher() -> &'static GlobMatcher {
    static MATCHER: OnceLock<GlobMatcher> = OnceLock::new();
    MATCHER.get_or_init(|| {
        Glob::new(COLLECTION_GLOB)
            .expect("collection glob is a valid constant")
            .compile_matcher()
    })
}

/// File-backed collection of mock records for one environment.
#[derive(Debug, Clone)]
pub struct MockStore {
    root: PathBuf,
}

impl MockStore {
    /// Create a store rooted at the environment directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a scope: the root, or a scenario subtree.
    pub fn scope_dir(&self, scenario: Option<&str>) -> PathBuf {
        match scenario {
            Some(name) => self.scenarios_dir().join(name),
            None => self.root.clone(),
        }
    }

    /// Canonical collection file of a scope.
    pub fn canonical_file(&self, scenario: Option<&str>) -> PathBuf {
        self.scope_dir(scenario).join(DEFAULT_FILE_NAME)
    }

    fn scenarios_dir(&self) -> PathBuf {
        self.root.join(SCENARIOS_DIR)
    }

    /// Collection files visible in a scope, in match precedence order.
    ///
    /// Files of the active scenario come first, then the root's files
    /// (excluding every scenario subtree). Each group is sorted by path.
    pub fn collection_files(&self, scenario: Option<&str>) -> Vec<PathBuf> {
        let mut files = Vec::new();

        if let Some(name) = scenario {
            let mut scenario_files = Vec::new();
            collect_files(&self.scope_dir(Some(name)), None, &mut scenario_files);
            scenario_files.sort();
            files.extend(scenario_files);
        }

        let mut root_files = Vec::new();
        let excluded = self.scenarios_dir();
        collect_files(&self.root, Some(&excluded), &mut root_files);
        root_files.sort();
        files.extend(root_files);

        files
    }

    /// Load every record visible in a scope.
    ///
    /// Unreadable or malformed files contribute nothing.
    pub fn load(&self, scenario: Option<&str>) -> Vec<MockRecord> {
        let mut records = Vec::new();
        for path in self.collection_files(scenario) {
            match read_collection(&path) {
                Ok(Some(file_records)) => records.extend(file_records),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping mock collection"),
            }
        }
        debug!(
            root = %self.root.display(),
            scenario = ?scenario,
            records = records.len(),
            "Loaded mocks"
        );
        records
    }

    /// Records of the canonical file of a scope.
    pub fn load_canonical(&self, scenario: Option<&str>) -> Result<Vec<MockRecord>> {
        Ok(read_collection(&self.canonical_file(scenario))?.unwrap_or_default())
    }

    /// Replace any record with the same (method, url_pattern) and append `record`.
    pub fn upsert(&self, scenario: Option<&str>, record: MockRecord) -> Result<()> {
        self.ensure_exists(scenario)?;
        let path = self.canonical_file(scenario);

        let mut records = read_collection(&path)?.unwrap_or_default();
        records.retain(|r| !r.same_key(record.method, &record.url_pattern));
        debug!(
            path = %path.display(),
            method = ?record.method,
            url_pattern = %record.url_pattern,
            "Upserting mock"
        );
        records.push(record);

        write_collection(&path, &records)
    }

    /// Remove records with the given key. Returns whether anything was removed.
    pub fn delete(
        &self,
        scenario: Option<&str>,
        method: Option<HttpMethod>,
        url_pattern: &str,
    ) -> Result<bool> {
        let path = self.canonical_file(scenario);
        let Some(mut records) = read_collection(&path)? else {
            return Ok(false);
        };

        let before = records.len();
        records.retain(|r| !r.same_key(method, url_pattern));
        if records.len() == before {
            return Ok(false);
        }

        write_collection(&path, &records)?;
        Ok(true)
    }

    /// Create the scope directory and an empty canonical file if absent.
    pub fn ensure_exists(&self, scenario: Option<&str>) -> Result<()> {
        let dir = self.scope_dir(scenario);
        fs::create_dir_all(&dir).map_err(|e| HotMockError::io(&dir, e))?;

        let path = dir.join(DEFAULT_FILE_NAME);
        if !path.exists() {
            write_collection(&path, &[])?;
        }
        Ok(())
    }

    /// Names of all scenarios, sorted.
    pub fn scenarios(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.scenarios_dir()) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

/// Recursively collect collection files under `dir`, skipping `exclude`.
fn collect_files(dir: &Path, exclude: Option<&Path>, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if exclude != Some(path.as_path()) {
                collect_files(&path, exclude, out);
            }
        } else if collection_matcher().is_match(entry.file_name()) {
            out.push(path);
        }
    }
}

/// Read one collection file.
///
/// `Ok(None)` when the file does not exist; empty or `null` documents and
/// non-list documents read as an empty collection.
fn read_collection(path: &Path) -> Result<Option<Vec<MockRecord>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HotMockError::io(path, e)),
    };

    if content.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|source| HotMockError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    if !value.is_sequence() {
        if !value.is_null() {
            warn!(path = %path.display(), "Mock collection is not a list, ignoring contents");
        }
        return Ok(Some(Vec::new()));
    }

    // Parsed from text so scalar header values like `Content-Length: 12` read as strings.
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|source| HotMockError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn write_collection(path: &Path, records: &[MockRecord]) -> Result<()> {
    let yaml = serde_yaml::to_string(records).map_err(|source| HotMockError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, yaml).map_err(|e| HotMockError::io(path, e))
}
