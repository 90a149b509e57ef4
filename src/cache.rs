use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::loader;
use crate::data::model::LoadedFile;
use crate::spec::catalog::{build_catalog, candidate_files, SpecCatalog};

// ---------------------------------------------------------------------------
// Dataset loads
// ---------------------------------------------------------------------------

/// What selecting a file produced. Failures are kept so that reselecting a
/// broken file shows the same message without reading it again.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedFile),
    Unsupported,
    Failed(String),
}

/// Loaded files keyed by `(directory, file name)`.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: HashMap<(PathBuf, String), Arc<LoadOutcome>>,
}

impl LoadCache {
    pub fn get_or_load(&mut self, dir: &Path, file: &str) -> Arc<LoadOutcome> {
        let key = (dir.to_path_buf(), file.to_string());
        if let Some(hit) = self.entries.get(&key) {
            log::debug!("load cache hit for {file}");
            return Arc::clone(hit);
        }

        let path = dir.join(file);
        let outcome = match loader::load_file(&path) {
            Ok(Some(loaded)) => {
                log::info!(
                    "loaded {file}: {} rows x {} columns",
                    loaded.table.n_rows(),
                    loaded.table.n_cols()
                );
                LoadOutcome::Loaded(loaded)
            }
            Ok(None) => LoadOutcome::Unsupported,
            Err(e) => {
                log::warn!("failed to load {}: {e:#}", path.display());
                LoadOutcome::Failed(format!("{e:#}"))
            }
        };
        let outcome = Arc::new(outcome);
        self.entries.insert(key, Arc::clone(&outcome));
        outcome
    }

    pub fn clear(&mut self) {
        log::debug!("dropping {} cached load(s)", self.len());
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Specification catalogs
// ---------------------------------------------------------------------------

/// Catalogs keyed by directory and the set of candidate files in it, so a
/// changed listing builds a new catalog.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: HashMap<(PathBuf, Vec<String>), Arc<SpecCatalog>>,
}

impl CatalogCache {
    pub fn get_or_build(&mut self, dir: &Path, files: &[String], legacy_name: &str) -> Arc<SpecCatalog> {
        let key = (dir.to_path_buf(), candidate_files(files));
        if let Some(hit) = self.entries.get(&key) {
            log::debug!("catalog cache hit for {}", dir.display());
            return Arc::clone(hit);
        }
        let catalog = Arc::new(build_catalog(dir, &key.1, legacy_name));
        self.entries.insert(key, Arc::clone(&catalog));
        catalog
    }

    pub fn clear(&mut self) {
        log::debug!("dropping {} cached catalog(s)", self.len());
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::legacy::LEGACY_SPEC_FILE;

    #[test]
    fn repeated_loads_do_not_reread_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.csv");
        std::fs::write(&path, "A\n1\n").unwrap();

        let mut cache = LoadCache::default();
        let first = cache.get_or_load(dir.path(), "demo.csv");
        std::fs::remove_file(&path).unwrap();
        let second = cache.get_or_load(dir.path(), "demo.csv");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(&*second, LoadOutcome::Loaded(f) if f.table.n_rows() == 1));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(matches!(&*cache.get_or_load(dir.path(), "demo.csv"), LoadOutcome::Failed(_)));
    }

    #[test]
    fn failures_and_unsupported_files_are_remembered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.xpt"), b"garbage").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();

        let mut cache = LoadCache::default();
        let failed = cache.get_or_load(dir.path(), "bad.xpt");
        let LoadOutcome::Failed(message) = &*failed else {
            panic!("expected a failure");
        };
        assert!(message.contains("SAS transport"));
        assert!(matches!(&*cache.get_or_load(dir.path(), "notes.txt"), LoadOutcome::Unsupported));
        assert!(Arc::ptr_eq(&failed, &cache.get_or_load(dir.path(), "bad.xpt")));
    }

    #[test]
    fn catalog_is_rebuilt_when_the_listing_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_vars.csv"), "Variable\nX\n").unwrap();

        let mut cache = CatalogCache::default();
        let files = loader::list_files(dir.path()).unwrap();
        let first = cache.get_or_build(dir.path(), &files, LEGACY_SPEC_FILE);
        assert_eq!(first.len(), 1);

        // Data files do not take part in the key.
        let mut with_data = files.clone();
        with_data.push("demo.xpt".into());
        let same = cache.get_or_build(dir.path(), &with_data, LEGACY_SPEC_FILE);
        assert!(Arc::ptr_eq(&first, &same));

        std::fs::write(dir.path().join("b_vars.csv"), "Variable\nY\n").unwrap();
        let files = loader::list_files(dir.path()).unwrap();
        let rebuilt = cache.get_or_build(dir.path(), &files, LEGACY_SPEC_FILE);
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(cache.len(), 2);
    }
}
