use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CatalogCache, LoadCache, LoadOutcome};
use crate::config::Config;
use crate::data::loader;
use crate::spec::describe::{metadata_rows, MetadataRow};
use crate::spec::matcher::{find_matching_spec, SpecMatch};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Metadata,
    Data,
}

/// What the data directory currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// The directory does not exist or cannot be read.
    Missing(String),
    Empty,
    Files(Vec<String>),
}

/// Everything shown for the selected file.
pub struct Selection {
    pub file: String,
    pub outcome: Arc<LoadOutcome>,
    pub spec_match: Option<SpecMatch>,
    /// `None` when neither native metadata nor a specification describes
    /// the dataset.
    pub metadata: Option<Vec<MetadataRow>>,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: Config,

    /// Contents of the directory text field.
    pub dir_input: String,

    pub listing: Listing,

    pub selection: Option<Selection>,

    pub tab: Tab,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    loads: LoadCache,
    catalogs: CatalogCache,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let mut state = Self {
            dir_input: config.data_dir.display().to_string(),
            config,
            listing: Listing::Empty,
            selection: None,
            tab: Tab::Metadata,
            status_message: None,
            loads: LoadCache::default(),
            catalogs: CatalogCache::default(),
        };
        state.rescan();
        state
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Switch to another data directory and select its first file.
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        if dir == self.config.data_dir && self.selection.is_some() {
            return;
        }
        log::info!("data directory: {}", dir.display());
        self.dir_input = dir.display().to_string();
        self.config.data_dir = dir;
        self.rescan();
    }

    /// Drop every cached load and catalog, then list the directory again.
    pub fn refresh(&mut self) {
        self.loads.clear();
        self.catalogs.clear();
        let previous = self.selection.as_ref().map(|s| s.file.clone());
        self.rescan();
        if let (Some(file), Listing::Files(files)) = (previous, &self.listing) {
            if files.contains(&file) {
                self.select_file(&file);
            }
        }
    }

    fn rescan(&mut self) {
        self.selection = None;
        self.status_message = None;
        let dir = self.config.data_dir.clone();
        self.listing = if !dir.is_dir() {
            Listing::Missing(format!("Directory does not exist: {}", dir.display()))
        } else {
            match loader::list_files(&dir) {
                Ok(files) if files.is_empty() => Listing::Empty,
                Ok(files) => Listing::Files(files),
                Err(e) => {
                    log::error!("listing {}: {e}", dir.display());
                    Listing::Missing(format!("Cannot read directory {}: {e}", dir.display()))
                }
            }
        };
        let first = match &self.listing {
            Listing::Files(files) => files.first().cloned(),
            _ => None,
        };
        if let Some(first) = first {
            self.select_file(&first);
        }
    }

    /// Load `file`, match it against the directory's specifications and build
    /// its metadata rows.
    pub fn select_file(&mut self, file: &str) {
        let Listing::Files(files) = &self.listing else {
            return;
        };
        let dir = self.config.data_dir.clone();
        let outcome = self.loads.get_or_load(&dir, file);

        let (spec_match, metadata) = match &*outcome {
            LoadOutcome::Loaded(loaded) => {
                let catalog = self
                    .catalogs
                    .get_or_build(&dir, files, &self.config.legacy_spec_file);
                let spec_match = find_matching_spec(file, &loaded.table, &catalog);
                let metadata = metadata_rows(
                    &loaded.table,
                    spec_match.as_ref().map(|m| &m.table),
                    loaded.native.as_ref(),
                );
                (spec_match, metadata)
            }
            _ => (None, None),
        };

        self.status_message = match &*outcome {
            LoadOutcome::Failed(message) => Some(format!("Error loading file {file}: {message}")),
            _ => None,
        };
        self.selection = Some(Selection {
            file: file.to_string(),
            outcome,
            spec_match,
            metadata,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;
    use crate::data::xport::fixture::{Cell, XptBuilder};
    use crate::spec::matcher::MatchRule;

    fn demo_xpt() -> Vec<u8> {
        XptBuilder::new("DEMO")
            .character("USUBJID", "Unique Subject", 8)
            .numeric("AGE", "Age", "")
            .row(vec![Cell::Char("S-001".into()), Cell::Num(Some(42.0))])
            .build()
    }

    fn state_for(dir: &Path) -> AppState {
        AppState::new(Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        })
    }

    fn row<'a>(state: &'a AppState, variable: &str) -> &'a MetadataRow {
        let rows = state.selection.as_ref().unwrap().metadata.as_ref().unwrap();
        rows.iter().find(|r| r.variable == variable).unwrap()
    }

    #[test]
    fn legacy_spec_describes_transport_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.xpt"), demo_xpt()).unwrap();
        std::fs::write(
            dir.path().join("SDTM_spec_Variables.csv"),
            "H$0$DM$USUBJID$Subject ID$Char\n",
        )
        .unwrap();

        let mut state = state_for(dir.path());
        state.select_file("demo.xpt");

        let selection = state.selection.as_ref().unwrap();
        let m = selection.spec_match.as_ref().unwrap();
        assert_eq!(m.source, "SDTM_spec_Variables.csv");
        assert_eq!(m.rule, MatchRule::ColumnOverlap);

        let usubjid = row(&state, "USUBJID");
        assert_eq!(usubjid.number, 1);
        assert_eq!(usubjid.label, "Subject ID");
        assert_eq!(usubjid.data_type, "Char");

        let age = row(&state, "AGE");
        assert_eq!(age.label, "Age");
        assert_eq!(age.data_type, "double");
        assert_eq!(age.length, "8");
    }

    #[test]
    fn csv_without_specs_has_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.csv"), "A,B\n1,x\n2,y\n").unwrap();

        let state = state_for(dir.path());
        let selection = state.selection.as_ref().unwrap();
        assert_eq!(selection.file, "demo.csv");
        assert!(selection.spec_match.is_none());
        assert!(selection.metadata.is_none());
        let LoadOutcome::Loaded(loaded) = &*selection.outcome else {
            panic!("expected a loaded file");
        };
        assert_eq!(loaded.table.n_rows(), 2);
        assert_eq!(loaded.table.n_cols(), 2);
    }

    #[test]
    fn file_name_match_beats_other_specs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.xpt"), demo_xpt()).unwrap();
        std::fs::write(
            dir.path().join("demo_vars.csv"),
            "Variable,Label\nUSUBJID,From demo spec\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("other_vars.csv"),
            "Variable,Label\nUSUBJID,From other spec\nAGE,Other age\n",
        )
        .unwrap();

        let mut state = state_for(dir.path());
        state.select_file("demo.xpt");

        let m = state.selection.as_ref().unwrap().spec_match.as_ref().unwrap();
        assert_eq!(m.source, "demo_vars.csv");
        assert_eq!(m.rule, MatchRule::FileName);
        assert_eq!(row(&state, "USUBJID").label, "From demo spec");
        // Not in the matched spec, so native metadata fills in.
        assert_eq!(row(&state, "AGE").label, "Age");
    }

    #[test]
    fn missing_and_empty_directories_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir.path().join("nope"));
        assert!(matches!(state.listing, Listing::Missing(_)));
        assert!(state.selection.is_none());

        let state = state_for(dir.path());
        assert_eq!(state.listing, Listing::Empty);
    }

    #[test]
    fn load_failure_sets_status_and_clears_views() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.sas7bdat"), b"nope").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let mut state = state_for(dir.path());
        let message = state.status_message.clone().unwrap();
        assert!(message.contains("broken.sas7bdat"));
        assert!(state.selection.as_ref().unwrap().metadata.is_none());

        state.select_file("notes.txt");
        assert!(state.status_message.is_none());
        assert!(matches!(
            &*state.selection.as_ref().unwrap().outcome,
            LoadOutcome::Unsupported
        ));
    }

    #[test]
    fn refresh_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("demo.csv"), "USUBJID,AGE\nS-1,30\n").unwrap();
        let mut state = state_for(dir.path());
        assert!(state.selection.as_ref().unwrap().metadata.is_none());

        std::fs::write(dir.path().join("demo_spec.csv"), "Variable,Label\nAGE,Age\n").unwrap();
        state.refresh();

        let selection = state.selection.as_ref().unwrap();
        assert_eq!(selection.file, "demo.csv");
        assert_eq!(row(&state, "AGE").label, "Age");
        assert_eq!(row(&state, "USUBJID").label, "");
        let LoadOutcome::Loaded(loaded) = &*selection.outcome else {
            panic!("expected a loaded file");
        };
        assert_eq!(loaded.table.cell(0, 1), Some(&CellValue::Integer(30)));
    }

    #[test]
    fn switching_directory_resets_the_selection() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("a.csv"), "X\n1\n").unwrap();
        std::fs::write(second.path().join("b.csv"), "Y\n2\n").unwrap();

        let mut state = state_for(first.path());
        assert_eq!(state.selection.as_ref().unwrap().file, "a.csv");

        state.set_data_dir(second.path().to_path_buf());
        assert_eq!(state.selection.as_ref().unwrap().file, "b.csv");
        assert_eq!(state.dir_input, second.path().display().to_string());
    }
}
