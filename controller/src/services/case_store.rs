//! Directory-backed case store
//!
//! Pending cases live in one directory, archived (finished) cases in
//! another. A case is created by cloning a template directory and writing
//! each suggested value into its linked JSON configuration entry.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::case::{update_metadata, CaseRecord, METADATA_FILE};
use crate::error::{ControllerError, ControllerResult};
use crate::optimizer::search_space::EntryLink;
use crate::traits::CaseStore;
use shared::{atomic_write_json, process_debug, process_info, process_warn, read_json, Parametrization, ProcessId};

/// Objective outputs written by a case's evaluation step
pub const OBJECTIVES_FILE: &str = "objectives.json";

pub const DEFAULT_SCRIPT_PREFIX: &str = "Allrun";

/// Files never copied from the template into a new case
const TEMPLATE_EXCLUDES: [&str; 2] = [METADATA_FILE, OBJECTIVES_FILE];

pub struct DirectoryCaseStore {
    template: PathBuf,
    pending_dir: PathBuf,
    archive_dir: PathBuf,
    /// Dimension name → configuration entry
    links: BTreeMap<String, EntryLink>,
    script_prefix: String,
}

impl DirectoryCaseStore {
    pub fn new(
        template: impl AsRef<Path>,
        pending_dir: impl AsRef<Path>,
        archive_dir: impl AsRef<Path>,
        links: BTreeMap<String, EntryLink>,
    ) -> Self {
        Self {
            template: template.as_ref().to_path_buf(),
            pending_dir: pending_dir.as_ref().to_path_buf(),
            archive_dir: archive_dir.as_ref().to_path_buf(),
            links,
            script_prefix: DEFAULT_SCRIPT_PREFIX.to_string(),
        }
    }

    pub fn with_script_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.script_prefix = prefix.into();
        self
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Check that the template holds a submission script and every linked entry
    pub fn verify_template(&self) -> ControllerResult<()> {
        let template_name = self.template.display().to_string();
        if !self.template.is_dir() {
            return Err(ControllerError::case(&template_name, "template directory does not exist"));
        }
        if find_script(&self.template, &self.script_prefix).is_none() {
            return Err(ControllerError::case(
                &template_name,
                format!("no submission script starting with '{}'", self.script_prefix),
            ));
        }

        for (name, link) in &self.links {
            let path = self.template.join(&link.file);
            let document: Value = read_json(&path).map_err(ControllerError::artifact)?;
            if document.pointer(&link.pointer).is_none() {
                return Err(ControllerError::case(
                    &template_name,
                    format!("dimension '{}': no entry '{}' in {}", name, link.pointer, link.file.display()),
                ));
            }
        }

        process_debug!(ProcessId::current(), "Template {} verified ({} links)", template_name, self.links.len());
        Ok(())
    }

    /// Write suggested values into the case's linked configuration entries
    fn apply(&self, case_dir: &Path, parametrization: &Parametrization) -> ControllerResult<()> {
        let mut documents: BTreeMap<&Path, Value> = BTreeMap::new();

        for (name, value) in parametrization {
            let link = self
                .links
                .get(name)
                .ok_or_else(|| ControllerError::case(case_dir.display().to_string(), format!("dimension '{name}' is not linked")))?;

            let document = match documents.entry(link.file.as_path()) {
                std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::btree_map::Entry::Vacant(entry) => {
                    let loaded: Value = read_json(&case_dir.join(&link.file)).map_err(ControllerError::artifact)?;
                    entry.insert(loaded)
                }
            };

            let slot = document.pointer_mut(&link.pointer).ok_or_else(|| {
                ControllerError::case(
                    case_dir.display().to_string(),
                    format!("no entry '{}' in {}", link.pointer, link.file.display()),
                )
            })?;
            *slot = value.clone();
        }

        for (file, document) in documents {
            atomic_write_json(&case_dir.join(file), &document).map_err(ControllerError::artifact)?;
        }
        Ok(())
    }

    fn load_cases_in(dir: &Path, cases: &mut Vec<CaseRecord>) -> ControllerResult<()> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.join(METADATA_FILE).is_file() {
                continue;
            }
            match CaseRecord::load(&path) {
                Ok(case) => cases.push(case),
                Err(e) => process_warn!(ProcessId::current(), "⚠️ Skipping case {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

/// First file in `dir` whose name starts with `prefix`
fn find_script(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let mut scripts: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();
    scripts.sort();
    scripts.into_iter().next()
}

/// Recursively copy `source` into `destination`, skipping `excludes` at the top level
fn copy_tree(source: &Path, destination: &Path, excludes: &[&str]) -> io::Result<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(source).map_err(io::Error::other)?;
        if entry.depth() == 1 && excludes.iter().any(|name| relative == Path::new(name)) {
            continue;
        }

        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move a directory, falling back to copy + remove across filesystems
fn move_dir(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    fs::create_dir_all(destination)?;
    copy_tree(source, destination, &[])?;
    fs::remove_dir_all(source)
}

#[async_trait]
impl CaseStore for DirectoryCaseStore {
    async fn cases(&self) -> ControllerResult<Vec<CaseRecord>> {
        let mut cases = Vec::new();
        Self::load_cases_in(&self.pending_dir, &mut cases)?;
        Self::load_cases_in(&self.archive_dir, &mut cases)?;
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(cases)
    }

    async fn materialize(
        &self,
        name: &str,
        generation_index: &str,
        parametrization: &Parametrization,
    ) -> ControllerResult<CaseRecord> {
        let case_dir = self.pending_dir.join(name);
        if case_dir.exists() {
            return Err(ControllerError::case(name, "case directory already exists"));
        }

        fs::create_dir_all(&case_dir)?;
        copy_tree(&self.template, &case_dir, &TEMPLATE_EXCLUDES)?;
        self.apply(&case_dir, parametrization)?;

        let mut case = CaseRecord::new(name, &case_dir);
        case.generation_index = Some(generation_index.to_string());
        case.based_on = Some(self.template.clone());
        case.parameters = parametrization.clone();
        case.persist()?;

        let suggestion: Map<String, Value> = parametrization.clone().into_iter().collect();
        update_metadata(&case_dir, suggestion, Some("optimizer-suggestion"))?;

        process_info!(ProcessId::current(), "🧪 Created case '{}' ({})", name, generation_index);
        Ok(case)
    }

    async fn save(&self, case: &CaseRecord) -> ControllerResult<()> {
        case.persist()
    }

    async fn annotate(&self, case: &CaseRecord, header: &str, entries: Map<String, Value>) -> ControllerResult<()> {
        update_metadata(&case.path, entries, Some(header))
    }

    async fn archive(&self, working_directory: &Path) -> ControllerResult<Option<CaseRecord>> {
        let Some(dir_name) = working_directory.file_name() else {
            return Ok(None);
        };
        let destination = self.archive_dir.join(dir_name);

        if working_directory.join(METADATA_FILE).is_file() {
            fs::create_dir_all(&self.archive_dir)?;
            if destination.exists() {
                return Err(ControllerError::case(
                    dir_name.to_string_lossy(),
                    format!("archive destination {} already exists", destination.display()),
                ));
            }
            move_dir(working_directory, &destination)?;
        } else if !destination.join(METADATA_FILE).is_file() {
            process_warn!(
                ProcessId::current(),
                "⚠️ {} holds no case, nothing to archive",
                working_directory.display()
            );
            return Ok(None);
        }

        let mut case = CaseRecord::load(&destination)?;
        case.path = destination;
        case.persist()?;
        process_debug!(ProcessId::current(), "Archived {} into {}", case.name, case.path.display());
        Ok(Some(case))
    }

    async fn objective_outputs(&self, case: &CaseRecord) -> ControllerResult<Option<BTreeMap<String, f64>>> {
        let path = case.path.join(OBJECTIVES_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let raw: Map<String, Value> = match read_json(&path) {
            Ok(raw) => raw,
            Err(e) => {
                process_warn!(ProcessId::current(), "⚠️ Unreadable objectives for case '{}': {}", case.name, e);
                return Ok(None);
            }
        };

        let outputs: Option<BTreeMap<String, f64>> = raw
            .into_iter()
            .map(|(name, value)| value.as_f64().filter(|v| v.is_finite()).map(|v| (name, v)))
            .collect();
        Ok(outputs.filter(|outputs| !outputs.is_empty()))
    }

    fn submission_script(&self, case: &CaseRecord) -> Option<PathBuf> {
        find_script(&case.path, &self.script_prefix)
    }
}
