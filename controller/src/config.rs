//! Campaign configuration stored as `<data-dir>/campaign.json`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::state::{DEFAULT_JOB_PREFIX, DEFAULT_MONITORING_INTERVAL_SECONDS};
use crate::core::tracker::TrackerSettings;
use crate::error::{ControllerError, ControllerResult};
use crate::optimizer::search_space::{validate_dimensions, EntryLink};
use crate::optimizer::OptimizerSettings;
use crate::services::case_store::DEFAULT_SCRIPT_PREFIX;
use shared::{atomic_write_json, read_json};

pub const CONFIG_FILE: &str = "campaign.json";

fn default_pending_dir() -> PathBuf {
    PathBuf::from("cases_pending")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("cases_archive")
}

fn default_template_path() -> PathBuf {
    PathBuf::from("template")
}

fn default_script_prefix() -> String {
    DEFAULT_SCRIPT_PREFIX.to_string()
}

fn default_scheduler_type() -> String {
    "local".to_string()
}

fn default_job_prefix() -> String {
    DEFAULT_JOB_PREFIX.to_string()
}

fn default_monitoring_interval() -> f64 {
    DEFAULT_MONITORING_INTERVAL_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSection {
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_pending_dir")]
    pub pending_dir: PathBuf,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSection {
    #[serde(default = "default_template_path")]
    pub path: PathBuf,
    /// File name prefix of the script that runs a case
    #[serde(default = "default_script_prefix")]
    pub submission_script: String,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            path: default_template_path(),
            submission_script: default_script_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSection {
    #[serde(rename = "type", default = "default_scheduler_type")]
    pub kind: String,
    pub job_limit: usize,
    #[serde(default = "default_job_prefix")]
    pub job_prefix: String,
    #[serde(default = "default_monitoring_interval")]
    pub monitoring_interval_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionSection {
    /// Job script running the detached acquisition worker
    #[serde(default)]
    pub script: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session: SessionSection,
    #[serde(default)]
    pub template: TemplateSection,
    pub optimizer: OptimizerSettings,
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub acquisition: AcquisitionSection,
}

impl SessionConfig {
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Load and validate the configuration of the campaign in `data_dir`
    pub fn load(data_dir: &Path) -> ControllerResult<Self> {
        let config: Self = read_json(&Self::path_in(data_dir)).map_err(ControllerError::artifact)?;
        config.validate(data_dir)?;
        Ok(config)
    }

    pub fn save(&self, data_dir: &Path) -> ControllerResult<()> {
        atomic_write_json(&Self::path_in(data_dir), self).map_err(ControllerError::artifact)
    }

    pub fn validate(&self, data_dir: &Path) -> ControllerResult<()> {
        if self.optimizer.offload_acquisition && self.acquisition.script.is_none() {
            return Err(ControllerError::config(
                "optimizer.offloadAcquisition requires acquisition.script",
            ));
        }
        if self.scheduler.job_limit < 1 {
            return Err(ControllerError::config("scheduler.jobLimit must be at least 1"));
        }
        if !self.scheduler.monitoring_interval_seconds.is_finite() || self.scheduler.monitoring_interval_seconds < 0.0 {
            return Err(ControllerError::config(
                "scheduler.monitoringIntervalSeconds must be a non-negative number",
            ));
        }

        let archive = self.archive_dir(data_dir);
        if archive == data_dir {
            return Err(ControllerError::config("session.archiveDir must differ from the data directory"));
        }
        if archive == self.pending_dir(data_dir) {
            return Err(ControllerError::config("session.archiveDir must differ from session.pendingDir"));
        }

        validate_dimensions(&self.optimizer.search_space)?;
        if let Some(dimension) = self.optimizer.search_space.iter().find(|d| d.link.is_none()) {
            return Err(ControllerError::config(format!(
                "dimension '{}' is not linked to a configuration entry",
                dimension.name
            )));
        }
        Ok(())
    }

    /// `path` as is if absolute, otherwise relative to `data_dir`
    pub fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }

    pub fn pending_dir(&self, data_dir: &Path) -> PathBuf {
        Self::resolve(data_dir, &self.session.pending_dir)
    }

    pub fn archive_dir(&self, data_dir: &Path) -> PathBuf {
        Self::resolve(data_dir, &self.session.archive_dir)
    }

    pub fn template_dir(&self, data_dir: &Path) -> PathBuf {
        Self::resolve(data_dir, &self.template.path)
    }

    pub fn acquisition_script(&self, data_dir: &Path) -> Option<PathBuf> {
        self.optimizer
            .offload_acquisition
            .then(|| self.acquisition.script.as_deref())
            .flatten()
            .map(|script| Self::resolve(data_dir, script))
    }

    /// Dimension name → configuration entry
    pub fn links(&self) -> BTreeMap<String, EntryLink> {
        self.optimizer
            .search_space
            .iter()
            .filter_map(|dimension| dimension.link.clone().map(|link| (dimension.name.clone(), link)))
            .collect()
    }

    /// The scheduler state lives in the data directory
    pub fn tracker_settings(&self, data_dir: &Path) -> TrackerSettings {
        TrackerSettings::new(data_dir, self.scheduler.job_limit)
            .with_prefix(self.scheduler.job_prefix.clone())
            .with_interval(self.scheduler.monitoring_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn raw() -> serde_json::Value {
        json!({
            "session": {"name": "pitzDaily"},
            "optimizer": {
                "type": "random",
                "seed": 1,
                "searchSpace": [{
                    "name": "velocity",
                    "domain": {"kind": "range", "lower": 1.0, "upper": 10.0},
                    "link": {"file": "system/controls.json", "pointer": "/inlet/velocity"}
                }]
            },
            "scheduler": {"type": "sge", "jobLimit": 4}
        })
    }

    fn parse(value: serde_json::Value) -> SessionConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(raw());
        assert_eq!(config.session.pending_dir, PathBuf::from("cases_pending"));
        assert_eq!(config.template.submission_script, "Allrun");
        assert_eq!(config.scheduler.job_prefix, "flwbst_");
        assert_eq!(config.scheduler.monitoring_interval_seconds, 60.0);
        assert!(config.acquisition_script(Path::new("/data")).is_none());
        assert!(config.validate(Path::new("/data")).is_ok());
    }

    #[test]
    fn test_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = parse(raw());
        config.save(dir.path()).unwrap();

        let loaded = SessionConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.links().len(), 1);
        assert_eq!(loaded.tracker_settings(dir.path()).job_limit, 4);
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SessionConfig::load(dir.path()),
            Err(ControllerError::MissingArtifact { .. })
        ));
    }

    #[test]
    fn test_offload_requires_script() {
        let mut value = raw();
        value["optimizer"]["offloadAcquisition"] = json!(true);
        assert!(parse(value.clone()).validate(Path::new("/data")).is_err());

        value["acquisition"] = json!({"script": "acquire.sh"});
        let config = parse(value);
        assert!(config.validate(Path::new("/data")).is_ok());
        assert_eq!(
            config.acquisition_script(Path::new("/data")),
            Some(PathBuf::from("/data/acquire.sh"))
        );
    }

    #[test]
    fn test_invalid_settings() {
        let mut zero_limit = raw();
        zero_limit["scheduler"]["jobLimit"] = json!(0);
        assert!(parse(zero_limit).validate(Path::new("/data")).is_err());

        let mut archive_is_data_dir = raw();
        archive_is_data_dir["session"]["archiveDir"] = json!("/data");
        assert!(parse(archive_is_data_dir).validate(Path::new("/data")).is_err());

        let mut unlinked = raw();
        unlinked["optimizer"]["searchSpace"][0]
            .as_object_mut()
            .unwrap()
            .remove("link");
        assert!(parse(unlinked).validate(Path::new("/data")).is_err());

        let mut duplicate = raw();
        let dimension = duplicate["optimizer"]["searchSpace"][0].clone();
        duplicate["optimizer"]["searchSpace"]
            .as_array_mut()
            .unwrap()
            .push(dimension);
        assert!(parse(duplicate).validate(Path::new("/data")).is_err());
    }
}
