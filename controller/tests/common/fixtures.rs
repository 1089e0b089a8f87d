//! Test fixtures and data for controller tests

use serde_json::json;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use controller::optimizer::{Dimension, Domain, EntryLink};
use shared::Parametrization;

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const JOB_LIMIT: usize = 2;
    pub const SEED: u64 = 17;
    /// Objective written by `write_objectives`
    pub const OBJECTIVE: &'static str = "drag";

    /// Controls file of the template case
    pub const CONTROLS_FILE: &'static str = "system/controls.json";

    pub fn velocity_link() -> EntryLink {
        EntryLink {
            file: Self::CONTROLS_FILE.into(),
            pointer: "/inlet/velocity".to_string(),
        }
    }

    /// One continuous dimension linked into the template controls
    pub fn dimensions() -> Vec<Dimension> {
        vec![Dimension {
            name: "velocity".to_string(),
            domain: Domain::Range {
                lower: 1.0,
                upper: 10.0,
                integer: false,
            },
            link: Some(Self::velocity_link()),
        }]
    }

    pub fn links() -> BTreeMap<String, EntryLink> {
        BTreeMap::from([("velocity".to_string(), Self::velocity_link())])
    }

    pub fn suggestion(velocity: f64) -> Parametrization {
        Parametrization::from([("velocity".to_string(), json!(velocity))])
    }

    /// Write a minimal template: controls file plus an Allrun script
    pub fn write_template(dir: &Path) {
        std::fs::create_dir_all(dir.join("system")).unwrap();
        std::fs::write(
            dir.join(Self::CONTROLS_FILE),
            json!({"inlet": {"velocity": 1.0}}).to_string(),
        )
        .unwrap();

        let script = dir.join("Allrun");
        std::fs::write(&script, "#!/bin/sh\necho run\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Objective output of a successfully evaluated case
    pub fn write_objectives(case_dir: &Path, value: f64) {
        std::fs::write(
            case_dir.join("objectives.json"),
            json!({ "drag": value }).to_string(),
        )
        .unwrap();
    }
}
