//! Search-space dimensions and their links into case configuration files

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{ControllerError, ControllerResult};

/// Address of one configuration entry inside a case
///
/// `file` is relative to the case directory and must hold JSON; `pointer`
/// is an RFC 6901 JSON pointer into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLink {
    pub file: PathBuf,
    pub pointer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Domain {
    Range {
        lower: f64,
        upper: f64,
        #[serde(default)]
        integer: bool,
    },
    Choice {
        values: Vec<Value>,
    },
}

impl Domain {
    fn validate(&self, name: &str) -> ControllerResult<()> {
        match self {
            Domain::Range { lower, upper, integer } => {
                if !lower.is_finite() || !upper.is_finite() || lower > upper {
                    return Err(ControllerError::config(format!(
                        "dimension '{name}': invalid range [{lower}, {upper}]"
                    )));
                }
                if *integer && lower.ceil() > upper.floor() {
                    return Err(ControllerError::config(format!(
                        "dimension '{name}': no integer in [{lower}, {upper}]"
                    )));
                }
                Ok(())
            }
            Domain::Choice { values } if values.is_empty() => {
                Err(ControllerError::config(format!("dimension '{name}': empty choice")))
            }
            Domain::Choice { .. } => Ok(()),
        }
    }

    /// Number of distinct values, `None` for continuous ranges
    pub fn cardinality(&self) -> Option<u64> {
        match self {
            Domain::Range { integer: false, .. } => None,
            Domain::Range { lower, upper, .. } => Some((upper.floor() - lower.ceil()) as u64 + 1),
            Domain::Choice { values } => Some(values.len() as u64),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Domain::Range { lower, upper, integer: true } => {
                let value = rng.gen_range(lower.ceil() as i64..=upper.floor() as i64);
                Value::from(value)
            }
            Domain::Range { lower, upper, .. } => {
                let value = if lower < upper { rng.gen_range(*lower..*upper) } else { *lower };
                Value::from(value)
            }
            Domain::Choice { values } => values.choose(rng).cloned().unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<EntryLink>,
}

/// Check names are unique and every domain is well formed
pub fn validate_dimensions(dimensions: &[Dimension]) -> ControllerResult<()> {
    if dimensions.is_empty() {
        return Err(ControllerError::config("search space has no dimensions"));
    }

    let mut seen = HashSet::new();
    for dimension in dimensions {
        if !seen.insert(dimension.name.as_str()) {
            return Err(ControllerError::config(format!(
                "dimension name '{}' is not unique",
                dimension.name
            )));
        }
        dimension.domain.validate(&dimension.name)?;
    }
    Ok(())
}

/// Total number of distinct points, `None` if any dimension is continuous
pub fn space_size(dimensions: &[Dimension]) -> Option<u64> {
    dimensions
        .iter()
        .try_fold(1u64, |size, dimension| size.checked_mul(dimension.domain.cardinality()?))
}
