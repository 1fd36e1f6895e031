//! Curated survey areas: which focus areas the self-assessment asks about,
//! in what order, and with what prompt.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CuratedArea {
    /// Stable identifier, independent of the catalog's display name
    pub key: String,
    /// Catalog name this entry is matched against
    pub name: String,
    pub order: usize,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "area")]
    pub areas: Vec<CuratedArea>,
}

const DEFAULT_AREAS: [(&str, &str, &str); 5] = [
    (
        "self_direction",
        "Self-Direction",
        "I manage my time, stay focused without reminders, set goals and follow through on them, and take initiative when I am stuck.",
    ),
    (
        "critical_thinking",
        "Critical Thinking",
        "I form my opinion after analyzing information, ask good questions that deepen my understanding, and use evidence to support my ideas.",
    ),
    (
        "creative_problem_solving",
        "Creative Problem-Solving",
        "I try multiple approaches when the first one doesn't work, generate original ideas, empathize with the needs of others, and use any failures to revise my ideas.",
    ),
    (
        "personal_growth",
        "Personal Growth and Reflection",
        "I notice my own strengths, areas for improvement, use feedback to improve my future work, and take measurable steps to improve myself.",
    ),
    (
        "teamwork_leadership",
        "Teamwork and Leadership",
        "I communicate and listen in a group setting, support others, and lead when needed.",
    ),
];

impl Default for SurveyConfig {
    fn default() -> Self {
        let areas = DEFAULT_AREAS
            .iter()
            .enumerate()
            .map(|(order, (key, name, prompt))| CuratedArea {
                key: key.to_string(),
                name: name.to_string(),
                order,
                prompt: prompt.to_string(),
            })
            .collect();
        Self { areas }
    }
}

impl SurveyConfig {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let mut config: SurveyConfig = toml::from_str(raw).context("invalid survey config")?;
        config.validate().context("invalid survey config")?;
        config.areas.sort_by_key(|area| area.order);
        Ok(config)
    }

    /// Keys and orders must be unique; keys and names must be non-blank.
    fn validate(&self) -> anyhow::Result<()> {
        let mut keys = HashSet::new();
        let mut orders = HashSet::new();

        for area in &self.areas {
            if area.key.trim().is_empty() {
                bail!("area {:?} has an empty key", area.name);
            }
            if area.name.trim().is_empty() {
                bail!("area {:?} has an empty name", area.key);
            }
            if !keys.insert(area.key.as_str()) {
                bail!("duplicate area key {:?}", area.key);
            }
            if !orders.insert(area.order) {
                bail!("duplicate order {} on area {:?}", area.order, area.key);
            }
        }
        Ok(())
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    /// Entries sorted by canonical presentation order
    pub fn ordered(&self) -> Vec<&CuratedArea> {
        let mut areas: Vec<&CuratedArea> = self.areas.iter().collect();
        areas.sort_by_key(|area| area.order);
        areas
    }
}
