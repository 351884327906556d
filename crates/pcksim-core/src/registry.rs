use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use pcksim_schema::{PckSkill, PersonaProfile, Scenario};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog;
use crate::config::{read_yaml_file, SessionConfig};

pub const PERSONAS_FILE: &str = "personas.yaml";
pub const SCENARIOS_FILE: &str = "scenarios.yaml";
pub const SKILLS_FILE: &str = "skills.yaml";

/// Static lookup of personas, scenarios and PCK skills.
#[derive(Debug, Clone)]
pub struct Registry {
    personas: Vec<PersonaProfile>,
    scenarios: Vec<Scenario>,
    skills: Vec<PckSkill>,
}

impl Registry {
    pub fn new(
        personas: Vec<PersonaProfile>,
        scenarios: Vec<Scenario>,
        skills: Vec<PckSkill>,
    ) -> Result<Self> {
        let registry = Self {
            personas,
            scenarios,
            skills,
        };
        for warning in registry.validate()? {
            tracing::warn!("catalog: {warning}");
        }
        Ok(registry)
    }

    /// The embedded catalog.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(
            catalog::PERSONAS_YAML,
            catalog::SCENARIOS_YAML,
            catalog::SKILLS_YAML,
        )
    }

    pub fn from_yaml(personas: &str, scenarios: &str, skills: &str) -> Result<Self> {
        Self::new(
            serde_yaml::from_str(personas).context("failed to parse personas")?,
            serde_yaml::from_str(scenarios).context("failed to parse scenarios")?,
            serde_yaml::from_str(skills).context("failed to parse skills")?,
        )
    }

    /// Read `personas.yaml`, `scenarios.yaml` and `skills.yaml` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::new(
            read_yaml_file(&dir.join(PERSONAS_FILE))?,
            read_yaml_file(&dir.join(SCENARIOS_FILE))?,
            read_yaml_file(&dir.join(SKILLS_FILE))?,
        )
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        match &config.catalog_dir {
            Some(dir) => Self::load(dir),
            None => Self::builtin(),
        }
    }

    pub fn personas(&self) -> &[PersonaProfile] {
        &self.personas
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn skills(&self) -> &[PckSkill] {
        &self.skills
    }

    /// Case-insensitive lookup by display name.
    pub fn persona(&self, name: &str) -> Option<&PersonaProfile> {
        let wanted = name.trim();
        self.personas
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn skill(&self, id: &str) -> Option<&PckSkill> {
        self.skills.iter().find(|s| s.skill_id == id)
    }

    /// Look up skills in order, skipping unknown ids.
    pub fn resolve_skills(&self, ids: &[String]) -> Vec<&PckSkill> {
        ids.iter()
            .filter_map(|id| {
                let skill = self.skill(id);
                if skill.is_none() {
                    tracing::warn!(skill_id = %id, "unknown PCK skill, skipping");
                }
                skill
            })
            .collect()
    }

    /// Pick the named personas, or the first `n` in catalog order.
    pub fn select_personas(&self, n: usize, names: Option<&[String]>) -> Result<Vec<PersonaProfile>> {
        match names {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| {
                    self.persona(name)
                        .cloned()
                        .ok_or_else(|| anyhow!("unknown persona: {name}"))
                })
                .collect(),
            _ => {
                if n > self.personas.len() {
                    return Err(anyhow!(
                        "requested {n} students but the catalog only has {}",
                        self.personas.len()
                    ));
                }
                Ok(self.personas.iter().take(n).cloned().collect())
            }
        }
    }

    /// Uniform random choice.
    pub fn choose_scenario<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Scenario> {
        self.scenarios.choose(rng)
    }

    /// Hard errors for structural problems; warnings for dangling skill references.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.personas.is_empty() {
            return Err(anyhow!("catalog has no personas"));
        }
        if self.scenarios.is_empty() {
            return Err(anyhow!("catalog has no scenarios"));
        }

        let mut names = HashSet::new();
        for persona in &self.personas {
            if persona.name.trim().is_empty() {
                return Err(anyhow!("persona with empty name"));
            }
            if !names.insert(persona.name.to_lowercase()) {
                return Err(anyhow!("duplicate persona name: {}", persona.name));
            }
        }

        let mut scenario_ids = HashSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(scenario.id.as_str()) {
                return Err(anyhow!("duplicate scenario id: {}", scenario.id));
            }
        }

        let mut skill_ids = HashSet::new();
        for skill in &self.skills {
            if !skill_ids.insert(skill.skill_id.as_str()) {
                return Err(anyhow!("duplicate skill id: {}", skill.skill_id));
            }
        }

        let mut warnings = Vec::new();
        for scenario in &self.scenarios {
            for id in &scenario.target_pck_skills {
                if !skill_ids.contains(id.as_str()) {
                    warnings.push(format!(
                        "scenario {} references unknown skill {id}",
                        scenario.id
                    ));
                }
            }
        }
        Ok(warnings)
    }
}
