// Ecosystem execution profiles for Gauntlet
use crate::types::Ecosystem;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Placeholder substituted with the validated exercise id
pub const EXERCISE_ID_PLACEHOLDER: &str = "{exerciseId}";

/// Which output normalizer an ecosystem's tool output goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Drop blank lines on success, keep tally and stack-frame lines on failure
    LineFilter,
    /// Drop toolchain banners on success, strip container paths on failure
    PathRedaction,
    /// Hand stdout back untouched
    Passthrough,
}

/// Everything needed to run one ecosystem's exercise tests in a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProfile {
    pub name: String,
    pub image: String,
    pub command_template: String,
    pub target_path: String,
    pub code_prefix: String,
    pub exercise_count: u32,
    pub time_limit_secs: u64,
    pub memory_limit_mb: u32,
    pub cpu_limit: f64,
    pub parser: ParserKind,
}

impl ExecutionProfile {
    fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            bail!("Ecosystem '{}' has an empty image name", self.name);
        }
        if !self.command_template.contains(EXERCISE_ID_PLACEHOLDER) {
            bail!(
                "Ecosystem '{}' command template is missing the {} placeholder",
                self.name,
                EXERCISE_ID_PLACEHOLDER
            );
        }
        if self.target_path.trim().is_empty() {
            bail!("Ecosystem '{}' has an empty target path", self.name);
        }
        if self.exercise_count == 0 {
            bail!("Ecosystem '{}' must have at least one exercise", self.name);
        }
        if self.time_limit_secs == 0 {
            bail!("Ecosystem '{}' time limit must be positive", self.name);
        }
        if self.memory_limit_mb == 0 {
            bail!("Ecosystem '{}' memory limit must be positive", self.name);
        }
        if !self.cpu_limit.is_finite() || self.cpu_limit <= 0.0 {
            bail!("Ecosystem '{}' CPU limit must be a positive number", self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EcosystemsJson {
    ecosystems: Vec<ExecutionProfile>,
}

/// Immutable ecosystem -> profile mapping, complete for every `Ecosystem`
#[derive(Debug, Clone)]
pub struct EcosystemRegistry {
    profiles: HashMap<Ecosystem, ExecutionProfile>,
}

impl EcosystemRegistry {
    /// Profiles baked into the binary, matching the shipped container images
    pub fn builtin() -> Self {
        let profiles = Ecosystem::ALL
            .into_iter()
            .map(|ecosystem| (ecosystem, builtin_profile(ecosystem)))
            .collect();
        Self { profiles }
    }

    /// Load profiles from an ecosystems.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Ecosystem config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Invalid ecosystem config in {}", config_path.display()))
    }

    /// Load from `config_path` when it exists, otherwise fall back to the built-in profiles
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let registry = Self::load(config_path)?;
            tracing::info!(path = %config_path.display(), "Loaded ecosystem profiles from file");
            Ok(registry)
        } else {
            tracing::debug!(path = %config_path.display(), "No ecosystem config file, using built-in profiles");
            Ok(Self::builtin())
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let parsed: EcosystemsJson =
            serde_json::from_str(content).context("Failed to parse ecosystems JSON")?;

        let mut profiles = HashMap::new();
        for profile in parsed.ecosystems {
            let ecosystem: Ecosystem = profile.name.parse()?;
            profile.validate()?;
            if profiles.insert(ecosystem, profile).is_some() {
                bail!("Ecosystem '{}' is configured more than once", ecosystem);
            }
        }

        for ecosystem in Ecosystem::ALL {
            if !profiles.contains_key(&ecosystem) {
                bail!("No profile configured for ecosystem '{}'", ecosystem);
            }
        }

        Ok(Self { profiles })
    }

    /// Profile for an ecosystem. Construction guarantees every variant is present.
    pub fn profile(&self, ecosystem: Ecosystem) -> &ExecutionProfile {
        &self.profiles[&ecosystem]
    }

    /// All profiles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Ecosystem, &ExecutionProfile)> {
        Ecosystem::ALL
            .into_iter()
            .map(move |ecosystem| (ecosystem, self.profile(ecosystem)))
    }
}

fn builtin_profile(ecosystem: Ecosystem) -> ExecutionProfile {
    match ecosystem {
        Ecosystem::Solidity => ExecutionProfile {
            name: ecosystem.to_string(),
            image: "solidity".to_string(),
            command_template: "npx hardhat test test/test_ex_{exerciseId}".to_string(),
            target_path: "/app/argencoin/contracts/CentralBank.sol".to_string(),
            code_prefix: String::new(),
            exercise_count: 3,
            time_limit_secs: 60,
            memory_limit_mb: 2048,
            cpu_limit: 2.0,
            parser: ParserKind::LineFilter,
        },
        Ecosystem::Cairo => ExecutionProfile {
            name: ecosystem.to_string(),
            image: "cairo".to_string(),
            command_template: "printf '#[cfg(test)]\\nmod test_ex_{exerciseId};\\n' > /app/cairo-exercises/src/tests.cairo && scarb cairo-test -f test_ex_{exerciseId}".to_string(),
            target_path: "/app/cairo-exercises/src/lib.cairo".to_string(),
            code_prefix: "#[cfg(test)]\nmod tests;\n\n".to_string(),
            exercise_count: 2,
            time_limit_secs: 60,
            memory_limit_mb: 2048,
            cpu_limit: 2.0,
            parser: ParserKind::PathRedaction,
        },
        Ecosystem::Zig => ExecutionProfile {
            name: ecosystem.to_string(),
            image: "zig".to_string(),
            command_template: "zig test /app/zip-exercises/src/ex_{exerciseId}_test.zig".to_string(),
            target_path: "/app/zip-exercises/src/ex_{exerciseId}.zig".to_string(),
            code_prefix: String::new(),
            exercise_count: 2,
            time_limit_secs: 60,
            memory_limit_mb: 2048,
            cpu_limit: 2.0,
            parser: ParserKind::Passthrough,
        },
    }
}
