// Runtime settings, read from the environment with local-development defaults
use std::path::PathBuf;

pub const DEFAULT_SCRATCH_DIR: &str = "user_assessments";
pub const DEFAULT_ECOSYSTEMS_CONFIG: &str = "config/ecosystems.json";
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory submissions are staged into before being bind-mounted
    pub scratch_dir: PathBuf,
    /// Optional ecosystems.json overriding the built-in profiles
    pub ecosystems_config: PathBuf,
    /// Container runtime binary (docker, podman, ...)
    pub container_runtime: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            ecosystems_config: PathBuf::from(DEFAULT_ECOSYSTEMS_CONFIG),
            container_runtime: DEFAULT_CONTAINER_RUNTIME.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            scratch_dir: non_empty("GAUNTLET_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            ecosystems_config: non_empty("GAUNTLET_ECOSYSTEMS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ecosystems_config),
            container_runtime: non_empty("GAUNTLET_CONTAINER_RUNTIME")
                .unwrap_or(defaults.container_runtime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.container_runtime, "docker");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GAUNTLET_SCRATCH_DIR", "/var/lib/gauntlet"),
            ("GAUNTLET_CONTAINER_RUNTIME", "podman"),
            ("GAUNTLET_ECOSYSTEMS_CONFIG", "  "),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.scratch_dir, PathBuf::from("/var/lib/gauntlet"));
        assert_eq!(settings.container_runtime, "podman");
        assert_eq!(settings.ecosystems_config, PathBuf::from(DEFAULT_ECOSYSTEMS_CONFIG));
    }
}
