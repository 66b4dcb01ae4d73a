// Container command composition.
//
// The command is a program plus a discrete argument vector. Nothing on the host
// goes through a shell; `sh -c` only runs inside the container, on a fixed
// template whose only substitution is an already validated integer.
use gauntlet_common::registry::{ExecutionProfile, EXERCISE_ID_PLACEHOLDER};
use std::fmt;
use std::path::Path;

/// Program that enforces the wall-clock limit around the container run
pub const GUARD_PROGRAM: &str = "timeout";

/// Exact command line for one container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Wall-clock limit the guard enforces, in seconds
    pub time_limit_secs: u64,
    /// Runtime binary and container name, for force-removal after a guard kill
    pub runtime: String,
    pub container_name: String,
}

impl ContainerCommand {
    /// The `--mount` spec of the staged-file bind mount
    pub fn bind_mount(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "--mount")
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ContainerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Read-only bind mount of one staged file.
///
/// `--mount` takes `key=value` pairs, so a `:` in the host path is harmless.
/// Commas are not; the scratch directory refuses them.
pub fn bind_mount_spec(staged_file: &Path, target_path: &str) -> String {
    format!(
        "type=bind,source={},target={},readonly",
        staged_file.display(),
        target_path
    )
}

/// Replace every exercise-id placeholder in `template`
pub fn substitute_exercise_id(template: &str, exercise_id: u32) -> String {
    template.replace(EXERCISE_ID_PLACEHOLDER, &exercise_id.to_string())
}

/// Build the guarded container invocation.
///
/// Order: wall-clock guard, `run --rm --name`, read-only mount of the staged file,
/// memory / CPU / network limits, image, then the in-container test command.
pub fn build_command(
    runtime: &str,
    profile: &ExecutionProfile,
    staged_file: &Path,
    container_name: &str,
    exercise_id: u32,
) -> ContainerCommand {
    let target_path = substitute_exercise_id(&profile.target_path, exercise_id);
    let test_command = substitute_exercise_id(&profile.command_template, exercise_id);

    let args = vec![
        "-s".to_string(),
        "KILL".to_string(),
        format!("{}s", profile.time_limit_secs),
        runtime.to_string(),
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        container_name.to_string(),
        "--mount".to_string(),
        bind_mount_spec(staged_file, &target_path),
        format!("--memory={}m", profile.memory_limit_mb),
        format!("--cpus={}", profile.cpu_limit),
        "--network=none".to_string(),
        profile.image.clone(),
        "sh".to_string(),
        "-c".to_string(),
        test_command,
    ];

    ContainerCommand {
        program: GUARD_PROGRAM.to_string(),
        args,
        time_limit_secs: profile.time_limit_secs,
        runtime: runtime.to_string(),
        container_name: container_name.to_string(),
    }
}
