use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel output reported when the wall-clock guard killed a run
pub const TIMEOUT_SENTINEL: &str = "TIMEOUT";

/// Supported toolchain targets. Each one maps to exactly one execution profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Solidity,
    Cairo,
    Zig,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 3] = [Ecosystem::Solidity, Ecosystem::Cairo, Ecosystem::Zig];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Solidity => "solidity",
            Ecosystem::Cairo => "cairo",
            Ecosystem::Zig => "zig",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEcosystem(pub String);

impl fmt::Display for UnknownEcosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown ecosystem '{}'", self.0)
    }
}

impl std::error::Error for UnknownEcosystem {}

impl FromStr for Ecosystem {
    type Err = UnknownEcosystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solidity" => Ok(Ecosystem::Solidity),
            "cairo" => Ok(Ecosystem::Cairo),
            "zig" => Ok(Ecosystem::Zig),
            _ => Err(UnknownEcosystem(s.to_string())),
        }
    }
}

/// One submission to evaluate.
///
/// `exercise_id` is untrusted and stays raw text until the validator accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub ecosystem: Ecosystem,
    pub submitted_code: String,
    pub exercise_id: String,
}

/// Raw result of one subprocess run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Stream used for failure diagnostics: stderr, or stdout when stderr is blank.
    pub fn error_stream(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Verdict handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub successful: bool,
    pub output: String,
}

impl ExecutionResult {
    pub fn timed_out(&self) -> bool {
        !self.successful && self.output == TIMEOUT_SENTINEL
    }
}
