// CLI commands for running submissions
use anyhow::{Context, Result};
use gauntlet_common::config::Settings;
use gauntlet_common::registry::{EcosystemRegistry, ExecutionProfile};
use gauntlet_common::types::{Ecosystem, ExecutionResult};
use gauntlet_engine::TestExecutor;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;
use tracing::info;

fn load_registry(settings: &Settings) -> Result<EcosystemRegistry> {
    EcosystemRegistry::load_or_builtin(&settings.ecosystems_config)
}

fn read_submission(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read submission {}", path.display())),
        None => {
            let mut code = String::new();
            io::stdin()
                .read_to_string(&mut code)
                .context("Failed to read submission from stdin")?;
            Ok(code)
        }
    }
}

/// Render a result the way the CLI prints it
pub fn render_result(result: &ExecutionResult, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(result).context("Failed to serialize result");
    }
    Ok(format!(
        "SUCCESSFUL: {}\nOUTPUT:\n{}",
        result.successful, result.output
    ))
}

/// Run one submission; returns whether the tests passed
pub async fn run_submission(
    settings: &Settings,
    ecosystem: Ecosystem,
    exercise: &str,
    file: Option<&Path>,
    json: bool,
) -> Result<bool> {
    let registry = load_registry(settings)?;
    let code = read_submission(file)?;

    let executor = TestExecutor::from_settings(settings, registry)
        .context("Failed to prepare scratch directory")?;

    let start = Instant::now();
    let result = executor
        .execute_test(ecosystem, &code, exercise)
        .await
        .context("Submission could not be evaluated")?;

    info!(
        ecosystem = %ecosystem,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Submission evaluated"
    );

    println!("{}", render_result(&result, json)?);
    Ok(result.successful)
}

fn describe_profile(ecosystem: Ecosystem, profile: &ExecutionProfile) -> String {
    format!(
        "{:<10} image={:<10} exercises=1..={:<3} time={}s memory={}MB cpus={} parser={:?}",
        ecosystem.as_str(),
        profile.image,
        profile.exercise_count,
        profile.time_limit_secs,
        profile.memory_limit_mb,
        profile.cpu_limit,
        profile.parser
    )
}

pub fn list_ecosystems(settings: &Settings) -> Result<()> {
    let registry = load_registry(settings)?;
    for (ecosystem, profile) in registry.iter() {
        println!("{}", describe_profile(ecosystem, profile));
    }
    Ok(())
}
