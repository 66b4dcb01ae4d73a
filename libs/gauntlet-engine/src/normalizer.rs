/// Output Normalizer - Per-Ecosystem Cleanup of Tool Output
///
/// **Core Responsibility:**
/// Turn raw `(exit_code, stdout, error_stream)` into text that is safe to show a
/// learner: no toolchain noise, no internal container paths.
///
/// **Properties:**
/// - Pure functions: no filesystem, no network, no state
/// - A wall-clock guard kill short-circuits every variant to `TIMEOUT`
/// - One implementation per `ParserKind`; adding an ecosystem means adding a
///   variant here and a profile in the registry, nothing else

use gauntlet_common::registry::ParserKind;
use gauntlet_common::types::TIMEOUT_SENTINEL;

/// True when the error stream shows the wall-clock guard killed the process
pub fn is_guard_timeout(error_stream: &str) -> bool {
    error_stream.to_lowercase().contains("killed") && error_stream.contains("timeout -s KILL")
}

pub trait OutputNormalizer: Send + Sync {
    /// Variant-specific cleanup, only called when the run was not a timeout
    fn normalize_output(&self, exit_code: i32, stdout: &str, error_stream: &str) -> String;

    /// `error_stream` is stderr, or stdout when stderr was blank
    fn normalize(&self, exit_code: i32, stdout: &str, error_stream: &str) -> String {
        if is_guard_timeout(error_stream) {
            return TIMEOUT_SENTINEL.to_string();
        }
        self.normalize_output(exit_code, stdout, error_stream)
    }
}

/// Normalizer bound to a parser tag
pub fn normalizer_for(kind: ParserKind) -> &'static dyn OutputNormalizer {
    match kind {
        ParserKind::LineFilter => &LineFilterNormalizer,
        ParserKind::PathRedaction => &PathRedactingNormalizer,
        ParserKind::Passthrough => &PassthroughNormalizer,
    }
}

fn drop_blank_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    lines.filter(|line| !line.trim().is_empty()).collect()
}

/// Mocha-style reporters (hardhat)
#[derive(Debug, Default, Clone, Copy)]
pub struct LineFilterNormalizer;

impl LineFilterNormalizer {
    const TALLY_MARKERS: [&'static str; 2] = ["passing", "failing"];
    const STACK_FRAME_PREFIX: &'static str = "at";

    fn keep_on_failure(line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.is_empty()
            || Self::TALLY_MARKERS.iter().any(|m| trimmed.contains(m))
            || trimmed.starts_with(Self::STACK_FRAME_PREFIX)
    }
}

impl OutputNormalizer for LineFilterNormalizer {
    fn normalize_output(&self, exit_code: i32, stdout: &str, error_stream: &str) -> String {
        if exit_code == 0 {
            drop_blank_lines(stdout.lines()).join("\n")
        } else {
            error_stream
                .lines()
                .filter(|line| Self::keep_on_failure(line))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Scarb / cairo-test: banners on success, container paths on failure
#[derive(Debug, Default, Clone, Copy)]
pub struct PathRedactingNormalizer;

impl PathRedactingNormalizer {
    const BANNER_PREFIXES: [&'static str; 5] =
        ["Compiling", "Finished", "Running", "running", "testing"];
    const CONTAINER_ROOT: &'static str = "/app/cairo-exercises/";

    fn is_banner(line: &str) -> bool {
        let trimmed = line.trim_start();
        Self::BANNER_PREFIXES.iter().any(|p| trimmed.starts_with(p))
    }
}

impl OutputNormalizer for PathRedactingNormalizer {
    fn normalize_output(&self, exit_code: i32, stdout: &str, error_stream: &str) -> String {
        if exit_code == 0 {
            drop_blank_lines(stdout.lines())
                .into_iter()
                .filter(|line| !Self::is_banner(line))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            // scarb reports diagnostics on stdout; stderr only when stdout is empty
            let diagnostics = if stdout.trim().is_empty() {
                error_stream
            } else {
                stdout
            };
            diagnostics.replace(Self::CONTAINER_ROOT, "")
        }
    }
}

/// Test runners whose output is already learner-friendly (zig test)
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughNormalizer;

impl OutputNormalizer for PassthroughNormalizer {
    fn normalize_output(&self, _exit_code: i32, stdout: &str, _error_stream: &str) -> String {
        stdout.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUARD_STDERR: &str = "Command killed by wall-clock guard (timeout -s KILL 60s)\n";

    const HARDHAT_PASS: &str = "\n\n  CentralBank\n    ✔ mints argencoin (52ms)\n\n\n  1 passing (1s)\n\n";

    const HARDHAT_FAIL: &str = "\
Compiling 1 file with 0.8.17
Error HH600: Compilation failed

  CentralBank
    1) deploys

  0 passing (3ms)
  1 failing

  1) CentralBank
       deploys:
     Error: invalid bytecode
      at Context.<anonymous> (test/test_ex_1.js:12:5)
      at processImmediate (node:internal/timers:476:21)
";

    const SCARB_PASS: &str = "\
   Compiling test(cairo_exercises) cairo_exercises v0.1.0 (/app/cairo-exercises/Scarb.toml)
    Finished release target(s) in 2 seconds
testing cairo_exercises ...
running 1 tests
test cairo_exercises::tests::test_ex_1::test_exercise_one ... ok

test result: ok. 1 passed; 0 failed; 0 ignored; 0 filtered out;
";

    const SCARB_FAIL: &str = "\
error: Unexpected token, expected ':'.
 --> /app/cairo-exercises/src/lib.cairo:4:20
fn exercise_one() -> u16 {
                   ^
could not compile `cairo_exercises` due to previous error
";

    #[test]
    fn test_guard_timeout_detection() {
        assert!(is_guard_timeout(GUARD_STDERR));
        assert!(is_guard_timeout("sh: line 1: 42 Killed timeout -s KILL 60s docker run"));
        assert!(!is_guard_timeout("Killed"));
        assert!(!is_guard_timeout("timeout -s KILL 60s"));
    }

    #[test]
    fn test_timeout_short_circuits_every_variant() {
        for kind in [ParserKind::LineFilter, ParserKind::PathRedaction, ParserKind::Passthrough] {
            let normalizer = normalizer_for(kind);
            assert_eq!(normalizer.normalize(137, "1 passing", GUARD_STDERR), "TIMEOUT");
            assert_eq!(normalizer.normalize(0, "all good", GUARD_STDERR), "TIMEOUT");
        }
    }

    #[test]
    fn test_line_filter_success_drops_blank_lines() {
        let output = LineFilterNormalizer.normalize(0, HARDHAT_PASS, "");
        assert_eq!(output, "  CentralBank\n    ✔ mints argencoin (52ms)\n  1 passing (1s)");
        assert!(output.lines().all(|line| !line.trim().is_empty()));
    }

    #[test]
    fn test_line_filter_failure_keeps_tally_and_frames() {
        let output = LineFilterNormalizer.normalize(1, "", HARDHAT_FAIL);

        assert!(output.contains("0 passing (3ms)"));
        assert!(output.contains("1 failing"));
        assert!(output.contains("at Context.<anonymous> (test/test_ex_1.js:12:5)"));
        assert!(!output.contains("Compiling"));
        assert!(!output.contains("Error HH600"));
        assert!(!output.contains("invalid bytecode"));
        for line in output.lines() {
            let trimmed = line.trim();
            assert!(
                trimmed.is_empty()
                    || trimmed.contains("passing")
                    || trimmed.contains("failing")
                    || trimmed.starts_with("at"),
                "unexpected line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_path_redaction_success_drops_banners() {
        let output = PathRedactingNormalizer.normalize(0, SCARB_PASS, "");
        assert_eq!(
            output,
            "test cairo_exercises::tests::test_ex_1::test_exercise_one ... ok\n\
             test result: ok. 1 passed; 0 failed; 0 ignored; 0 filtered out;"
        );
    }

    #[test]
    fn test_path_redaction_failure_strips_container_paths() {
        let output = PathRedactingNormalizer.normalize(1, SCARB_FAIL, "some stderr noise");
        assert!(output.contains(" --> src/lib.cairo:4:20"));
        assert!(!output.contains("/app/"));
        assert!(!output.contains("some stderr noise"));
    }

    #[test]
    fn test_path_redaction_failure_falls_back_to_error_stream() {
        let stderr = "error: Unexpected token\n --> /app/cairo-exercises/src/lib.cairo:4:20\n";
        let output = normalizer_for(ParserKind::PathRedaction).normalize(1, "", stderr);

        assert_eq!(output, "error: Unexpected token\n --> src/lib.cairo:4:20\n");

        let output = PathRedactingNormalizer.normalize(1, "  \n", stderr);
        assert!(output.contains("src/lib.cairo:4:20"));
        assert!(!output.contains("/app/"));
    }

    #[test]
    fn test_passthrough_returns_stdout() {
        let stdout = "All 1 tests passed.\n";
        assert_eq!(PassthroughNormalizer.normalize(0, stdout, ""), stdout);
        assert_eq!(PassthroughNormalizer.normalize(1, stdout, "error: x"), stdout);
    }
}
