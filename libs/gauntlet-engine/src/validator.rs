// Exercise id validation. Runs before the id reaches any path or command.
use crate::error::{ExecutorError, Result};
use gauntlet_common::registry::ExecutionProfile;
use gauntlet_common::types::Ecosystem;

/// Parse an untrusted exercise id into `1..=profile.exercise_count`.
///
/// Only plain decimal digits without a leading zero are accepted, so signs,
/// whitespace, separators and traversal sequences never get through.
pub fn validate_exercise_id(
    ecosystem: Ecosystem,
    profile: &ExecutionProfile,
    raw: &str,
) -> Result<u32> {
    let invalid = || ExecutorError::InvalidExerciseId {
        ecosystem,
        raw: raw.to_string(),
    };

    let bytes = raw.as_bytes();
    match bytes.first() {
        Some(b'1'..=b'9') => {}
        _ => return Err(invalid()),
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    // Overflow is just another out-of-range value
    let id: u32 = raw.parse().map_err(|_| invalid())?;
    if id > profile.exercise_count {
        return Err(invalid());
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_common::registry::EcosystemRegistry;

    fn check(raw: &str) -> Result<u32> {
        let registry = EcosystemRegistry::builtin();
        validate_exercise_id(
            Ecosystem::Solidity,
            registry.profile(Ecosystem::Solidity),
            raw,
        )
    }

    #[test]
    fn test_accepts_ids_in_range() {
        assert_eq!(check("1").unwrap(), 1);
        assert_eq!(check("3").unwrap(), 3);
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        for raw in ["", " ", "\t\n", " 1", "1 ", "1\n"] {
            assert!(
                matches!(check(raw), Err(ExecutorError::InvalidExerciseId { .. })),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_rejects_partial_and_non_decimal() {
        for raw in ["1a", "a1", "+1", "-1", "1.0", "0x1", "01", "1e0", "someInvalid../../", "../1"] {
            assert!(check(raw).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        for raw in ["0", "4", "999999", "99999999999999999999"] {
            assert!(check(raw).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_error_carries_raw_input() {
        match check("999999") {
            Err(ExecutorError::InvalidExerciseId { ecosystem, raw }) => {
                assert_eq!(ecosystem, Ecosystem::Solidity);
                assert_eq!(raw, "999999");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
