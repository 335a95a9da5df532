use super::types::{CheckState, ProbeOutcome};

/// Decide whether a probe outcome means the check is up
///
/// Up only when a response arrived and its status code is one of the
/// check's success codes.
pub fn classify(outcome: &ProbeOutcome, success_codes: &[u16]) -> CheckState {
    match outcome.response_code {
        Some(code) if !outcome.failed && success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases: &[(bool, Option<u16>, &[u16], CheckState)] = &[
            (false, Some(200), &[200], CheckState::Up),
            (false, Some(201), &[200, 201], CheckState::Up),
            (false, Some(301), &[200, 301], CheckState::Up),
            (false, Some(500), &[200], CheckState::Down),
            (false, Some(200), &[201], CheckState::Down),
            (false, None, &[200], CheckState::Down),
            (true, None, &[200], CheckState::Down),
            // A failed probe is down even if a code slipped through
            (true, Some(200), &[200], CheckState::Down),
            (false, Some(200), &[], CheckState::Down),
        ];

        for (failed, response_code, success_codes, expected) in cases {
            let outcome = ProbeOutcome { failed: *failed, response_code: *response_code, error: None };
            assert_eq!(
                classify(&outcome, success_codes),
                *expected,
                "failed={failed} code={response_code:?} codes={success_codes:?}"
            );
        }
    }

    #[test]
    fn test_error_text_does_not_matter() {
        let with_reason = ProbeOutcome { failed: false, response_code: Some(200), error: Some("x".into()) };
        let without = ProbeOutcome::response(200);
        assert_eq!(classify(&with_reason, &[200]), classify(&without, &[200]));
    }
}
