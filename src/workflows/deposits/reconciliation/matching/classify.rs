use super::super::domain::{CandidateRef, Registrant, VerificationStatus};

/// Terminal disposition for one candidate list. No retry state exists:
/// callers re-submit a transaction in a later batch if they want it
/// re-evaluated, which the idempotency guard makes safe.
pub(crate) fn classify(candidates: &[&Registrant]) -> (VerificationStatus, Vec<CandidateRef>, String) {
    match candidates {
        [] => (
            VerificationStatus::NoMatch,
            Vec::new(),
            "no eligible registrant".to_string(),
        ),
        [single] => (
            VerificationStatus::Matched,
            vec![CandidateRef::from_registrant(single)],
            format!("matched registrant {} ({})", single.id, single.name),
        ),
        // Several structurally eligible registrants: ambiguity must stay
        // explicit. An automatic tie-break here would risk misattributing
        // money, so resolution is handed to a human.
        many => (
            VerificationStatus::Ambiguous,
            many.iter()
                .map(|registrant| CandidateRef::from_registrant(registrant))
                .collect(),
            format!(
                "{} eligible registrants; manual resolution required",
                many.len()
            ),
        ),
    }
}
