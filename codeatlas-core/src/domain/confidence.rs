// codeatlas-core/src/domain/confidence.rs
//
// The deterministic confidence formula from spec.md §4.9. Pure, small,
// independently unit-tested.

/// Everything the Reconciler needs to compute one relationship's final
/// confidence.
#[derive(Debug, Clone)]
pub struct ConfidenceInputs {
    /// `raw_confidence` of every evidence row for this relationship hash.
    pub raw_confidences: Vec<f64>,
    /// Number of contradicting passes: another relationship of a
    /// different type observed between the same two POIs.
    pub contradicting_passes: u32,
    /// True if any evidence row came from the `deterministic` pass
    /// (structural rule, e.g. file CONTAINS POI) — forces confidence to 1.0.
    pub has_deterministic_evidence: bool,
}

const AGREEMENT_BOOST: f64 = 0.2;
const DISAGREEMENT_PENALTY: f64 = 0.5;

/// Computes the final confidence for a relationship from its accumulated
/// evidence, per spec.md §4.9:
///
/// 1. Start from the arithmetic mean of `raw_confidence`.
/// 2. Apply an agreement boost per additional confirming pass beyond the
///    first: `score <- score + (1 - score) * 0.2`.
/// 3. Apply a disagreement penalty per contradicting pass:
///    `score <- score * 0.5`.
/// 4. Clamp to `[0, 1]`. Deterministic evidence forces `score = 1.0`.
pub fn compute_confidence(inputs: &ConfidenceInputs) -> f64 {
    if inputs.has_deterministic_evidence {
        return 1.0;
    }

    if inputs.raw_confidences.is_empty() {
        return 0.0;
    }

    let mean = inputs.raw_confidences.iter().sum::<f64>() / inputs.raw_confidences.len() as f64;
    let mut score = mean;

    let confirming_passes_beyond_first = inputs.raw_confidences.len().saturating_sub(1);
    for _ in 0..confirming_passes_beyond_first {
        score += (1.0 - score) * AGREEMENT_BOOST;
    }

    for _ in 0..inputs.contradicting_passes {
        score *= DISAGREEMENT_PENALTY;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_single_evidence_is_unboosted_mean() {
        let inputs = ConfidenceInputs {
            raw_confidences: vec![0.9],
            contradicting_passes: 0,
            has_deterministic_evidence: false,
        };
        assert!((compute_confidence(&inputs) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_evidence_boosts_confidence() {
        // spec.md §8 scenario 2: three passes at raw confidence 0.6.
        let inputs = ConfidenceInputs {
            raw_confidences: vec![0.6, 0.6, 0.6],
            contradicting_passes: 0,
            has_deterministic_evidence: false,
        };
        let score = compute_confidence(&inputs);
        assert!((score - 0.744).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn test_contradicting_pass_penalizes() {
        let inputs = ConfidenceInputs {
            raw_confidences: vec![0.8],
            contradicting_passes: 1,
            has_deterministic_evidence: false,
        };
        assert!((compute_confidence(&inputs) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_evidence_forces_one() {
        let inputs = ConfidenceInputs {
            raw_confidences: vec![0.01],
            contradicting_passes: 5,
            has_deterministic_evidence: true,
        };
        assert_eq!(compute_confidence(&inputs), 1.0);
    }

    #[test]
    fn test_score_is_always_clamped() {
        let inputs = ConfidenceInputs {
            raw_confidences: vec![0.99, 0.99, 0.99, 0.99],
            contradicting_passes: 0,
            has_deterministic_evidence: false,
        };
        let score = compute_confidence(&inputs);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_empty_evidence_is_zero() {
        let inputs = ConfidenceInputs {
            raw_confidences: vec![],
            contradicting_passes: 0,
            has_deterministic_evidence: false,
        };
        assert_eq!(compute_confidence(&inputs), 0.0);
    }
}
