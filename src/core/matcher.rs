use crate::core::recognizer::cosine_similarity;
use crate::storage::enrollment_store::EnrollmentRecord;

/// Result of matching a query embedding against the enrolled records.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Match { name: String, similarity: f32 },
    NoMatch,
}

/// Linear scan of the enrolled records for the best cosine match.
///
/// Candidates are visited in lexicographic name order and only a strictly
/// better similarity displaces the current best, so equal scores resolve
/// to the smallest name. An empty record set is always `NoMatch`.
pub fn identify(query: &[f32], records: &[EnrollmentRecord], threshold: f32) -> MatchOutcome {
    let mut candidates: Vec<&EnrollmentRecord> = records.iter().collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    let mut best: Option<(&EnrollmentRecord, f32)> = None;
    for record in candidates {
        let similarity = cosine_similarity(query, &record.embedding);
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((record, similarity));
        }
    }

    match best {
        Some((record, similarity)) if similarity >= threshold => MatchOutcome::Match {
            name: record.name.clone(),
            similarity,
        },
        _ => MatchOutcome::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, embedding: Vec<f32>) -> EnrollmentRecord {
        EnrollmentRecord::new(name, embedding)
    }

    #[test]
    fn empty_records_never_match() {
        assert_eq!(identify(&[1.0, 0.0], &[], 0.5), MatchOutcome::NoMatch);
    }

    #[test]
    fn exact_embedding_matches_its_owner() {
        let records = vec![
            record("alice", vec![1.0, 0.0, 0.0]),
            record("bob", vec![0.0, 1.0, 0.0]),
        ];

        match identify(&[1.0, 0.0, 0.0], &records, 0.5) {
            MatchOutcome::Match { name, similarity } => {
                assert_eq!(name, "alice");
                assert!((similarity - 1.0).abs() < 1e-6);
            }
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn below_threshold_is_no_match() {
        let records = vec![record("alice", vec![0.0, 1.0])];
        assert_eq!(identify(&[1.0, 0.0], &records, 0.5), MatchOutcome::NoMatch);
    }

    #[test]
    fn best_match_wins_regardless_of_position() {
        let records = vec![
            record("decoy1", vec![0.0, 1.0, 0.0]),
            record("decoy2", vec![0.0, 0.0, 1.0]),
            record("target", vec![1.0, 0.0, 0.0]),
        ];

        match identify(&[1.0, 0.0, 0.0], &records, 0.5) {
            MatchOutcome::Match { name, .. } => assert_eq!(name, "target"),
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn equal_scores_resolve_to_smallest_name() {
        // Same embedding under two names, in reverse insertion order.
        let records = vec![
            record("zoe", vec![1.0, 0.0]),
            record("anna", vec![1.0, 0.0]),
        ];

        match identify(&[1.0, 0.0], &records, 0.5) {
            MatchOutcome::Match { name, .. } => assert_eq!(name, "anna"),
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }
}
