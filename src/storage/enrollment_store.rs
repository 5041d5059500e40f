use crate::common::{FaceGateError, Result};
use crate::core::recognizer::Embedding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;
const RECORD_EXTENSION: &str = "bincode";

/// One enrolled user: display name plus the embedding captured at
/// registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub version: u32,
    pub name: String,
    pub embedding: Embedding,
}

impl EnrollmentRecord {
    pub fn new(name: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            version: STORE_VERSION,
            name: name.into(),
            embedding,
        }
    }
}

/// Directory of `<name>.bincode` files, one per enrolled user.
pub struct EnrollmentStore {
    data_dir: PathBuf,
}

impl EnrollmentStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| {
            FaceGateError::Storage(format!("failed to create {}: {}", data_dir.display(), e))
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Persist an embedding under `name`, silently replacing any existing
    /// record with that name.
    pub fn put(&self, name: &str, embedding: &[f32]) -> Result<()> {
        let name = Self::validate_name(name)?;
        let record = EnrollmentRecord::new(name, embedding.to_vec());
        let encoded = bincode::serialize(&record).map_err(|e| {
            FaceGateError::Storage(format!("failed to serialize record for {}: {}", name, e))
        })?;

        let path = self.record_path(name);
        fs::write(&path, encoded).map_err(|e| {
            FaceGateError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;
        tracing::info!(user = name, "enrollment record written");
        Ok(())
    }

    /// Every persisted record, sorted by name.
    pub fn all(&self) -> Result<Vec<EnrollmentRecord>> {
        let entries = fs::read_dir(&self.data_dir).map_err(|e| {
            FaceGateError::Storage(format!("failed to read {}: {}", self.data_dir.display(), e))
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                FaceGateError::Storage(format!(
                    "failed to read {}: {}",
                    self.data_dir.display(),
                    e
                ))
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            let data = fs::read(&path).map_err(|e| {
                FaceGateError::Storage(format!("failed to read {}: {}", path.display(), e))
            })?;
            match bincode::deserialize::<EnrollmentRecord>(&data) {
                Ok(record) => records.push(record),
                // One damaged record must not lock out every user.
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping undecodable enrollment record"
                ),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// The name doubles as the record file name; refuse anything that could
    /// escape the store directory.
    pub fn validate_name(name: &str) -> Result<&str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FaceGateError::InvalidName("username cannot be empty".into()));
        }
        if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
            return Err(FaceGateError::InvalidName(format!(
                "username '{}' is not a valid record name",
                name
            )));
        }
        Ok(name)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, RECORD_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::{identify, MatchOutcome};
    use crate::storage::session_log::{Direction, SessionLog};
    use chrono::TimeZone;

    fn open_store(dir: &Path) -> EnrollmentStore {
        EnrollmentStore::open(dir.join("db")).unwrap()
    }

    #[test]
    fn put_then_all_roundtrips_the_record() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        store.put("alice", &[0.1, 0.2, 0.3]).unwrap();

        let records = store.all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alice");
        assert_eq!(records[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn second_put_replaces_instead_of_duplicating() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        store.put("alice", &[1.0, 0.0]).unwrap();
        store.put("alice", &[0.0, 1.0]).unwrap();

        let records = store.all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn all_returns_records_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        store.put("carol", &[1.0]).unwrap();
        store.put("alice", &[2.0]).unwrap();
        store.put("bob", &[3.0]).unwrap();

        let names: Vec<_> = store.all().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn empty_store_yields_no_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn invalid_names_are_rejected_and_write_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        for name in ["", "   ", "a/b", "..", "a\\b"] {
            assert!(
                matches!(store.put(name, &[1.0]), Err(FaceGateError::InvalidName(_))),
                "name {:?} should be rejected",
                name
            );
        }
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn name_is_trimmed_before_storing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        store.put("  alice  ", &[1.0]).unwrap();
        assert_eq!(store.all().unwrap()[0].name, "alice");
    }

    #[test]
    fn undecodable_record_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());

        store.put("alice", &[1.0]).unwrap();
        fs::write(store.data_dir().join("mallory.bincode"), b"not a record").unwrap();

        let records = store.all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alice");
    }

    #[test]
    fn missing_directory_surfaces_as_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());
        fs::remove_dir_all(store.data_dir()).unwrap();

        assert!(matches!(store.all(), Err(FaceGateError::Storage(_))));
    }

    // The register-then-login scenario, with the embedding capability
    // stubbed out by synthetic vectors.
    #[test]
    fn register_login_and_stranger_scenario() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(tmp.path());
        let log = SessionLog::new(tmp.path().join("log.txt"));
        let threshold = 0.5;

        let alice = vec![0.9f32, 0.1, 0.05];
        let stranger = vec![-0.2f32, 0.9, 0.1];

        // register "alice"
        store.put("alice", &alice).unwrap();
        let records = store.all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alice");

        // login with the same face: match + one log line ending in ",in"
        let outcome = identify(&alice, &records, threshold);
        match outcome {
            MatchOutcome::Match { ref name, .. } => assert_eq!(name, "alice"),
            MatchOutcome::NoMatch => panic!("expected alice to match"),
        }
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        log.append_at("alice", at, Direction::In).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("alice,"));
        assert!(lines[0].ends_with(",in"));

        // login with an unenrolled face: no match, log unchanged
        assert_eq!(identify(&stranger, &records, threshold), MatchOutcome::NoMatch);
        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
