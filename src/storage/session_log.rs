use crate::common::{FaceGateError, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Append-only log of successful authentications, one
/// `name,timestamp,direction` line per event.
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, name: &str, direction: Direction) -> Result<()> {
        self.append_at(name, Local::now(), direction)
    }

    pub fn append_at(
        &self,
        name: &str,
        at: DateTime<Local>,
        direction: Direction,
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| {
                FaceGateError::Log(format!("failed to open {}: {}", self.path.display(), e))
            })?;

        writeln!(
            file,
            "{},{},{}",
            name,
            at.format(TIMESTAMP_FORMAT),
            direction.as_str()
        )
        .map_err(|e| {
            FaceGateError::Log(format!("failed to append to {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 12, 34, 56).unwrap()
    }

    #[test]
    fn append_writes_one_formatted_line() {
        let tmp = tempfile::tempdir().unwrap();
        let log = SessionLog::new(tmp.path().join("log.txt"));

        log.append_at("alice", fixed_time(), Direction::In).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "alice,2024-01-02 12:34:56,in\n");
    }

    #[test]
    fn appends_never_rewrite_prior_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = SessionLog::new(tmp.path().join("log.txt"));

        log.append_at("alice", fixed_time(), Direction::In).unwrap();
        log.append_at("bob", fixed_time(), Direction::In).unwrap();
        log.append_at("alice", fixed_time(), Direction::Out).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "alice,2024-01-02 12:34:56,in");
        assert_eq!(lines[1], "bob,2024-01-02 12:34:56,in");
        assert_eq!(lines[2], "alice,2024-01-02 12:34:56,out");
    }

    #[test]
    fn unwritable_path_surfaces_as_log_error() {
        let tmp = tempfile::tempdir().unwrap();
        let log = SessionLog::new(tmp.path().join("missing").join("log.txt"));

        assert!(matches!(
            log.append_at("alice", fixed_time(), Direction::In),
            Err(FaceGateError::Log(_))
        ));
    }
}
