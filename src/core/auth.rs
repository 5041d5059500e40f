use crate::common::{Config, FaceGateError, Result};
use crate::core::detector::FaceDetector;
use crate::core::matcher::{self, MatchOutcome};
use crate::core::recognizer::{Embedding, FaceRecognizer};
use crate::storage::enrollment_store::{EnrollmentRecord, EnrollmentStore};
use image::DynamicImage;

/// Outcome of a login attempt, distinguishing "nobody in frame" from
/// "unrecognized face".
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Accepted { name: String, similarity: f32 },
    Unknown,
    NoFace,
}

/// Detector + recognizer composed into the login/enrollment entry points.
pub struct FaceAuthenticator {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    similarity_threshold: f32,
}

impl FaceAuthenticator {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: FaceDetector::new(config)?,
            recognizer: FaceRecognizer::new(config)?,
            similarity_threshold: config.matcher.similarity_threshold,
        })
    }

    /// Embedding of the most confident face in the frame, or `None` when no
    /// face is detectable.
    pub fn embed(&self, frame: &DynamicImage) -> Result<Option<Embedding>> {
        let faces = self.detector.detect(frame)?;
        match faces.first() {
            Some(face) => Ok(Some(self.recognizer.embed(frame, face)?)),
            None => Ok(None),
        }
    }

    pub fn identify(
        &self,
        frame: &DynamicImage,
        records: &[EnrollmentRecord],
    ) -> Result<AuthOutcome> {
        let Some(embedding) = self.embed(frame)? else {
            return Ok(AuthOutcome::NoFace);
        };

        match matcher::identify(&embedding, records, self.similarity_threshold) {
            MatchOutcome::Match { name, similarity } => {
                Ok(AuthOutcome::Accepted { name, similarity })
            }
            MatchOutcome::NoMatch => Ok(AuthOutcome::Unknown),
        }
    }

    /// Enroll `name` from the given frame. Zero-face frames are rejected, so
    /// no record is ever written without a detected face behind it.
    pub fn enroll(&self, store: &EnrollmentStore, name: &str, frame: &DynamicImage) -> Result<()> {
        let name = EnrollmentStore::validate_name(name)?;
        let Some(embedding) = self.embed(frame)? else {
            return Err(FaceGateError::NoFaceDetected);
        };
        store.put(name, &embedding)?;
        tracing::info!(user = name, "user enrolled");
        Ok(())
    }
}
