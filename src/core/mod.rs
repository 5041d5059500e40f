pub mod auth;
pub mod detector;
pub mod matcher;
pub mod recognizer;

pub use auth::{AuthOutcome, FaceAuthenticator};
pub use detector::{FaceBox, FaceDetector};
pub use matcher::{identify, MatchOutcome};
pub use recognizer::{cosine_similarity, Embedding, FaceRecognizer};

use ort::GraphOptimizationLevel;

pub(crate) fn optimization_level(level: u32) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}
