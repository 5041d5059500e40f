use crate::common::error::{FaceGateError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "facegate.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub models: ModelConfig,
    pub detector: DetectorConfig,
    pub recognizer: RecognizerConfig,
    pub matcher: MatcherConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
    pub optimization_level: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("models/face-detector.onnx"),
            recognizer_path: PathBuf::from("models/face-embedder.onnx"),
            optimization_level: 3,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DetectorConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RecognizerConfig {
    pub input_size: u32,
    pub normalization_value: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            input_size: 112,
            normalization_value: 127.5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MatcherConfig {
    pub similarity_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub log_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
            log_path: PathBuf::from("log.txt"),
            snapshot_path: PathBuf::from(".login-snapshot.jpg"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UiConfig {
    pub preview_interval_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            preview_interval_ms: 20,
        }
    }
}

impl Config {
    /// Load the configuration, falling back to built-in defaults.
    ///
    /// Looks for `facegate.toml` in the platform config directory first,
    /// then in the working directory. The app runs without any file.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::system_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        let local = Path::new(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from_path(local);
        }

        Ok(Self::default())
    }

    fn system_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "facegate", "FaceGate")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| FaceGateError::Other(anyhow::anyhow!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Camera width must be between 1 and 4096, got {}",
                self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Camera height must be between 1 and 4096, got {}",
                self.camera.height
            )));
        }

        if self.matcher.similarity_threshold < 0.0 || self.matcher.similarity_threshold > 1.0 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Similarity threshold must be between 0.0 and 1.0, got {}",
                self.matcher.similarity_threshold
            )));
        }
        if self.detector.confidence_threshold < 0.0 || self.detector.confidence_threshold > 1.0 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence_threshold
            )));
        }
        if self.detector.iou_threshold < 0.0 || self.detector.iou_threshold > 1.0 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "NMS IoU threshold must be between 0.0 and 1.0, got {}",
                self.detector.iou_threshold
            )));
        }

        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }

        if self.ui.preview_interval_ms == 0 || self.ui.preview_interval_ms > 1000 {
            return Err(FaceGateError::Other(anyhow::anyhow!(
                "Preview interval must be between 1 and 1000 ms, got {}",
                self.ui.preview_interval_ms
            )));
        }

        Ok(())
    }
}
