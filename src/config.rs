use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const INPUT_SIZE_STRIDE: u32 = 32;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    model_path: Option<PathBuf>,
    data_yaml: Option<PathBuf>,
    class_names: Option<Vec<String>>,
    detector: Option<DetectorConfigFile>,
    visualizer: Option<VisualizerConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct VisualizerConfigFile {
    show_id: Option<bool>,
    show_confidence: Option<bool>,
    font_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    enable_logging: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model_path: Option<PathBuf>,
    /// Dataset description whose `names` list supplies class labels.
    pub data_yaml: Option<PathBuf>,
    /// Explicit class labels; wins over `data_yaml` when non-empty.
    pub class_names: Vec<String>,
    pub detector: DetectorSettings,
    pub visualizer: VisualizerSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerSettings {
    pub show_id: bool,
    pub show_confidence: bool,
    /// TrueType font for labels. Without one only boxes are drawn.
    pub font_path: Option<PathBuf>,
    /// Where annotated frames are written, if anywhere.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub enable_logging: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            show_id: true,
            show_confidence: true,
            font_path: None,
            output_dir: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enable_logging: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl Config {
    /// Resolve configuration from `STRAWBERRY_CONFIG` (JSON, or TOML for a
    /// `.toml` path), then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STRAWBERRY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let detector = file.detector.unwrap_or_default();
        let visualizer = file.visualizer.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        Self {
            model_path: file.model_path,
            data_yaml: file.data_yaml,
            class_names: file.class_names.unwrap_or_default(),
            detector: DetectorSettings {
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                iou_threshold: detector.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            },
            visualizer: VisualizerSettings {
                show_id: visualizer.show_id.unwrap_or(true),
                show_confidence: visualizer.show_confidence.unwrap_or(true),
                font_path: visualizer.font_path,
                output_dir: visualizer.output_dir,
            },
            pipeline: PipelineSettings {
                enable_logging: pipeline.enable_logging.unwrap_or(true),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_path("STRAWBERRY_MODEL") {
            self.model_path = Some(path);
        }
        if let Some(path) = env_path("STRAWBERRY_DATA_YAML") {
            self.data_yaml = Some(path);
        }
        if let Ok(names) = std::env::var("STRAWBERRY_CLASS_NAMES") {
            let parsed = split_csv(&names);
            if !parsed.is_empty() {
                self.class_names = parsed;
            }
        }
        if let Ok(value) = std::env::var("STRAWBERRY_CONF_THRESHOLD") {
            self.detector.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("STRAWBERRY_CONF_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("STRAWBERRY_IOU_THRESHOLD") {
            self.detector.iou_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("STRAWBERRY_IOU_THRESHOLD must be a number"))?;
        }
        if let Some(path) = env_path("STRAWBERRY_OUTPUT_DIR") {
            self.visualizer.output_dir = Some(path);
        }
        if let Some(path) = env_path("STRAWBERRY_FONT") {
            self.visualizer.font_path = Some(path);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_unit_interval("confidence_threshold", self.detector.confidence_threshold)?;
        check_unit_interval("iou_threshold", self.detector.iou_threshold)?;
        let size = self.detector.input_size;
        if size == 0 || size % INPUT_SIZE_STRIDE != 0 {
            return Err(anyhow!(
                "input_size must be a positive multiple of {}, got {}",
                INPUT_SIZE_STRIDE,
                size
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg: ConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.detector.input_size, 640);
        assert_eq!(cfg.detector.confidence_threshold, 0.25);
        assert_eq!(cfg.detector.iou_threshold, 0.45);
        assert!(cfg.visualizer.show_id);
        assert!(cfg.visualizer.show_confidence);
        assert!(cfg.pipeline.enable_logging);
        assert!(cfg.model_path.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let mut cfg = Config::default();
        cfg.detector.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.detector.iou_threshold = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.detector.iou_threshold = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unaligned_input_size() {
        let mut cfg = Config::default();
        cfg.detector.input_size = 0;
        assert!(cfg.validate().is_err());
        cfg.detector.input_size = 500;
        assert!(cfg.validate().is_err());
        cfg.detector.input_size = 320;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let file: ConfigFile = serde_json::from_str(r#"{"detector": {"input_size": 320}}"#)?;
        let cfg = Config::from_file(file);
        assert_eq!(cfg.detector.input_size, 320);
        assert_eq!(cfg.detector.confidence_threshold, 0.25);
        assert!(cfg.class_names.is_empty());
        Ok(())
    }

    #[test]
    fn split_csv_skips_blanks() {
        assert_eq!(split_csv(" a, ,b,"), vec!["a", "b"]);
    }
}
