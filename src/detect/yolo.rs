use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde_yaml::Value;

use crate::config::{Config, DetectorSettings};
use crate::detect::backend::DetectorBackend;
use crate::frame::Frame;
use crate::Detection;

/// Labels used when neither the config nor a dataset file provides any.
pub const DEFAULT_CLASS_NAMES: &[&str] = &["strawberry"];

/// Model-backed detector that never fails the caller.
///
/// With no model configured, or a model that cannot be loaded, every call
/// returns an empty list. Inference errors are logged and also yield an empty
/// list, so downstream stages always see a well-formed (possibly empty) result.
pub struct YoloDetector {
    backend: Option<Box<dyn DetectorBackend>>,
    class_names: Vec<String>,
}

impl YoloDetector {
    /// Build from explicit settings. Load failures are logged, not returned.
    pub fn new(
        model_path: Option<&Path>,
        settings: &DetectorSettings,
        class_names: Vec<String>,
    ) -> Self {
        let backend = match model_path {
            Some(path) => match load_model(path, settings, &class_names) {
                Ok(backend) => {
                    info!("detector model loaded from {}", path.display());
                    Some(backend)
                }
                Err(err) => {
                    warn!("detector running without a model: {:#}", err);
                    None
                }
            },
            None => {
                info!("no detector model configured; detections will be empty");
                None
            }
        };
        Self {
            backend,
            class_names,
        }
    }

    /// Build from resolved configuration, picking class names from the config
    /// list, then the dataset YAML, then the built-in default.
    pub fn from_config(config: &Config) -> Self {
        let class_names = resolve_class_names(config);
        Self::new(config.model_path.as_deref(), &config.detector, class_names)
    }

    pub fn without_model() -> Self {
        Self {
            backend: None,
            class_names: default_class_names(),
        }
    }

    /// Wrap an already-constructed backend.
    pub fn with_backend(backend: Box<dyn DetectorBackend>, class_names: Vec<String>) -> Self {
        Self {
            backend: Some(backend),
            class_names,
        }
    }

    pub fn has_model(&self) -> bool {
        self.backend.is_some()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

impl DetectorBackend for YoloDetector {
    fn name(&self) -> &'static str {
        "yolo"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(Vec::new());
        };
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        match backend.detect(frame) {
            Ok(detections) => Ok(detections),
            Err(err) => {
                warn!("{} inference failed: {:#}", backend.name(), err);
                Ok(Vec::new())
            }
        }
    }

    fn warm_up(&mut self) -> Result<()> {
        match self.backend.as_mut() {
            Some(backend) => backend.warm_up(),
            None => Ok(()),
        }
    }
}

/// Read class names from a dataset YAML `names` entry.
///
/// Both the list form (`names: [a, b]`) and the index map form
/// (`names: {0: a, 1: b}`) are accepted; map entries are ordered by index.
pub fn read_data_yaml(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset file {}", path.display()))?;
    let doc: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid dataset file {}", path.display()))?;

    match doc.get("names") {
        Some(Value::Sequence(items)) => Ok(items.iter().filter_map(scalar_to_string).collect()),
        Some(Value::Mapping(map)) => {
            let mut indexed = Vec::with_capacity(map.len());
            for (key, value) in map {
                let index = key
                    .as_u64()
                    .ok_or_else(|| anyhow!("class index {:?} is not an integer", key))?;
                if let Some(name) = scalar_to_string(value) {
                    indexed.push((index, name));
                }
            }
            indexed.sort_by_key(|(index, _)| *index);
            Ok(indexed.into_iter().map(|(_, name)| name).collect())
        }
        Some(_) => Err(anyhow!("`names` in {} is neither a list nor a map", path.display())),
        None => Ok(Vec::new()),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn resolve_class_names(config: &Config) -> Vec<String> {
    if !config.class_names.is_empty() {
        return config.class_names.clone();
    }
    if let Some(path) = config.data_yaml.as_deref() {
        match read_data_yaml(path) {
            Ok(names) if !names.is_empty() => return names,
            Ok(_) => warn!("{} has no class names; using defaults", path.display()),
            Err(err) => warn!("ignoring dataset file: {:#}", err),
        }
    }
    default_class_names()
}

fn default_class_names() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|name| name.to_string()).collect()
}

#[cfg(feature = "backend-tract")]
fn load_model(
    path: &Path,
    settings: &DetectorSettings,
    class_names: &[String],
) -> Result<Box<dyn DetectorBackend>> {
    let backend = crate::detect::TractBackend::new(path, settings.input_size)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold)
        .with_class_names(class_names.to_vec());
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model(
    path: &Path,
    _settings: &DetectorSettings,
    _class_names: &[String],
) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "cannot load {}: built without the backend-tract feature",
        path.display()
    ))
}
