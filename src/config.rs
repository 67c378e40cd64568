use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

const DEFAULT_MASK_PATH: &str = "mask.png";
const DEFAULT_MIN_SPOT_AREA: u32 = 100;
const DEFAULT_SOURCE_LOCATOR: &str = "stub://lot";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SAMPLE_STEP: u32 = 30;
const DEFAULT_DIFF_THRESHOLD: f32 = 0.4;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_WIDTH: u32 = 15;
const DEFAULT_INPUT_HEIGHT: u32 = 15;

#[derive(Debug, Deserialize, Default)]
struct LotwatchConfigFile {
    mask: Option<MaskConfigFile>,
    source: Option<SourceConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    diff_threshold: Option<f32>,
    annotate: Option<AnnotateConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct MaskConfigFile {
    path: Option<PathBuf>,
    min_spot_area: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    locator: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_step: Option<u32>,
    queue_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    invert: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    font_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

/// Immutable runtime configuration, constructed once at startup and passed
/// by reference. Core components never look settings up ambiently.
#[derive(Debug, Clone)]
pub struct LotwatchConfig {
    pub mask: MaskSettings,
    pub source: SourceSettings,
    pub classifier: ClassifierSettings,
    /// Change score above which a region is dirty, in [0, 1].
    pub diff_threshold: f32,
    pub annotate: AnnotateSettings,
}

#[derive(Debug, Clone)]
pub struct MaskSettings {
    pub path: PathBuf,
    /// Connected components below this pixel area are annotation noise.
    pub min_spot_area: u32,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub locator: String,
    /// Frame dimensions for synthetic sources; decoded sources carry their
    /// own.
    pub width: u32,
    pub height: u32,
    /// Process every Nth frame.
    pub sample_step: u32,
    /// `Some(n)` decouples decoding behind a bounded queue of n frames.
    pub queue_depth: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    /// Swap labels for models trained with the opposite class order.
    pub invert: bool,
}

#[derive(Debug, Clone)]
pub struct AnnotateSettings {
    pub font_path: Option<PathBuf>,
    /// Write annotated sampled frames here when set.
    pub output_dir: Option<PathBuf>,
}

impl LotwatchConfig {
    /// Load from the file named by `LOTWATCH_CONFIG` (when set), apply
    /// `LOTWATCH_*` environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LOTWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LotwatchConfigFile) -> Self {
        let mask = MaskSettings {
            path: file
                .mask
                .as_ref()
                .and_then(|mask| mask.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MASK_PATH)),
            min_spot_area: file
                .mask
                .as_ref()
                .and_then(|mask| mask.min_spot_area)
                .unwrap_or(DEFAULT_MIN_SPOT_AREA),
        };
        let source = SourceSettings {
            locator: file
                .source
                .as_ref()
                .and_then(|source| source.locator.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_LOCATOR.to_string()),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_SOURCE_HEIGHT),
            sample_step: file
                .source
                .as_ref()
                .and_then(|source| source.sample_step)
                .unwrap_or(DEFAULT_SAMPLE_STEP),
            queue_depth: file.source.as_ref().and_then(|source| source.queue_depth),
        };
        let classifier = ClassifierSettings {
            backend: file
                .classifier
                .as_ref()
                .and_then(|classifier| classifier.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: file
                .classifier
                .as_ref()
                .and_then(|classifier| classifier.model_path.clone()),
            input_width: file
                .classifier
                .as_ref()
                .and_then(|classifier| classifier.input_width)
                .unwrap_or(DEFAULT_INPUT_WIDTH),
            input_height: file
                .classifier
                .as_ref()
                .and_then(|classifier| classifier.input_height)
                .unwrap_or(DEFAULT_INPUT_HEIGHT),
            invert: file
                .classifier
                .as_ref()
                .and_then(|classifier| classifier.invert)
                .unwrap_or(false),
        };
        let annotate = AnnotateSettings {
            font_path: file
                .annotate
                .as_ref()
                .and_then(|annotate| annotate.font_path.clone()),
            output_dir: file.annotate.and_then(|annotate| annotate.output_dir),
        };
        Self {
            mask,
            source,
            classifier,
            diff_threshold: file.diff_threshold.unwrap_or(DEFAULT_DIFF_THRESHOLD),
            annotate,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("LOTWATCH_MASK_PATH") {
            if !path.trim().is_empty() {
                self.mask.path = PathBuf::from(path);
            }
        }
        if let Ok(locator) = std::env::var("LOTWATCH_SOURCE") {
            if !locator.trim().is_empty() {
                self.source.locator = locator;
            }
        }
        if let Ok(step) = std::env::var("LOTWATCH_SAMPLE_STEP") {
            self.source.sample_step = step
                .parse()
                .map_err(|_| anyhow!("LOTWATCH_SAMPLE_STEP must be an integer"))?;
        }
        if let Ok(threshold) = std::env::var("LOTWATCH_DIFF_THRESHOLD") {
            self.diff_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("LOTWATCH_DIFF_THRESHOLD must be a number"))?;
        }
        if let Ok(backend) = std::env::var("LOTWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.classifier.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("LOTWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.classifier.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(dir) = std::env::var("LOTWATCH_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.annotate.output_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.diff_threshold) {
            return Err(anyhow!(
                "diff_threshold must be within [0, 1], got {}",
                self.diff_threshold
            ));
        }
        if self.source.sample_step == 0 {
            return Err(anyhow!("source.sample_step must be at least 1"));
        }
        if self.mask.min_spot_area == 0 {
            return Err(anyhow!("mask.min_spot_area must be at least 1"));
        }
        if self.classifier.input_width == 0 || self.classifier.input_height == 0 {
            return Err(anyhow!("classifier input dimensions must be non-zero"));
        }
        if self.source.queue_depth == Some(0) {
            return Err(anyhow!("source.queue_depth must be at least 1 when set"));
        }
        if self.classifier.backend == "tract" && self.classifier.model_path.is_none() {
            return Err(anyhow!("classifier.model_path is required for tract"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<LotwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
