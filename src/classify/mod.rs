//! Occupancy classification backends.
//!
//! The classifier is an opaque capability: fixed-size pixel patch in, binary
//! label out. It is injected into the tracker as a trait object, which keeps
//! the model swappable and lets tests use scripted doubles.

mod backend;
mod backends;

use anyhow::{anyhow, Result};

use crate::config::ClassifierSettings;

pub use backend::{InvertLabels, OccupancyClassifier};
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;

/// Construct the configured classifier backend.
///
/// `invert_classifier` wraps the backend so models trained with flipped
/// labels can be used without retraining.
pub fn build_classifier(settings: &ClassifierSettings) -> Result<Box<dyn OccupancyClassifier>> {
    let backend: Box<dyn OccupancyClassifier> = match settings.backend.as_str() {
        "stub" => Box::new(StubClassifier::default()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract backend requires classifier.model_path"))?;
            Box::new(TractClassifier::new(
                model_path,
                settings.input_width,
                settings.input_height,
            )?)
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => {
            return Err(anyhow!(
                "tract backend requires building with the backend-tract feature"
            ))
        }
        other => return Err(anyhow!("unknown classifier backend '{}'", other)),
    };

    if settings.invert {
        Ok(Box::new(InvertLabels::new(backend)))
    } else {
        Ok(backend)
    }
}
