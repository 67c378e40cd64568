#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::classify::backend::OccupancyClassifier;
use crate::frame::{FrameBuffer, PixelFormat};
use crate::Occupancy;

/// Tract-based backend for ONNX occupancy models.
///
/// Expects a two-class model (index 0 = free, index 1 = occupied) taking a
/// `1x3xHxW` f32 tensor scaled to [0, 1]. The model file is read once at
/// startup; inference performs no I/O.
pub struct TractClassifier {
    model: TypedSimplePlan<TypedModel>,
    width: u32,
    height: u32,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, patch: &FrameBuffer) -> Result<Tensor> {
        if patch.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "patch size {}x{} does not match model input {}x{}",
                patch.width(),
                patch.height(),
                self.width,
                self.height
            ));
        }
        if patch.format() != PixelFormat::Rgb {
            return Err(anyhow!("tract backend requires RGB patches"));
        }

        let width = self.width as usize;
        let pixels = patch.as_bytes();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn extract_label(&self, outputs: TVec<TValue>) -> Result<Occupancy> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let mut best = (0usize, f32::NEG_INFINITY);
        for (idx, score) in scores.iter().enumerate() {
            if *score > best.1 {
                best = (idx, *score);
            }
        }
        if !best.1.is_finite() {
            return Err(anyhow!("model produced non-finite scores"));
        }

        match best.0 {
            0 => Ok(Occupancy::Free),
            1 => Ok(Occupancy::Occupied),
            other => Err(anyhow!("model produced unrecognized class index {}", other)),
        }
    }
}

impl OccupancyClassifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, patch: &FrameBuffer) -> Result<Occupancy> {
        let input = self.build_input(patch)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_label(outputs)
    }
}
