//! ONNX Runtime backed classifier

use crate::error::ScoreError;
use crate::models::classifier::{Classifier, ClassifierOutput};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A classifier exported to ONNX (tree ensembles, gradient boosting, ...).
///
/// The session needs exclusive access while running, so each model carries
/// its own mutex; requests scoring different models never contend.
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    pub fn new(name: &str, session: Session, input_name: String, output_name: String) -> Self {
        Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        }
    }

    fn run(&self, features: &[f32]) -> Result<f64> {
        // Input tensor of shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        fraud_probability(&outputs, &self.output_name, &self.name)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
        let probability = self
            .run(features)
            .map_err(|e| ScoreError::model(&self.name, format!("{:#}", e)))?;

        Ok(ClassifierOutput::from_probability(probability))
    }
}

/// Extract the class-1 probability from a session's outputs.
///
/// Tree exporters disagree on layout: some emit a `[batch, classes]` tensor,
/// others a `seq(map(int64, float))`. The configured output is tried first,
/// then every non-label output.
fn fraud_probability(outputs: &SessionOutputs, output_name: &str, model_name: &str) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(&output, model_name) {
            return Ok(prob);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = probability_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, prob = prob, "Probability read from fallback output");
            return Ok(prob);
        }
    }

    warn!(model = %model_name, "No probability output found");
    anyhow::bail!("model '{}' produced no probability output", model_name)
}

fn probability_from_value(output: &DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probability_from_tensor(&dims, data);
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        match probability_from_sequence_map(output) {
            Ok(prob) => return Some(prob),
            Err(e) => debug!(model = %model_name, error = %e, "seq(map) extraction failed"),
        }
    }

    None
}

/// `[batch, classes]`, `[classes]` or a single probability column.
fn probability_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    match classes {
        c if c >= 2 => data.get(1).map(|&p| p as f64),
        1 => data.first().map(|&p| p as f64),
        _ => None,
    }
}

/// First map of a `seq(map(int64, float))` output; class 1, else 1 - class 0.
fn probability_from_sequence_map(output: &DynValue) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let first = maps.first().ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;
    let pairs = first.try_extract_key_values::<i64, f32>()?;

    if let Some((_, prob)) = pairs.iter().find(|(class, _)| *class == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = pairs.iter().find(|(class, _)| *class == 0) {
        return Ok(1.0 - *prob as f64);
    }
    anyhow::bail!("No class probability in map")
}
