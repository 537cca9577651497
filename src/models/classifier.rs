use crate::config::OnnxConfig;
use crate::image::InputTensor;
use crate::models::{Model, ModelArtifact};
use crate::utils::error::PredictError;
use crate::Result;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 基于 ONNX Runtime 的二分类模型
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    name: String,
}

impl OnnxClassifier {
    pub fn new(artifact: &ModelArtifact, config: &OnnxConfig) -> Result<Self> {
        let builder = Session::builder()
            .and_then(|b| b.with_optimization_level(optimization_level(config.optimization_level)))
            .and_then(|b| b.with_intra_threads(config.intra_threads))
            .map_err(load_error)?;

        let session = match artifact {
            ModelArtifact::File(path) => {
                tracing::info!("Loading classification model from: {}", path.display());
                builder.commit_from_file(path).map_err(load_error)?
            }
            ModelArtifact::Bytes { origin, data } => {
                tracing::info!("Loading classification model from: {} ({} bytes)", origin, data.len());
                builder.commit_from_memory(data).map_err(load_error)?
            }
        };

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(PredictError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(PredictError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model io: input='{}', output='{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            name: artifact.origin(),
        })
    }
}

impl Model for OnnxClassifier {
    fn predict(&self, input: &InputTensor) -> Result<f32> {
        let input_tensor = Tensor::from_array(input.view().to_owned()).map_err(inference_error)?;

        let values: Vec<f32> = {
            let mut session = self.session.lock();
            let outputs = session
                .run(inputs![self.input_name.as_str() => input_tensor])
                .map_err(inference_error)?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output
                    .try_extract_array::<f32>()
                    .map_err(inference_error)?
                    .iter()
                    .copied()
                    .collect(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(PredictError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        // 期望输出 [1, 1]
        match values.as_slice() {
            [probability] => Ok(*probability),
            other => Err(PredictError::Inference(format!(
                "Expected a single probability, got {} values",
                other.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

fn load_error(e: ort::Error) -> PredictError {
    PredictError::ModelLoad(e.to_string())
}

fn inference_error(e: ort::Error) -> PredictError {
    PredictError::Inference(e.to_string())
}
