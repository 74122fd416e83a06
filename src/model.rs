use std::fs::File;
use std::io::Read;

use image::imageops::FilterType;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use thiserror::Error;

/// Input edge expected by the classifier: 224x224 RGB, batch of 1.
pub const INPUT_SIZE: u32 = 224;

const INPUT_OP: &str = "x";
const OUTPUT_OP: &str = "Identity";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("tensorflow error: {0}")]
    TensorFlow(#[from] tensorflow::Status),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("graph operation '{0}' not found")]
    MissingOperation(&'static str),
    #[error("class list '{0}' contains no labels")]
    EmptyClassList(String),
    #[error("model returned {got} scores for {expected} class labels")]
    ScoreCountMismatch { expected: usize, got: usize },
    #[error("model returned an empty score vector")]
    EmptyScores,
}

/// Opaque scoring function. The production implementation wraps a
/// TensorFlow session; tests substitute a deterministic stub.
pub trait Classifier: Send + Sync {
    /// Scores a preprocessed input (flat 1x224x224x3, normalized to
    /// [-1, 1]) and returns one score per class, in class-list order.
    fn class_scores(&self, input: &[f32]) -> Result<Vec<f32>, ModelError>;
}

pub struct PestModel {
    session: Session,
    graph: Graph,
}

impl PestModel {
    pub fn load(model_path: &str) -> Result<Self, ModelError> {
        let mut graph = Graph::new();
        let mut model_file = File::open(model_path)?;
        let mut model_bytes = Vec::new();
        model_file.read_to_end(&mut model_bytes)?;

        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;
        let session = Session::new(&SessionOptions::new(), &graph)?;

        Ok(PestModel { session, graph })
    }
}

impl Classifier for PestModel {
    fn class_scores(&self, input: &[f32]) -> Result<Vec<f32>, ModelError> {
        let mut tensor: Tensor<f32> =
            Tensor::new(&[1, INPUT_SIZE as u64, INPUT_SIZE as u64, 3]);
        tensor.copy_from_slice(input);

        let input_operation = self
            .graph
            .operation_by_name(INPUT_OP)
            .map_err(|_| ModelError::MissingOperation(INPUT_OP))?
            .ok_or(ModelError::MissingOperation(INPUT_OP))?;
        let output_operation = self
            .graph
            .operation_by_name(OUTPUT_OP)
            .map_err(|_| ModelError::MissingOperation(OUTPUT_OP))?
            .ok_or(ModelError::MissingOperation(OUTPUT_OP))?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session.run(&mut args)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token)?;
        Ok(output_tensor.to_vec())
    }
}

/// Decodes an uploaded image and flattens it into the classifier's
/// input layout: 224x224 RGB, MobileNetV2 scaling (x / 127.5 - 1).
pub fn preprocess_image(image_data: &[u8]) -> Result<Vec<f32>, ModelError> {
    let img = image::load_from_memory(image_data)?;
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let mut flat = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
    for pixel in rgb.pixels() {
        flat.push(pixel[0] as f32 / 127.5 - 1.0);
        flat.push(pixel[1] as f32 / 127.5 - 1.0);
        flat.push(pixel[2] as f32 / 127.5 - 1.0);
    }

    Ok(flat)
}

/// Loads the ordered label list, one label per line. The order must
/// match the order the model was trained with.
pub fn load_class_labels(path: &str) -> Result<Vec<String>, ModelError> {
    let labels: Vec<String> = std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        return Err(ModelError::EmptyClassList(path.to_string()));
    }
    Ok(labels)
}

/// Index of the highest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, best_score)) => score > best_score,
        };
        if better {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}
