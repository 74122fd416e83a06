use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

mod error;
mod model;
mod recommend;
mod upload;
mod utils;

use error::ServiceError;
use model::{Classifier, ModelError, PestModel};
use recommend::RecommendationTable;
use utils::{ensure_files_exist, Config};

/// Read-only service context, built once at startup and shared across
/// requests. No locks: nothing here mutates after construction.
struct AppState {
    classifier: Box<dyn Classifier>,
    labels: Vec<String>,
    pesticides: RecommendationTable,
    upload_dir: PathBuf,
    keep_uploads: bool,
}

#[derive(Serialize)]
struct PredictResponse {
    pest: String,
    recommended_pesticide: String,
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    ensure_files_exist(&config).await;

    let classifier = PestModel::load(&config.model_path).expect("Failed to load model");
    let labels =
        model::load_class_labels(&config.class_list_path).expect("Failed to load class list");
    let pesticides = RecommendationTable::from_path(&config.pesticide_csv_path)
        .expect("Failed to load pesticide table");
    std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");

    log::info!(
        "loaded {} class labels and {} pesticide entries",
        labels.len(),
        pesticides.len()
    );

    let state = Arc::new(AppState {
        classifier: Box::new(classifier),
        labels,
        pesticides,
        upload_dir: config.upload_dir.clone(),
        keep_uploads: config.keep_uploads,
    });

    let app = app(state, config.body_limit_bytes);

    log::info!("listening on http://0.0.0.0:{}", config.port);
    axum::Server::bind(&format!("0.0.0.0:{}", config.port).parse().unwrap())
        .serve(app.into_make_service())
        .await
        .unwrap();
}

fn app(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
}

async fn predict_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ServiceError> {
    let mut uploaded: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await?.to_vec();
            uploaded = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) = match uploaded {
        Some((filename, bytes)) if !bytes.is_empty() => (filename, bytes),
        _ => return Err(ServiceError::MissingImage),
    };

    let guard = upload::persist(&state.upload_dir, &filename, &bytes).await?;

    // Decode from the in-memory bytes; the on-disk copy is an audit
    // artifact, not an input.
    let input = model::preprocess_image(&bytes)?;
    let scores = state.classifier.class_scores(&input)?;
    if scores.len() != state.labels.len() {
        return Err(ModelError::ScoreCountMismatch {
            expected: state.labels.len(),
            got: scores.len(),
        }
        .into());
    }

    let index = model::argmax(&scores).ok_or(ModelError::EmptyScores)?;
    let pest = state.labels[index].clone();
    let recommended_pesticide = state.pesticides.lookup(&pest).to_string();

    log::info!(
        "predicted '{}' (score {:.4}) for upload {}",
        pest,
        scores[index],
        guard.path().display()
    );
    if state.keep_uploads {
        guard.keep();
    }

    Ok(Json(PredictResponse {
        pest,
        recommended_pesticide,
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}
