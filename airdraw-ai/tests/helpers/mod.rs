//! Shared fixtures for airdraw-ai integration tests
//!
//! In-process axum servers stand in for the phone's sensor server and the
//! model server; both bind 127.0.0.1:0 and run until the test runtime ends.

#![allow(dead_code)]

pub mod log_capture;

use airdraw_ai::pipeline::{AffineStats, Classifier, ClassifierError, InferenceContext, NormalizationModel};
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use ndarray::{Array1, Array3, ArrayD, IxDyn};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUFFER_NAMES: [&str; 6] = ["accX", "accY", "accZ", "gyrX", "gyrY", "gyrZ"];

/// Probabilities peaking at digit 7
pub fn peaked_probabilities() -> Vec<f64> {
    let mut probs = vec![0.02; 10];
    probs[7] = 0.82;
    probs
}

/// Classifier returning a fixed output and remembering the batch it saw
pub struct StubClassifier {
    shape: Vec<usize>,
    values: Vec<f64>,
    pub last_batch: Mutex<Option<Array3<f64>>>,
}

impl StubClassifier {
    pub fn new(shape: &[usize], values: Vec<f64>) -> Self {
        Self {
            shape: shape.to_vec(),
            values,
            last_batch: Mutex::new(None),
        }
    }

    pub fn peaked() -> Self {
        Self::new(&[1, 10], peaked_probabilities())
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn predict(&self, batch: &Array3<f64>) -> Result<ArrayD<f64>, ClassifierError> {
        *self.last_batch.lock().unwrap() = Some(batch.clone());
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.values.clone())
            .map_err(|e| ClassifierError::ModelError(e.to_string()))
    }
}

/// Normalization that leaves values unchanged
pub fn identity_normalization() -> NormalizationModel {
    NormalizationModel::Affine(AffineStats::new(Array1::zeros(6), Array1::ones(6)).unwrap())
}

pub fn context_with(classifier: Arc<dyn Classifier>) -> InferenceContext {
    InferenceContext::new(identity_normalization(), classifier, 200).unwrap()
}

/// CSV text with `rows` rows where ax = 1..=rows and the rest are 0
pub fn ramp_csv(rows: usize) -> String {
    let mut csv = String::from("ax,ay,az,gx,gy,gz\n");
    for i in 1..=rows {
        csv.push_str(&format!("{},0,0,0,0,0\n", i));
    }
    csv
}

/// Behaviour of the fake phone
#[derive(Debug, Clone)]
pub struct PhoneBehaviour {
    /// Buffer length per channel, in accX..gyrZ order
    pub lengths: [usize; 6],
    /// Delay before every response
    pub delay: Duration,
    /// Answer `/get` with a document missing `gyrZ`
    pub drop_gyr_z: bool,
    /// Answer `/control?cmd=start` with `{"result": false}`
    pub refuse_start: bool,
}

impl Default for PhoneBehaviour {
    fn default() -> Self {
        Self {
            lengths: [100; 6],
            delay: Duration::ZERO,
            drop_gyr_z: false,
            refuse_start: false,
        }
    }
}

#[derive(Clone)]
struct PhoneState {
    behaviour: PhoneBehaviour,
    commands: Arc<Mutex<Vec<String>>>,
}

/// Running fake phone
pub struct FakePhone {
    pub base_url: String,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakePhone {
    /// Commands received so far, including "get" for buffer fetches
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

pub async fn spawn_phone(behaviour: PhoneBehaviour) -> FakePhone {
    let commands = Arc::new(Mutex::new(Vec::new()));
    let state = PhoneState {
        behaviour,
        commands: commands.clone(),
    };

    let app = Router::new()
        .route("/control", get(phone_control))
        .route("/get", get(phone_get))
        .with_state(state);

    let base_url = serve(app).await;
    FakePhone { base_url, commands }
}

async fn phone_control(
    State(state): State<PhoneState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    tokio::time::sleep(state.behaviour.delay).await;
    let cmd = params.get("cmd").cloned().unwrap_or_default();
    state.commands.lock().unwrap().push(cmd.clone());

    let accepted = !(state.behaviour.refuse_start && cmd == "start");
    Json(json!({ "result": accepted }))
}

async fn phone_get(
    State(state): State<PhoneState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    tokio::time::sleep(state.behaviour.delay).await;
    state.commands.lock().unwrap().push("get".to_string());

    let mut buffers = Map::new();
    for (i, name) in BUFFER_NAMES.iter().enumerate() {
        if !params.contains_key(*name) || (state.behaviour.drop_gyr_z && *name == "gyrZ") {
            continue;
        }
        let values: Vec<f64> = (0..state.behaviour.lengths[i])
            .map(|k| k as f64 + i as f64 * 1000.0)
            .collect();
        buffers.insert(name.to_string(), json!({ "buffer": values, "size": 0 }));
    }
    Json(json!({ "buffer": buffers, "status": { "measuring": false } }))
}

/// Fake model server answering `POST /predict` with a fixed `predictions` value
pub async fn spawn_model_server(predictions: Value) -> String {
    let app = Router::new().route(
        "/predict",
        post(move |Json(body): Json<Value>| {
            let predictions = predictions.clone();
            async move {
                let instances = body["instances"].as_array().map(|a| a.len()).unwrap_or(0);
                assert_eq!(instances, 1, "expected a batch of one");
                Json(json!({ "predictions": predictions }))
            }
        }),
    );
    format!("{}/predict", serve(app).await)
}

/// A local URL nothing is listening on
pub async fn unused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
