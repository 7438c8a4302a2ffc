pub mod artifacts;
pub mod dia;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::Config;
use crate::error::AppError;

pub use dia::DiaEngine;

/// Everything the model needs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub audio_prompt: Option<Vec<f32>>,
    pub max_new_tokens: u32,
    pub cfg_scale: f32,
    pub temperature: f32,
    pub top_p: f32,
    pub cfg_filter_top_k: u32,
    pub seed: u64,
}

pub trait SpeechModel: Send + Sync {
    /// Generate mono samples at [`crate::audio::SAMPLE_RATE`].
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<f32>, AppError>;
}

pub type ModelLoader = Box<dyn Fn() -> Result<Arc<dyn SpeechModel>, AppError> + Send + Sync>;

/// Process-wide model handle, built at most once.
///
/// A failed load leaves the slot empty so the next caller tries again.
/// Concurrent first callers block on the same initialization.
pub struct ModelSlot {
    loader: ModelLoader,
    model: OnceCell<Arc<dyn SpeechModel>>,
}

impl ModelSlot {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SpeechModel>, AppError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let config = config.clone();
        Self::new(move || {
            let engine = DiaEngine::load(&config)?;
            Ok(Arc::new(engine) as Arc<dyn SpeechModel>)
        })
    }

    pub fn get(&self) -> Result<Arc<dyn SpeechModel>, AppError> {
        self.model
            .get_or_try_init(|| {
                info!("Loading model...");
                (self.loader)()
            })
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }
}

/// Lock a model session even if an earlier generation panicked while
/// holding it. Sessions carry no state between runs.
pub fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Seed handed to the model for one generation.
///
/// With a request seed every draw is reproducible; without one the seed
/// comes from OS entropy.
pub fn generation_seed(seed: Option<u64>) -> u64 {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    rng.random()
}
