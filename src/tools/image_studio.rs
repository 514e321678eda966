use crate::gateway::{Gateway, ImageOptions};
use crate::inflight::InFlight;
use std::sync::Mutex;
use tracing::error;

#[derive(Debug, Default)]
struct StudioState {
    gallery: Vec<String>,
    error: Option<String>,
}

/// Free-form image generation with a gallery of results, newest first.
#[derive(Default)]
pub struct ImageStudio {
    state: Mutex<StudioState>,
    busy: InFlight,
}

impl ImageStudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gallery(&self) -> Vec<String> {
        self.state.lock().unwrap().gallery.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.busy.is_active()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Generate one image. No-op (returns false) on empty prompt or while a
    /// generation is already running.
    pub async fn generate(
        &self,
        gateway: &Gateway,
        prompt: &str,
        options: ImageOptions,
    ) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }
        let Some(_guard) = self.busy.try_begin() else {
            return false;
        };
        self.state.lock().unwrap().error = None;

        match gateway.generate_image(prompt, &options).await {
            Ok(url) => {
                self.state.lock().unwrap().gallery.insert(0, url);
                true
            }
            Err(e) => {
                error!(error = %e, "image studio generation failed");
                self.state.lock().unwrap().error = Some(e.to_string());
                false
            }
        }
    }
}
