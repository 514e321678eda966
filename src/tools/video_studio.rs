use crate::gateway::{Gateway, GatewayError};
use crate::inflight::InFlight;
use std::sync::Mutex;
use tracing::error;

pub const FAILURE_MESSAGE: &str =
    "Error creating video. Please check your project billing or API key.";

#[derive(Debug, Default)]
struct StudioState {
    gallery: Vec<String>,
    status: Option<String>,
    error: Option<String>,
    needs_reauth: bool,
}

/// Long-running video generation with polled progress. The gallery holds
/// download references, newest first.
#[derive(Default)]
pub struct VideoStudio {
    state: Mutex<StudioState>,
    busy: InFlight,
}

impl VideoStudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gallery(&self) -> Vec<String> {
        self.state.lock().unwrap().gallery.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.busy.is_active()
    }

    /// Latest progress message from the pending operation.
    pub fn status(&self) -> Option<String> {
        self.state.lock().unwrap().status.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Set once when the Gateway reports an expired/invalid credential; the
    /// embedder should prompt for re-authentication. Never set twice for one
    /// operation and never retried automatically.
    pub fn needs_reauth(&self) -> bool {
        self.state.lock().unwrap().needs_reauth
    }

    pub fn acknowledge_reauth(&self) {
        self.state.lock().unwrap().needs_reauth = false;
    }

    pub async fn generate(&self, gateway: &Gateway, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }
        let Some(_guard) = self.busy.try_begin() else {
            return false;
        };
        {
            let mut state = self.state.lock().unwrap();
            state.error = None;
            state.status = Some("Initiating high-speed generation...".to_string());
        }

        let result = gateway
            .generate_video(prompt, |message| {
                self.state.lock().unwrap().status = Some(message.to_string());
            })
            .await;

        let mut state = self.state.lock().unwrap();
        state.status = None;
        match result {
            Ok(url) => {
                state.gallery.insert(0, url);
                true
            }
            Err(e) => {
                error!(error = %e, "video generation failed");
                if matches!(e, GatewayError::CredentialExpired) {
                    state.needs_reauth = true;
                }
                state.error = Some(FAILURE_MESSAGE.to_string());
                false
            }
        }
    }
}
