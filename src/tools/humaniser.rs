use crate::gateway::{models, ChatOptions, Gateway};
use crate::inflight::InFlight;
use std::sync::Mutex;
use tracing::error;

pub const FAILURE_MESSAGE: &str = "Failed to humanise text. Please try again.";

#[derive(Debug, Default)]
struct HumaniserState {
    output: Option<String>,
    error: Option<String>,
}

/// Rewrites machine-sounding text into a natural register. Single output
/// slot, replaced on every run.
#[derive(Default)]
pub struct Humaniser {
    state: Mutex<HumaniserState>,
    busy: InFlight,
}

impl Humaniser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> Option<String> {
        self.state.lock().unwrap().output.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.busy.is_active()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub async fn humanise(&self, gateway: &Gateway, input: &str) -> bool {
        let input = input.trim();
        if input.is_empty() {
            return false;
        }
        let Some(_guard) = self.busy.try_begin() else {
            return false;
        };
        self.state.lock().unwrap().error = None;

        let prompt = format!(
            "Humanise the following text. Make it sound natural, conversational, \
             and avoid AI-specific robotic patterns while maintaining the exact \
             original meaning. Do not use overly formal or repetitive structures.\n\n\
             TEXT TO HUMANISE:\n\"{input}\""
        );
        let options = ChatOptions {
            temperature: 0.9,
            top_p: Some(0.95),
            ..Default::default()
        };

        match gateway.generate_text(models::PRO, &prompt, &options).await {
            Ok(text) => {
                self.state.lock().unwrap().output = Some(text);
                true
            }
            Err(e) => {
                error!(error = %e, "humanise failed");
                self.state.lock().unwrap().error = Some(FAILURE_MESSAGE.to_string());
                false
            }
        }
    }
}
