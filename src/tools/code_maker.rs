use crate::gateway::{models, ChatOptions, Gateway};
use crate::inflight::InFlight;
use std::sync::Mutex;
use tracing::error;

const SYSTEM_INSTRUCTION: &str =
    "You are a world-class Frontend Engineer. Generate a single-file HTML document \
     (including CSS in <style> and JS in <script>) based on the user's request. \
     Return ONLY the code, no markdown wrappers, no explanation. Output a complete, \
     modern, and beautiful UI.";

pub const FAILURE_MESSAGE: &str = "Failed to generate code.";

#[derive(Debug, Default)]
struct MakerState {
    code: Option<String>,
    error: Option<String>,
}

/// Generates a single-file HTML document. One slot: rerunning with a new
/// prompt replaces the current document (refine-style).
#[derive(Default)]
pub struct CodeMaker {
    state: Mutex<MakerState>,
    busy: InFlight,
}

impl CodeMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code(&self) -> Option<String> {
        self.state.lock().unwrap().code.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.busy.is_active()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub async fn generate(&self, gateway: &Gateway, prompt: &str) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }
        let Some(_guard) = self.busy.try_begin() else {
            return false;
        };
        self.state.lock().unwrap().error = None;

        let options = ChatOptions {
            system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
            temperature: 0.7,
            ..Default::default()
        };

        match gateway.generate_text(models::FLASH, prompt, &options).await {
            Ok(raw) => {
                self.state.lock().unwrap().code = Some(strip_code_fences(&raw));
                true
            }
            Err(e) => {
                error!(error = %e, "code generation failed");
                self.state.lock().unwrap().error = Some(FAILURE_MESSAGE.to_string());
                false
            }
        }
    }
}

/// Remove the ```html fences the model sometimes wraps its reply in.
fn strip_code_fences(raw: &str) -> String {
    let s = raw
        .strip_prefix("```html")
        .map(|rest| rest.strip_prefix('\n').unwrap_or(rest))
        .unwrap_or(raw);
    let s = s
        .strip_suffix("```")
        .map(|rest| rest.strip_suffix('\n').unwrap_or(rest))
        .unwrap_or(s);
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_html_fences() {
        let fenced = "```html\n<html></html>\n```";
        assert_eq!(strip_code_fences(fenced), "<html></html>");
    }

    #[test]
    fn test_unfenced_code_untouched() {
        assert_eq!(strip_code_fences("<html></html>"), "<html></html>");
    }

    #[test]
    fn test_fence_without_newline() {
        assert_eq!(strip_code_fences("```html<p></p>```"), "<p></p>");
    }
}
