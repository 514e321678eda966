use crate::gateway::{models, ChatOptions, Gateway};
use crate::inflight::InFlight;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;
use tracing::error;

pub const FAILURE_MESSAGE: &str = "Failed to design a learning path. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningModule {
    pub title: String,
    pub duration: String,
    pub description: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub objective: String,
    pub modules: Vec<LearningModule>,
    pub status: PathStatus,
}

#[derive(Deserialize)]
struct PlanReply {
    modules: Vec<LearningModule>,
}

#[derive(Debug, Default)]
struct PlannerState {
    path: Option<LearningPath>,
    error: Option<String>,
}

/// Turns a learning goal into a structured 4-week curriculum. Single slot.
#[derive(Default)]
pub struct LearningPlanner {
    state: Mutex<PlannerState>,
    busy: InFlight,
}

impl LearningPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<LearningPath> {
        self.state.lock().unwrap().path.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.busy.is_active()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub async fn generate(&self, gateway: &Gateway, objective: &str) -> bool {
        let objective = objective.trim();
        if objective.is_empty() {
            return false;
        }
        let Some(_guard) = self.busy.try_begin() else {
            return false;
        };
        self.state.lock().unwrap().error = None;

        let prompt = format!(
            "Design a tailored 4-week learning curriculum for this goal: {objective}. \
             Break it into modules with a title, an estimated duration, a short \
             description, and a list of curated resource names."
        );
        let options = ChatOptions {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(json!({
                "type": "OBJECT",
                "properties": {
                    "modules": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "title": { "type": "STRING" },
                                "duration": { "type": "STRING" },
                                "description": { "type": "STRING" },
                                "resources": {
                                    "type": "ARRAY",
                                    "items": { "type": "STRING" }
                                }
                            },
                            "required": ["title", "duration", "description", "resources"]
                        }
                    }
                },
                "required": ["modules"]
            })),
            ..Default::default()
        };

        match gateway.generate_text(models::FLASH, &prompt, &options).await {
            Ok(raw) => match serde_json::from_str::<PlanReply>(&raw) {
                Ok(reply) => {
                    self.state.lock().unwrap().path = Some(LearningPath {
                        objective: objective.to_string(),
                        modules: reply.modules,
                        status: PathStatus::Active,
                    });
                    true
                }
                Err(e) => {
                    error!(error = %e, "learning path reply was not valid JSON");
                    self.state.lock().unwrap().error = Some(FAILURE_MESSAGE.to_string());
                    false
                }
            },
            Err(e) => {
                error!(error = %e, "learning path generation failed");
                self.state.lock().unwrap().error = Some(FAILURE_MESSAGE.to_string());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_reply_parses() {
        let raw = r#"{
            "modules": [{
                "title": "Foundations",
                "duration": "1 week",
                "description": "Core concepts.",
                "resources": ["The Book", "A Course"]
            }]
        }"#;
        let reply: PlanReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.modules.len(), 1);
        assert_eq!(reply.modules[0].title, "Foundations");
        assert_eq!(reply.modules[0].resources.len(), 2);
    }
}
