use crate::gateway::{AspectRatio, Gateway, ImageOptions};
use crate::inflight::InFlight;
use std::sync::Mutex;
use tracing::error;

pub const MIN_PANELS: usize = 1;
pub const MAX_PANELS: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct StylePreset {
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const STYLE_PRESETS: [StylePreset; 4] = [
    StylePreset {
        name: "Modern Comic",
        prompt: "Modern high-contrast superhero comic book art, sharp lines",
    },
    StylePreset {
        name: "Cyberpunk Manga",
        prompt: "Detailed cyberpunk anime style, neon lighting, clean ink",
    },
    StylePreset {
        name: "Pencil Sketch",
        prompt: "Rough pencil sketch style, graphite textures",
    },
    StylePreset {
        name: "Watercolor Storybook",
        prompt: "Soft watercolor illustration, storybook aesthetic",
    },
];

#[derive(Debug, Clone)]
pub struct ComicPanel {
    pub id: String,
    pub prompt: String,
    pub caption: String,
    pub image: Option<String>,
    pub generating: bool,
    pub error: Option<String>,
}

impl ComicPanel {
    fn empty() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: String::new(),
            caption: String::new(),
            image: None,
            generating: false,
            error: None,
        }
    }
}

struct StudioState {
    panels: Vec<ComicPanel>,
    style: String,
    pro: bool,
}

/// Comic strip builder: a row of prompt slots illustrated one at a time.
pub struct ComicStudio {
    state: Mutex<StudioState>,
    bulk: InFlight,
}

impl Default for ComicStudio {
    fn default() -> Self {
        Self::new()
    }
}

impl ComicStudio {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StudioState {
                panels: (0..3).map(|_| ComicPanel::empty()).collect(),
                style: STYLE_PRESETS[0].prompt.to_string(),
                pro: false,
            }),
            bulk: InFlight::new(),
        }
    }

    pub fn panels(&self) -> Vec<ComicPanel> {
        self.state.lock().unwrap().panels.clone()
    }

    pub fn is_bulk_generating(&self) -> bool {
        self.bulk.is_active()
    }

    pub fn set_style(&self, style: &str) {
        self.state.lock().unwrap().style = style.to_string();
    }

    pub fn set_pro(&self, pro: bool) {
        self.state.lock().unwrap().pro = pro;
    }

    /// Add an empty panel, up to the cap. Returns the new panel id.
    pub fn add_panel(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        if state.panels.len() >= MAX_PANELS {
            return None;
        }
        let panel = ComicPanel::empty();
        let id = panel.id.clone();
        state.panels.push(panel);
        Some(id)
    }

    /// Remove a panel, never dropping below the minimum.
    pub fn remove_panel(&self, id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.panels.len() <= MIN_PANELS {
            return false;
        }
        let before = state.panels.len();
        state.panels.retain(|p| p.id != id);
        state.panels.len() < before
    }

    pub fn set_prompt(&self, id: &str, prompt: &str) {
        self.panel_mut(id, |p| p.prompt = prompt.to_string());
    }

    pub fn set_caption(&self, id: &str, caption: &str) {
        self.panel_mut(id, |p| p.caption = caption.to_string());
    }

    fn panel_mut(&self, id: &str, apply: impl FnOnce(&mut ComicPanel)) {
        let mut state = self.state.lock().unwrap();
        if let Some(panel) = state.panels.iter_mut().find(|p| p.id == id) {
            apply(panel);
        }
    }

    /// Illustrate one panel. The composed prompt folds in the global style.
    /// A panel that disappears mid-flight is a quiet no-op on completion.
    pub async fn generate_panel(&self, gateway: &Gateway, id: &str) -> bool {
        let (prompt, pro) = {
            let mut state = self.state.lock().unwrap();
            let style = state.style.clone();
            let pro = state.pro;
            let Some(panel) = state.panels.iter_mut().find(|p| p.id == id) else {
                return false;
            };
            if panel.prompt.trim().is_empty() || panel.generating {
                return false;
            }
            panel.generating = true;
            panel.error = None;
            (
                format!(
                    "Comic art: {}. Style: {}. High quality.",
                    panel.prompt, style
                ),
                pro,
            )
        };

        let options = ImageOptions {
            aspect_ratio: AspectRatio::Landscape,
            pro,
        };
        let result = gateway.generate_image(&prompt, &options).await;

        let mut state = self.state.lock().unwrap();
        let Some(panel) = state.panels.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        panel.generating = false;
        match result {
            Ok(url) => {
                panel.image = Some(url);
                true
            }
            Err(e) => {
                error!(error = %e, panel = id, "comic panel generation failed");
                panel.error = Some(e.to_string());
                false
            }
        }
    }

    /// Illustrate every pending panel strictly one after another. Sequential
    /// on purpose: the batch is the rate limiter. A failing panel records
    /// its error and the batch moves on. Returns the number illustrated.
    pub async fn generate_all(&self, gateway: &Gateway) -> usize {
        let Some(_guard) = self.bulk.try_begin() else {
            return 0;
        };

        let ids: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .panels
            .iter()
            .filter(|p| !p.prompt.trim().is_empty() && p.image.is_none())
            .map(|p| p.id.clone())
            .collect();

        let mut generated = 0;
        for id in ids {
            if self.generate_panel(gateway, &id).await {
                generated += 1;
            }
        }
        generated
    }
}
