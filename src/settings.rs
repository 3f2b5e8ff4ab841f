use serde::{Deserialize, Serialize};

pub const DEFAULT_WEIGHT: f32 = 0.65;
pub const DEFAULT_MODEL: &str = "V3_5";

/// Model identifiers the service is known to accept.
pub const KNOWN_MODELS: &[&str] = &["V3_5", "V4", "V4_5", "V4_5PLUS", "V5"];

/// Knobs sent along with an upload. Built fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    weirdness_constraint: f32,
    style_weight: f32,
    audio_weight: f32,
    model: String,
    instrumental: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            weirdness_constraint: DEFAULT_WEIGHT,
            style_weight: DEFAULT_WEIGHT,
            audio_weight: DEFAULT_WEIGHT,
            model: DEFAULT_MODEL.into(),
            instrumental: true,
        }
    }
}

impl GenerationSettings {
    /// Weights are clamped into `[0, 1]`; NaN falls back to the default.
    pub fn new(
        weirdness_constraint: f32,
        style_weight: f32,
        audio_weight: f32,
        model: impl Into<String>,
        instrumental: bool,
    ) -> Self {
        let model = model.into();
        if !KNOWN_MODELS.contains(&model.as_str()) {
            log::warn!("Unknown model identifier {model:?}, sending it anyway");
        }
        Self {
            weirdness_constraint: unit_weight(weirdness_constraint),
            style_weight: unit_weight(style_weight),
            audio_weight: unit_weight(audio_weight),
            model,
            instrumental,
        }
    }

    pub fn weirdness_constraint(&self) -> f32 {
        self.weirdness_constraint
    }

    pub fn style_weight(&self) -> f32 {
        self.style_weight
    }

    pub fn audio_weight(&self) -> f32 {
        self.audio_weight
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instrumental(&self) -> bool {
        self.instrumental
    }

    /// Form fields in the order the upload endpoint documents them.
    pub fn form_fields(&self) -> [(&'static str, String); 5] {
        [
            ("weirdnessConstraint", self.weirdness_constraint.to_string()),
            ("styleWeight", self.style_weight.to_string()),
            ("audioWeight", self.audio_weight.to_string()),
            ("model", self.model.clone()),
            ("instrumental", self.instrumental.to_string()),
        ]
    }
}

fn unit_weight(value: f32) -> f32 {
    if value.is_nan() {
        DEFAULT_WEIGHT
    } else {
        value.clamp(0.0, 1.0)
    }
}
