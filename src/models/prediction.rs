use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PROMPT: &str = "masterpiece, best quality, highres, <lora:more_details:0.5>";
pub const DEFAULT_NEGATIVE_PROMPT: &str = "(worst quality, low quality, normal quality:2)";
pub const DEFAULT_SCHEDULER: &str = "DPM++ 3M SDE Karras";

/// Input block for the clarity upscaler. Every prediction uses the same
/// tuning; only the image changes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnhanceInput {
    pub image: String,
    pub scale_factor: u32,
    pub prompt: &'static str,
    pub negative_prompt: &'static str,
    pub dynamic: u32,
    pub creativity: f64,
    pub resemblance: f64,
    pub output_format: &'static str,
    pub scheduler: &'static str,
    pub num_inference_steps: u32,
}

impl EnhanceInput {
    pub fn for_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            scale_factor: 2,
            prompt: DEFAULT_PROMPT,
            negative_prompt: DEFAULT_NEGATIVE_PROMPT,
            dynamic: 6,
            creativity: 0.35,
            resemblance: 0.6,
            output_format: "png",
            scheduler: DEFAULT_SCHEDULER,
            num_inference_steps: 18,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePredictionRequest<'a> {
    pub version: &'a str,
    pub input: &'a EnhanceInput,
}

/// Prediction lifecycle as reported by Replicate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded
                | PredictionStatus::Failed
                | PredictionStatus::Canceled
                | PredictionStatus::Aborted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    /// First output URL. The upscaler returns a list; a bare string is accepted too.
    pub fn first_output(&self) -> Option<&str> {
        match self.output.as_ref()? {
            Value::Array(items) => items.first().and_then(Value::as_str),
            Value::String(url) => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(msg) => Some(msg.clone()),
            other => Some(other.to_string()),
        }
    }
}
