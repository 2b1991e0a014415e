use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Why an uploaded image was turned away before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum RejectionReason {
    TooSmall,
    TooLarge,
    TooDark,
    TooBright,
}

impl RejectionReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::TooSmall => "Image is too small. Please upload a larger image.",
            RejectionReason::TooLarge => "Image is too large. Please upload a smaller image.",
            RejectionReason::TooDark => "Image is too dark. Please take photo in better lighting.",
            RejectionReason::TooBright => "Image is too bright. Please reduce exposure.",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRecord {
    pub disease_key: String,
    pub name: String,
    pub solution: String,
    pub prevention_tips: Vec<String>,
    pub is_healthy: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub success: bool,
    pub disease: String,
    /// Top class probability as a percentage, two decimals.
    pub confidence: f32,
    pub is_healthy: bool,
    pub organic_solution: String,
    pub prevention_tips: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            reason: None,
        }
    }

    pub fn rejected(reason: RejectionReason) -> Self {
        Self {
            success: false,
            message: reason.message().to_string(),
            reason: Some(reason),
        }
    }
}
