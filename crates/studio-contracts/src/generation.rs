use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Route served by the mock endpoint.
pub const GENERATE_PATH: &str = "/api/generate";
pub const MISSING_FIELDS_MESSAGE: &str = "Missing fields";
pub const OVERLOADED_MESSAGE: &str = "Model overloaded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Style {
    Editorial,
    Streetwear,
    Vintage,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::Editorial, Style::Streetwear, Style::Vintage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Editorial => "Editorial",
            Style::Streetwear => "Streetwear",
            Style::Vintage => "Vintage",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown style '{0}'")]
pub struct UnknownStyle(pub String);

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStyle(trimmed.to_string()))
    }
}

/// A composer field that must be present before a request can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerField {
    Image,
    Prompt,
    Style,
}

impl ComposerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposerField::Image => "image",
            ComposerField::Prompt => "prompt",
            ComposerField::Style => "style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required field(s): {}", field_list(.missing))]
pub struct ValidationError {
    pub missing: Vec<ComposerField>,
}

fn field_list(fields: &[ComposerField]) -> String {
    fields
        .iter()
        .map(ComposerField::as_str)
        .collect::<Vec<&str>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(alias = "imageDataUrl")]
    pub encoded_image: String,
    pub prompt: String,
    pub style: Style,
}

impl GenerationRequest {
    /// Builds a request from composer inputs. Blank strings count as missing.
    pub fn from_parts(
        encoded_image: Option<&str>,
        prompt: Option<&str>,
        style: Option<Style>,
    ) -> Result<Self, ValidationError> {
        let encoded_image = encoded_image.filter(|value| !value.trim().is_empty());
        let prompt = prompt.filter(|value| !value.trim().is_empty());

        let mut missing = Vec::new();
        if encoded_image.is_none() {
            missing.push(ComposerField::Image);
        }
        if prompt.is_none() {
            missing.push(ComposerField::Prompt);
        }
        if style.is_none() {
            missing.push(ComposerField::Style);
        }

        match (encoded_image, prompt, style) {
            (Some(encoded_image), Some(prompt), Some(style)) => Ok(Self {
                encoded_image: encoded_image.to_string(),
                prompt: prompt.to_string(),
                style,
            }),
            _ => Err(ValidationError { missing }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: String,
    #[serde(rename = "imageUrl")]
    pub encoded_image: String,
    pub prompt: String,
    pub style: Style,
    pub created_at: String,
}

/// Request body as received by the endpoint, before any field is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateBody {
    #[serde(alias = "imageDataUrl")]
    pub encoded_image: Option<String>,
    pub prompt: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingFields,
    #[error(transparent)]
    UnknownStyle(#[from] UnknownStyle),
}

impl GenerateBody {
    pub fn into_request(self) -> Result<GenerationRequest, BodyError> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(|inner| !inner.trim().is_empty())
                .unwrap_or(false)
        };
        if !present(&self.encoded_image) || !present(&self.prompt) || !present(&self.style) {
            return Err(BodyError::MissingFields);
        }
        let style = self.style.as_deref().unwrap_or_default().parse::<Style>()?;
        Ok(GenerationRequest {
            encoded_image: self.encoded_image.unwrap_or_default(),
            prompt: self.prompt.unwrap_or_default(),
            style,
        })
    }
}

/// Error payload returned with every non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
