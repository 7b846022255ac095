//! Shared types for mathviewer
//!
//! This crate provides the wire types exchanged with the rendering backend
//! and the small enums used by the viewer configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status field of a backend JSON response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Ok,
    Warning,
    Error,
    Other(String),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Error => "error",
            Status::Other(s) => s,
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ok" => Status::Ok,
            "warning" => Status::Warning,
            "error" => Status::Error,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `result` object of a backend JSON response
///
/// Services fill different subsets of these fields. Anything not modelled
/// explicitly (for example the variables returned by `configurationjson`)
/// lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Backend JSON response envelope: `{status, result}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status: Status,

    #[serde(default)]
    pub result: ServiceResult,
}

impl ServiceResponse {
    pub fn ok(result: ServiceResult) -> Self {
        Self {
            status: Status::Ok,
            result,
        }
    }

    /// Successful response carrying only `result.text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok(ServiceResult {
            text: Some(text.into()),
            ..ServiceResult::default()
        })
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            result: ServiceResult::default(),
        }
    }
}

/// HTTP method used for a service call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

/// Decoded formula image metrics
///
/// `width`/`height`/`baseline` are in image pixels; when `dpi` is present and
/// differs from 96 they must be rescaled before being used as CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub width: f64,
    pub height: f64,
    pub baseline: Option<f64>,
    pub dpi: Option<f64>,
}

/// Which content the viewer renders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerMode {
    #[default]
    None,
    Image,
    Latex,
    Mathml,
}

impl ViewerMode {
    /// `$$...$$` spans are rendered in these modes
    pub fn renders_latex(self) -> bool {
        matches!(self, ViewerMode::Image | ViewerMode::Latex)
    }

    /// `<math>` elements are rendered in these modes
    pub fn renders_mathml(self) -> bool {
        matches!(self, ViewerMode::Image | ViewerMode::Mathml)
    }
}

impl FromStr for ViewerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ViewerMode::None),
            "image" => Ok(ViewerMode::Image),
            "latex" => Ok(ViewerMode::Latex),
            "mathml" => Ok(ViewerMode::Mathml),
            other => Err(format!("unknown viewer mode: {other}")),
        }
    }
}

/// How formula images are persisted by the save pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMode {
    #[default]
    #[serde(rename = "xml")]
    Xml,
    #[serde(rename = "safeXml")]
    SafeXml,
    #[serde(rename = "base64")]
    Base64,
    #[serde(rename = "image")]
    Image,
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(SaveMode::Xml),
            "safeXml" => Ok(SaveMode::SafeXml),
            "base64" => Ok(SaveMode::Base64),
            "image" => Ok(SaveMode::Image),
            other => Err(format!("unknown save mode: {other}")),
        }
    }
}

/// Image format produced by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "svg" => Ok(ImageFormat::Svg),
            "png" => Ok(ImageFormat::Png),
            other => Err(format!("unknown image format: {other}")),
        }
    }
}
