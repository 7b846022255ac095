//! Viewer properties.
//!
//! Values are merged in this order, later sources winning: built-in defaults,
//! a YAML file, the query string of the embedding script URL and finally the
//! backend `configurationjson` service.

use mathviewer_types::{ImageFormat, SaveMode, ViewerMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::service::{self, ServiceProvider};

/// Keys requested from `configurationjson`.
const BACKEND_KEYS: [&str; 3] = [
    "wirispluginperformance",
    "editorServicesRoot",
    "editorServicesExtension",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub viewer: ViewerMode,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default = "default_zoom")]
    pub zoom: f64,

    /// CSS selector of the element to render.
    #[serde(default = "default_element")]
    pub element: String,

    /// Use the cached `showimage` flow instead of `createimage`.
    #[serde(rename = "wirispluginperformance", default = "default_true")]
    pub performance: bool,

    /// Attribute holding the safe-encoded MathML of a formula image.
    #[serde(rename = "wiriseditormathmlattribute", default = "default_mathml_attribute")]
    pub mathml_attribute: String,

    #[serde(default = "default_services_root")]
    pub editor_services_root: String,

    #[serde(default)]
    pub editor_services_extension: String,

    #[serde(default)]
    pub image_format: ImageFormat,

    #[serde(default)]
    pub save_mode: SaveMode,

    #[serde(default = "default_parse_modes")]
    pub parse_modes: Vec<String>,

    /// Fix unescaped operators when decoding safe MathML.
    #[serde(default)]
    pub blackboard: bool,
}

fn default_lang() -> String {
    String::from("en")
}

fn default_dpi() -> u32 {
    96
}

fn default_zoom() -> f64 {
    1.0
}

fn default_element() -> String {
    String::from("body")
}

fn default_true() -> bool {
    true
}

fn default_mathml_attribute() -> String {
    String::from("data-mathml")
}

fn default_services_root() -> String {
    String::from("https://www.wiris.net/demo/plugins/app/")
}

fn default_parse_modes() -> Vec<String> {
    vec![String::from("latex")]
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            viewer: ViewerMode::default(),
            lang: default_lang(),
            dpi: default_dpi(),
            zoom: default_zoom(),
            element: default_element(),
            performance: default_true(),
            mathml_attribute: default_mathml_attribute(),
            editor_services_root: default_services_root(),
            editor_services_extension: String::new(),
            image_format: ImageFormat::default(),
            save_mode: SaveMode::default(),
            parse_modes: default_parse_modes(),
            blackboard: false,
        }
    }
}

impl Properties {
    /// Load properties from a YAML file; missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Defaults overridden by a query string.
    pub fn from_query(query: &str) -> Self {
        let mut properties = Self::default();
        properties.apply_query(query);
        properties
    }

    /// Override values from a query string such as `viewer=image&lang=fr`.
    ///
    /// A leading `?` is ignored. Unknown keys are ignored and invalid values
    /// are logged and leave the current value in place.
    pub fn apply_query(&mut self, query: &str) {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.apply(&key, &value);
        }
    }

    /// Apply the query string of an embedding script URL.
    pub fn apply_script_src(&mut self, src: &str) -> Result<()> {
        let url = url::Url::parse(src).map_err(|e| Error::Config(format!("{src}: {e}")))?;
        if let Some(query) = url.query() {
            self.apply_query(query);
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) {
        let applied = match key {
            "viewer" => parse_into(&mut self.viewer, value),
            "lang" => set(&mut self.lang, value),
            "dpi" => parse_into(&mut self.dpi, value),
            "zoom" => parse_into(&mut self.zoom, value),
            "element" => set(&mut self.element, value),
            "wirispluginperformance" => parse_into(&mut self.performance, value),
            "wiriseditormathmlattribute" => set(&mut self.mathml_attribute, value),
            "editorServicesRoot" => set(&mut self.editor_services_root, value),
            "editorServicesExtension" => {
                self.editor_services_extension = value.to_string();
                true
            }
            _ => return,
        };
        if !applied {
            warn!(key, value, "Ignoring invalid property value");
        }
    }

    /// Merge the backend configuration.
    ///
    /// A status error from the backend keeps the local values; transport
    /// failures propagate.
    pub async fn generate(mut self, provider: &dyn ServiceProvider) -> Result<Self> {
        match service::configuration_json(provider, &BACKEND_KEYS).await {
            Ok(result) => {
                for (key, value) in &result.extra {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    debug!(%key, %value, "Backend property");
                    self.apply(key, &value);
                }
            }
            Err(err) if err.is_status() => {
                warn!(%err, "Backend configuration unavailable, keeping local properties");
            }
            Err(err) => return Err(err),
        }
        Ok(self)
    }

    pub fn parses_latex(&self) -> bool {
        self.parse_modes.iter().any(|mode| mode == "latex")
    }
}

fn set(field: &mut String, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    *field = value.to_string();
    true
}

fn parse_into<T: FromStr>(field: &mut T, value: &str) -> bool {
    match value.parse() {
        Ok(parsed) => {
            *field = parsed;
            true
        }
        Err(_) => false,
    }
}
