//! Accessible text for formula images.

use mathviewer_types::Status;
use std::sync::Arc;
use tracing::warn;

use crate::cache::TextCache;
use crate::error::Result;
use crate::mathml;
use crate::service::{self, ServiceProvider};
use crate::strings;

/// Class marking chemistry formulas, read with the chemistry grammar.
const CHEMISTRY_CLASS: &str = "wrs_chemistry";

pub struct Accessibility {
    provider: Arc<dyn ServiceProvider>,
    cache: TextCache,
}

impl Accessibility {
    pub fn new(provider: Arc<dyn ServiceProvider>) -> Self {
        Self {
            provider,
            cache: TextCache::new(),
        }
    }

    pub fn cache(&self) -> &TextCache {
        &self.cache
    }

    /// Accessible text of `mathml` in `lang`.
    ///
    /// An `error` status from the backend degrades to a localized error
    /// message, which is not cached.
    pub async fn mathml_to_accessible(&self, mathml: &str, lang: &str) -> Result<String> {
        if let Some(text) = self.cache.get(mathml) {
            return Ok(text);
        }

        let chemistry = mathml::contain_class(mathml, CHEMISTRY_CLASS);
        let response =
            service::mathml2accessible(self.provider.as_ref(), mathml, lang, chemistry).await?;

        if response.status == Status::Error {
            warn!(lang, "Accessibility service failed");
            return Ok(strings::get("error_convert_accessibility", lang).to_string());
        }

        let text = response.result.text.unwrap_or_default();
        self.cache.populate(mathml, text.clone());
        Ok(text)
    }
}
