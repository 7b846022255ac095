//! Backend RPC client.
//!
//! Every call is an HTTP GET or POST to `{root}{service}{extension}` with
//! form-encoded parameters. The typed helpers at the bottom of this module
//! describe the services the viewer consumes.

mod mock;

use async_trait::async_trait;
use mathviewer_types::{Method, ServiceResponse, ServiceResult, Status};
use tracing::debug;

use crate::config::Properties;
use crate::error::{Error, Result};

pub use mock::MockProvider;

// ============================================================================
// Requests
// ============================================================================

/// One backend call: endpoint name, method and parameters in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub service: String,
    pub method: Method,
    pub params: Vec<(String, String)>,
}

impl ServiceRequest {
    pub fn get(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: Method::Get,
            params: Vec::new(),
        }
    }

    pub fn post(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: Method::Post,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Logical service name: the `service` parameter for the generic
    /// `service` endpoint, the endpoint itself otherwise.
    pub fn name(&self) -> &str {
        match self.param_value("service") {
            Some(name) if self.service == "service" => name,
            _ => &self.service,
        }
    }
}

// ============================================================================
// Provider trait
// ============================================================================

/// Transport to the rendering backend.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Perform `request` and return the response body.
    async fn request(&self, request: &ServiceRequest) -> Result<String>;

    /// GET an absolute URL and return the response body.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Perform `request` and parse the body as a JSON response.
    async fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse> {
        let body = self.request(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET an absolute URL and parse the body as a JSON response.
    async fn fetch_json(&self, url: &str) -> Result<ServiceResponse> {
        let body = self.fetch(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// [`ServiceProvider`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpServiceProvider {
    client: reqwest::Client,
    root: String,
    extension: String,
}

impl HttpServiceProvider {
    pub fn new(root: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn from_properties(properties: &Properties) -> Self {
        Self::new(
            properties.editor_services_root.clone(),
            properties.editor_services_extension.clone(),
        )
    }

    /// `{root}{service}{extension}`
    pub fn service_url(&self, service: &str) -> String {
        format!("{}{}{}", self.root, service, self.extension)
    }
}

#[async_trait]
impl ServiceProvider for HttpServiceProvider {
    async fn request(&self, request: &ServiceRequest) -> Result<String> {
        let url = self.service_url(&request.service);
        debug!(service = request.name(), method = ?request.method, %url, "Calling service");

        let builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.params),
            Method::Post => self.client.post(&url).form(&request.params),
        };
        let response = builder.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(%url, "Fetching");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Unwrap `result` of an "ok" response; any other status is an error.
pub fn process_json_response(service: &str, response: ServiceResponse) -> Result<ServiceResult> {
    if response.status.is_ok() {
        Ok(response.result)
    } else {
        Err(Error::Status {
            service: service.to_string(),
            status: response.status,
        })
    }
}

// ============================================================================
// Services
// ============================================================================

fn generic(name: &str) -> ServiceRequest {
    ServiceRequest::post("service").param("service", name)
}

/// MathML to LaTeX. The status is left for the caller to inspect.
pub async fn mathml2latex(provider: &dyn ServiceProvider, mml: &str) -> Result<ServiceResponse> {
    provider
        .call(&generic("mathml2latex").param("mml", mml))
        .await
}

/// LaTeX to MathML. With `save_latex` the backend embeds the LaTeX in a
/// semantics annotation itself.
pub async fn latex2mathml(
    provider: &dyn ServiceProvider,
    latex: &str,
    save_latex: bool,
) -> Result<ServiceResponse> {
    let mut request = generic("latex2mathml").param("latex", latex);
    if save_latex {
        request = request.param("saveLatex", "");
    }
    provider.call(&request).await
}

/// MathML to accessible text.
pub async fn mathml2accessible(
    provider: &dyn ServiceProvider,
    mml: &str,
    lang: &str,
    chemistry: bool,
) -> Result<ServiceResponse> {
    let mut request = generic("mathml2accessible")
        .param("mml", mml)
        .param("metrics", "true")
        .param("centerbaseline", "false")
        .param("lang", lang)
        .param("ignoreStyles", "true");
    if chemistry {
        request = request.param("mode", "chemistry");
    }
    provider.call(&request).await
}

/// Cache key of a formula image on the backend.
pub fn formula_hash(mml: &str, lang: &str) -> String {
    let key = format!("centerbaseline=false;lang={lang};metrics=true;mml={mml};");
    format!("{:x}", md5::compute(key.as_bytes()))
}

/// Rendered image for `mml`.
///
/// The GET asks the backend for a cached image; a status error there means
/// "not cached yet" and the image is generated with a POST. A `warning` on the
/// POST means the backend could not parse the MathML.
pub async fn show_image(
    provider: &dyn ServiceProvider,
    mml: &str,
    lang: &str,
) -> Result<ServiceResult> {
    let probe = ServiceRequest::get("showimage")
        .param("formula", formula_hash(mml, lang))
        .param("mml", mml)
        .param("metrics", "true")
        .param("centerbaseline", "false")
        .param("lang", lang);

    match process_json_response("showimage", provider.call(&probe).await?) {
        Ok(result) => return Ok(result),
        Err(err) if err.is_status() => {
            debug!(%err, "Image not cached, generating");
        }
        Err(err) => return Err(err),
    }

    let generate = ServiceRequest::post("showimage")
        .param("mml", mml)
        .param("metrics", "true")
        .param("centerbaseline", "false")
        .param("lang", lang);
    let response = provider.call(&generate).await?;
    if response.status == Status::Warning {
        return Err(Error::MalformedMathml(mml.to_string()));
    }
    process_json_response("showimage", response)
}

/// URL of a rendered image (legacy flow).
pub async fn create_image(provider: &dyn ServiceProvider, mml: &str, lang: &str) -> Result<String> {
    let request = ServiceRequest::get("createimage")
        .param("mml", mml)
        .param("metrics", "true")
        .param("centerbaseline", "false")
        .param("lang", lang);
    Ok(provider.request(&request).await?.trim().to_string())
}

/// Named backend configuration values, returned in `result.extra`.
pub async fn configuration_json(
    provider: &dyn ServiceProvider,
    keys: &[&str],
) -> Result<ServiceResult> {
    let request = ServiceRequest::get("configurationjson").param("variablekeys", keys.join(","));
    process_json_response("configurationjson", provider.call(&request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_names() {
        assert_eq!(generic("latex2mathml").name(), "latex2mathml");
        assert_eq!(ServiceRequest::get("showimage").name(), "showimage");
        assert_eq!(
            ServiceRequest::get("createimage")
                .param("service", "x")
                .name(),
            "createimage"
        );
    }

    #[test]
    fn builds_service_urls() {
        let provider = HttpServiceProvider::new("https://example.com/app/", ".php");
        assert_eq!(
            provider.service_url("showimage"),
            "https://example.com/app/showimage.php"
        );
    }

    #[test]
    fn status_errors() {
        let ok = ServiceResponse::text("x");
        assert_eq!(
            process_json_response("service", ok).unwrap().text.as_deref(),
            Some("x")
        );

        let err = process_json_response("service", ServiceResponse::with_status(Status::Error))
            .unwrap_err();
        assert!(err.is_status());
    }

    #[test]
    fn formula_hash_is_stable_hex() {
        let hash = formula_hash("<math><mi>x</mi></math>", "en");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, formula_hash("<math><mi>x</mi></math>", "en"));
        assert_ne!(hash, formula_hash("<math><mi>x</mi></math>", "fr"));
    }

    #[tokio::test]
    async fn show_image_uses_cached_image() {
        let provider = MockProvider::new(|request| {
            assert_eq!(request.method, Method::Get);
            Ok(json!({"status": "ok", "result": {"content": "<svg/>", "height": 10.0}}).to_string())
        });
        let result = show_image(&provider, "<math/>", "en").await.unwrap();
        assert_eq!(result.content.as_deref(), Some("<svg/>"));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn show_image_falls_back_to_post() {
        let provider = MockProvider::new(|request| match request.method {
            Method::Get => Ok(json!({"status": "error"}).to_string()),
            Method::Post => {
                assert!(request.param_value("formula").is_none());
                Ok(json!({"status": "ok", "result": {"content": "<svg/>"}}).to_string())
            }
        });
        let result = show_image(&provider, "<math/>", "en").await.unwrap();
        assert_eq!(result.content.as_deref(), Some("<svg/>"));

        let methods: Vec<Method> = provider.requests().iter().map(|r| r.method).collect();
        assert_eq!(methods, [Method::Get, Method::Post]);
    }

    #[tokio::test]
    async fn show_image_reports_malformed_mathml() {
        let provider = MockProvider::new(|request| match request.method {
            Method::Get => Ok(json!({"status": "error"}).to_string()),
            Method::Post => Ok(json!({"status": "warning"}).to_string()),
        });
        let err = show_image(&provider, "<math><mi>", "en").await.unwrap_err();
        assert!(matches!(err, Error::MalformedMathml(_)));
    }

    #[tokio::test]
    async fn configuration_values_land_in_extra() {
        let provider = MockProvider::new(|request| {
            assert_eq!(request.param_value("variablekeys"), Some("a,b"));
            Ok(json!({"status": "ok", "result": {"a": "1", "b": true}}).to_string())
        });
        let result = configuration_json(&provider, &["a", "b"]).await.unwrap();
        assert_eq!(result.extra.get("a"), Some(&json!("1")));
        assert_eq!(result.extra.get("b"), Some(&json!(true)));
    }
}
