//! # mathviewer-core
//!
//! Core library for the mathviewer formula renderer.
//!
//! This crate finds formulas in HTML documents (MathML elements, `$$latex$$`
//! text and safe-encoded MathML), converts them through a rendering backend
//! and replaces them with accessible formula images.

pub mod accessibility;
pub mod cache;
pub mod charset;
pub mod config;
pub mod dom;
pub mod entities;
pub mod error;
pub mod extract;
pub mod image;
pub mod latex;
pub mod mathml;
pub mod render;
pub mod save;
pub mod service;
pub mod strings;
pub mod viewer;

pub use accessibility::Accessibility;
pub use cache::TextCache;
pub use charset::{CharacterSet, SAFE_XML, XML};
pub use config::Properties;
pub use dom::{Document, NodeId, NodeKind};
pub use error::{Error, Result};
pub use extract::{MathmlPosition, SafeMathmlMatch};
pub use latex::{get_latex_from_text_node, LatexCodec, LatexSpan, LatexTags};
pub use mathml::DecodeOptions;
pub use render::Renderer;
pub use service::{HttpServiceProvider, MockProvider, ServiceProvider, ServiceRequest};
pub use viewer::{JsPluginViewer, Viewer, VIEWER_LOADED_EVENT};

pub use mathviewer_types::{
    ImageFormat, ImageMetrics, Method, SaveMode, ServiceResponse, ServiceResult, Status,
    ViewerMode,
};
