//! Formula image metrics.
//!
//! The backend stores width, height, baseline and resolution inside the
//! images it renders: as attributes of the SVG root, as chunks of the PNG
//! header, or in the query string of a legacy `createimage` URL.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mathviewer_types::{ImageFormat, ImageMetrics, SaveMode};
use std::collections::HashMap;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// Base64 characters holding the PNG chunks that carry the metrics.
const PNG_METRICS_CHARS: usize = 88;

const PNG_SIGNATURE_LEN: usize = 8;
const CHUNK_IHDR: u32 = 0x4948_4452;
const CHUNK_BASELINE: u32 = 0x6261_5345;
const CHUNK_PHYS: u32 = 0x7048_5973;

/// Inches per meter, for converting `pHYs` pixels per meter to dpi.
const INCHES_PER_METER: f64 = 39.37;

/// Read `height="`, `width="` and `wrs:baseline="` off an SVG string.
///
/// Returns `None` when there is no parsable `width`.
pub fn metrics_from_svg_string(svg: &str) -> Option<ImageMetrics> {
    let width = svg_attribute(svg, "width")?;
    Some(ImageMetrics {
        width,
        height: svg_attribute(svg, "height").unwrap_or_default(),
        baseline: svg_attribute(svg, "wrs:baseline"),
        dpi: None,
    })
}

fn svg_attribute(svg: &str, name: &str) -> Option<f64> {
    let marker = format!("{name}=\"");
    let start = svg.find(&marker)? + marker.len();
    let end = start + svg[start..].find('"')?;
    svg[start..end].trim().parse().ok()
}

/// Big-endian reader over an immutable buffer.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.bytes.len());
    }

    fn read_u32(&mut self) -> Option<u32> {
        let chunk: [u8; 4] = self.bytes.get(self.pos..self.pos + 4)?.try_into().ok()?;
        self.pos += 4;
        Some(u32::from_be_bytes(chunk))
    }
}

/// Metrics from the head of a PNG written by the backend.
///
/// After the signature, each step reads a chunk tag, the fields of the
/// chunks it knows (`IHDR`, `baSE`, `pHYs`) and one trailing word.
pub fn metrics_from_bytes(bytes: &[u8]) -> Option<ImageMetrics> {
    let mut cursor = Cursor::new(bytes);
    cursor.skip(PNG_SIGNATURE_LEN);

    let mut size = None;
    let mut baseline = None;
    let mut dpi = None;

    while cursor.remaining() >= 4 {
        let Some(tag) = cursor.read_u32() else { break };
        match tag {
            CHUNK_IHDR => {
                let (Some(width), Some(height)) = (cursor.read_u32(), cursor.read_u32()) else {
                    break;
                };
                size = Some((width, height));
                cursor.skip(5);
            }
            CHUNK_BASELINE => {
                let Some(value) = cursor.read_u32() else { break };
                baseline = Some(f64::from(value));
            }
            CHUNK_PHYS => {
                let Some(per_meter) = cursor.read_u32() else { break };
                dpi = Some((f64::from(per_meter) / INCHES_PER_METER).round());
                cursor.skip(5);
            }
            _ => {}
        }
        cursor.skip(4);
    }

    let (width, height) = size?;
    Some(ImageMetrics {
        width: f64::from(width),
        height: f64::from(height),
        baseline,
        dpi,
    })
}

/// Metrics from the `cw`, `ch`, `cb` and `dpi` parameters of a legacy image
/// URL.
pub fn metrics_from_query(uri: &str) -> Option<ImageMetrics> {
    let query = uri.split_once('?').map_or(uri, |(_, query)| query);
    let params: HashMap<_, _> = url::form_urlencoded::parse(query.as_bytes()).collect();
    let number = |key: &str| params.get(key).and_then(|value| value.trim().parse::<f64>().ok());

    Some(ImageMetrics {
        width: number("cw")?,
        height: number("ch").unwrap_or_default(),
        baseline: number("cb"),
        dpi: number("dpi"),
    })
}

/// Size `img` from the metrics embedded in its image.
///
/// With `json_response` the metrics come from the image itself, read as
/// `format`: `uri` holds the SVG (raw or as a data URI) unless SVGs are saved
/// in base64 and `img` carries a base64 `src`, in which case they are read
/// from that `src`, as are PNGs. Otherwise `uri` is a legacy `createimage`
/// URL. Images without a width are left alone.
pub fn set_img_size(
    doc: &mut Document,
    img: NodeId,
    uri: &str,
    json_response: bool,
    format: ImageFormat,
    save_mode: SaveMode,
) -> Result<()> {
    let metrics = if !json_response {
        metrics_from_query(uri)
    } else {
        let base64_src = doc
            .attribute(img, "src")
            .is_some_and(|src| src.contains(";base64,"));
        match (format, save_mode) {
            (ImageFormat::Svg, SaveMode::Base64) if base64_src => {
                let bytes = decode_src_payload(doc, img, None)?;
                metrics_from_svg_string(&String::from_utf8_lossy(&bytes))
            }
            (ImageFormat::Svg, _) => metrics_from_svg_string(&svg_source(uri)),
            (ImageFormat::Png, _) => {
                let bytes = decode_src_payload(doc, img, Some(PNG_METRICS_CHARS))?;
                metrics_from_bytes(&bytes)
            }
        }
    };

    let Some(metrics) = metrics else {
        debug!(uri, "No metrics in image");
        return Ok(());
    };
    apply_metrics(doc, img, scale_to_css(metrics));
    Ok(())
}

/// Raw SVG from either an SVG string or a percent-encoded data URI.
fn svg_source(uri: &str) -> String {
    match uri.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((_, payload)) => urlencoding::decode(payload)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| payload.to_string()),
        None => uri.to_string(),
    }
}

/// Bytes of the base64 payload of `img`'s `src`, optionally only the first
/// `limit` characters of it.
fn decode_src_payload(doc: &Document, img: NodeId, limit: Option<usize>) -> Result<Vec<u8>> {
    let src = doc.attribute(img, "src").unwrap_or_default();
    let payload = src
        .find("base64,")
        .map_or(src, |i| &src[i + "base64,".len()..]);
    let payload = match limit {
        Some(limit) => payload.get(..limit).unwrap_or(payload),
        None => payload,
    };
    STANDARD
        .decode(payload)
        .map_err(|e| Error::InvalidResponse(format!("image payload: {e}")))
}

/// Convert image pixels to CSS pixels.
pub fn scale_to_css(metrics: ImageMetrics) -> ImageMetrics {
    match metrics.dpi {
        Some(dpi) if dpi > 0.0 => {
            let scale = |value: f64| value * 96.0 / dpi;
            ImageMetrics {
                width: scale(metrics.width),
                height: scale(metrics.height),
                baseline: metrics.baseline.map(scale),
                dpi: metrics.dpi,
            }
        }
        _ => metrics,
    }
}

/// Set `width`, `height` and, when the baseline is known, the
/// `vertical-align` that puts it on the text baseline.
pub fn apply_metrics(doc: &mut Document, img: NodeId, metrics: ImageMetrics) {
    doc.set_attribute(img, "width", metrics.width.to_string());
    doc.set_attribute(img, "height", metrics.height.to_string());
    if let Some(baseline) = metrics.baseline {
        doc.set_attribute(
            img,
            "style",
            format!("vertical-align: -{}px", metrics.height - baseline),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:wrs="http://www.wiris.com/xml/mathml-extension" height="24" width="43" wrs:baseline="16"><text>x</text></svg>"#;

    /// PNG head in the layout the backend writes: tag, fields, trailing word.
    fn png_head(width: u32, height: u32, baseline: u32, per_meter: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend(CHUNK_IHDR.to_be_bytes());
        bytes.extend(width.to_be_bytes());
        bytes.extend(height.to_be_bytes());
        bytes.extend([8, 6, 0, 0, 0]);
        bytes.extend(0u32.to_be_bytes());
        bytes.extend(CHUNK_BASELINE.to_be_bytes());
        bytes.extend(baseline.to_be_bytes());
        bytes.extend(0u32.to_be_bytes());
        bytes.extend(CHUNK_PHYS.to_be_bytes());
        bytes.extend(per_meter.to_be_bytes());
        bytes.extend([0, 0, 0, 0, 1]);
        bytes.extend(0u32.to_be_bytes());
        bytes
    }

    #[test]
    fn reads_svg_attributes() {
        let metrics = metrics_from_svg_string(SVG).unwrap();
        assert_eq!(metrics.width, 43.0);
        assert_eq!(metrics.height, 24.0);
        assert_eq!(metrics.baseline, Some(16.0));
        assert_eq!(metrics.dpi, None);
        assert_eq!(metrics_from_svg_string(r#"<svg height="3">"#), None);
    }

    #[test]
    fn reads_png_chunks() {
        let metrics = metrics_from_bytes(&png_head(86, 48, 32, 7559)).unwrap();
        assert_eq!(metrics.width, 86.0);
        assert_eq!(metrics.height, 48.0);
        assert_eq!(metrics.baseline, Some(32.0));
        assert_eq!(metrics.dpi, Some(192.0));

        let css = scale_to_css(metrics);
        assert_eq!((css.width, css.height, css.baseline), (43.0, 24.0, Some(16.0)));
    }

    #[test]
    fn png_without_header_has_no_metrics() {
        assert_eq!(metrics_from_bytes(&[0; 4]), None);
        assert_eq!(metrics_from_bytes(&png_head(1, 1, 1, 1)[..16]), None);
    }

    #[test]
    fn reads_legacy_query() {
        let metrics =
            metrics_from_query("https://example.com/app/showimage?formula=abc&cw=20&ch=10&cb=7")
                .unwrap();
        assert_eq!(metrics.width, 20.0);
        assert_eq!(metrics.baseline, Some(7.0));
        assert_eq!(metrics.dpi, None);
        assert_eq!(metrics_from_query("https://example.com/?ch=10"), None);
    }

    #[test]
    fn sizes_image_from_svg_data_uri() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        let uri = format!("data:image/svg+xml;charset=utf8,{}", urlencoding::encode(SVG));

        set_img_size(&mut doc, img, &uri, true, ImageFormat::Svg, SaveMode::Xml).unwrap();

        assert_eq!(doc.attribute(img, "width"), Some("43"));
        assert_eq!(doc.attribute(img, "height"), Some("24"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -8px"));
    }

    #[test]
    fn sizes_image_from_png_src() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        let mut png = png_head(86, 48, 32, 7559);
        png.extend([0u8; 64]);
        doc.set_attribute(img, "src", format!("data:image/png;base64,{}", STANDARD.encode(&png)));

        set_img_size(&mut doc, img, "", true, ImageFormat::Png, SaveMode::Xml).unwrap();

        assert_eq!(doc.attribute(img, "width"), Some("43"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -8px"));
    }

    #[test]
    fn sizes_image_from_base64_svg_src() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        doc.set_attribute(img, "src", format!("data:image/svg+xml;base64,{}", STANDARD.encode(SVG)));

        set_img_size(&mut doc, img, "", true, ImageFormat::Svg, SaveMode::Base64).unwrap();
        assert_eq!(doc.attribute(img, "height"), Some("24"));

        // A percent-encoded src is read as such even in base64 save mode.
        let plain = doc.create_element("img");
        let uri = format!("data:image/svg+xml;charset=utf8,{}", urlencoding::encode(SVG));
        doc.set_attribute(plain, "src", uri.as_str());
        set_img_size(&mut doc, plain, &uri, true, ImageFormat::Svg, SaveMode::Base64).unwrap();
        assert_eq!(doc.attribute(plain, "height"), Some("24"));
    }

    #[test]
    fn legacy_url_and_missing_metrics() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        let query = "x.png?cw=40&ch=20&cb=15&dpi=192";
        set_img_size(&mut doc, img, query, false, ImageFormat::Svg, SaveMode::Xml).unwrap();
        assert_eq!(doc.attribute(img, "width"), Some("20"));
        assert_eq!(doc.attribute(img, "style"), Some("vertical-align: -2.5px"));

        let other = doc.create_element("img");
        set_img_size(&mut doc, other, "x.png", false, ImageFormat::Svg, SaveMode::Xml).unwrap();
        assert_eq!(doc.attribute(other, "width"), None);
    }
}
