//! Resolves content-store image references into fully qualified,
//! size-parameterized display URLs.
//!
//! Asset references look like `image-{id}-{width}x{height}-{format}`; the
//! builder expands them against a CDN base URL and appends crop parameters.
//! Plain `http(s)` URLs (the database and flat-file backends store these)
//! pass through with the size parameters appended.

use serde::Deserialize;
use url::Url;

/// An image as referenced by a post or settings record. `asset` is either a
/// store asset reference or a plain URL.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ImageRef {
    pub asset: String,

    #[serde(default)]
    pub alt: Option<String>,
}

impl ImageRef {
    pub fn new(asset: impl Into<String>) -> ImageRef {
        ImageRef {
            asset: asset.into(),
            alt: None,
        }
    }
}

/// Builds display URLs for image assets. One instance per site, configured
/// with the CDN base URL.
#[derive(Clone, Debug)]
pub struct UrlBuilder {
    cdn_base: Url,
}

impl UrlBuilder {
    /// `cdn_base` should end in a trailing slash (e.g.
    /// `https://cdn.example.org/images/site/production/`).
    pub fn new(cdn_base: Url) -> UrlBuilder {
        UrlBuilder { cdn_base }
    }

    /// Resolves `asset` into a `width`x`height` display URL. Returns `None`
    /// for references the builder can't interpret; callers render nothing in
    /// that case.
    pub fn url(&self, asset: &str, width: u32, height: u32) -> Option<String> {
        let mut resolved = if asset.starts_with("http://") || asset.starts_with("https://") {
            Url::parse(asset).ok()?
        } else {
            let file = parse_asset_ref(asset)?;
            self.cdn_base.join(&file).ok()?
        };
        resolved
            .query_pairs_mut()
            .append_pair("w", &width.to_string())
            .append_pair("h", &height.to_string())
            .append_pair("fit", "crop");
        Some(resolved.into())
    }
}

// `image-{id}-{w}x{h}-{fmt}` -> `{id}-{w}x{h}.{fmt}`
fn parse_asset_ref(asset: &str) -> Option<String> {
    let rest = asset.strip_prefix("image-")?;
    let (stem, format) = rest.rsplit_once('-')?;
    let (_, dimensions) = stem.rsplit_once('-')?;
    if !dimensions.contains('x') || format.is_empty() {
        return None;
    }
    Some(format!("{}.{}", stem, format))
}
