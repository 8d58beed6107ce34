//! URLs for media artifacts served next to the API.
//!
//! Uploaded sources and rendered results are static files under the
//! service root rather than the API prefix. The file base is the API base
//! with its trailing `/api` segment stripped.

use url::Url;

/// Builds direct URLs for source and result media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrls {
    file_base: String,
}

impl MediaUrls {
    pub fn from_api_base(api_base: &str) -> Self {
        let trimmed = api_base.trim_end_matches('/');
        let file_base = trimmed.strip_suffix("/api").unwrap_or(trimmed);
        Self {
            file_base: file_base.to_string(),
        }
    }

    pub fn file_base(&self) -> &str {
        &self.file_base
    }

    /// URL of an uploaded source file.
    pub fn source_url(&self, filename: &str) -> String {
        format!(
            "{}/files/upload/{}",
            self.file_base,
            urlencoding::encode(filename)
        )
    }

    /// URL of a rendered result file.
    pub fn result_url(&self, filename: &str) -> String {
        format!(
            "{}/files/result/{}",
            self.file_base,
            urlencoding::encode(filename)
        )
    }

    /// Turn a location returned by the service into an absolute URL.
    ///
    /// Absolute URLs pass through. Paths starting with `/` are resolved
    /// against the service origin, anything else against the file base.
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        match Url::parse(&format!("{}/", self.file_base)).and_then(|base| base.join(location)) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(
                    file_base = %self.file_base,
                    location,
                    error = %e,
                    "Could not resolve media location, concatenating",
                );
                format!("{}/{}", self.file_base, location.trim_start_matches('/'))
            }
        }
    }
}
