// MIME detection for ingested image bytes
//
// Content sniffing itself is delegated to image::guess_format; this module
// only normalizes its answer and enforces the configured allowlist. Any
// sniffer failure is folded into a single error, it never surfaces raw.

use crate::core::errors::MimeError;

/// Fixed alias table applied after lowercasing and parameter stripping
const MIME_ALIASES: &[(&str, &str)] = &[
    ("image/jpg", "image/jpeg"),
    ("image/x-ms-bmp", "image/bmp"),
    ("image/x-bmp", "image/bmp"),
    ("image/tif", "image/tiff"),
];

/// Lowercase, drop any `;charset=...` style parameters, apply aliases.
pub fn normalize_mime(raw: &str) -> String {
    let ct = raw
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    for (alias, canonical) in MIME_ALIASES {
        if ct == *alias {
            return (*canonical).to_string();
        }
    }

    ct
}

/// Validates sniffed MIME types against the configured allowlist
pub struct MimeClassifier {
    allowed: Vec<String>,
}

impl MimeClassifier {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.iter().map(|s| normalize_mime(s)).collect(),
        }
    }

    /// Sniff the content type of `bytes` and return the normalized MIME
    /// type if it is allowed.
    pub fn classify(&self, bytes: &[u8]) -> Result<String, MimeError> {
        let format = image::guess_format(bytes).map_err(|_| MimeError::Unidentifiable)?;
        let ct = normalize_mime(format.to_mime_type());

        if ct.is_empty() || !self.allowed.contains(&ct) {
            return Err(MimeError::Unsupported(ct));
        }

        Ok(ct)
    }
}
