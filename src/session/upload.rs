//! Multipart bodies for file uploads

use rand::RngCore as _;

/// Number of leading bytes examined when sniffing a file's content type.
pub const SNIFF_LEN: usize = 512;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"<?xml", "text/xml; charset=utf-8"),
];

/// Guesses a MIME type from the first [`SNIFF_LEN`] bytes of `data`.
///
/// Known binary signatures win; otherwise HTML markers, then plain UTF-8 text,
/// then `application/octet-stream`.
///
/// # Examples
///
/// ```
/// use idmctl::session::upload::sniff_content_type;
///
/// assert_eq!(sniff_content_type(b"%PDF-1.7 ..."), "application/pdf");
/// assert_eq!(sniff_content_type(b"hello"), "text/plain; charset=utf-8");
/// assert_eq!(sniff_content_type(&[0u8, 1, 2]), "application/octet-stream");
/// ```
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
        return *mime;
    }

    let trimmed = trim_leading_whitespace(head);
    let lowered = trimmed
        .iter()
        .take(14)
        .map(u8::to_ascii_lowercase)
        .collect::<Vec<_>>();
    if lowered.starts_with(b"<!doctype html") || lowered.starts_with(b"<html") {
        return "text/html; charset=utf-8";
    }

    let is_text = match std::str::from_utf8(head) {
        Ok(_) => true,
        // a multi-byte character cut at the sniff boundary is still text
        Err(e) => e.error_len().is_none(),
    };
    if is_text && !head.iter().any(|b| is_binary_control(*b)) {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn is_binary_control(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Incrementally built `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    /// Starts an empty form with a random boundary.
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        let boundary = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self::with_boundary(boundary)
    }

    /// Starts an empty form with a fixed boundary.
    pub fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            body: Vec::new(),
        }
    }

    /// Appends one part.
    pub fn part(
        mut self,
        name: &str,
        file_name: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> Self {
        let disposition = match file_name {
            Some(file_name) => format!(
                "form-data; name=\"{}\"; filename=\"{}\"",
                escape_quotes(name),
                escape_quotes(file_name)
            ),
            None => format!("form-data; name=\"{}\"", escape_quotes(name)),
        };
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body
            .extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        self.body
            .extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// `Content-Type` header value announcing this form's boundary.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Closes the form and returns the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
