//! Raw HTTP responses and their on-disk form
//!
//! A cached response is stored exactly as it would appear on the wire:
//! status line, headers, blank line, body. Replaying it yields the same
//! status, headers and body the network originally returned.

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("response has no header terminator")]
    MissingHeaderTerminator,

    #[error("response head is not valid UTF-8")]
    InvalidEncoding,

    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid header line: {0}")]
    InvalidHeader(String),

    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("truncated body: Content-Length is {declared}, found {actual} bytes")]
    TruncatedBody { declared: usize, actual: usize },
}

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A complete response: status, headers and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Only 200 OK responses are cached
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serialize to HTTP/1.1 wire form.
    ///
    /// The body is always written whole, so `Transfer-Encoding` is dropped and
    /// `Content-Length` rewritten to match.
    pub fn to_wire(&self) -> Vec<u8> {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");

        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("transfer-encoding")
            {
                continue;
            }
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Parse the wire form written by [`RawResponse::to_wire`]
    pub fn from_wire(data: &[u8]) -> Result<Self, WireError> {
        let split = data
            .windows(HEADER_TERMINATOR.len())
            .position(|w| w == HEADER_TERMINATOR)
            .ok_or(WireError::MissingHeaderTerminator)?;

        let head = std::str::from_utf8(&data[..split]).map_err(|_| WireError::InvalidEncoding)?;
        let mut body = &data[split + HEADER_TERMINATOR.len()..];

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let status = parse_status_line(status_line)?;

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| WireError::InvalidHeader(line.to_string()))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let declared = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| {
                v.parse::<usize>()
                    .map_err(|_| WireError::InvalidContentLength(v.clone()))
            })
            .transpose()?;
        if let Some(len) = declared {
            if len > body.len() {
                return Err(WireError::TruncatedBody {
                    declared: len,
                    actual: body.len(),
                });
            }
            body = &body[..len];
        }

        Ok(Self {
            status,
            headers,
            body: Bytes::copy_from_slice(body),
        })
    }
}

fn parse_status_line(line: &str) -> Result<u16, WireError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(WireError::InvalidStatusLine(line.to_string()));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| WireError::InvalidStatusLine(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_layout() {
        let response = RawResponse::new(200, "<html></html>")
            .with_header("Content-Type", "text/html; charset=utf-8");

        let wire = String::from_utf8(response.to_wire()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(wire.ends_with("Content-Length: 13\r\n\r\n<html></html>"));
    }

    #[test]
    fn test_replay_keeps_status_headers_and_body() {
        let response = RawResponse::new(404, "gone")
            .with_header("X-Request-Id", "abc")
            .with_header("Transfer-Encoding", "chunked");

        let replayed = RawResponse::from_wire(&response.to_wire()).unwrap();
        assert_eq!(replayed.status, 404);
        assert_eq!(replayed.header("x-request-id"), Some("abc"));
        assert_eq!(replayed.header("transfer-encoding"), None);
        assert_eq!(replayed.header("content-length"), Some("4"));
        assert_eq!(&replayed.body[..], b"gone");
    }

    #[test]
    fn test_body_may_contain_blank_lines() {
        let body = "line one\r\n\r\nline two";
        let response = RawResponse::new(200, body);

        let replayed = RawResponse::from_wire(&response.to_wire()).unwrap();
        assert_eq!(replayed.text(), body);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            RawResponse::from_wire(b"no terminator here"),
            Err(WireError::MissingHeaderTerminator)
        ));
        assert!(matches!(
            RawResponse::from_wire(b"HTTQ 200 OK\r\n\r\n"),
            Err(WireError::InvalidStatusLine(_))
        ));
        assert!(matches!(
            RawResponse::from_wire(b"HTTP/1.1 200 OK\r\nbroken header\r\n\r\n"),
            Err(WireError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_short_body_is_rejected() {
        let mut wire = RawResponse::new(200, "<html>complete</html>").to_wire();
        wire.truncate(wire.len() - 5);

        assert!(matches!(
            RawResponse::from_wire(&wire),
            Err(WireError::TruncatedBody { declared: 21, actual: 16 })
        ));
        assert!(matches!(
            RawResponse::from_wire(b"HTTP/1.1 200 OK\r\nContent-Length: many\r\n\r\nbody"),
            Err(WireError::InvalidContentLength(_))
        ));
    }
}
