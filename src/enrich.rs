//! Full-text enrichment for newly seen documents.
//!
//! Only invoked for documents not yet known to the sink, with a textual MIME
//! type, and when `sync.fulltext` is enabled. Failures never abort a record:
//! the pipeline falls back to the history label for both title and text.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::error::ExtractError;

/// Extracted body text and the best available title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub plain_text: String,
    pub title: String,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(
        &self,
        locator: &str,
        fallback_title: &str,
    ) -> Result<ExtractedText, ExtractError>;
}

/// Extractor that reads `file://` locators from disk and fetches http(s)
/// locators with a GET request.
pub struct HttpTextExtractor {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpTextExtractor {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    async fn fetch(&self, locator: &str) -> Result<(String, bool), ExtractError> {
        let mut resp = self.client.get(locator).send().await?;
        if !resp.status().is_success() {
            return Err(ExtractError::Status(resp.status().as_u16()));
        }
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            let room = self.max_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok((decode_truncated(body), is_html))
    }

    async fn read_file(&self, locator: &str) -> Result<(String, bool), ExtractError> {
        let path = url::Url::parse(locator)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| ExtractError::UnsupportedScheme(locator.to_string()))?;
        let file = tokio::fs::File::open(&path).await?;
        let mut body = Vec::new();
        file.take(self.max_bytes as u64)
            .read_to_end(&mut body)
            .await?;
        let is_html = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);
        Ok((decode_truncated(body), is_html))
    }
}

/// Decode a body that may have been cut at the size cap. A multi-byte
/// character split by the cut is dropped rather than replaced.
fn decode_truncated(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let utf8 = e.utf8_error();
            let mut bytes = e.into_bytes();
            if utf8.error_len().is_none() {
                bytes.truncate(utf8.valid_up_to());
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    async fn extract_text(
        &self,
        locator: &str,
        fallback_title: &str,
    ) -> Result<ExtractedText, ExtractError> {
        let scheme = locator.split(':').next().unwrap_or_default();
        let (body, is_html) = match scheme {
            "http" | "https" => self.fetch(locator).await?,
            "file" => self.read_file(locator).await?,
            other => return Err(ExtractError::UnsupportedScheme(other.to_string())),
        };

        if is_html {
            let title = html_title(&body)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback_title.to_string());
            Ok(ExtractedText {
                plain_text: html_to_text(&body),
                title,
            })
        } else {
            Ok(ExtractedText {
                plain_text: body.trim().to_string(),
                title: fallback_title.to_string(),
            })
        }
    }
}

/// Extractor used when full-text mode is off; always declines.
pub struct NoExtractor;

#[async_trait]
impl TextExtractor for NoExtractor {
    async fn extract_text(
        &self,
        locator: &str,
        _fallback_title: &str,
    ) -> Result<ExtractedText, ExtractError> {
        Err(ExtractError::UnsupportedScheme(locator.to_string()))
    }
}

/// Contents of the first `<title>` element, whitespace-collapsed.
pub fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    Some(collapse_whitespace(&decode_entities(&html[start..end])))
}

/// Visible text of an HTML document: tags dropped, `<script>`, `<style>`
/// and `<head>` contents skipped, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() / 2);
    let mut i = 0;

    while i < html.len() {
        let Some(rel) = lower[i..].find('<') else {
            out.push_str(&html[i..]);
            break;
        };
        out.push_str(&html[i..i + rel]);
        let tag_start = i + rel;

        let skipped = ["script", "style", "head"].iter().find_map(|name| {
            let opener = format!("<{}", name);
            let after = lower[tag_start..].strip_prefix(opener.as_str())?;
            if !after.starts_with(|c: char| c == '>' || c.is_ascii_whitespace()) {
                return None;
            }
            let closer = format!("</{}", name);
            lower[tag_start..].find(closer.as_str()).map(|p| tag_start + p)
        });
        let from = skipped.unwrap_or(tag_start);

        match lower[from..].find('>') {
            Some(close) => {
                i = from + close + 1;
                out.push(' ');
            }
            None => break,
        }
    }

    collapse_whitespace(&decode_entities(&out))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title> Rust &amp; Friends </title>
<style>body { color: red; }</style></head>
<body><h1>Hello</h1><script>var x = "<b>";</script>
<p>Ownership&nbsp;and borrowing.</p></body></html>"#;

    #[test]
    fn title_is_extracted() {
        assert_eq!(html_title(PAGE).as_deref(), Some("Rust & Friends"));
        assert_eq!(html_title("<p>no title</p>"), None);
    }

    #[test]
    fn visible_text_only() {
        assert_eq!(html_to_text(PAGE), "Hello Ownership and borrowing.");
    }

    #[test]
    fn unterminated_tag_does_not_loop() {
        assert_eq!(html_to_text("text <b unterminated"), "text");
    }

    #[tokio::test]
    async fn reads_local_text_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "  line one\nline two  ").unwrap();
        let locator = url::Url::from_file_path(&path).unwrap().to_string();

        let ex = HttpTextExtractor::new(Duration::from_secs(5), 1024).unwrap();
        let out = ex.extract_text(&locator, "Notes").await.unwrap();
        assert_eq!(out.plain_text, "line one\nline two");
        assert_eq!(out.title, "Notes");
    }

    #[tokio::test]
    async fn truncates_to_max_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.txt");
        std::fs::write(&path, "abcdefghij").unwrap();
        let locator = url::Url::from_file_path(&path).unwrap().to_string();

        let ex = HttpTextExtractor::new(Duration::from_secs(5), 4).unwrap();
        let out = ex.extract_text(&locator, "").await.unwrap();
        assert_eq!(out.plain_text, "abcd");
    }

    #[tokio::test]
    async fn truncation_keeps_whole_characters() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cafe.txt");
        std::fs::write(&path, "caf\u{e9} au lait").unwrap();
        let locator = url::Url::from_file_path(&path).unwrap().to_string();

        // The cap lands between the two bytes of 'é'.
        let ex = HttpTextExtractor::new(Duration::from_secs(5), 4).unwrap();
        let out = ex.extract_text(&locator, "").await.unwrap();
        assert_eq!(out.plain_text, "caf");
    }

    #[test]
    fn decode_truncated_only_trims_the_tail() {
        assert_eq!(decode_truncated(b"ok".to_vec()), "ok");
        assert_eq!(decode_truncated(vec![b'a', 0xE2, 0x82]), "a");
        assert_eq!(decode_truncated(vec![0xFF, b'b']), "\u{FFFD}b");
    }

    /// Serve an endless `text/plain` body; returns the URL.
    async fn endless_body_server() -> String {
        use axum::body::{Body, Bytes};
        use axum::http::header;
        use axum::routing::get;

        const CHUNK: &[u8] = &[b'x'; 1024];
        let app = axum::Router::new().route(
            "/big.txt",
            get(|| async {
                let stream = futures::stream::repeat_with(|| {
                    Ok::<_, std::io::Error>(Bytes::from_static(CHUNK))
                });
                ([(header::CONTENT_TYPE, "text/plain")], Body::from_stream(stream))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}/big.txt", addr)
    }

    #[tokio::test]
    async fn http_body_read_stops_at_cap() {
        let url = endless_body_server().await;
        let ex = HttpTextExtractor::new(Duration::from_secs(5), 3000).unwrap();
        let out = ex.extract_text(&url, "Big").await.unwrap();
        assert_eq!(out.plain_text.len(), 3000);
        assert!(out.plain_text.bytes().all(|b| b == b'x'));
        assert_eq!(out.title, "Big");
    }

    #[tokio::test]
    async fn unsupported_scheme_fails() {
        let ex = HttpTextExtractor::new(Duration::from_secs(5), 1024).unwrap();
        let err = ex.extract_text("about:blank", "x").await.unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedScheme(_)));
    }
}
