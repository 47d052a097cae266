//! Locator classification.
//!
//! Maps a locator to the storage class and MIME type recorded on its
//! document. The default [`UriClassifier`] looks only at the URI itself; it
//! never touches the network.
//!
//! | Extension | MIME Type |
//! |-----------|----------|
//! | `.html`, `.htm`, `.php`, `.asp`, `.aspx`, `.jsp` | `text/html` |
//! | `.txt` | `text/plain` |
//! | `.md` | `text/markdown` |
//! | `.csv` | `text/csv` |
//! | `.xml` | `text/xml` |
//! | `.json` | `application/json` |
//! | `.pdf` | `application/pdf` |
//! | `.png`, `.jpg`, `.jpeg`, `.gif`, `.svg` | `image/*` |
//! | none, http(s) | `text/html` |
//! | Other | `application/octet-stream` |

use tracing::debug;
use url::Url;

use crate::config::NFO;
use crate::models::Classification;

const OCTET_STREAM: &str = "application/octet-stream";

pub trait Classifier: Send + Sync {
    fn classify(&self, locator: &str) -> Classification;
}

/// Extension-table classifier over parsed URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriClassifier;

impl Classifier for UriClassifier {
    fn classify(&self, locator: &str) -> Classification {
        let url = match Url::parse(locator) {
            Ok(url) => url,
            Err(e) => {
                debug!(%locator, error = %e, "unparseable locator, classifying as opaque remote data");
                return Classification {
                    storage_class: format!("{}RemoteDataObject", NFO),
                    mime_type: OCTET_STREAM.to_string(),
                };
            }
        };

        let storage_class = if url.scheme() == "file" {
            format!("{}LocalFileDataObject", NFO)
        } else {
            format!("{}RemoteDataObject", NFO)
        };

        let web = matches!(url.scheme(), "http" | "https");
        let extension = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        let mime_type = match extension.as_deref() {
            Some(ext) => match mime_for_extension(ext) {
                Some(mime) => mime,
                None if web => "text/html",
                None => OCTET_STREAM,
            },
            None if web => "text/html",
            None => OCTET_STREAM,
        };

        Classification {
            storage_class,
            mime_type: mime_type.to_string(),
        }
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "html" | "htm" | "xhtml" | "php" | "asp" | "aspx" | "jsp" => "text/html",
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "zip" => "application/zip",
        _ => return None,
    })
}

/// Whether full-text extraction makes sense for this MIME type.
pub fn is_textual(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
}
