//! Core data models that flow through the sync pipeline.
//!
//! Serialized field names follow the DiMe JSON schema, so the types here are
//! also the wire format sent to the sink.

use serde::Serialize;

/// One visit row read from a history snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Visit time, ISO-8601 UTC (`2016-03-01T12:00:00Z`).
    pub timestamp: String,
    pub locator: String,
    pub label: String,
}

/// Storage class and MIME type derived from a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub storage_class: String,
    pub mime_type: String,
}

/// The resource a visit points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type", rename = "Document")]
pub struct Document {
    #[serde(rename = "id")]
    pub identity: String,
    #[serde(rename = "uri")]
    pub locator: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "isStoredAs")]
    pub storage_class: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub title: String,
    #[serde(rename = "plainTextContent", skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
}

/// Reference to an already-delivered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type", rename = "Document")]
pub struct DocumentRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TargetResource {
    Reference(DocumentRef),
    Embedded(Box<Document>),
}

impl TargetResource {
    pub fn document_id(&self) -> &str {
        match self {
            TargetResource::Reference(r) => &r.id,
            TargetResource::Embedded(d) => &d.identity,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, TargetResource::Embedded(_))
    }
}

/// One visit occurrence. This is also the payload posted to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "@type", rename = "DesktopEvent")]
pub struct Event {
    #[serde(rename = "id")]
    pub identity: String,
    pub origin: String,
    pub actor: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "start")]
    pub start_time: String,
    #[serde(rename = "targettedResource")]
    pub target: TargetResource,
}

impl Event {
    /// A copy of this event carrying the full document instead of a reference.
    pub fn with_embedded(&self, document: Document) -> Event {
        Event {
            target: TargetResource::Embedded(Box::new(document)),
            ..self.clone()
        }
    }
}
