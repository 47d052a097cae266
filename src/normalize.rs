//! Record normalization and content-derived identities.
//!
//! A [`RawRecord`] becomes a [`Document`] (the visited resource) and an
//! [`Event`] (the visit). Identities are SHA-256 digests of each entity's
//! canonical JSON with the `id` field removed. `serde_json` maps keep keys
//! sorted, so the canonical form does not depend on field declaration order.
//!
//! The document identity is computed first and the event refers to it, so
//! the event identity transitively covers the document's content.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::classify::Classifier;
use crate::models::{Document, DocumentRef, Event, RawRecord, TargetResource};

/// Per-logger constants stamped onto every event and document.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub origin: String,
    pub actor: String,
    pub event_type: String,
    pub document_type: String,
}

/// Hex SHA-256 over the canonical JSON of `entity`, ignoring its `id`.
pub fn content_id<T: Serialize>(entity: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    let canonical = serde_json::to_vec(&value)?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Build the document/event pair for one record.
pub fn normalize(
    record: &RawRecord,
    ctx: &NormalizeContext,
    classifier: &dyn Classifier,
) -> Result<(Document, Event), serde_json::Error> {
    let class = classifier.classify(&record.locator);

    let mut document = Document {
        identity: String::new(),
        locator: record.locator.clone(),
        kind: ctx.document_type.clone(),
        storage_class: class.storage_class,
        mime_type: class.mime_type,
        title: record.label.clone(),
        plain_text: None,
    };
    document.identity = content_id(&document)?;

    let mut event = Event {
        identity: String::new(),
        origin: ctx.origin.clone(),
        actor: ctx.actor.clone(),
        event_type: ctx.event_type.clone(),
        start_time: record.timestamp.clone(),
        target: TargetResource::Reference(DocumentRef {
            id: document.identity.clone(),
        }),
    };
    event.identity = content_id(&event)?;

    Ok((document, event))
}
