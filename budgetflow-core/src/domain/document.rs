//! Remote document wire type and entity decoding

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::scope::{CollectionKind, ResolvedScope};

/// A document as delivered by the remote store: the store-assigned id plus
/// the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: JsonValue,
}

impl Document {
    pub fn new(id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// An entity stored in its own remote collection
pub trait Entity: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Collection this entity lives in
    const KIND: CollectionKind;

    /// Store-assigned identifier
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Fill owner references the document body left out, using the scope the
    /// document was read from. References that are present are kept as-is,
    /// even when they disagree with the scope.
    fn adopt_scope(&mut self, scope: &ResolvedScope);
}

/// Decode a document into an entity, assigning its store id
pub fn decode<T: Entity>(doc: &Document, scope: &ResolvedScope) -> Result<T> {
    let mut entity: T = serde_json::from_value(doc.data.clone())
        .map_err(|e| Error::decode(&doc.id, e.to_string()))?;
    entity.set_id(doc.id.clone());
    entity.adopt_scope(scope);
    Ok(entity)
}

/// Decode every document, skipping (and logging) those that fail
pub fn decode_all<T: Entity>(docs: &[Document], scope: &ResolvedScope) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode::<T>(doc, scope) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(kind = %T::KIND, id = %doc.id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

/// Encode an entity into a document body. The id travels separately.
pub fn encode<T: Entity>(entity: &T) -> Result<Document> {
    let mut data = serde_json::to_value(entity)?;
    if let Some(obj) = data.as_object_mut() {
        obj.remove("id");
    }
    Ok(Document::new(entity.id(), data))
}
