//! Wire serialization seam.
//!
//! The binary serializer and its schema registry are external
//! collaborators; the connection core only needs the [`WireSchema`]
//! surface: serialize a method call, serialize a constructor-tagged bare
//! object, and look constructors up by predicate.
//!
//! [`JsonSchema`] is the bundled reference implementation. It is great for
//! tests and prototyping (human-readable output) but is not a binary
//! protocol encoder.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::normalize::{Args, Method};

/// Error type for schema operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The constructor predicate is not present in the schema registry.
    #[error("unknown constructor: {predicate}")]
    UnknownConstructor {
        /// Predicate that failed the lookup.
        predicate: String,
    },

    /// Failed to encode a payload to bytes.
    #[error("encode failed: {message}")]
    Encode {
        /// Underlying encoder failure text.
        message: String,
    },
}

/// Constructor metadata from the schema registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorSpec {
    /// Predicate (tag) identifying the constructor on the wire.
    pub predicate: String,
    /// Schema type the constructor produces.
    pub type_name: String,
}

/// Pluggable wire serializer and schema registry.
pub trait WireSchema {
    /// Serialize a method call to its wire form.
    fn serialize_method(&self, method: &Method, args: &Args) -> Result<Vec<u8>, SchemaError>;

    /// Serialize a bare object tagged with its constructor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownConstructor`] when the constructor is
    /// not registered.
    fn serialize_object(&self, constructor: &str, body: &Args) -> Result<Vec<u8>, SchemaError>;

    /// Look up a constructor by predicate.
    fn constructor(&self, predicate: &str) -> Option<ConstructorSpec>;
}

/// JSON-backed schema implementation.
///
/// Tags payloads with their constructor or method name under the `_` key
/// and encodes the result with `serde_json`.
#[derive(Debug, Clone)]
pub struct JsonSchema {
    constructors: HashMap<String, String>,
}

impl JsonSchema {
    /// Create a schema pre-loaded with the constructors the rewrite rules
    /// and tests rely on.
    pub fn new() -> Self {
        let mut schema = Self {
            constructors: HashMap::new(),
        };
        for (predicate, type_name) in [
            ("inputPeerSelf", "InputPeer"),
            ("inputEncryptedChat", "InputEncryptedChat"),
            ("inputFile", "InputFile"),
            ("inputFileBig", "InputFile"),
            ("inputEncryptedFile", "InputEncryptedFile"),
            ("inputMediaUploadedPhoto", "InputMedia"),
            ("inputMediaUploadedDocument", "InputMedia"),
            ("inputMediaPhoto", "InputMedia"),
            ("inputMediaDocument", "InputMedia"),
            ("decryptedMessage", "DecryptedMessage"),
            ("msgs_ack", "MsgsAck"),
        ] {
            schema.register(predicate, type_name);
        }
        schema
    }

    /// Register an additional constructor.
    pub fn register(&mut self, predicate: impl Into<String>, type_name: impl Into<String>) {
        self.constructors.insert(predicate.into(), type_name.into());
    }

    fn encode_tagged(&self, tag: &str, fields: &Args) -> Result<Vec<u8>, SchemaError> {
        let mut payload = Args::new();
        payload.insert("_".to_string(), Value::String(tag.to_string()));
        for (key, value) in fields {
            payload.insert(key.clone(), value.clone());
        }
        serde_json::to_vec(&payload).map_err(|e| SchemaError::Encode {
            message: e.to_string(),
        })
    }
}

impl Default for JsonSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl WireSchema for JsonSchema {
    fn serialize_method(&self, method: &Method, args: &Args) -> Result<Vec<u8>, SchemaError> {
        self.encode_tagged(method.as_wire(), args)
    }

    fn serialize_object(&self, constructor: &str, body: &Args) -> Result<Vec<u8>, SchemaError> {
        if self.constructor(constructor).is_none() {
            return Err(SchemaError::UnknownConstructor {
                predicate: constructor.to_string(),
            });
        }
        self.encode_tagged(constructor, body)
    }

    fn constructor(&self, predicate: &str) -> Option<ConstructorSpec> {
        self.constructors
            .get(predicate)
            .map(|type_name| ConstructorSpec {
                predicate: predicate.to_string(),
                type_name: type_name.clone(),
            })
    }
}
