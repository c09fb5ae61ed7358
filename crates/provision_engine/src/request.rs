//! Request and response envelopes.
//!
//! Payloads are opaque JSON documents. The engine decodes them into an
//! action's declared input only when dispatching; transports pass them
//! through untouched.

use crate::error::EngineError;
use provision_store::UserId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An encoded action input or output.
///
/// An empty payload decodes as JSON `null`, which is also what [`Void`]
/// encodes to.
///
/// [`Void`]: crate::service::Void
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Encodes `value` as a payload.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, EngineError> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(EngineError::Encode)
    }

    /// Decodes the payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EngineError> {
        decode_bytes(&self.0)
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the payload, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns whether the payload has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decodes `bytes` into `T`, treating blank input as JSON `null`.
pub(crate) fn decode_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EngineError> {
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(EngineError::Decode)
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(json: &str) -> Self {
        Self(json.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(json: String) -> Self {
        Self(json.into_bytes())
    }
}

// On the wire a payload is embedded as a JSON document, not as a byte array.
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value: serde_json::Value =
            decode_bytes(&self.0).map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        serde_json::to_vec(&value)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// The part of a request addressed to a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Action name, e.g. `"create"` or `"add-disk"`.
    pub action: String,
    /// Object id within the space.
    #[serde(rename = "resource")]
    pub resource_id: String,
    /// Encoded action input.
    #[serde(default)]
    pub payload: Payload,
}

/// A request handled by [`Engine::handle`](crate::Engine::handle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Resource type name, e.g. `"VM"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tenant id.
    pub user: UserId,
    /// Space name.
    pub space: String,
    /// Action, object id and payload.
    #[serde(flatten)]
    pub resource: ResourceRequest,
}

impl Request {
    /// Creates a request with an empty payload.
    pub fn new(
        kind: impl Into<String>,
        user: UserId,
        space: impl Into<String>,
        action: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            user,
            space: space.into(),
            resource: ResourceRequest {
                action: action.into(),
                resource_id: resource_id.into(),
                payload: Payload::empty(),
            },
        }
    }

    /// Sets the encoded payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.resource.payload = payload.into();
        self
    }

    /// Encodes `input` as the payload.
    pub fn with_input<T: Serialize + ?Sized>(mut self, input: &T) -> Result<Self, EngineError> {
        self.resource.payload = Payload::encode(input)?;
        Ok(self)
    }
}

/// The result of a successfully handled request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Encoded action output.
    pub payload: Payload,
}
