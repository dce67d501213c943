//! Tagged byte payloads.
//!
//! A [`Sink`] is the body of every [`Request`](crate::Request) and
//! [`Response`](crate::Response). The dispatch path never looks inside the
//! bytes; the [`ContentType`] tag is the only thing the core and the HTTP
//! bridge interpret.

use std::borrow::Cow;
use std::fmt;
use std::io;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// The kind of payload carried by a [`Sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// Opaque binary data.
    #[default]
    Bytes,
    /// UTF-8 text.
    Text,
    /// A structured document (JSON).
    Structured,
    /// A schema-encoded message, e.g. protobuf.
    Encoded,
}

impl ContentType {
    /// Returns the name of the content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes => "Bytes",
            Self::Text => "Text",
            Self::Structured => "Structured",
            Self::Encoded => "Encoded",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, content-type tagged byte payload.
///
/// Cloning a `Sink` is cheap: the bytes are reference counted and never
/// mutated after construction.
///
/// # Example
///
/// ```rust
/// use courier_core::{ContentType, Sink};
///
/// let sink = Sink::text("hello");
/// assert_eq!(sink.content_type(), ContentType::Text);
/// assert_eq!(sink.as_str(), Some("hello"));
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Sink {
    content_type: ContentType,
    data: Bytes,
}

impl Sink {
    /// Creates a sink with an explicit content type.
    pub fn new(content_type: ContentType, data: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            data: data.into(),
        }
    }

    /// Creates a [`ContentType::Bytes`] sink.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::new(ContentType::Bytes, data)
    }

    /// Creates a [`ContentType::Text`] sink.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ContentType::Text, text.into())
    }

    /// Creates a [`ContentType::Encoded`] sink from already-encoded bytes.
    pub fn encoded(data: impl Into<Bytes>) -> Self {
        Self::new(ContentType::Encoded, data)
    }

    /// Serializes `value` as JSON into a [`ContentType::Structured`] sink.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::new(ContentType::Structured, data))
    }

    /// Returns the content type tag.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns a cheap clone of the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the payload as `&str` if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Deserializes the payload as JSON.
    ///
    /// The content type tag is not checked; a `Bytes` sink holding JSON
    /// decodes just as well.
    pub fn decode_structured<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.data)
    }

    /// Writes the payload to `writer`.
    pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.data)
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text_lossy())
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}
