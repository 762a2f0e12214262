//! Compact value codec
//!
//! Values are held as boxed UTF-8 byte slices: no spare capacity and no
//! separate length/capacity pair per entry. Reading a value validates the
//! bytes again on every call, trading a little CPU for the smaller footprint.
//!
//! Encoding is always UTF-8, so byte equality of two `ByteForm`s is the same
//! as text equality of the values they hold.

use std::borrow::Cow;
use std::fmt;

/// Immutable UTF-8 byte representation of a text value.
///
/// An absent `ByteForm` stands for "no value".
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteForm(Option<Box<[u8]>>);

impl ByteForm {
    /// The absent byte form.
    pub const fn absent() -> Self {
        Self(None)
    }

    /// Encode an optional text value. `None` yields the absent form.
    pub fn encode(text: Option<&str>) -> Self {
        Self(text.map(|t| Box::from(t.as_bytes())))
    }

    /// Encode a present text value.
    pub fn from_text(text: &str) -> Self {
        Self(Some(Box::from(text.as_bytes())))
    }

    /// Decode back to text. Not cached: the bytes are re-validated each call.
    ///
    /// Forms built by this module are always valid UTF-8 and borrow;
    /// anything else is replaced lossily rather than rejected.
    pub fn decode(&self) -> Option<Cow<'_, str>> {
        self.0.as_deref().map(String::from_utf8_lossy)
    }

    /// Raw bytes, or `None` for the absent form.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    /// True if this form represents "no value".
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Encoded length in bytes (0 when absent).
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |b| b.len())
    }

    /// True for absent or zero-length forms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for ByteForm {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl fmt::Debug for ByteForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(text) => write!(f, "ByteForm({:?})", text),
            None => f.write_str("ByteForm(<absent>)"),
        }
    }
}

/// Encode an optional text value into its byte form.
pub fn encode(text: Option<&str>) -> ByteForm {
    ByteForm::encode(text)
}

/// Decode a byte form back into text; absent decodes to `None`.
pub fn decode(form: &ByteForm) -> Option<Cow<'_, str>> {
    form.decode()
}
