//! Opaque values produced and consumed by the device.
//!
//! Every value travels between machines as a hex string so it can be
//! copied by hand; parsing validates the encoding and, where the
//! format is fixed, the length.
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Error generated when decoding an opaque value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Input was empty.
    #[error("{label} is empty")]
    Empty {
        /// Kind of value being decoded.
        label: &'static str,
    },

    /// Input was not valid hex.
    #[error("{label} is not valid hex: {reason}")]
    Hex {
        /// Kind of value being decoded.
        label: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Decoded bytes have the wrong length.
    #[error("{label} must be {expected} bytes, got {actual}")]
    Length {
        /// Kind of value being decoded.
        label: &'static str,
        /// Required length.
        expected: usize,
        /// Length of the input.
        actual: usize,
    },
}

/// Decode hex input that may carry surrounding whitespace
/// and a `0x` prefix.
pub fn decode_hex(
    label: &'static str,
    input: &str,
) -> Result<Vec<u8>, DecodeError> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if input.is_empty() {
        return Err(DecodeError::Empty { label });
    }
    hex::decode(input).map_err(|e| DecodeError::Hex {
        label,
        reason: e.to_string(),
    })
}

macro_rules! opaque_blob {
    ($(#[$meta:meta])* $name:ident, $label:expr, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Human readable name of this value.
            pub const LABEL: &'static str = $label;

            /// Required length in bytes, if fixed.
            pub const LENGTH: Option<usize> = $len;

            /// Wrap raw bytes after validating the length.
            pub fn from_bytes(
                bytes: Vec<u8>,
            ) -> Result<Self, DecodeError> {
                if bytes.is_empty() {
                    return Err(DecodeError::Empty { label: $label });
                }
                if let Some(expected) = Self::LENGTH {
                    if bytes.len() != expected {
                        return Err(DecodeError::Length {
                            label: $label,
                            expected,
                            actual: bytes.len(),
                        });
                    }
                }
                Ok(Self(bytes))
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Lowercase hex encoding.
            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_bytes(decode_hex($label, s)?)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DecodeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let prefix = &self.0[..self.0.len().min(6)];
                write!(
                    f,
                    "{}({}.., {} bytes)",
                    stringify!($name),
                    hex::encode(prefix),
                    self.0.len()
                )
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let value =
                    <String as serde::Deserialize>::deserialize(
                        deserializer,
                    )?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_blob!(
    /// Public value identifying one key share holder.
    Identity,
    "identity",
    Some(129)
);

opaque_blob!(
    /// Serialized transaction without a signature.
    UnsignedTransaction,
    "unsigned transaction",
    None
);

opaque_blob!(
    /// Transaction hash returned after on-device review.
    TxHash,
    "transaction hash",
    Some(32)
);

opaque_blob!(
    /// First round commitment of one party.
    SigningCommitment,
    "signing commitment",
    None
);

opaque_blob!(
    /// Coordinator built package combining the transaction and
    /// every commitment.
    SigningPackage,
    "signing package",
    None
);

opaque_blob!(
    /// Partial signature of one party.
    SignatureShare,
    "signature share",
    None
);

opaque_blob!(
    /// Serialized transaction carrying its signature.
    Transaction,
    "transaction",
    None
);

opaque_blob!(
    /// Signature produced by a single key.
    Signature,
    "signature",
    Some(64)
);
