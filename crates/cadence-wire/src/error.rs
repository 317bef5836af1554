// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the wire layer.

use cadence_core::ProtocolError;
use std::fmt;

/// A low-level cursor failure: the byte stream itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A read ran past the end of the buffer.
    UnexpectedEnd {
        /// Bytes the read needed.
        wanted: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },
    /// A varint kept its continuation bit set past the maximum width.
    VarintOverflow,
    /// A string's bytes were not valid UTF-8.
    InvalidUtf8,
    /// A boolean byte held something other than 0 or 1.
    InvalidBool(u8),
    /// A value did not fit the width its wire field prescribes.
    ValueOutOfRange {
        /// Which field overflowed.
        what: &'static str,
    },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnexpectedEnd { wanted, remaining } => {
                write!(
                    f,
                    "unexpected end of buffer: wanted {wanted} bytes, {remaining} remaining"
                )
            }
            WireError::VarintOverflow => write!(f, "varint exceeds maximum encoded width"),
            WireError::InvalidUtf8 => write!(f, "string bytes are not valid UTF-8"),
            WireError::InvalidBool(b) => write!(f, "invalid boolean byte: {b:#04x}"),
            WireError::ValueOutOfRange { what } => {
                write!(f, "value does not fit the wire field: {what}")
            }
        }
    }
}

impl std::error::Error for WireError {}

impl From<WireError> for ProtocolError {
    fn from(err: WireError) -> Self {
        ProtocolError::MalformedFrame(err.to_string())
    }
}

/// A serialization failure above the byte level: no codec accepted a value,
/// or a discriminator pointed outside the shared catalog.
///
/// Always a hard failure. A value is never partially decoded and never
/// guessed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationMismatch {
    /// No registry entry resolves for the type at all.
    NoCodec {
        /// Name of the unresolvable type.
        type_name: &'static str,
    },
    /// A codec chain was exhausted with every codec declining.
    Unhandled {
        /// Name of the unhandled type.
        type_name: &'static str,
    },
    /// A polymorphic discriminator outside the shared ordered catalog.
    UnknownDiscriminator {
        /// The out-of-catalog index.
        index: u16,
    },
    /// A value whose type is not in the shared catalog was bound
    /// polymorphically.
    NotCataloged {
        /// Name of the uncataloged type.
        type_name: &'static str,
    },
    /// A polymorphic read resolved a type with no registered constructor.
    NotConstructible {
        /// Name of the unconstructible type.
        type_name: &'static str,
    },
    /// The underlying byte stream failed.
    Wire(WireError),
}

impl fmt::Display for SerializationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationMismatch::NoCodec { type_name } => {
                write!(f, "no codec registered for type '{type_name}'")
            }
            SerializationMismatch::Unhandled { type_name } => {
                write!(f, "codec chain exhausted for type '{type_name}'")
            }
            SerializationMismatch::UnknownDiscriminator { index } => {
                write!(f, "discriminator {index} is outside the shared type catalog")
            }
            SerializationMismatch::NotCataloged { type_name } => {
                write!(f, "type '{type_name}' is not in the shared type catalog")
            }
            SerializationMismatch::NotConstructible { type_name } => {
                write!(f, "type '{type_name}' has no registered constructor")
            }
            SerializationMismatch::Wire(err) => write!(f, "wire error: {err}"),
        }
    }
}

impl std::error::Error for SerializationMismatch {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationMismatch::Wire(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WireError> for SerializationMismatch {
    fn from(err: WireError) -> Self {
        SerializationMismatch::Wire(err)
    }
}
