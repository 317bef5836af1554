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

//! # Cadence Wire
//!
//! The portable byte encoding of the synchronization core: a byte cursor,
//! a polymorphic serialization registry, the directional sync worker that
//! drives codecs, and the command frame codec.
//!
//! The cardinal rule of this crate is symmetry: the sequence and arity of
//! binds a codec issues must be identical when writing and when reading.
//! Any divergence desynchronizes the cursor for the rest of the message,
//! with no recovery.

#![warn(missing_docs)]

pub mod catalog;
pub mod cursor;
pub mod desc;
pub mod error;
pub mod frame;
pub mod registry;
pub mod worker;

pub use catalog::TypeCatalog;
pub use cursor::ByteCursor;
pub use desc::{SyncValue, TypeDesc, TypeTag};
pub use error::{SerializationMismatch, WireError};
pub use frame::{decode_command, encode_command};
pub use registry::{Codec, CodecOutcome, ConstructFn, RegistrationKind, SyncRegistry};
pub use worker::{Direction, SyncWorker};
