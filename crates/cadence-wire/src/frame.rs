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

//! The command wire frame.
//!
//! Layout: `{timeline_id: varint, due_tick: i32, kind: u16, issuer_id: i32,
//! payload_len: i32, payload bytes}`. The payload is opaque here; it is
//! produced and consumed exclusively through the serialization registry for
//! the command's declared argument types, in declaration order.

use crate::cursor::ByteCursor;
use crate::error::WireError;
use cadence_core::{CommandKind, IssuerId, ProtocolError, ScheduledCommand, Tick, TimelineId};

/// Appends a command frame to the cursor.
pub fn encode_command(cursor: &mut ByteCursor, command: &ScheduledCommand) -> Result<(), WireError> {
    let due = i32::try_from(command.due.get())
        .map_err(|_| WireError::ValueOutOfRange { what: "due tick" })?;
    let payload_len = i32::try_from(command.payload.len())
        .map_err(|_| WireError::ValueOutOfRange { what: "payload length" })?;

    cursor.write_varint_u32(command.target.0);
    cursor.write_i32(due);
    cursor.write_u16(command.kind.0);
    cursor.write_i32(command.issuer.0);
    cursor.write_i32(payload_len);
    cursor.write_raw(&command.payload);
    Ok(())
}

/// Reads one command frame from the cursor.
///
/// A negative due tick or payload length cannot have been produced by a
/// conforming writer, so either is a protocol violation, not a value to
/// clamp.
pub fn decode_command(cursor: &mut ByteCursor) -> Result<ScheduledCommand, ProtocolError> {
    let target = TimelineId(cursor.read_varint_u32()?);
    let due = cursor.read_i32()?;
    if due < 0 {
        return Err(ProtocolError::MalformedFrame(format!(
            "negative due tick {due}"
        )));
    }
    let kind = CommandKind(cursor.read_u16()?);
    let issuer = IssuerId(cursor.read_i32()?);
    let payload_len = cursor.read_i32()?;
    if payload_len < 0 {
        return Err(ProtocolError::MalformedFrame(format!(
            "negative payload length {payload_len}"
        )));
    }
    let payload = cursor.read_raw(payload_len as usize)?;

    Ok(ScheduledCommand {
        target,
        due: Tick::new(due as u64),
        issuer,
        kind,
        payload,
    })
}
