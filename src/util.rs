//! Small helpers around the generated protobuf message layer.

use protobuf::{Message, ProtobufResult};
use std::io::Read;

/// Parses a protobuf message from an in-memory byte slice.
pub(crate) fn parse_message_from_bytes<M: Message>(bytes: &[u8]) -> ProtobufResult<M> {
    Message::parse_from_bytes(bytes)
}

/// Parses a protobuf message from a reader, consuming it until EOF.
pub(crate) fn parse_message_from_reader<M: Message, R: Read>(reader: &mut R) -> ProtobufResult<M> {
    Message::parse_from_reader(reader)
}
