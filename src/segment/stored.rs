//! Stored-field records.
//!
//! Each document's stored fields form one record in the segment's `.fdt`
//! file: the identifier under `_id` first, then stored fields in document
//! order. Records are followed by their own CRC32 so they can be verified
//! when loaded lazily.

use std::io::{Read, Seek, SeekFrom};

use crate::document::ID_FIELD;
use crate::document::document::Document;
use crate::document::field::{FieldKind, FieldValue};
use crate::error::{QuiverError, Result};
use crate::storage::{Storage, StorageOutput};
use crate::storage::structured::{StructReader, StructWriter};
use crate::util::varint::write_u64;

/// Location of a record inside the `.fdt` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPointer {
    /// Byte offset of the record payload.
    pub offset: u64,
    /// Payload length, excluding the trailing checksum.
    pub len: u32,
}

/// Serialize the stored part of a document into a record payload.
pub fn encode_document(document: &Document) -> Result<Vec<u8>> {
    let mut entries: Vec<(&str, FieldKind, Vec<u8>)> = Vec::new();
    entries.push((ID_FIELD, FieldKind::Text, document.id().as_bytes().to_vec()));
    for field in document.fields().iter().filter(|f| f.is_stored()) {
        let bytes = match field.value() {
            FieldValue::Text(text) => text.as_bytes().to_vec(),
            other => crate::codec::encode(other)?.to_vec(),
        };
        entries.push((field.name(), field.kind(), bytes));
    }

    let mut payload = Vec::new();
    write_u64(&mut payload, entries.len() as u64);
    for (name, kind, bytes) in entries {
        write_u64(&mut payload, name.len() as u64);
        payload.extend_from_slice(name.as_bytes());
        payload.push(kind.tag());
        write_u64(&mut payload, bytes.len() as u64);
        payload.extend_from_slice(&bytes);
    }
    Ok(payload)
}

/// Walk a record payload, calling `visitor(name, kind, bytes)` until it
/// returns `false`.
pub fn visit_record<F>(payload: &[u8], mut visitor: F) -> Result<()>
where
    F: FnMut(&str, FieldKind, &[u8]) -> bool,
{
    let mut reader = StructReader::from_bytes(payload);
    let count = reader.read_len()?;
    for _ in 0..count {
        let name = reader.read_string()?;
        let kind = FieldKind::from_tag(reader.read_u8()?)?;
        let len = reader.read_len()?;
        if !visitor(&name, kind, reader.read_raw(len)?) {
            break;
        }
    }
    Ok(())
}

/// Decode every field of a record payload, `_id` first.
pub fn decode_record(payload: &[u8]) -> Result<Vec<(String, FieldValue)>> {
    let mut fields = Vec::new();
    let mut failure = None;
    visit_record(payload, |name, kind, bytes| match decode_value(kind, bytes) {
        Ok(value) => {
            fields.push((name.to_string(), value));
            true
        }
        Err(e) => {
            failure = Some(e);
            false
        }
    })?;
    match failure {
        Some(e) => Err(e),
        None => Ok(fields),
    }
}

fn decode_value(kind: FieldKind, bytes: &[u8]) -> Result<FieldValue> {
    match kind {
        FieldKind::Text => String::from_utf8(bytes.to_vec())
            .map(FieldValue::Text)
            .map_err(|e| QuiverError::corruption(format!("stored text: {e}"))),
        _ => crate::codec::decode(kind, bytes),
    }
}

/// Append a record and its checksum; returns where it landed.
pub fn write_record<W: StorageOutput>(
    writer: &mut StructWriter<W>,
    payload: &[u8],
) -> Result<RecordPointer> {
    let offset = writer.position();
    let len = u32::try_from(payload.len())
        .map_err(|_| QuiverError::invalid_field("stored fields exceed 4 GiB"))?;
    writer.write_raw(payload)?;
    writer.write_u32(crc32fast::hash(payload))?;
    Ok(RecordPointer { offset, len })
}

/// Read and verify one record.
pub fn read_record(storage: &dyn Storage, file: &str, pointer: RecordPointer) -> Result<Vec<u8>> {
    let mut input = storage.open_input(file)?;
    input.seek(SeekFrom::Start(pointer.offset))?;

    let mut buffer = vec![0u8; pointer.len as usize + 4];
    input.read_exact(&mut buffer)?;

    let payload_len = pointer.len as usize;
    let stored = u32::from_le_bytes([
        buffer[payload_len],
        buffer[payload_len + 1],
        buffer[payload_len + 2],
        buffer[payload_len + 3],
    ]);
    buffer.truncate(payload_len);
    if crc32fast::hash(&buffer) != stored {
        return Err(QuiverError::corruption(format!(
            "{file}: stored record at {} failed checksum",
            pointer.offset
        )));
    }
    Ok(buffer)
}
