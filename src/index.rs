//! The random-access file index: a one-pass scan recording every `"OSMData"` fileblock's
//! position and size, without decoding any of them.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use crate::blob::{ByteOffset, MAX_BLOB_HEADER_SIZE};
use crate::error::Result;
use crate::util::parse_message_from_bytes;

use crate::proto::fileformat;

/// Position and size metadata for one `"OSMData"` fileblock, enough to seek straight to it
/// without decoding any preceding block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileblockDescriptor {
    /// Byte offset of the 4-byte length prefix that precedes the `BlobHeader`.
    pub header_offset: u64,
    /// Size in bytes of the `BlobHeader` message.
    pub header_size: u64,
    /// Byte offset of the `Blob` payload.
    pub data_offset: u64,
    /// Size in bytes of the `Blob` payload, as declared by the `BlobHeader`.
    pub data_size: u64,
}

/// Scans an entire stream for `"OSMData"` fileblocks, from the current position to EOF,
/// returning the stream to its starting position afterwards.
///
/// A seek failure partway through the scan ends the scan silently, keeping whatever descriptors
/// were already found: a deliberate "cut-losses" policy so a truncated or appended-to file
/// remains partially usable.
pub(crate) fn scan<R: Read + Seek>(reader: &mut R) -> Result<Vec<FileblockDescriptor>> {
    let start_pos = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;

    let mut descriptors = Vec::new();
    let mut pos: u64 = 0;

    loop {
        let mut len_buf = [0u8; 4];
        if reader.read_exact(&mut len_buf).is_err() {
            // Clean EOF at a length-prefix boundary, or a short read partway through one:
            // either way the scan has nothing more to learn, so stop here.
            break;
        }
        let header_size = u64::from(BigEndian::read_u32(&len_buf));

        if header_size == 0 || header_size > MAX_BLOB_HEADER_SIZE {
            break;
        }

        let mut header_buf = vec![0u8; header_size as usize];
        if reader.read_exact(&mut header_buf).is_err() {
            break;
        }

        let header: fileformat::BlobHeader = match parse_message_from_bytes(&header_buf) {
            Ok(h) => h,
            Err(_) => break,
        };

        let data_offset = pos + 4 + header_size;
        let raw_datasize = header.get_datasize();
        if raw_datasize < 0 {
            break;
        }
        let data_size = raw_datasize as u64;

        if header.get_field_type() == "OSMData" {
            descriptors.push(FileblockDescriptor {
                header_offset: ByteOffset(pos).0,
                header_size,
                data_offset,
                data_size,
            });
        }

        // Skip the payload without decoding it. A seek failure here ends the scan.
        if reader.seek(SeekFrom::Start(data_offset + data_size)).is_err() {
            warn!("index scan: seek past fileblock at {} failed, stopping early", pos);
            break;
        }

        pos = data_offset + data_size;
    }

    reader.seek(SeekFrom::Start(start_pos))?;

    debug!("index scan found {} OSMData fileblock(s)", descriptors.len());

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::Message;
    use std::io::Cursor;

    fn fileblock(field_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut header = fileformat::BlobHeader::new();
        header.set_field_type(field_type.to_string());
        header.set_datasize(payload.len() as i32);
        let header_bytes = header.write_to_bytes().unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn records_only_osmdata_blocks_and_restores_position() {
        let mut bytes = Vec::new();
        bytes.extend(fileblock("OSMHeader", b"abc"));
        bytes.extend(fileblock("OSMData", b"defgh"));
        bytes.extend(fileblock("OSMData", b"ij"));

        let mut cursor = Cursor::new(bytes);
        cursor.seek(SeekFrom::Start(7)).unwrap();

        let descriptors = scan(&mut cursor).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].data_size, 5);
        assert_eq!(descriptors[1].data_size, 2);
        assert_eq!(cursor.stream_position().unwrap(), 7);
    }

    #[test]
    fn truncated_trailing_block_is_dropped_silently() {
        let mut bytes = Vec::new();
        bytes.extend(fileblock("OSMData", b"ok"));
        bytes.extend_from_slice(&20u32.to_be_bytes()); // header length with no bytes following

        let mut cursor = Cursor::new(bytes);
        let descriptors = scan(&mut cursor).unwrap();
        assert_eq!(descriptors.len(), 1);
    }
}
