//! Locate, read, decompress and unpack the fileblocks a PBF file is made of.
//!
//! A `.osm.pbf` file is a concatenation of fileblocks: a 4-byte big-endian
//! length prefix, a `BlobHeader` of that many bytes, and a `Blob` of
//! `header.datasize` bytes. [`BlobReader`] walks this framing and yields
//! decoded [`Blob`]s one at a time; [`decode_blob`] turns a `Blob`'s
//! `raw`/`zlib_data` payload into plain bytes.

use crate::block::{HeaderBlock, PrimitiveBlock};
use byteorder::{BigEndian, ByteOrder};
use crate::error::{new_blob_error, new_error, new_protobuf_error, BlobError, ErrorKind, Result};
use crate::proto::fileformat;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use crate::util::parse_message_from_bytes;

#[cfg(feature = "system-libz")]
use flate2::{Decompress, FlushDecompress, Status};

#[cfg(not(feature = "system-libz"))]
use inflate::inflate_bytes_zlib;

/// Maximum allowed `BlobHeader` size in bytes.
pub static MAX_BLOB_HEADER_SIZE: u64 = 64 * 1024;

/// Maximum allowed `Blob` size in bytes, as declared by a `BlobHeader`'s `datasize`.
pub static MAX_BLOB_SIZE: u64 = 32 * 1024 * 1024;

/// The content type of a blob.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlobType<'a> {
    /// Blob contains a `HeaderBlock`.
    OsmHeader,
    /// Blob contains a `PrimitiveBlock`.
    OsmData,
    /// An unknown blob type with the given string identifier.
    /// Parsers should ignore unknown blobs they do not expect.
    Unknown(&'a str),
}

/// The decoded content of a blob (analogous to `BlobType`).
#[derive(Clone, Debug)]
pub enum BlobDecode<'a> {
    /// Blob contains a `HeaderBlock`.
    OsmHeader(Box<HeaderBlock>),
    /// Blob contains a `PrimitiveBlock`.
    OsmData(PrimitiveBlock),
    /// An unknown blob type with the given string identifier.
    /// Parsers should ignore unknown blobs they do not expect.
    Unknown(&'a str),
}

/// The offset of a fileblock in bytes from stream start, pointing at the
/// start of its 4-byte length prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ByteOffset(pub u64);

/// A single fileblock: a `BlobHeader` plus its `Blob` payload.
///
/// A PBF file consists of a sequence of blobs. This type supports decoding the content of a blob
/// to different types of blocks that are usually more interesting to the user.
#[derive(Clone, Debug)]
pub struct Blob {
    header: fileformat::BlobHeader,
    blob: fileformat::Blob,
    offset: Option<ByteOffset>,
}

impl Blob {
    fn new(
        header: fileformat::BlobHeader,
        blob: fileformat::Blob,
        offset: Option<ByteOffset>,
    ) -> Blob {
        Blob {
            header,
            blob,
            offset,
        }
    }

    /// Decodes the Blob and tries to obtain the inner content (usually a `HeaderBlock` or a
    /// `PrimitiveBlock`). This operation might involve an expensive decompression step.
    pub fn decode(&self) -> Result<BlobDecode> {
        match self.get_type() {
            BlobType::OsmHeader => {
                let block = Box::new(self.to_headerblock()?);
                Ok(BlobDecode::OsmHeader(block))
            }
            BlobType::OsmData => {
                let block = self.to_primitiveblock()?;
                Ok(BlobDecode::OsmData(block))
            }
            BlobType::Unknown(x) => Ok(BlobDecode::Unknown(x)),
        }
    }

    /// Returns the type of a blob without decoding its content.
    pub fn get_type(&self) -> BlobType {
        match self.header.get_field_type() {
            "OSMHeader" => BlobType::OsmHeader,
            "OSMData" => BlobType::OsmData,
            x => BlobType::Unknown(x),
        }
    }

    /// Returns the byte offset of the blob from the start of its source stream.
    /// This might be `None` if the source stream does not implement `Seek`.
    pub fn offset(&self) -> Option<ByteOffset> {
        self.offset
    }

    /// Tries to decode the blob to a `HeaderBlock`. This operation might involve an expensive
    /// decompression step.
    pub fn to_headerblock(&self) -> Result<HeaderBlock> {
        decode_blob(&self.blob).map(HeaderBlock::new)
    }

    /// Tries to decode the blob to a `PrimitiveBlock`. This operation might involve an expensive
    /// decompression step.
    pub fn to_primitiveblock(&self) -> Result<PrimitiveBlock> {
        decode_blob(&self.blob).map(PrimitiveBlock::new)
    }
}

/// A reader for PBF files that allows iterating over `Blob`s.
///
/// Every `next()` call reads and tears down exactly one fileblock's framing
/// (4-byte length prefix, `BlobHeader`, `Blob`) with no state kept across
/// calls beyond the stream position.
#[derive(Clone, Debug)]
pub struct BlobReader<R: Read> {
    reader: R,
    /// Current reader offset in bytes from the start of the stream.
    offset: Option<ByteOffset>,
    last_blob_ok: bool,
}

impl<R: Read> BlobReader<R> {
    /// Creates a new `BlobReader`.
    pub fn new(reader: R) -> BlobReader<R> {
        BlobReader {
            reader,
            offset: None,
            last_blob_ok: true,
        }
    }

    /// Reads exactly `buf.len()` bytes, distinguishing a clean end-of-stream (zero bytes
    /// read before any data arrived) from a short/partial read (some bytes arrived, then
    /// the stream ended), which is treated as an I/O failure rather than EOF.
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut total = 0;
        while total < buf.len() {
            match self.reader.read(&mut buf[total..]) {
                Ok(0) => {
                    return if total == 0 {
                        Ok(false)
                    } else {
                        Err(new_error(ErrorKind::UnexpectedEof))
                    };
                }
                Ok(n) => total += n,
                Err(ref e) if e.kind() == ::std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

impl BlobReader<BufReader<File>> {
    /// Tries to open the file at the given path and constructs a `BlobReader` from this.
    ///
    /// # Errors
    /// Returns the same errors that `std::fs::File::open` returns.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        let reader = BufReader::new(f);

        Ok(BlobReader {
            reader,
            offset: Some(ByteOffset(0)),
            last_blob_ok: true,
        })
    }
}

impl<R: Read> Iterator for BlobReader<R> {
    type Item = Result<Blob>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop iteration if there was an error.
        if !self.last_blob_ok {
            return None;
        }

        let prev_offset = self.offset;

        let mut len_buf = [0u8; 4];
        match self.read_exact_or_eof(&mut len_buf) {
            Ok(true) => {}
            Ok(false) => {
                // Clean end-of-stream: permitted only here, with zero bytes consumed.
                return None;
            }
            Err(e) => {
                self.offset = None;
                self.last_blob_ok = false;
                return Some(Err(e));
            }
        }
        self.offset = self.offset.map(|x| ByteOffset(x.0 + 4));

        let header_size = u64::from(BigEndian::read_u32(&len_buf));

        if header_size == 0 || header_size > MAX_BLOB_HEADER_SIZE {
            self.last_blob_ok = false;
            return Some(Err(new_blob_error(BlobError::InvalidHeaderSize {
                size: header_size,
            })));
        }

        let mut header_buf = vec![0u8; header_size as usize];
        match self.read_exact_or_eof(&mut header_buf) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                self.offset = None;
                self.last_blob_ok = false;
                return Some(Err(new_error(ErrorKind::UnexpectedEof)));
            }
        }

        let header: fileformat::BlobHeader = match parse_message_from_bytes(&header_buf) {
            Ok(header) => header,
            Err(e) => {
                self.offset = None;
                self.last_blob_ok = false;
                return Some(Err(new_protobuf_error(e, "blob header")));
            }
        };
        self.offset = self.offset.map(|x| ByteOffset(x.0 + header_size));

        let datasize = i64::from(header.get_datasize());
        if datasize <= 0 || datasize as u64 > MAX_BLOB_SIZE {
            self.last_blob_ok = false;
            return Some(Err(new_blob_error(BlobError::InvalidBlobSize {
                size: datasize.max(0) as u64,
            })));
        }
        let datasize = datasize as u64;

        let mut blob_buf = vec![0u8; datasize as usize];
        match self.read_exact_or_eof(&mut blob_buf) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                self.offset = None;
                self.last_blob_ok = false;
                return Some(Err(new_error(ErrorKind::UnexpectedEof)));
            }
        }

        let blob: fileformat::Blob = match parse_message_from_bytes(&blob_buf) {
            Ok(blob) => blob,
            Err(e) => {
                self.offset = None;
                self.last_blob_ok = false;
                return Some(Err(new_protobuf_error(e, "blob content")));
            }
        };

        self.offset = self.offset.map(|x| ByteOffset(x.0 + datasize));

        Some(Ok(Blob::new(header, blob, prev_offset)))
    }
}

impl<R: Read> BlobReader<R> {
    /// Returns a mutable reference to the underlying reader, for operations (like the index
    /// scan) that need to work with the raw stream directly.
    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Returns the current offset from the start of the stream, if known.
    pub(crate) fn current_offset(&self) -> Option<ByteOffset> {
        self.offset
    }
}

impl<R: Read + Seek> BlobReader<R> {
    /// Creates a new `BlobReader` from the given reader that is seekable and will be initialized
    /// with a valid offset.
    pub fn new_seekable(mut reader: R) -> Result<BlobReader<R>> {
        let pos = reader.seek(SeekFrom::Current(0))?;

        Ok(BlobReader {
            reader,
            offset: Some(ByteOffset(pos)),
            last_blob_ok: true,
        })
    }

    /// Seek to an offset in bytes from the start of the stream. This also clears any
    /// previously recorded error, allowing the reader to be reused after a `seek`.
    pub fn seek(&mut self, pos: ByteOffset) -> Result<()> {
        match self.reader.seek(SeekFrom::Start(pos.0)) {
            Ok(offset) => {
                self.offset = Some(ByteOffset(offset));
                self.last_blob_ok = true;
                Ok(())
            }
            Err(e) => {
                self.offset = None;
                Err(e.into())
            }
        }
    }
}

impl BlobReader<BufReader<File>> {
    /// Creates a new `BlobReader` from the given path that is seekable and will be initialized
    /// with a valid offset.
    pub fn seekable_from_path<P: AsRef<Path>>(path: P) -> Result<BlobReader<BufReader<File>>> {
        let f = File::open(path.as_ref())?;
        let buf_reader = BufReader::new(f);
        Self::new_seekable(buf_reader)
    }
}

/// Decodes a `Blob`'s payload into plain bytes and parses it as a protobuf message `T`
/// (usually a `HeaderBlock` or `PrimitiveBlock`).
pub(crate) fn decode_blob<T>(blob: &fileformat::Blob) -> Result<T>
where
    T: ::protobuf::Message,
{
    if blob.has_raw() {
        parse_message_from_bytes(blob.get_raw())
            .map_err(|e| new_protobuf_error(e, "raw blob data"))
    } else if blob.has_zlib_data() {
        let raw_size = blob.get_raw_size();
        if raw_size < 0 || raw_size as u64 > MAX_BLOB_SIZE {
            return Err(new_blob_error(BlobError::InvalidBlobSize {
                size: raw_size.max(0) as u64,
            }));
        }
        let raw = inflate_zlib(blob.get_zlib_data(), raw_size as usize)?;
        parse_message_from_bytes(&raw).map_err(|e| new_protobuf_error(e, "blob zlib data"))
    } else if blob.has_lzma_data() {
        Err(new_blob_error(BlobError::UnsupportedLzma))
    } else {
        Err(new_blob_error(BlobError::UnknownFormat))
    }
}

/// Inflates `input` (a raw zlib stream) into exactly `raw_size` bytes, requiring the stream to
/// reach `STREAM_END` within a single call. Any mismatch between the declared and the actual
/// inflated size is reported as a decompression error, matching the C reference implementation's
/// single-shot `inflate()` call.
///
/// Uses the system zlib binding via `flate2`, matching the teacher's `system-libz` feature.
#[cfg(feature = "system-libz")]
fn inflate_zlib(input: &[u8], raw_size: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; raw_size];
    let mut decompress = Decompress::new(true);

    let status = decompress
        .decompress(input, &mut out, FlushDecompress::Finish)
        .map_err(|_| new_blob_error(BlobError::Decompression))?;

    if status != Status::StreamEnd || decompress.total_out() as usize != raw_size {
        return Err(new_blob_error(BlobError::Decompression));
    }

    Ok(out)
}

/// Inflates `input` (a raw zlib stream) into exactly `raw_size` bytes.
///
/// Pure-Rust fallback via the `inflate` crate, used when the `system-libz` feature is disabled,
/// matching the teacher's own fallback story (`examples/Clikengo-osmpbf/src/blob.rs`'s
/// `#[cfg(not(feature = "system-libz"))] use inflate::DeflateDecoder;` twin). A mismatch between
/// the declared `raw_size` and the actual inflated length is reported the same way as the
/// `system-libz` path, so callers observe identical behavior regardless of which feature is
/// enabled.
#[cfg(not(feature = "system-libz"))]
fn inflate_zlib(input: &[u8], raw_size: usize) -> Result<Vec<u8>> {
    let out = inflate_bytes_zlib(input).map_err(|_| new_blob_error(BlobError::Decompression))?;

    if out.len() != raw_size {
        return Err(new_blob_error(BlobError::Decompression));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::Message;

    fn encode_prefixed(header: &fileformat::BlobHeader, blob: &fileformat::Blob) -> Vec<u8> {
        let header_bytes = header.write_to_bytes().unwrap();
        let blob_bytes = blob.write_to_bytes().unwrap();

        let mut out = Vec::new();
        let mut len_buf = [0u8; 4];
        BigEndian::write_u32(&mut len_buf, header_bytes.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&blob_bytes);
        out
    }

    fn raw_blob(field_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut header = fileformat::BlobHeader::new();
        header.set_field_type(field_type.to_string());

        let mut blob = fileformat::Blob::new();
        blob.set_raw(payload.to_vec());

        header.set_datasize(blob.write_to_bytes().unwrap().len() as i32);
        encode_prefixed(&header, &blob)
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        let mut reader = BlobReader::new(&b""[..]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_length_prefix_is_io_error() {
        let mut reader = BlobReader::new(&b"\x00\x00"[..]);
        let result = reader.next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn reads_a_single_raw_blob() {
        let bytes = raw_blob("OSMData", b"hello");
        let mut reader = BlobReader::new(&bytes[..]);

        let blob = reader.next().unwrap().unwrap();
        assert_eq!(blob.get_type(), BlobType::OsmData);
        assert!(reader.next().is_none());
    }

    #[test]
    fn header_size_zero_is_invalid() {
        let mut bytes = vec![0u8; 4];
        BigEndian::write_u32(&mut bytes, 0);
        let mut reader = BlobReader::new(&bytes[..]);
        let err = reader.next().unwrap().unwrap_err();
        match err.kind() {
            ErrorKind::Blob(BlobError::InvalidHeaderSize { size: 0 }) => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn header_size_too_big_is_rejected() {
        let mut bytes = vec![0u8; 4];
        BigEndian::write_u32(&mut bytes, (MAX_BLOB_HEADER_SIZE + 1) as u32);
        let mut reader = BlobReader::new(&bytes[..]);
        let err = reader.next().unwrap().unwrap_err();
        match err.kind() {
            ErrorKind::Blob(BlobError::InvalidHeaderSize { .. }) => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    // A valid zlib stream for the literal `b"some data of known length"` (25 bytes), built ahead
    // of time so this test exercises the same bytes under either compression feature without
    // needing an encoder (the `inflate` crate used by the `system-libz`-off path has no encoder).
    const ZLIB_KNOWN_LENGTH_DATA: &[u8] = &[
        120, 156, 43, 206, 207, 77, 85, 72, 73, 44, 73, 84, 200, 79, 83, 200, 206, 203, 47, 207,
        83, 200, 73, 205, 75, 47, 201, 0, 0, 119, 119, 9, 83,
    ];
    const ZLIB_KNOWN_LENGTH_RAW_SIZE: usize = 25;

    fn zlib_blob(raw_size: i32) -> Vec<u8> {
        let mut header = fileformat::BlobHeader::new();
        header.set_field_type("OSMData".to_string());

        let mut blob = fileformat::Blob::new();
        blob.set_zlib_data(ZLIB_KNOWN_LENGTH_DATA.to_vec());
        blob.set_raw_size(raw_size);

        header.set_datasize(blob.write_to_bytes().unwrap().len() as i32);
        encode_prefixed(&header, &blob)
    }

    #[test]
    fn zlib_blob_decompresses_to_declared_raw_size() {
        let out = inflate_zlib(ZLIB_KNOWN_LENGTH_DATA, ZLIB_KNOWN_LENGTH_RAW_SIZE).unwrap();
        assert_eq!(out, b"some data of known length");
    }

    #[test]
    fn zlib_raw_size_mismatch_is_decompression_error() {
        let bytes = zlib_blob(4); // deliberately wrong

        let mut reader = BlobReader::new(&bytes[..]);
        let b = reader.next().unwrap().unwrap();
        let result = b.decode();
        match result {
            Err(ref e) => match e.kind() {
                ErrorKind::Blob(BlobError::Decompression) => {}
                other => panic!("unexpected error: {:?}", other),
            },
            Ok(_) => panic!("expected decompression error"),
        }
    }

    #[test]
    fn lzma_is_reported_as_unsupported() {
        let mut header = fileformat::BlobHeader::new();
        header.set_field_type("OSMData".to_string());

        let mut blob = fileformat::Blob::new();
        blob.set_lzma_data(vec![1, 2, 3]);

        header.set_datasize(blob.write_to_bytes().unwrap().len() as i32);
        let bytes = encode_prefixed(&header, &blob);

        let mut reader = BlobReader::new(&bytes[..]);
        let b = reader.next().unwrap().unwrap();
        match b.decode() {
            Err(ref e) => match e.kind() {
                ErrorKind::Blob(BlobError::UnsupportedLzma) => {}
                other => panic!("unexpected error: {:?}", other),
            },
            Ok(_) => panic!("expected unsupported-lzma error"),
        }
    }
}
