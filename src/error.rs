#![allow(deprecated)]

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;
use std::str::Utf8Error;

use protobuf::ProtobufError;

// Error data structures are modeled just like in the `csv` crate by BurntSushi.

pub(crate) fn new_error(kind: ErrorKind) -> Error {
    Error(Box::new(kind))
}

pub(crate) fn new_blob_error(kind: BlobError) -> Error {
    Error(Box::new(ErrorKind::Blob(kind)))
}

pub(crate) fn new_protobuf_error(err: ProtobufError, location: &'static str) -> Error {
    Error(Box::new(ErrorKind::Protobuf { err, location }))
}

/// A type alias for `Result<T, pbfcore::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur while opening or reading an `.osm.pbf` file.
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }
}

/// The specific type of an error.
///
/// Roughly grouped by cause: argument errors (bad input from the caller),
/// I/O errors (the underlying stream misbehaved), integrity errors (the
/// file's framing or encoding is corrupt), and capability errors (the file
/// uses a feature this decoder does not implement).
#[derive(Debug)]
pub enum ErrorKind {
    /// The given path does not end in `.osm.pbf`.
    InvalidFileSuffix,
    /// An error for I/O operations.
    Io(io::Error),
    /// A read returned fewer bytes than required without reaching a clean
    /// end-of-stream boundary.
    UnexpectedEof,
    /// An error that occurs when decoding a protobuf message.
    Protobuf {
        err: ProtobufError,
        location: &'static str,
    },
    /// The stringtable contains an entry at `index` that could not be decoded to a valid UTF-8
    /// string.
    StringtableUtf8 { err: Utf8Error, index: usize },
    /// An element contains an out-of-bounds index to the stringtable.
    StringtableIndexOutOfBounds { index: usize },
    /// An error that occurs when decoding `Blob`s.
    Blob(BlobError),
    /// A fileblock was expected to carry a specific type tag (e.g. `"OSMData"`)
    /// but carried a different one.
    WrongBlockType {
        expected: &'static str,
        found: String,
    },
    /// The first fileblock of the file was not an `"OSMHeader"` block.
    MissingHeaderBlock,

    //TODO add UnexpectedPrimitiveBlock
    /// Hints that destructuring should not be exhaustive.
    ///
    /// This enum may grow additional variants, so this makes sure clients
    /// don't count on exhaustive matching. (Otherwise, adding a new variant
    /// could break existing code.)
    #[doc(hidden)]
    __Nonexhaustive,
}

/// An error that occurs when decoding a blob.
#[derive(Debug)]
pub enum BlobError {
    /// The 4-byte length prefix declares a `BlobHeader` size that is zero or bigger than
    /// [`MAX_BLOB_HEADER_SIZE`](../blob/static.MAX_BLOB_HEADER_SIZE.html).
    InvalidHeaderSize {
        /// Declared blob header size in bytes.
        size: u64,
    },
    /// The `BlobHeader`'s declared `datasize` is zero or bigger than
    /// [`MAX_BLOB_SIZE`](../blob/static.MAX_BLOB_SIZE.html).
    InvalidBlobSize {
        /// Declared blob data size in bytes.
        size: u64,
    },
    /// Zlib decompression failed, e.g. because the stream did not terminate with `STREAM_END`
    /// inside a single inflate call, or the declared `raw_size` did not match the inflated length.
    Decompression,
    /// The blob is LZMA-compressed, which this decoder does not implement.
    UnsupportedLzma,
    /// The blob carries a `data` variant this decoder does not recognize.
    UnknownFormat,
    /// Hints that destructuring should not be exhaustive.
    #[doc(hidden)]
    __Nonexhaustive,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        new_error(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl StdError for Error {
    fn cause(&self) -> Option<&dyn StdError> {
        match *self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Protobuf { ref err, .. } => Some(err),
            ErrorKind::StringtableUtf8 { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::InvalidFileSuffix => write!(f, "file name does not end in '.osm.pbf'"),
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::UnexpectedEof => write!(f, "unexpected end of file"),
            ErrorKind::Protobuf { ref err, location } => {
                write!(f, "protobuf error at '{}': {}", location, err)
            }
            ErrorKind::StringtableUtf8 { ref err, index } => {
                write!(f, "invalid UTF-8 at string table index {}: {}", index, err)
            }
            ErrorKind::StringtableIndexOutOfBounds { index } => {
                write!(f, "stringtable index out of bounds: {}", index)
            }
            ErrorKind::Blob(BlobError::InvalidHeaderSize { size }) => {
                write!(f, "invalid blob header size: {} bytes", size)
            }
            ErrorKind::Blob(BlobError::InvalidBlobSize { size }) => {
                write!(f, "invalid blob data size: {} bytes", size)
            }
            ErrorKind::Blob(BlobError::Decompression) => {
                write!(f, "zlib decompression of blob data failed")
            }
            ErrorKind::Blob(BlobError::UnsupportedLzma) => {
                write!(f, "blob uses LZMA compression, which is not supported")
            }
            ErrorKind::Blob(BlobError::UnknownFormat) => {
                write!(f, "blob has an unrecognized data format")
            }
            ErrorKind::Blob(BlobError::__Nonexhaustive) => unreachable!(),
            ErrorKind::WrongBlockType {
                expected,
                ref found,
            } => write!(f, "expected a '{}' fileblock, found '{}'", expected, found),
            ErrorKind::MissingHeaderBlock => {
                write!(f, "file does not start with an 'OSMHeader' fileblock")
            }
            ErrorKind::__Nonexhaustive => unreachable!(),
        }
    }
}
