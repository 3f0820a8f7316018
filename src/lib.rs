//! A streaming decoder for the OpenStreetMap PBF file format (`*.osm.pbf`).
//!
//! An `.osm.pbf` file is a concatenation of length-prefixed, protobuf-encoded *fileblocks*. The
//! [`Parser`] opens such a file, decodes its header, builds a random-access index of its
//! `"OSMData"` fileblocks, and steps through them one at a time, exposing each block's nodes,
//! ways and relations as plain owned values.
//!
//! ```no_run
//! use pbfcore::Parser;
//!
//! # fn run() -> pbfcore::Result<()> {
//! let mut parser = Parser::from_path("tests/fixtures/sample.osm.pbf")?;
//! println!("data blocks: {}", parser.size());
//!
//! parser.iterate(|data| {
//!     for node in &data.nodes {
//!         println!("node {} at ({}, {})", node.id, node.lat, node.lon);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```

mod blob;
mod block;
mod dense;
mod elements;
mod error;
mod header;
mod index;
mod parser;
mod proto;
mod record;
mod util;

pub use blob::{Blob, BlobDecode, BlobReader, BlobType, ByteOffset, MAX_BLOB_HEADER_SIZE, MAX_BLOB_SIZE};
pub use block::{
    BlockElementsIter, GroupIter, GroupNodeIter, GroupRelationIter, GroupWayIter, HeaderBlock,
    PrimitiveBlock, PrimitiveGroup,
};
pub use dense::{DenseNode, DenseRawTagIter, DenseTagIter};
pub use elements::{
    Element, Info, Node as ViewNode, RawTagIter, RelMember, RelMemberIter, RelMemberType,
    Relation as ViewRelation, TagIter, Way as ViewWay, WayRefIter,
};
pub use error::{BlobError, Error, ErrorKind, Result};
pub use header::{BoundingBox, FileHeader};
pub use index::FileblockDescriptor;
pub use parser::Parser;
pub use record::{Data, Meta, Node, Relation, RelationMember, Way};
