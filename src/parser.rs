//! The `Parser`: opens an `.osm.pbf` file, decodes its header, and steps through the file's
//! `"OSMData"` fileblocks one at a time.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::trace;

use crate::blob::{BlobReader, BlobType, ByteOffset};
use crate::error::{new_error, ErrorKind, Result};
use crate::header::FileHeader;
use crate::index::{self, FileblockDescriptor};
use crate::record::{self, Data, Node, Relation, Way};

/// A streaming, seekable reader over an `.osm.pbf` file.
///
/// Holds an exclusive file handle, the header decoded at open time, the index of `"OSMData"`
/// fileblocks built at open time, and the contents of the most recently decoded data block.
/// Every operation is synchronous and strictly sequential: there is no internal concurrency, and
/// nothing here is `Send`/`Sync` by accident.
#[derive(Debug)]
pub struct Parser<R: Read> {
    reader: BlobReader<R>,
    header: FileHeader,
    index: Vec<FileblockDescriptor>,
    cursor: Option<usize>,
    data: Data,
}

impl Parser<BufReader<File>> {
    /// Opens an `.osm.pbf` file.
    ///
    /// Validates the `.osm.pbf` suffix, decodes the header, decodes the first data block (if
    /// any), and builds the random-access index. The open is atomic: if any of this fails, the
    /// underlying file handle is released and no partially-initialized `Parser` escapes.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Parser<BufReader<File>>> {
        let path = path.as_ref();
        match path.to_str() {
            Some(s) if s.ends_with(".osm.pbf") => {}
            _ => return Err(new_error(ErrorKind::InvalidFileSuffix)),
        }

        let file = File::open(path)?;
        Parser::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> Parser<R> {
    /// Builds a `Parser` over an already-open, seekable reader, skipping the path/suffix check
    /// that `from_path` performs.
    pub fn new(reader: R) -> Result<Parser<R>> {
        let mut blob_reader = BlobReader::new_seekable(reader)?;

        let header = match blob_reader.next() {
            Some(Ok(blob)) => match blob.get_type() {
                BlobType::OsmHeader => {
                    let header_block = blob.to_headerblock()?;
                    FileHeader::from_proto(header_block.raw())
                }
                other => {
                    return Err(new_error(ErrorKind::WrongBlockType {
                        expected: "OSMHeader",
                        found: block_type_name(&other),
                    }));
                }
            },
            Some(Err(e)) => return Err(e),
            None => return Err(new_error(ErrorKind::MissingHeaderBlock)),
        };

        let (cursor, data) = match blob_reader.next() {
            Some(Ok(blob)) => match blob.get_type() {
                BlobType::OsmData => {
                    let block = blob.to_primitiveblock()?;
                    (Some(0), record::decode_block(&block)?)
                }
                other => {
                    return Err(new_error(ErrorKind::WrongBlockType {
                        expected: "OSMData",
                        found: block_type_name(&other),
                    }));
                }
            },
            Some(Err(e)) => return Err(e),
            None => (None, Data::default()),
        };

        let restore_to = blob_reader.current_offset();
        let descriptors = index::scan(blob_reader.get_mut())?;
        if let Some(offset) = restore_to {
            blob_reader.seek(offset)?;
        }
        trace!("opened parser with {} indexed data block(s)", descriptors.len());

        Ok(Parser {
            reader: blob_reader,
            header,
            index: descriptors,
            cursor,
            data,
        })
    }

    /// Returns the file's decoded `OSMHeader` metadata.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns the nodes of the currently decoded data block.
    pub fn nodes(&self) -> &[Node] {
        &self.data.nodes
    }

    /// Returns the ways of the currently decoded data block.
    pub fn ways(&self) -> &[Way] {
        &self.data.ways
    }

    /// Returns the relations of the currently decoded data block.
    pub fn relations(&self) -> &[Relation] {
        &self.data.relations
    }

    /// Returns the full contents (nodes, ways, and relations) of the currently decoded block.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Returns the file's `"OSMData"` fileblock index, in file order.
    pub fn blobs(&self) -> &[FileblockDescriptor] {
        &self.index
    }

    /// Returns the number of `"OSMData"` fileblocks in the file.
    pub fn size(&self) -> usize {
        self.index.len()
    }

    /// Returns the ordinal of the currently decoded block, or `None` if no block has been
    /// decoded yet (an empty file with no `"OSMData"` blocks).
    pub fn pos(&self) -> Option<usize> {
        self.cursor
    }

    /// Decodes the next `"OSMData"` fileblock, replacing the current decoded contents.
    ///
    /// Returns `Ok(false)` at end-of-stream rather than an error. Any other error leaves the
    /// previously decoded contents untouched.
    pub fn advance(&mut self) -> Result<bool> {
        match self.reader.next() {
            None => Ok(false),
            Some(Err(e)) => Err(e),
            Some(Ok(blob)) => match blob.get_type() {
                BlobType::OsmData => {
                    let block = blob.to_primitiveblock()?;
                    self.data = record::decode_block(&block)?;
                    self.cursor = Some(self.cursor.map_or(0, |c| c + 1));
                    Ok(true)
                }
                other => Err(new_error(ErrorKind::WrongBlockType {
                    expected: "OSMData",
                    found: block_type_name(&other),
                })),
            },
        }
    }

    /// Seeks to the data block at `index`.
    ///
    /// A no-op (returning `Ok(true)`) if `index` is already the current position. Returns
    /// `Ok(false)` without raising if `index` is out of range. Internally this repositions the
    /// stream and then performs a normal `advance()`, so decoded state always goes through one
    /// codepath.
    pub fn seek(&mut self, index: usize) -> Result<bool> {
        if self.cursor == Some(index) {
            return Ok(true);
        }

        let descriptor = match self.index.get(index) {
            Some(d) => *d,
            None => return Ok(false),
        };

        trace!("seeking to data block {} at offset {}", index, descriptor.header_offset);
        self.reader.seek(ByteOffset(descriptor.header_offset))?;
        self.cursor = index.checked_sub(1);
        self.advance()
    }

    /// Calls `f` with each data block's decoded contents, in order, until end-of-stream.
    ///
    /// `f` only sees a block's contents for the duration of its call: the next `advance()`
    /// replaces them.
    pub fn iterate<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&Data),
    {
        while self.advance()? {
            f(&self.data);
        }
        Ok(())
    }
}

fn block_type_name(t: &BlobType) -> String {
    match t {
        BlobType::OsmHeader => "OSMHeader".to_string(),
        BlobType::OsmData => "OSMData".to_string(),
        BlobType::Unknown(s) => (*s).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};
    use crate::proto::fileformat;
    use crate::proto::osmformat::{
        self, DenseNodes, HeaderBlock as RawHeaderBlock, PrimitiveBlock as RawPrimitiveBlock,
        PrimitiveGroup, Relation as RawRelation, Relation_MemberType, Way as RawWay,
    };
    use protobuf::Message;
    use std::io::Cursor;

    fn fileblock(field_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut header = fileformat::BlobHeader::new();
        header.set_field_type(field_type.to_string());

        let mut blob = fileformat::Blob::new();
        blob.set_raw(payload.to_vec());
        let blob_bytes = blob.write_to_bytes().unwrap();
        header.set_datasize(blob_bytes.len() as i32);
        let header_bytes = header.write_to_bytes().unwrap();

        let mut out = Vec::new();
        let mut len_buf = [0u8; 4];
        BigEndian::write_u32(&mut len_buf, header_bytes.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&blob_bytes);
        out
    }

    fn header_block(required_features: &[&str]) -> Vec<u8> {
        let mut hb = RawHeaderBlock::new();
        hb.set_required_features(required_features.iter().map(|s| s.to_string()).collect());
        hb.write_to_bytes().unwrap()
    }

    fn block_with_single_dense_node(id_delta: i64, lat_delta: i64, lon_delta: i64) -> Vec<u8> {
        let mut dense = DenseNodes::new();
        dense.set_id(vec![id_delta]);
        dense.set_lat(vec![lat_delta]);
        dense.set_lon(vec![lon_delta]);

        let mut group = PrimitiveGroup::new();
        group.set_dense(dense);

        let mut block = RawPrimitiveBlock::new();
        block.mut_stringtable().mut_s().push(b"".to_vec());
        block.mut_primitivegroup().push(group);
        block.write_to_bytes().unwrap()
    }

    fn block_with_single_row_node(id: i64) -> Vec<u8> {
        let mut node = osmformat::Node::new();
        node.set_id(id);
        node.set_lat(0);
        node.set_lon(0);

        let mut group = PrimitiveGroup::new();
        group.mut_nodes().push(node);

        let mut block = RawPrimitiveBlock::new();
        block.mut_stringtable().mut_s().push(b"".to_vec());
        block.mut_primitivegroup().push(group);
        block.write_to_bytes().unwrap()
    }

    fn block_with_single_way(id: i64, refs: Vec<i64>) -> Vec<u8> {
        let mut way = RawWay::new();
        way.set_id(id);
        way.set_refs(refs);

        let mut group = PrimitiveGroup::new();
        group.mut_ways().push(way);

        let mut block = RawPrimitiveBlock::new();
        block.mut_stringtable().mut_s().push(b"".to_vec());
        block.mut_primitivegroup().push(group);
        block.write_to_bytes().unwrap()
    }

    fn block_with_single_relation() -> Vec<u8> {
        let mut rel = RawRelation::new();
        rel.set_id(1);
        rel.set_memids(vec![7, 3]); // running sums: 7, then 7+3=10
        rel.set_types(vec![Relation_MemberType::NODE, Relation_MemberType::WAY]);
        rel.set_roles_sid(vec![1, 2]);

        let mut group = PrimitiveGroup::new();
        group.mut_relations().push(rel);

        let mut block = RawPrimitiveBlock::new();
        let st = block.mut_stringtable().mut_s();
        st.push(b"".to_vec());
        st.push(b"outer".to_vec());
        st.push(b"inner".to_vec());
        block.mut_primitivegroup().push(group);
        block.write_to_bytes().unwrap()
    }

    #[test]
    fn s1_header_only_file_has_zero_data_blocks() {
        let bytes = fileblock("OSMHeader", &header_block(&["OsmSchema-V0.6"]));
        let parser = Parser::new(Cursor::new(bytes)).unwrap();

        assert_eq!(parser.header().required_features(), &["OsmSchema-V0.6".to_string()]);
        assert_eq!(parser.size(), 0);
        assert_eq!(parser.pos(), None);

        let mut parser = parser;
        assert_eq!(parser.advance().unwrap(), false);
    }

    #[test]
    fn s2_dense_node_decodes_to_expected_coordinates() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock(
            "OSMData",
            &block_with_single_dense_node(42, 513_802_940, -12_000_000),
        ));

        let parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.size(), 1);
        assert_eq!(parser.pos(), Some(0));
        assert_eq!(parser.nodes().len(), 1);
        let node = &parser.nodes()[0];
        assert_eq!(node.id, 42);
        assert!((node.lat - 51.380_294_0).abs() < 1e-9);
        assert!((node.lon - (-1.2)).abs() < 1e-9);
        assert!(node.tags.is_empty());
    }

    #[test]
    fn s3_seek_jumps_to_arbitrary_data_block_and_tracks_pos() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(100)));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(200)));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(300)));

        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.size(), 3);
        assert_eq!(parser.nodes()[0].id, 100);

        assert_eq!(parser.seek(2).unwrap(), true);
        assert_eq!(parser.pos(), Some(2));
        assert_eq!(parser.nodes()[0].id, 300);

        assert_eq!(parser.seek(0).unwrap(), true);
        assert_eq!(parser.pos(), Some(0));
        assert_eq!(parser.nodes()[0].id, 100);
    }

    #[test]
    fn seek_is_idempotent_when_already_at_target() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(1)));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(2)));

        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.seek(1).unwrap(), true);
        assert_eq!(parser.nodes()[0].id, 2);
        // Re-seeking to the same index is a no-op: no I/O, same decoded contents.
        assert_eq!(parser.seek(1).unwrap(), true);
        assert_eq!(parser.pos(), Some(1));
        assert_eq!(parser.nodes()[0].id, 2);
    }

    #[test]
    fn seek_out_of_range_returns_false() {
        let bytes = fileblock("OSMHeader", &header_block(&[]));
        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.seek(5).unwrap(), false);
    }

    #[test]
    fn s5_way_refs_are_delta_decoded() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock("OSMData", &block_with_single_way(1, vec![100, 5, -10])));

        let parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.ways().len(), 1);
        assert_eq!(parser.ways()[0].refs, vec![100, 105, 95]);
    }

    #[test]
    fn s6_relation_members_are_grouped_by_type_with_roles() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock("OSMData", &block_with_single_relation()));

        let parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.relations().len(), 1);
        let rel = &parser.relations()[0];
        assert_eq!(rel.nodes.len(), 1);
        assert_eq!(rel.nodes[0].id, 7);
        assert_eq!(rel.nodes[0].role, "outer");
        assert_eq!(rel.ways.len(), 1);
        assert_eq!(rel.ways[0].id, 10);
        assert_eq!(rel.ways[0].role, "inner");
        assert!(rel.relations.is_empty());
    }

    #[test]
    fn iterate_visits_every_data_block_in_order() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(1)));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(2)));
        bytes.extend(fileblock("OSMData", &block_with_single_row_node(3)));

        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        let mut seen = Vec::new();
        parser.iterate(|data| seen.push(data.nodes[0].id)).unwrap();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn missing_header_block_is_rejected() {
        let bytes = fileblock("OSMData", &block_with_single_row_node(1));
        let err = Parser::new(Cursor::new(bytes)).unwrap_err();
        match err.kind() {
            ErrorKind::WrongBlockType { expected, .. } => assert_eq!(*expected, "OSMHeader"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_input_is_missing_header_block() {
        let err = Parser::new(Cursor::new(Vec::new())).unwrap_err();
        match err.kind() {
            ErrorKind::MissingHeaderBlock => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn truncated_at_length_prefix_boundary_is_clean_eof() {
        let bytes = fileblock("OSMHeader", &header_block(&[]));
        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        assert_eq!(parser.advance().unwrap(), false);
    }

    #[test]
    fn truncated_mid_payload_is_io_error() {
        let mut bytes = fileblock("OSMHeader", &header_block(&[]));
        let mut data_block = fileblock("OSMData", &block_with_single_row_node(1));
        data_block.truncate(data_block.len() - 2); // cut off mid-payload
        bytes.extend(data_block);

        let mut parser = Parser::new(Cursor::new(bytes)).unwrap();
        let err = parser.advance().unwrap_err();
        match err.kind() {
            ErrorKind::UnexpectedEof => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
