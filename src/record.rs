//! Owned, materialised OSM primitives: the decoded contents of one `PrimitiveBlock`.
//!
//! Everything in this module is a plain value, copied out of the zero-copy view layer
//! (`elements`, `dense`) at decode time. A `Parser` replaces its `Data` wholesale on every
//! `advance()`; nothing here borrows from the block that produced it.

use std::collections::HashMap;

use crate::block::PrimitiveBlock;
use crate::dense::DenseNode;
use crate::elements::{Element, Info, RelMemberType};
use crate::error::Result;

fn round7(value: f64) -> f64 {
    (value * 10_000_000.0).round() / 10_000_000.0
}

/// Version/timestamp/changeset/user metadata attached to a primitive.
///
/// `timestamp` is expressed as integer milliseconds since the Unix epoch, already scaled by the
/// block's `date_granularity`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
    pub version: Option<i32>,
    pub timestamp: Option<i64>,
    pub changeset: Option<i64>,
    pub uid: Option<i32>,
    pub user: Option<String>,
}

fn meta_from_info(info: &Info) -> Result<Meta> {
    let user = match info.user() {
        Some(Ok(u)) => Some(u.to_owned()),
        Some(Err(err)) => return Err(err),
        None => None,
    };
    Ok(Meta {
        version: info.version(),
        timestamp: info.milli_timestamp(),
        changeset: info.changeset(),
        uid: info.uid(),
        user,
    })
}

/// A geographic point, optionally tagged.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub tags: HashMap<String, String>,
    pub meta: Option<Meta>,
}

/// An ordered sequence of node references, optionally tagged.
#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub id: i64,
    pub tags: HashMap<String, String>,
    pub refs: Vec<i64>,
    pub meta: Option<Meta>,
}

/// A member of a `Relation`. `role` is the empty string when the member carries no role.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationMember {
    pub id: i64,
    pub role: String,
}

/// A tagged grouping of members, split by member type.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub tags: HashMap<String, String>,
    pub nodes: Vec<RelationMember>,
    pub ways: Vec<RelationMember>,
    pub relations: Vec<RelationMember>,
    pub meta: Option<Meta>,
}

/// The materialised contents of one decoded `PrimitiveBlock`: every node, way and relation it
/// carries, in the order they were encountered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Data {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
}

fn tags_from_iter<'a, I: Iterator<Item = (&'a str, &'a str)>>(iter: I) -> HashMap<String, String> {
    iter.map(|(k, v)| (k.to_owned(), v.to_owned())).collect()
}

fn dense_node_record(dnode: &DenseNode) -> Result<Node> {
    let meta = match dnode.info() {
        Some(info) => Some(meta_from_info(&info)?),
        None => None,
    };
    Ok(Node {
        id: dnode.id(),
        lat: round7(dnode.lat()),
        lon: round7(dnode.lon()),
        tags: tags_from_iter(dnode.tags()),
        meta,
    })
}

/// Decodes every element of a `PrimitiveBlock` into owned records, applying delta decoding,
/// coordinate/timestamp scaling and string-table lookups.
pub(crate) fn decode_block(block: &PrimitiveBlock) -> Result<Data> {
    let mut data = Data::default();

    for element in block.elements() {
        match element {
            Element::Node(node) => {
                let meta = match node.info_opt() {
                    Some(info) => Some(meta_from_info(&info)?),
                    None => None,
                };
                data.nodes.push(Node {
                    id: node.id(),
                    lat: round7(node.lat()),
                    lon: round7(node.lon()),
                    tags: tags_from_iter(node.tags()),
                    meta,
                });
            }
            Element::DenseNode(dnode) => {
                data.nodes.push(dense_node_record(&dnode)?);
            }
            Element::Way(way) => {
                let meta = match way.info_opt() {
                    Some(info) => Some(meta_from_info(&info)?),
                    None => None,
                };
                data.ways.push(Way {
                    id: way.id(),
                    tags: tags_from_iter(way.tags()),
                    refs: way.refs().collect(),
                    meta,
                });
            }
            Element::Relation(rel) => {
                let meta = match rel.info_opt() {
                    Some(info) => Some(meta_from_info(&info)?),
                    None => None,
                };
                let mut nodes = Vec::new();
                let mut ways = Vec::new();
                let mut relations = Vec::new();
                for member in rel.members() {
                    let role = match member.role() {
                        Ok(role) => role.to_owned(),
                        Err(err) => return Err(err),
                    };
                    let record = RelationMember {
                        id: member.member_id,
                        role,
                    };
                    match member.member_type {
                        RelMemberType::Node => nodes.push(record),
                        RelMemberType::Way => ways.push(record),
                        RelMemberType::Relation => relations.push(record),
                    }
                }
                data.relations.push(Relation {
                    id: rel.id(),
                    tags: tags_from_iter(rel.tags()),
                    nodes,
                    ways,
                    relations,
                    meta,
                });
            }
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_seven_fractional_digits() {
        // lat_offset=0, granularity=100, raw_lat=513802940 => 51.3802940
        let lat = round7(0.000_000_001 * (100.0 * 513_802_940.0));
        assert!((lat - 51.380_294_0).abs() < 1e-9);
    }
}
