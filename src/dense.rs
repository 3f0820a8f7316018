//! Decoding of `DenseNodes`: delta-coded columns of id/lat/lon/info, plus the flat
//! `keys_vals` tag encoding.

use crate::block::str_from_stringtable;
use crate::elements::Info;
use crate::proto::osmformat;
use crate::proto::osmformat::PrimitiveBlock;
use protobuf::Message;

/// A node decoded from a block's dense-node array.
///
/// Also see `Node`. This distinction is usually not important but is not abstracted away to
/// avoid copying: dense encoding is by far the more common representation in real-world files.
#[derive(Clone, Debug)]
pub struct DenseNode<'a> {
    block: &'a PrimitiveBlock,
    id: i64,
    lat: i64,
    lon: i64,
    key_vals: &'a [i32],
    tags_start: usize,
    tags_end: usize,
    info: Option<DenseInfoValues>,
}

#[derive(Clone, Copy, Debug)]
struct DenseInfoValues {
    version: Option<i32>,
    timestamp: Option<i64>,
    changeset: Option<i64>,
    uid: Option<i32>,
    user_sid: Option<i32>,
    visible: Option<bool>,
}

impl<'a> DenseNode<'a> {
    /// Returns the node id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns the latitude coordinate in degrees.
    pub fn lat(&self) -> f64 {
        0.000_000_001_f64 * self.lat_in_nano_degrees() as f64
    }

    /// Returns the longitude coordinate in degrees.
    pub fn lon(&self) -> f64 {
        0.000_000_001_f64 * self.lon_in_nano_degrees() as f64
    }

    /// Returns the latitude coordinate in nano-degrees.
    pub fn lat_in_nano_degrees(&self) -> i64 {
        self.block.get_lat_offset() + (i64::from(self.block.get_granularity()) * self.lat)
    }

    /// Returns the longitude coordinate in nano-degrees.
    pub fn lon_in_nano_degrees(&self) -> i64 {
        self.block.get_lon_offset() + (i64::from(self.block.get_granularity()) * self.lon)
    }

    /// Returns additional metadata for this element, if `DenseInfo` was present for this block.
    pub fn info(&self) -> Option<Info<'a>> {
        self.info.map(|v| {
            Info::from_dense_parts(
                self.block,
                v.version,
                v.timestamp,
                v.changeset,
                v.uid,
                v.user_sid,
                v.visible,
            )
        })
    }

    /// Returns an iterator over the tags of this node.
    /// A tag is represented as a pair of strings (key and value).
    pub fn tags(&self) -> DenseTagIter<'a> {
        DenseTagIter {
            block: self.block,
            pairs: self.key_vals[self.tags_start..self.tags_end].iter(),
        }
    }

    /// Returns an iterator over the tags of this node.
    /// A tag is represented as a pair of indices (key and value) to the stringtable of the
    /// current `PrimitiveBlock`.
    pub fn raw_tags(&self) -> DenseRawTagIter<'a> {
        DenseRawTagIter {
            pairs: self.key_vals[self.tags_start..self.tags_end].iter(),
        }
    }

    /// Returns the raw stringtable.
    pub fn raw_stringtable(&self) -> &'a [Vec<u8>] {
        self.block.get_stringtable().get_s()
    }
}

/// An iterator over the tags of a dense node. It returns a pair of strings (key and value).
#[derive(Clone, Debug)]
pub struct DenseTagIter<'a> {
    block: &'a PrimitiveBlock,
    pairs: std::slice::Iter<'a, i32>,
}

impl<'a> Iterator for DenseTagIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let key_index = *self.pairs.next()?;
        let val_index = *self.pairs.next()?;
        let k_res = str_from_stringtable(self.block, key_index as usize);
        let v_res = str_from_stringtable(self.block, val_index as usize);
        match (k_res, v_res) {
            (Ok(k), Ok(v)) => Some((k, v)),
            _ => None,
        }
    }
}

/// An iterator over the tags of a dense node. It returns a pair of indices (key and value) to
/// the stringtable of the current `PrimitiveBlock`.
#[derive(Clone, Debug)]
pub struct DenseRawTagIter<'a> {
    pairs: std::slice::Iter<'a, i32>,
}

impl<'a> Iterator for DenseRawTagIter<'a> {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let key_index = *self.pairs.next()?;
        let val_index = *self.pairs.next()?;
        Some((key_index, val_index))
    }
}

/// An iterator over the dense nodes in a `DenseNodes` message.
///
/// Decodes the seven running sums (id, lat, lon, timestamp, changeset, user_sid, uid) and walks
/// the flat `keys_vals` array, where each node's tags are terminated by a `0` entry. The bounds
/// check on `keys_vals` always runs before the value is inspected, so a key/value pair that runs
/// past the end of the array is an error the caller can see (an empty tag iterator), not an
/// out-of-bounds read.
#[derive(Clone, Debug)]
pub struct DenseNodeIter<'a> {
    block: &'a PrimitiveBlock,
    dense: &'a osmformat::DenseNodes,
    index: usize,
    len: usize,
    key_vals_cursor: usize,
    current_id: i64,
    current_lat: i64,
    current_lon: i64,
    current_timestamp: i64,
    current_changeset: i64,
    current_uid: i32,
    current_user_sid: i32,
    has_denseinfo: bool,
    has_version: bool,
    has_timestamp: bool,
    has_changeset: bool,
    has_uid: bool,
    has_user_sid: bool,
    has_visible: bool,
}

impl<'a> DenseNodeIter<'a> {
    pub(crate) fn empty(block: &'a PrimitiveBlock) -> DenseNodeIter<'a> {
        DenseNodeIter::new(block, osmformat::DenseNodes::default_instance())
    }

    pub(crate) fn new(
        block: &'a PrimitiveBlock,
        dense: &'a osmformat::DenseNodes,
    ) -> DenseNodeIter<'a> {
        let info = dense.get_denseinfo();
        DenseNodeIter {
            block,
            dense,
            index: 0,
            len: dense.get_id().len(),
            key_vals_cursor: 0,
            current_id: 0,
            current_lat: 0,
            current_lon: 0,
            current_timestamp: 0,
            current_changeset: 0,
            current_uid: 0,
            current_user_sid: 0,
            has_denseinfo: dense.has_denseinfo(),
            has_version: !info.get_version().is_empty(),
            has_timestamp: !info.get_timestamp().is_empty(),
            has_changeset: !info.get_changeset().is_empty(),
            has_uid: !info.get_uid().is_empty(),
            has_user_sid: !info.get_user_sid().is_empty(),
            has_visible: !info.get_visible().is_empty(),
        }
    }

    // Finds the next `0`-terminated run of key/value indices in `keys_vals`, advancing the
    // cursor past the terminator. The length is checked before each access, so running off the
    // end of the array (a malformed block) ends the current node's tags rather than panicking.
    fn next_tag_range(&mut self) -> (usize, usize) {
        let key_vals = self.dense.get_keys_vals();
        let start = self.key_vals_cursor;
        let mut i = start;
        while i < key_vals.len() && key_vals[i] != 0 {
            i += 1;
        }
        let end = i;
        self.key_vals_cursor = if i < key_vals.len() { i + 1 } else { i };
        (start, end)
    }
}

impl<'a> Iterator for DenseNodeIter<'a> {
    type Item = DenseNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let i = self.index;
        self.index += 1;

        self.current_id += self.dense.get_id()[i];
        self.current_lat += self.dense.get_lat().get(i).copied().unwrap_or(0);
        self.current_lon += self.dense.get_lon().get(i).copied().unwrap_or(0);

        let info = if self.has_denseinfo {
            let denseinfo = self.dense.get_denseinfo();
            let version = denseinfo.get_version().get(i).copied();
            if self.has_timestamp {
                self.current_timestamp += denseinfo.get_timestamp().get(i).copied().unwrap_or(0);
            }
            if self.has_changeset {
                self.current_changeset += denseinfo.get_changeset().get(i).copied().unwrap_or(0);
            }
            if self.has_uid {
                self.current_uid += denseinfo.get_uid().get(i).copied().unwrap_or(0);
            }
            if self.has_user_sid {
                self.current_user_sid += denseinfo.get_user_sid().get(i).copied().unwrap_or(0);
            }
            let visible = if self.has_visible {
                denseinfo.get_visible().get(i).copied()
            } else {
                None
            };

            Some(DenseInfoValues {
                version: if self.has_version { version } else { None },
                timestamp: if self.has_timestamp {
                    Some(self.current_timestamp)
                } else {
                    None
                },
                changeset: if self.has_changeset {
                    Some(self.current_changeset)
                } else {
                    None
                },
                uid: if self.has_uid {
                    Some(self.current_uid)
                } else {
                    None
                },
                user_sid: if self.has_user_sid {
                    Some(self.current_user_sid)
                } else {
                    None
                },
                visible,
            })
        } else {
            None
        };

        let (tags_start, tags_end) = self.next_tag_range();

        Some(DenseNode {
            block: self.block,
            id: self.current_id,
            lat: self.current_lat,
            lon: self.current_lon,
            key_vals: self.dense.get_keys_vals(),
            tags_start,
            tags_end,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::osmformat::{DenseInfo, DenseNodes, PrimitiveBlock as RawPrimitiveBlock};

    #[test]
    fn decodes_running_sums() {
        let mut dense = DenseNodes::new();
        dense.set_id(vec![10, -1, 4]); // cumulative: 10, 9, 13
        dense.set_lat(vec![100, 1, 1]);
        dense.set_lon(vec![200, -1, -1]);

        let block = RawPrimitiveBlock::new();
        let iter = DenseNodeIter::new(&block, &dense);
        let ids: Vec<i64> = iter.map(|n| n.id()).collect();
        assert_eq!(ids, vec![10, 9, 13]);
    }

    #[test]
    fn tags_are_terminated_by_zero_and_bounds_checked() {
        let mut dense = DenseNodes::new();
        dense.set_id(vec![1, 2]);
        dense.set_lat(vec![0, 0]);
        dense.set_lon(vec![0, 0]);
        // first node: key=1,val=2 then terminator; second node: truncated, no terminator.
        dense.set_keys_vals(vec![1, 2, 0, 3]);

        let mut block = RawPrimitiveBlock::new();
        block.mut_stringtable().mut_s().push(b"".to_vec());
        block.mut_stringtable().mut_s().push(b"k".to_vec());
        block.mut_stringtable().mut_s().push(b"v".to_vec());

        let mut iter = DenseNodeIter::new(&block, &dense);

        let first = iter.next().unwrap();
        assert_eq!(first.raw_tags().collect::<Vec<_>>(), vec![(1, 2)]);

        let second = iter.next().unwrap();
        // dangling `3` has no matching value and no terminator: yields no tags, not a panic.
        assert_eq!(second.raw_tags().collect::<Vec<_>>(), Vec::<(i32, i32)>::new());
    }

    #[test]
    fn info_absent_when_denseinfo_missing() {
        let mut dense = DenseNodes::new();
        dense.set_id(vec![1]);
        dense.set_lat(vec![0]);
        dense.set_lon(vec![0]);

        let block = RawPrimitiveBlock::new();
        let mut iter = DenseNodeIter::new(&block, &dense);
        let node = iter.next().unwrap();
        assert!(node.info().is_none());
    }

    #[test]
    fn user_sid_zero_yields_no_user() {
        let mut dense = DenseNodes::new();
        dense.set_id(vec![1]);
        dense.set_lat(vec![0]);
        dense.set_lon(vec![0]);
        let mut info = DenseInfo::new();
        info.set_version(vec![1]);
        info.set_timestamp(vec![0]);
        info.set_changeset(vec![0]);
        info.set_uid(vec![0]);
        info.set_user_sid(vec![0]);
        dense.set_denseinfo(info);

        let block = RawPrimitiveBlock::new();
        let mut iter = DenseNodeIter::new(&block, &dense);
        let node = iter.next().unwrap();
        let meta = node.info().unwrap();
        assert!(meta.user().is_none());
    }
}
