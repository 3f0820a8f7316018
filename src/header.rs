//! The decoded `OSMHeader` fileblock.

use crate::proto::osmformat;

/// A bounding box in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BoundingBox {
    fn from_proto(bbox: &osmformat::HeaderBBox) -> BoundingBox {
        const NANO_DEGREE: f64 = 0.000_000_001;
        BoundingBox {
            left: NANO_DEGREE * bbox.get_left() as f64,
            right: NANO_DEGREE * bbox.get_right() as f64,
            top: NANO_DEGREE * bbox.get_top() as f64,
            bottom: NANO_DEGREE * bbox.get_bottom() as f64,
        }
    }
}

/// Metadata carried by the file's single `OSMHeader` fileblock.
#[derive(Clone, Debug)]
pub struct FileHeader {
    bbox: Option<BoundingBox>,
    required_features: Vec<String>,
    optional_features: Vec<String>,
    writingprogram: Option<String>,
    source: Option<String>,
    osmosis_replication_timestamp: Option<i64>,
    osmosis_replication_sequence_number: Option<i64>,
    osmosis_replication_base_url: Option<String>,
}

impl FileHeader {
    pub(crate) fn from_proto(header: &osmformat::HeaderBlock) -> FileHeader {
        FileHeader {
            bbox: if header.has_bbox() {
                Some(BoundingBox::from_proto(header.get_bbox()))
            } else {
                None
            },
            required_features: header.get_required_features().to_vec(),
            optional_features: header.get_optional_features().to_vec(),
            writingprogram: if header.has_writingprogram() {
                Some(header.get_writingprogram().to_owned())
            } else {
                None
            },
            source: if header.has_source() {
                Some(header.get_source().to_owned())
            } else {
                None
            },
            osmosis_replication_timestamp: if header.has_osmosis_replication_timestamp() {
                Some(header.get_osmosis_replication_timestamp())
            } else {
                None
            },
            osmosis_replication_sequence_number: if header
                .has_osmosis_replication_sequence_number()
            {
                Some(header.get_osmosis_replication_sequence_number())
            } else {
                None
            },
            osmosis_replication_base_url: if header.has_osmosis_replication_base_url() {
                Some(header.get_osmosis_replication_base_url().to_owned())
            } else {
                None
            },
        }
    }

    /// Returns the bounding box of the data in this file, if present.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// Returns the list of features a reader must implement to parse this file correctly.
    pub fn required_features(&self) -> &[String] {
        &self.required_features
    }

    /// Returns the list of features a reader may ignore.
    pub fn optional_features(&self) -> &[String] {
        &self.optional_features
    }

    /// Returns the name of the program that produced this file, if recorded.
    pub fn writingprogram(&self) -> Option<&str> {
        self.writingprogram.as_deref()
    }

    /// Returns the data source string, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns the replication timestamp, in seconds since the epoch, if recorded.
    pub fn osmosis_replication_timestamp(&self) -> Option<i64> {
        self.osmosis_replication_timestamp
    }

    /// Returns the replication sequence number, if recorded.
    pub fn osmosis_replication_sequence_number(&self) -> Option<i64> {
        self.osmosis_replication_sequence_number
    }

    /// Returns the base URL of the replication service, if recorded.
    pub fn osmosis_replication_base_url(&self) -> Option<&str> {
        self.osmosis_replication_base_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_bbox_is_none() {
        let raw = osmformat::HeaderBlock::new();
        let header = FileHeader::from_proto(&raw);
        assert_eq!(header.bbox(), None);
    }

    #[test]
    fn bbox_nanodegrees_are_scaled_to_decimal_degrees() {
        let mut bbox = osmformat::HeaderBBox::new();
        bbox.set_left(-1_200_000_000);
        bbox.set_right(1_200_000_000);
        bbox.set_top(513_802_940_0);
        bbox.set_bottom(513_000_000_0);

        let mut raw = osmformat::HeaderBlock::new();
        raw.set_bbox(bbox);

        let header = FileHeader::from_proto(&raw);
        let bbox = header.bbox().unwrap();
        assert!((bbox.left - (-1.2)).abs() < 1e-9);
        assert!((bbox.right - 1.2).abs() < 1e-9);
    }

    #[test]
    fn required_features_are_carried_through() {
        let mut raw = osmformat::HeaderBlock::new();
        raw.set_required_features(vec!["OsmSchema-V0.6".to_string()].into());
        let header = FileHeader::from_proto(&raw);
        assert_eq!(header.required_features(), &["OsmSchema-V0.6".to_string()]);
    }
}
