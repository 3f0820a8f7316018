//! Generated protocol buffer message types.
//!
//! The actual struct and `protobuf::Message` impls for `fileformat.proto`
//! and `osmformat.proto` are produced by `build.rs` at compile time and
//! pulled in here. Nothing in this crate hand-maintains the wire format.

#![allow(clippy::all)]
#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals)]
#![allow(unused)]

pub mod fileformat {
    include!(concat!(env!("OUT_DIR"), "/fileformat.rs"));
}

pub mod osmformat {
    include!(concat!(env!("OUT_DIR"), "/osmformat.rs"));
}
