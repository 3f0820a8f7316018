//! Compiles the OSMPBF `.proto` schemas into Rust message types.

extern crate protobuf_codegen_pure;

use std::env;
use std::fs;
use std::path::Path;

// protobuf-codegen-pure emits `#![allow(...)]` inner attributes and a `//!`
// inner doc comment at the top of each generated file. That is fine when the
// file is used as its own module file, but this crate pulls the generated
// code in via `include!` inside a `pub mod { ... }` block, where inner
// attributes/doc comments are no longer the first tokens of a file and are
// rejected by rustc. Strip them post-generation; they are lint configuration
// only and do not affect the generated message types or their behavior.
fn strip_inner_attrs(path: &Path) {
    let contents = fs::read_to_string(path).expect("failed to read generated protobuf file");
    let cleaned: String = contents
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("#![") {
                ""
            } else if trimmed.starts_with("//!") {
                "//"
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, cleaned).expect("failed to rewrite generated protobuf file");
}

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();

    protobuf_codegen_pure::Codegen::new()
        .out_dir(&out_dir)
        .inputs(&["proto/fileformat.proto", "proto/osmformat.proto"])
        .include("proto")
        .run()
        .expect("failed to compile fileformat.proto/osmformat.proto");

    strip_inner_attrs(&Path::new(&out_dir).join("fileformat.rs"));
    strip_inner_attrs(&Path::new(&out_dir).join("osmformat.rs"));

    println!("cargo:rerun-if-changed=proto/fileformat.proto");
    println!("cargo:rerun-if-changed=proto/osmformat.proto");
}
