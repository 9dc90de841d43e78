//! This library handles creating and reading **NX** (PKG5) container files.
//!
//! # NX Container Format Documentation
//!
//! This crate converts an in-memory property tree (as parsed out of a proprietary
//! game-asset archive) into a single flat binary file optimized for random-access
//! reads. Nodes become fixed-size records addressed by dense integer ids, all
//! strings are deduplicated into one table, and image/audio payloads are stored
//! as length-prefixed blobs. Absolute offset tables allow a consumer to reach any
//! string or blob in O(1) without re-parsing. NX files are typically identified
//! with the `.nx` extension.
//!
//! ## File Structure
//!
//! An NX file consists of a header, a node record block, a string table with its
//! offset index, and a blob block with its offset index.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: 0x504B4735 ("PKG5")                               |
//! | 0x0004         | Node Count             | 4 bytes: Number of node records                            |
//! | 0x0008         | Node Block Offset      | 8 bytes: Absolute offset of the node record block          |
//! | 0x0010         | String Count           | 4 bytes: Number of entries in the string table             |
//! | 0x0014         | String Table Offset    | 8 bytes: Absolute offset of the string offset index        |
//! | 0x001C         | Blob Count             | 4 bytes: Number of entries in the blob table               |
//! | 0x0020         | Blob Table Offset      | 8 bytes: Absolute offset of the blob offset index          |
//! | 0x0028         | Trailing magic         | 2 bytes: 0x84, 0x41                                        |
//!
//! ### Node Block
//!
//! The node block starts at offset 44 (the header padded to a 4-byte multiple)
//! and holds one 20-byte record per node, densely packed, in id order. Id 0 is
//! always the tree root. A node's children occupy the contiguous id range
//! `first_child_id .. first_child_id + child_count` and are sorted by name under
//! ordinal byte comparison, so consumers can binary-search children by name.
//!
//! | Offset (bytes) | Field          | Description                                          |
//! |----------------|----------------|------------------------------------------------------|
//! | 0x0000         | Name Id        | 4 bytes: Index into the string table                 |
//! | 0x0004         | First Child Id | 4 bytes: Id of the first child node                  |
//! | 0x0008         | Child Count    | 2 bytes: Number of children                          |
//! | 0x000A         | Type Tag       | 2 bytes: Payload interpretation, see below           |
//! | 0x000C         | Payload        | 8 bytes: Value, interpreted per type tag             |
//!
//! Type tags: `0` no payload (directories, sub-properties and other structural
//! nodes, plus unresolved links), `1` signed 64-bit integer, `2` IEEE double,
//! `3` string table id, `4` two signed 32-bit integers (a point), `5` blob table
//! id (0 when that payload kind was not dumped).
//!
//! Link nodes alias another node. They are resolved while converting: a resolved
//! link's record is byte-identical to its target's record from offset 4 onward,
//! so at read time a link is indistinguishable from its target, children
//! included. Links whose chain is cyclic or dangling degrade to tag 0 with a
//! zero payload.
//!
//! ### String Table
//!
//! Strings are stored as a 2-byte UTF-8 byte length followed by the bytes, each
//! entry starting on an even offset. Id 0 is always the empty string. After the
//! entries comes the offset index: one absolute 8-byte offset per string,
//! starting on an 8-byte multiple. The header's string table offset points at
//! the index, not the entries.
//!
//! ### Blob Block
//!
//! Blob id 0 is a reserved 34-zero-byte placeholder meaning "payload absent".
//! Every other entry starts on an 8-byte multiple and is either an image or an
//! audio record:
//!
//! | Image field      | Size | Description                                 |
//! |------------------|------|---------------------------------------------|
//! | Compressed Size  | 8    | Length of the LZ4 block that follows        |
//! | Raw Size         | 8    | Length of the pixel data when decompressed  |
//! | Version          | 2    | Fixed 1                                     |
//! | Format Tag       | 4    | "WZBM"                                      |
//! | Reserved         | 4    | 0                                           |
//! | Width            | 4    | Pixel width                                 |
//! | Height           | 4    | Pixel height                                |
//! | Data             | n    | LZ4-compressed 32bpp BGRA pixel rows        |
//!
//! | Audio field      | Size | Description                                 |
//! |------------------|------|---------------------------------------------|
//! | Total Size       | 8    | `header_len + data_len + 2`, stored twice   |
//! | Version          | 2    | Fixed 0                                     |
//! | Format Tag       | 4    | "WZAU"                                      |
//! | Duration         | 4    | Milliseconds                                |
//! | Reserved         | 8    | 0                                           |
//! | Header Size      | 2    | Length of the codec header bytes            |
//! | Header + Data    | n    | Codec header followed by raw audio bytes    |
//!
//! After the entries comes the blob offset index, one absolute 8-byte offset
//! per blob id, starting on an 8-byte multiple.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.nx`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Image Compression**: LZ4 block format, with the raw size stored so
//!   readers can allocate the decode buffer up front

pub mod blob;
pub mod compression;
pub mod error;
pub mod intern;
pub mod read;
pub mod tree;
pub mod types;
pub mod write;

pub use read::NxArchive;
pub use tree::{NodeId, PropertyTree, PropertyValue};
pub use write::{NxWriter, NxWriterOptions};
