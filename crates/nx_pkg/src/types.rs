//! Base types for structure of NX container files.

use binrw::{BinRead, BinWrite};

/// Format tag identifying an image blob entry
pub const BLOB_TAG_BITMAP: [u8; 4] = *b"WZBM";

/// Format tag identifying an audio blob entry
pub const BLOB_TAG_AUDIO: [u8; 4] = *b"WZAU";

/// Trailing header magic
pub const HEADER_END_MAGIC: [u8; 2] = [0x84, 0x41];

/// Size of one node record in bytes
pub const NODE_SIZE: u64 = 20;

/// Offset of the node block: the 42-byte header padded to the next 4-byte multiple
pub const NODE_BLOCK_OFFSET: u64 = 44;

/// Size of the reserved empty blob entry, matching the smallest real entry shape
pub const NULL_BLOB_SIZE: usize = 34;

/// NX file header
///
/// Defines the header of the NX file which always starts with "PKG5".
/// All data is stored in little endian format. The section offsets are
/// absolute file offsets; the string and blob offsets point at the offset
/// indices, not at the first entry.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"PKG5", little)]
pub struct NxHeader {
    /// The number of node records stored in the file
    pub node_count: u32,

    /// The absolute offset of the node record block
    pub node_block_offset: u64,

    /// The number of entries in the string table
    pub string_count: u32,

    /// The absolute offset of the string offset index
    pub string_table_offset: u64,

    /// The number of entries in the blob table, the reserved empty blob included
    pub blob_count: u32,

    /// The absolute offset of the blob offset index
    pub blob_table_offset: u64,

    /// Trailing magic bytes
    pub end_magic: [u8; 2],
}

impl Default for NxHeader {
    fn default() -> Self {
        Self {
            node_count: 0,
            node_block_offset: NODE_BLOCK_OFFSET,
            string_count: 0,
            string_table_offset: 0,
            blob_count: 1,
            blob_table_offset: 0,
            end_magic: HEADER_END_MAGIC,
        }
    }
}

/// The payload interpretation of a node record
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(repr = u16)]
pub enum NodeTag {
    /// No payload; structural nodes and unresolved links
    #[default]
    Empty = 0,

    /// Signed 64-bit integer
    Integer = 1,

    /// 64-bit IEEE double
    Float = 2,

    /// String table id
    String = 3,

    /// Two signed 32-bit integers
    Point = 4,

    /// Blob table id
    Blob = 5,
}

/// NX node record
///
/// One fixed 20-byte entry of the node block. The children of a node are the
/// contiguous ids `first_child_id .. first_child_id + child_count`, sorted by
/// name under ordinal byte comparison.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct NxNode {
    /// String table id of this node's name
    pub name_id: u32,

    /// Id of the first child; unused and zero when there are no children
    pub first_child_id: u32,

    /// Number of children
    pub child_count: u16,

    /// How to interpret the payload bytes
    pub tag: NodeTag,

    /// Raw payload bytes, interpreted per tag
    pub payload: [u8; 8],
}

impl NxNode {
    /// Payload for an integer node, widened to 64 bits
    pub fn integer_payload(value: i64) -> [u8; 8] {
        value.to_le_bytes()
    }

    /// Payload for a float node, widened to a double
    pub fn float_payload(value: f64) -> [u8; 8] {
        value.to_le_bytes()
    }

    /// Payload holding a string or blob id in the low four bytes
    pub fn id_payload(id: u32) -> [u8; 8] {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&id.to_le_bytes());
        payload
    }

    /// Payload for a point node
    pub fn point_payload(x: i32, y: i32) -> [u8; 8] {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&x.to_le_bytes());
        payload[4..].copy_from_slice(&y.to_le_bytes());
        payload
    }

    /// The payload as a widened integer
    pub fn integer(&self) -> i64 {
        i64::from_le_bytes(self.payload)
    }

    /// The payload as a double
    pub fn float(&self) -> f64 {
        f64::from_le_bytes(self.payload)
    }

    /// The payload's low four bytes as a string or blob id
    pub fn id(&self) -> u32 {
        u32::from_le_bytes(self.payload[..4].try_into().expect("four bytes"))
    }

    /// The payload as a point
    pub fn point(&self) -> (i32, i32) {
        (
            i32::from_le_bytes(self.payload[..4].try_into().expect("four bytes")),
            i32::from_le_bytes(self.payload[4..].try_into().expect("four bytes")),
        )
    }
}

/// Fixed-size leading fields of an image blob entry
///
/// The LZ4-compressed pixel bytes follow directly after. The raw size and the
/// dimensions let readers allocate the decode buffer without decompressing
/// twice.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct BitmapBlobHeader {
    /// Length of the compressed pixel data that follows
    pub compressed_len: i64,

    /// Length of the pixel data when decompressed
    pub raw_len: i64,

    /// Entry format version, fixed at 1
    pub version: i16,

    /// Format tag, always [`BLOB_TAG_BITMAP`]
    pub tag: [u8; 4],

    /// Reserved, zero
    pub reserved: i32,

    /// Pixel width
    pub width: i32,

    /// Pixel height
    pub height: i32,
}

impl Default for BitmapBlobHeader {
    fn default() -> Self {
        Self {
            compressed_len: 0,
            raw_len: 0,
            version: 1,
            tag: BLOB_TAG_BITMAP,
            reserved: 0,
            width: 0,
            height: 0,
        }
    }
}

/// Fixed-size leading fields of an audio blob entry
///
/// The codec header bytes and the raw audio bytes follow directly after.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct AudioBlobHeader {
    /// `header_len + data_len + 2`
    pub total_len: i64,

    /// Same as `total_len`, kept for format symmetry with image entries
    pub total_len_dup: i64,

    /// Entry format version, fixed at 0
    pub version: i16,

    /// Format tag, always [`BLOB_TAG_AUDIO`]
    pub tag: [u8; 4],

    /// Duration in milliseconds
    pub duration_ms: i32,

    /// Reserved, zero
    pub reserved: i64,

    /// Length of the codec header bytes
    pub header_len: u16,
}

impl Default for AudioBlobHeader {
    fn default() -> Self {
        Self {
            total_len: 0,
            total_len_dup: 0,
            version: 0,
            tag: BLOB_TAG_AUDIO,
            duration_ms: 0,
            reserved: 0,
            header_len: 0,
        }
    }
}
