//! Types for reading NX container files
//!

use binrw::BinRead;
use byteorder::{ReadBytesExt, LE};
use std::io::{Read, Seek, SeekFrom};

use crate::compression;
use crate::error::{Error, NodeNotFoundError, Result};
use crate::types::{NxHeader, NxNode, BLOB_TAG_AUDIO, BLOB_TAG_BITMAP};

/// One blob table entry, decoded
#[derive(Debug, Clone, PartialEq)]
pub enum NxBlob {
    /// The reserved id-0 placeholder, or a payload kind that was not dumped
    Absent,

    /// An image payload, pixels decompressed
    Bitmap {
        /// Pixel width
        width: i32,
        /// Pixel height
        height: i32,
        /// 32bpp BGRA rows, `width * height * 4` bytes
        data: Vec<u8>,
    },

    /// An audio payload
    Audio {
        /// Duration in milliseconds
        duration_ms: i32,
        /// Codec header bytes
        header: Vec<u8>,
        /// Encoded audio bytes
        data: Vec<u8>,
    },
}

/// NX container reader
///
/// Node records, the string table and the blob offset index are loaded up
/// front; blob payloads are fetched lazily since images may be large.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_root_children(reader: impl Read + Seek) -> nx_pkg::error::Result<()> {
///     let mut nx = nx_pkg::NxArchive::new(reader)?;
///
///     let root = *nx.node(0)?;
///     for child in nx.children(&root).to_vec() {
///         println!("{}", nx.name(&child)?);
///     }
///
///     Ok(())
/// }
/// ```
pub struct NxArchive<R> {
    reader: R,
    header: NxHeader,
    nodes: Vec<NxNode>,
    strings: Vec<String>,
    blob_offsets: Vec<u64>,
}

impl<R: Read + Seek> NxArchive<R> {
    /// Read an NX container, collecting nodes, strings and blob offsets.
    pub fn new(mut reader: R) -> Result<NxArchive<R>> {
        match Self::get_metadata(&mut reader) {
            Ok((header, nodes, strings, blob_offsets)) => Ok(NxArchive {
                reader,
                header,
                nodes,
                strings,
                blob_offsets,
            }),
            Err(_) => Err(Error::InvalidArchive),
        }
    }

    /// The container header
    pub fn header(&self) -> &NxHeader {
        &self.header
    }

    /// Number of node records in this container.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether this container holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node record by id; the root is id 0
    pub fn node(&self, id: u32) -> Result<&NxNode> {
        self.nodes
            .get(id as usize)
            .ok_or_else(|| NodeNotFoundError::Id(id).into())
    }

    /// The records of a node's children, contiguous and sorted by name
    ///
    /// A corrupt record whose child range falls outside the node block
    /// yields an empty slice.
    pub fn children(&self, node: &NxNode) -> &[NxNode] {
        let start = node.first_child_id as usize;
        let end = start.saturating_add(node.child_count as usize);
        self.nodes.get(start..end).unwrap_or(&[])
    }

    /// Binary-search a node's children for `name`
    ///
    /// Children are stored sorted under ordinal byte comparison, which is
    /// what makes this lookup valid without scanning.
    pub fn child_by_name(&self, node: &NxNode, name: &str) -> Result<&NxNode> {
        let children = self.children(node);
        children
            .binary_search_by(|child| {
                self.strings[child.name_id as usize]
                    .as_bytes()
                    .cmp(name.as_bytes())
            })
            .map(|index| &children[index])
            .map_err(|_| NodeNotFoundError::Name(name.to_owned()).into())
    }

    /// Get a string table entry by id
    pub fn string(&self, id: u32) -> Result<&str> {
        self.strings
            .get(id as usize)
            .map(|s| s.as_str())
            .ok_or_else(|| NodeNotFoundError::Id(id).into())
    }

    /// The name of a node
    pub fn name(&self, node: &NxNode) -> Result<&str> {
        self.string(node.name_id)
    }

    /// The absolute offset of a blob entry
    pub fn blob_offset(&self, id: u32) -> Result<u64> {
        self.blob_offsets
            .get(id as usize)
            .copied()
            .ok_or_else(|| NodeNotFoundError::Id(id).into())
    }

    /// Fetch and decode a blob entry, decompressing image pixels
    pub fn blob(&mut self, id: u32) -> Result<NxBlob> {
        let offset = self.blob_offset(id)?;
        if id == 0 {
            return Ok(NxBlob::Absent);
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let first_len = self.reader.read_i64::<LE>()?;
        let second_len = self.reader.read_i64::<LE>()?;
        let _version = self.reader.read_i16::<LE>()?;
        let mut tag = [0u8; 4];
        self.reader.read_exact(&mut tag)?;

        // The stored lengths are untrusted; negative or short values must
        // fail as corruption, not wrap around.
        match tag {
            BLOB_TAG_BITMAP => {
                let _reserved = self.reader.read_i32::<LE>()?;
                let width = self.reader.read_i32::<LE>()?;
                let height = self.reader.read_i32::<LE>()?;
                let compressed_len =
                    usize::try_from(first_len).map_err(|_| Error::InvalidArchive)?;
                let raw_len = usize::try_from(second_len).map_err(|_| Error::InvalidArchive)?;
                let mut compressed = vec![0u8; compressed_len];
                self.reader.read_exact(&mut compressed)?;
                Ok(NxBlob::Bitmap {
                    width,
                    height,
                    data: compression::decompress(&compressed, raw_len)?,
                })
            }
            BLOB_TAG_AUDIO => {
                let duration_ms = self.reader.read_i32::<LE>()?;
                let _reserved = self.reader.read_i64::<LE>()?;
                let header_len = self.reader.read_u16::<LE>()?;
                let data_len = usize::try_from(first_len)
                    .ok()
                    .and_then(|total| total.checked_sub(header_len as usize + 2))
                    .ok_or(Error::InvalidArchive)?;
                let mut header = vec![0u8; header_len as usize];
                self.reader.read_exact(&mut header)?;
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data)?;
                Ok(NxBlob::Audio {
                    duration_ms,
                    header,
                    data,
                })
            }
            _ => Err(Error::InvalidArchive),
        }
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    #[allow(clippy::type_complexity)]
    fn get_metadata(reader: &mut R) -> Result<(NxHeader, Vec<NxNode>, Vec<String>, Vec<u64>)> {
        let header = NxHeader::read(reader)?;

        reader.seek(SeekFrom::Start(header.node_block_offset))?;
        let nodes = (0..header.node_count)
            .map(|_| NxNode::read(reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let strings = Self::get_strings(reader, &header)?;

        reader.seek(SeekFrom::Start(header.blob_table_offset))?;
        let blob_offsets = (0..header.blob_count)
            .map(|_| reader.read_u64::<LE>().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        Ok((header, nodes, strings, blob_offsets))
    }

    fn get_strings(reader: &mut R, header: &NxHeader) -> Result<Vec<String>> {
        reader.seek(SeekFrom::Start(header.string_table_offset))?;
        let offsets = (0..header.string_count)
            .map(|_| reader.read_u64::<LE>().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        offsets
            .into_iter()
            .map(|offset| {
                reader.seek(SeekFrom::Start(offset))?;
                let len = reader.read_u16::<LE>()?;
                let mut raw = vec![0u8; len as usize];
                reader.read_exact(&mut raw)?;
                String::from_utf8(raw).map_err(|_| Error::InvalidArchive)
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    use super::NxArchive;
    use crate::error::Result;
    use crate::types::NodeTag;

    #[test]
    fn read_invalid_magic() {
        #[rustfmt::skip]
        let input = [
            0x50, 0x4B, 0x47, 0x34,
            0x00, 0x00, 0x00, 0x00,
            0x2C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x84, 0x41,
        ];

        let archive = NxArchive::new(Cursor::new(input));
        assert!(archive.is_err());
    }

    #[test]
    fn read_truncated_file() {
        let archive = NxArchive::new(Cursor::new([0x50, 0x4B, 0x47, 0x35, 0x00]));
        assert!(archive.is_err());
    }

    fn single_root_container() -> Vec<u8> {
        #[rustfmt::skip]
        let bytes = vec![
            // Header
            0x50, 0x4B, 0x47, 0x35,
            0x01, 0x00, 0x00, 0x00,
            0x2C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x48, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x78, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x84, 0x41,
            0x00, 0x00,
            // Node block
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // String table
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // String offset index
            0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // The reserved empty blob
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // Blob offset index
            0x50, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        bytes
    }

    #[test]
    fn read_single_root_container() -> Result<()> {
        let mut archive = NxArchive::new(Cursor::new(single_root_container()))?;
        assert_eq!(archive.len(), 1);

        let root = *archive.node(0)?;
        assert_eq!(archive.name(&root)?, "");
        assert_eq!(root.tag, NodeTag::Empty);
        assert_eq!(archive.children(&root), &[]);

        assert_eq!(archive.blob_offset(0)?, 0x50);
        assert_eq!(archive.blob(0)?, super::NxBlob::Absent);

        Ok(())
    }

    #[test]
    fn read_out_of_range_child_range() -> Result<()> {
        let mut input = single_root_container();
        // The root record claims five children beyond the node block.
        input[48..52].copy_from_slice(&100u32.to_le_bytes());
        input[52..54].copy_from_slice(&5u16.to_le_bytes());

        let archive = NxArchive::new(Cursor::new(input))?;
        let root = *archive.node(0)?;
        assert_eq!(archive.children(&root), &[]);
        assert!(archive.child_by_name(&root, "x").is_err());

        Ok(())
    }
}
