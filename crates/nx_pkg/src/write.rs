//! Types for writing NX container files
//!

use binrw::BinWrite;
use bon::Builder;
use byteorder::{WriteBytesExt, LE};
use std::collections::{HashMap, HashSet};
use std::io::{self, Seek, SeekFrom, Write};
use tracing::{info, instrument, warn};

use crate::blob::BlobPipeline;
use crate::error::{Error, Result};
use crate::intern::StringTable;
use crate::tree::{NodeId, PropertyTree, PropertyValue};
use crate::types::{
    AudioBlobHeader, BitmapBlobHeader, NodeTag, NxHeader, NxNode, NODE_BLOCK_OFFSET, NULL_BLOB_SIZE,
};

/// Options for how the NX file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct NxWriterOptions {
    /// Whether canvas payloads are compressed and stored; when disabled,
    /// canvas nodes reference the reserved empty blob
    #[builder(default = true)]
    pub dump_image: bool,

    /// Whether audio payloads are stored; when disabled, audio nodes
    /// reference the reserved empty blob
    #[builder(default = true)]
    pub dump_audio: bool,

    /// Size of the image compression worker pool
    #[builder(default = default_worker_count())]
    pub worker_threads: usize,
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Counters reported by a finished conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NxStats {
    /// Node records written
    pub node_count: u32,

    /// Distinct strings written, the reserved empty string included
    pub string_count: u32,

    /// Blob entries written, the reserved empty blob included
    pub blob_count: u32,

    /// Links whose records now mirror their target
    pub resolved_links: u32,

    /// Cyclic or dangling links, degraded to empty containers
    pub unresolved_links: u32,

    /// Interned strings that contained control characters
    pub control_char_strings: u32,
}

struct FlatTree {
    /// Flattening order; position = assigned id
    order: Vec<NodeId>,

    /// Assigned id per reachable arena node
    id_of: HashMap<NodeId, u32>,

    /// One record per assigned id, links still holding their placeholder
    records: Vec<NxNode>,
}

/// NX container generator
///
/// The whole tree is resident before any byte is finalized; a conversion is a
/// one-shot batch. Image compression overlaps the traversal and the
/// sequential writes on a worker pool.
///
/// ```
/// # fn doit() -> nx_pkg::error::Result<()>
/// # {
/// use nx_pkg::{NxWriter, NxWriterOptions, PropertyTree, PropertyValue};
///
/// let mut tree = PropertyTree::new("");
/// let root = tree.root();
/// tree.add_child(root, "level", PropertyValue::Integer(30));
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut writer = NxWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     NxWriterOptions::builder().build(),
/// );
/// let stats = writer.write_tree(&tree)?;
/// assert_eq!(stats.node_count, 2);
///
/// let bytes = writer.into_inner().into_inner();
/// # assert!(!bytes.is_empty());
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct NxWriter<W: Write + Seek> {
    inner: W,
    options: NxWriterOptions,
}

impl<W: Write + Seek> NxWriter<W> {
    /// Wrap an output stream
    pub fn new(inner: W, options: NxWriterOptions) -> NxWriter<W> {
        NxWriter { inner, options }
    }

    /// Convert `tree` into a complete container on the output stream
    ///
    /// Writes every section and finalizes the header; after a successful
    /// return the stream holds a self-contained NX file.
    #[instrument(skip_all, err)]
    pub fn write_tree(&mut self, tree: &PropertyTree) -> Result<NxStats> {
        let mut strings = StringTable::new();
        let mut pipeline = BlobPipeline::new(self.options.worker_threads);

        let mut flat = flatten(tree, &mut strings, &mut pipeline, self.options)?;
        pipeline.close_submissions();
        info!(nodes = flat.order.len(), "tree flattened");

        let (resolved_links, unresolved_links) = resolve_links(tree, &mut flat);
        info!(resolved_links, unresolved_links, "links resolved");

        // Reserve the header region; it is patched once all offsets are known.
        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&[0u8; NODE_BLOCK_OFFSET as usize])?;

        for record in &flat.records {
            record.write(&mut self.inner)?;
        }

        let string_table_offset = self.write_strings(&strings)?;
        let blob_table_offset = self.write_blobs(&mut pipeline)?;

        let header = NxHeader {
            node_count: flat.records.len() as u32,
            string_count: strings.len() as u32,
            string_table_offset,
            blob_count: pipeline.blob_count(),
            blob_table_offset,
            ..Default::default()
        };
        self.inner.seek(SeekFrom::Start(0))?;
        header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        Ok(NxStats {
            node_count: header.node_count,
            string_count: header.string_count,
            blob_count: header.blob_count,
            resolved_links,
            unresolved_links,
            control_char_strings: strings.control_char_count(),
        })
    }

    /// Unwrap and return the inner writer object
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_strings(&mut self, strings: &StringTable) -> Result<u64> {
        let mut offsets = Vec::with_capacity(strings.len());
        for s in strings.iter() {
            let bytes = s.as_bytes();
            let len =
                u16::try_from(bytes.len()).map_err(|_| Error::StringTooLong(bytes.len()))?;
            offsets.push(pad_to(&mut self.inner, 2)?);
            self.inner.write_u16::<LE>(len)?;
            self.inner.write_all(bytes)?;
        }

        let table_offset = pad_to(&mut self.inner, 8)?;
        for offset in offsets {
            self.inner.write_u64::<LE>(offset)?;
        }
        Ok(table_offset)
    }

    fn write_blobs(&mut self, pipeline: &mut BlobPipeline) -> Result<u64> {
        let mut offsets = vec![0u64; pipeline.blob_count() as usize];

        // Blob 0 is the fixed-size empty placeholder.
        offsets[0] = pad_to(&mut self.inner, 8)?;
        self.inner.write_all(&[0u8; NULL_BLOB_SIZE])?;

        for (id, audio) in pipeline.take_audios() {
            offsets[id as usize] = pad_to(&mut self.inner, 8)?;
            let total_len = (audio.header.len() + audio.data.len() + 2) as i64;
            AudioBlobHeader {
                total_len,
                total_len_dup: total_len,
                duration_ms: audio.duration_ms,
                header_len: audio.header.len() as u16,
                ..Default::default()
            }
            .write(&mut self.inner)?;
            self.inner.write_all(&audio.header)?;
            self.inner.write_all(&audio.data)?;
        }

        // Completion records arrive in whatever order the workers finish;
        // each one lands in the offset slot of its submission-time id.
        while pipeline.pending_bitmaps() > 0 {
            let bitmap = pipeline.recv_bitmap()?;
            offsets[bitmap.id as usize] = pad_to(&mut self.inner, 8)?;
            BitmapBlobHeader {
                compressed_len: bitmap.compressed.len() as i64,
                raw_len: bitmap.raw_len as i64,
                width: bitmap.width as i32,
                height: bitmap.height as i32,
                ..Default::default()
            }
            .write(&mut self.inner)?;
            self.inner.write_all(&bitmap.compressed)?;
        }
        pipeline.join();

        let table_offset = pad_to(&mut self.inner, 8)?;
        for offset in offsets {
            self.inner.write_u64::<LE>(offset)?;
        }
        Ok(table_offset)
    }
}

/// Breadth-first traversal assigning dense ids and encoding one record per node
///
/// Within one node, children are visited in ascending ordinal byte order of
/// their name; equal names keep their original relative order. The sorted
/// order is the on-disk contract consumers binary-search against.
fn flatten(
    tree: &PropertyTree,
    strings: &mut StringTable,
    pipeline: &mut BlobPipeline,
    options: NxWriterOptions,
) -> Result<FlatTree> {
    let mut order = vec![tree.root()];
    let mut id_of = HashMap::with_capacity(tree.len());
    let mut records = Vec::with_capacity(tree.len());

    let mut current = 0usize;
    let mut remaining = 1usize;
    while remaining > 0 {
        let node = order[current];
        id_of.insert(node, current as u32);

        let children = tree.children(node);
        let child_count =
            u16::try_from(children.len()).map_err(|_| Error::TooManyChildren(children.len()))?;
        let first_child_id = if children.is_empty() {
            0
        } else {
            (current + remaining) as u32
        };

        records.push(encode_node(
            tree,
            node,
            first_child_id,
            child_count,
            strings,
            pipeline,
            options,
        ));

        let mut sorted = children.to_vec();
        sorted.sort_by(|a, b| tree.name(*a).as_bytes().cmp(tree.name(*b).as_bytes()));
        order.extend(sorted);

        remaining += children.len();
        remaining -= 1;
        current += 1;
    }

    Ok(FlatTree {
        order,
        id_of,
        records,
    })
}

fn encode_node(
    tree: &PropertyTree,
    node: NodeId,
    first_child_id: u32,
    child_count: u16,
    strings: &mut StringTable,
    pipeline: &mut BlobPipeline,
    options: NxWriterOptions,
) -> NxNode {
    let name_id = strings.intern(tree.name(node));

    let (tag, payload) = match tree.value(node) {
        PropertyValue::Empty => (NodeTag::Empty, [0u8; 8]),
        PropertyValue::Integer(v) => (NodeTag::Integer, NxNode::integer_payload(*v)),
        PropertyValue::Float(v) => (NodeTag::Float, NxNode::float_payload(*v)),
        PropertyValue::String(v) => (NodeTag::String, NxNode::id_payload(strings.intern(v))),
        PropertyValue::Point(x, y) => (NodeTag::Point, NxNode::point_payload(*x, *y)),
        PropertyValue::Canvas(canvas) => {
            let blob_id = if options.dump_image {
                pipeline.submit_canvas(canvas)
            } else {
                0
            };
            (NodeTag::Blob, NxNode::id_payload(blob_id))
        }
        PropertyValue::Audio(audio) => {
            let blob_id = if options.dump_audio {
                pipeline.submit_audio(audio)
            } else {
                0
            };
            (NodeTag::Blob, NxNode::id_payload(blob_id))
        }
        // Placeholder; resolution overwrites everything after the name id.
        PropertyValue::Link(_) => (NodeTag::Empty, [0u8; 8]),
    };

    NxNode {
        name_id,
        first_child_id,
        child_count,
        tag,
        payload,
    }
}

/// Patch every link record to mirror its final non-link target
///
/// A resolved link copies the full 16-byte region after the name id (first
/// child, child count, tag, payload), so at read time the link aliases the
/// target's value and children alike. Cyclic chains and targets absent from
/// the flattened tree leave the record as an empty container.
fn resolve_links(tree: &PropertyTree, flat: &mut FlatTree) -> (u32, u32) {
    let mut resolved = 0;
    let mut unresolved = 0;

    for id in 0..flat.order.len() {
        let node = flat.order[id];
        let PropertyValue::Link(first_target) = tree.value(node) else {
            continue;
        };

        let mut visited = HashSet::from([node]);
        let mut target = *first_target;
        let final_target = loop {
            if !visited.insert(target) {
                break None;
            }
            match tree.value(target) {
                PropertyValue::Link(next) => target = *next,
                _ => break Some(target),
            }
        };

        match final_target.and_then(|t| flat.id_of.get(&t)) {
            Some(&target_id) => {
                let source = flat.records[target_id as usize];
                let record = &mut flat.records[id];
                record.first_child_id = source.first_child_id;
                record.child_count = source.child_count;
                record.tag = source.tag;
                record.payload = source.payload;
                resolved += 1;
            }
            None => {
                warn!(name = tree.name(node), "unresolved link");
                unresolved += 1;
            }
        }
    }

    (resolved, unresolved)
}

/// Pad the stream with zero bytes up to the next `multiple`, returning the
/// aligned position
fn pad_to<W: Write + Seek>(writer: &mut W, multiple: u64) -> io::Result<u64> {
    let position = writer.stream_position()?;
    let skip = (multiple - position % multiple) % multiple;
    if skip > 0 {
        writer.write_all(&vec![0u8; skip as usize])?;
    }
    Ok(position + skip)
}
