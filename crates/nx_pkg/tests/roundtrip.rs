use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{ReadBytesExt, LE};
use pretty_assertions::assert_eq;

use nx_pkg::error::Result;
use nx_pkg::read::NxBlob;
use nx_pkg::tree::{Audio, Canvas};
use nx_pkg::types::NodeTag;
use nx_pkg::{NxArchive, NxWriter, NxWriterOptions, PropertyTree, PropertyValue};

fn convert(tree: &PropertyTree) -> Result<Vec<u8>> {
    let mut writer = NxWriter::new(
        Cursor::new(Vec::new()),
        NxWriterOptions::builder().worker_threads(4).build(),
    );
    writer.write_tree(tree)?;
    Ok(writer.into_inner().into_inner())
}

fn checkered(width: u32, height: u32, seed: u8) -> Canvas {
    let data = (0..width * height * 4)
        .map(|i| (i as u8).wrapping_mul(3).wrapping_add(seed))
        .collect();
    Canvas::new(width, height, data)
}

#[test]
fn end_to_end_scenario() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    tree.add_child(root, "a", PropertyValue::Integer(5));
    tree.add_child(root, "b", PropertyValue::String("hi".into()));

    let bytes = convert(&tree)?;
    let archive = NxArchive::new(Cursor::new(bytes))?;

    assert_eq!(archive.header().node_count, 3);
    assert_eq!(archive.header().string_count, 4);
    assert_eq!(archive.string(0)?, "");
    assert_eq!(archive.string(1)?, "a");
    assert_eq!(archive.string(2)?, "b");
    assert_eq!(archive.string(3)?, "hi");

    let root = *archive.node(0)?;
    assert_eq!(root.tag, NodeTag::Empty);
    assert_eq!(root.first_child_id, 1);
    assert_eq!(root.child_count, 2);

    let a = archive.child_by_name(&root, "a")?;
    assert_eq!(a.tag, NodeTag::Integer);
    assert_eq!(a.integer(), 5);

    let b = archive.child_by_name(&root, "b")?;
    assert_eq!(b.tag, NodeTag::String);
    assert_eq!(archive.string(b.id())?, "hi");

    Ok(())
}

#[test]
fn round_trip_reconstructs_scalars_and_payloads() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    let character = tree.add_child(root, "character", PropertyValue::Empty);
    tree.add_child(character, "level", PropertyValue::Integer(200));
    tree.add_child(character, "speed", PropertyValue::Float(1.25));
    tree.add_child(character, "origin", PropertyValue::Point(-3, 14));
    tree.add_child(
        character,
        "title",
        PropertyValue::String("Night Lord".into()),
    );
    tree.add_child(root, "icon", PropertyValue::Canvas(checkered(16, 8, 0x11)));
    tree.add_child(
        root,
        "bgm",
        PropertyValue::Audio(Audio {
            duration_ms: 187_000,
            header: vec![0xDE, 0xAD],
            data: vec![0x42; 96],
        }),
    );

    let bytes = convert(&tree)?;
    let mut archive = NxArchive::new(Cursor::new(bytes))?;

    let root = *archive.node(0)?;
    let character = *archive.child_by_name(&root, "character")?;
    assert_eq!(character.child_count, 4);
    assert_eq!(archive.child_by_name(&character, "level")?.integer(), 200);
    assert_eq!(archive.child_by_name(&character, "speed")?.float(), 1.25);
    assert_eq!(archive.child_by_name(&character, "origin")?.point(), (-3, 14));
    let title = *archive.child_by_name(&character, "title")?;
    assert_eq!(archive.string(title.id())?, "Night Lord");

    let icon = *archive.child_by_name(&root, "icon")?;
    match archive.blob(icon.id())? {
        NxBlob::Bitmap {
            width,
            height,
            data,
        } => {
            assert_eq!((width, height), (16, 8));
            assert_eq!(data, checkered(16, 8, 0x11).data);
        }
        other => panic!("expected a bitmap blob, got {other:?}"),
    }

    let bgm = *archive.child_by_name(&root, "bgm")?;
    match archive.blob(bgm.id())? {
        NxBlob::Audio {
            duration_ms,
            header,
            data,
        } => {
            assert_eq!(duration_ms, 187_000);
            assert_eq!(header, vec![0xDE, 0xAD]);
            assert_eq!(data, vec![0x42; 96]);
        }
        other => panic!("expected an audio blob, got {other:?}"),
    }

    Ok(())
}

#[test]
fn blob_ids_follow_submission_order() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    // Zero-padded names keep sorted order equal to insertion order, so the
    // n-th child is also the n-th submission.
    for i in 0..24u8 {
        tree.add_child(
            root,
            format!("c{i:02}"),
            PropertyValue::Canvas(checkered(32, 32, i)),
        );
    }

    let bytes = convert(&tree)?;
    let mut archive = NxArchive::new(Cursor::new(bytes))?;
    assert_eq!(archive.header().blob_count, 25);

    let root = *archive.node(0)?;
    for i in 0..24u8 {
        let child = *archive.child_by_name(&root, &format!("c{i:02}"))?;
        assert_eq!(child.id(), u32::from(i) + 1);

        match archive.blob(child.id())? {
            NxBlob::Bitmap { data, .. } => assert_eq!(data, checkered(32, 32, i).data),
            other => panic!("expected a bitmap blob, got {other:?}"),
        }
    }

    Ok(())
}

#[test]
fn sections_and_blobs_are_aligned() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    // Odd-length names force string padding to matter.
    tree.add_child(root, "x", PropertyValue::String("odd".into()));
    tree.add_child(root, "y", PropertyValue::String("lengths".into()));
    for i in 0..3u8 {
        tree.add_child(
            root,
            format!("img{i}"),
            PropertyValue::Canvas(checkered(3, 3, i)),
        );
    }

    let bytes = convert(&tree)?;
    let archive = NxArchive::new(Cursor::new(bytes.clone()))?;
    let header = *archive.header();

    assert_eq!(header.string_table_offset % 8, 0);
    assert_eq!(header.blob_table_offset % 8, 0);

    let mut reader = Cursor::new(bytes);
    reader.seek(SeekFrom::Start(header.string_table_offset))?;
    for _ in 0..header.string_count {
        let entry_offset = reader.read_u64::<LE>()?;
        assert_eq!(entry_offset % 2, 0);
    }

    for id in 0..header.blob_count {
        assert_eq!(archive.blob_offset(id)? % 8, 0);
    }

    Ok(())
}

#[test]
fn disabled_image_dump_round_trips_to_absent() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    tree.add_child(root, "icon", PropertyValue::Canvas(checkered(4, 4, 0)));

    let mut writer = NxWriter::new(
        Cursor::new(Vec::new()),
        NxWriterOptions::builder()
            .dump_image(false)
            .worker_threads(1)
            .build(),
    );
    writer.write_tree(&tree)?;
    let bytes = writer.into_inner().into_inner();

    let mut archive = NxArchive::new(Cursor::new(bytes))?;
    let root = *archive.node(0)?;
    let icon = *archive.child_by_name(&root, "icon")?;
    assert_eq!(icon.tag, NodeTag::Blob);
    assert_eq!(icon.id(), 0);
    assert_eq!(archive.blob(0)?, NxBlob::Absent);

    Ok(())
}

#[test]
fn resolved_link_is_followable_at_read_time() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    let dir = tree.add_child(root, "real", PropertyValue::Empty);
    tree.add_child(dir, "inner", PropertyValue::Integer(77));
    tree.add_child(root, "alias", PropertyValue::Link(dir));

    let bytes = convert(&tree)?;
    let archive = NxArchive::new(Cursor::new(bytes))?;

    let root = *archive.node(0)?;
    let alias = *archive.child_by_name(&root, "alias")?;
    let inner = archive.child_by_name(&alias, "inner")?;
    assert_eq!(inner.integer(), 77);

    // Link and target differ only in the name id.
    let real = *archive.child_by_name(&root, "real")?;
    assert_eq!(alias.first_child_id, real.first_child_id);
    assert_eq!(alias.child_count, real.child_count);
    assert_eq!(alias.tag, real.tag);
    assert_eq!(alias.payload, real.payload);

    Ok(())
}

#[test]
fn corrupt_blob_lengths_are_an_error() -> Result<()> {
    let mut tree = PropertyTree::new("");
    let root = tree.root();
    tree.add_child(
        root,
        "bgm",
        PropertyValue::Audio(Audio {
            duration_ms: 1_000,
            header: vec![0xDE, 0xAD],
            data: vec![0x42; 8],
        }),
    );

    let bytes = convert(&tree)?;
    let archive = NxArchive::new(Cursor::new(bytes.clone()))?;
    let offset = archive.blob_offset(1)? as usize;

    // A negative total length must fail instead of wrapping into a huge read.
    let mut negative = bytes.clone();
    negative[offset..offset + 8].copy_from_slice(&(-1i64).to_le_bytes());
    let mut archive = NxArchive::new(Cursor::new(negative))?;
    assert!(archive.blob(1).is_err());

    // A total length shorter than the header must fail instead of underflowing.
    let mut short = bytes;
    short[offset..offset + 8].copy_from_slice(&1i64.to_le_bytes());
    let mut archive = NxArchive::new(Cursor::new(short))?;
    assert!(archive.blob(1).is_err());

    Ok(())
}

#[test]
fn empty_blob_entry_is_thirty_four_zero_bytes() -> Result<()> {
    let tree = PropertyTree::new("");
    let bytes = convert(&tree)?;
    let archive = NxArchive::new(Cursor::new(bytes.clone()))?;

    let offset = archive.blob_offset(0)? as usize;
    let mut reader = Cursor::new(&bytes);
    reader.seek(SeekFrom::Start(offset as u64))?;
    let mut entry = [0xFFu8; 34];
    reader.read_exact(&mut entry)?;
    assert_eq!(entry, [0u8; 34]);

    Ok(())
}
