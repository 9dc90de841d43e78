use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs::File, path::PathBuf};

use nx_pkg::types::{NodeTag, NxNode};
use nx_pkg::NxArchive;

#[derive(Args)]
pub struct TreeArgs {
    /// An input NX file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Maximum depth to descend into the hierarchy
    #[arg(short, long, default_value_t = 4)]
    depth: usize,
}

impl TreeArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", self.file.display()))?;
        let archive = NxArchive::new(f)?;

        let root = *archive.node(0)?;
        print_node(&archive, &root, 0, self.depth)?;

        Ok(())
    }
}

fn print_node(
    archive: &NxArchive<File>,
    node: &NxNode,
    indent: usize,
    max_depth: usize,
) -> Result<()> {
    let name = archive.name(node)?;
    let display_name = if name.is_empty() { "/" } else { name };
    println!(
        "{:indent$}{} {}",
        "",
        display_name.cyan(),
        describe(archive, node)?,
        indent = indent * 2
    );

    if indent < max_depth {
        for child in archive.children(node) {
            print_node(archive, child, indent + 1, max_depth)?;
        }
    } else if node.child_count > 0 {
        println!(
            "{:indent$}{}",
            "",
            format!("... {} more", node.child_count).dimmed(),
            indent = (indent + 1) * 2
        );
    }

    Ok(())
}

fn describe(archive: &NxArchive<File>, node: &NxNode) -> Result<String> {
    Ok(match node.tag {
        NodeTag::Empty => String::new(),
        NodeTag::Integer => format!("= {}", node.integer()),
        NodeTag::Float => format!("= {}", node.float()),
        NodeTag::String => format!("= {:?}", archive.string(node.id())?),
        NodeTag::Point => {
            let (x, y) = node.point();
            format!("= ({x}, {y})")
        }
        NodeTag::Blob => format!("[blob {}]", node.id()),
    })
}
