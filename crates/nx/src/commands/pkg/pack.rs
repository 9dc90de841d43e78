use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use serde::Deserialize;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use nx_pkg::{NodeId, NxWriter, NxWriterOptions, PropertyTree, PropertyValue};

#[derive(Args)]
pub struct PackArgs {
    /// A JSON property tree description
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// A target NX file; defaults to the input name with an .nx extension
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Set to include canvas payloads in the NX file
    #[arg(long, default_value_t = false)]
    dump_image: bool,

    /// Set to include audio payloads in the NX file
    #[arg(long, default_value_t = false)]
    dump_audio: bool,

    /// Size of the image compression worker pool
    #[arg(long)]
    workers: Option<usize>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

#[derive(Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum JsonValue {
    #[default]
    Empty,
    Integer {
        value: i64,
    },
    Float {
        value: f64,
    },
    String {
        value: String,
    },
    Point {
        x: i32,
        y: i32,
    },
    Canvas {
        width: u32,
        height: u32,
        file: PathBuf,
    },
    Audio {
        duration_ms: i32,
        file: PathBuf,
        #[serde(default)]
        header_file: Option<PathBuf>,
    },
    Link {
        /// Slash-separated node path from the root
        target: String,
    },
}

#[derive(Deserialize)]
struct JsonNode {
    #[serde(default)]
    name: String,

    #[serde(default)]
    value: JsonValue,

    #[serde(default)]
    children: Vec<JsonNode>,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let input = File::open(&self.input)
            .into_diagnostic()
            .context(format!("opening {}", self.input.display()))?;
        let description: JsonNode = serde_json::from_reader(input)
            .into_diagnostic()
            .context(format!("parsing {}", self.input.display()))?;

        let base = self.input.parent().unwrap_or(Path::new("."));
        let tree = build_tree(&description, base)?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("nx"));
        if !self.overwrite && output.exists() {
            return Err(miette!("{} already exists", output.display()));
        }

        // A crash mid-write leaves only the temporary file behind, never a
        // partial file claiming to be a complete container.
        let temporary = output.with_extension("nx.tmp");
        let file = File::create(&temporary)
            .into_diagnostic()
            .context(format!("creating {}", temporary.display()))?;

        let options = NxWriterOptions::builder()
            .dump_image(self.dump_image)
            .dump_audio(self.dump_audio)
            .maybe_worker_threads(self.workers)
            .build();

        let mut writer = NxWriter::new(file, options);
        let stats = writer
            .write_tree(&tree)
            .context(format!("converting {}", self.input.display()))?;
        drop(writer);

        std::fs::rename(&temporary, &output)
            .into_diagnostic()
            .context(format!("renaming to {}", output.display()))?;

        info!(
            nodes = stats.node_count,
            strings = stats.string_count,
            blobs = stats.blob_count,
            resolved_links = stats.resolved_links,
            unresolved_links = stats.unresolved_links,
            "wrote {}",
            output.display()
        );

        Ok(())
    }
}

fn build_tree(description: &JsonNode, base: &Path) -> Result<PropertyTree> {
    let mut tree = PropertyTree::new(description.name.clone());
    let mut links = Vec::new();

    let root = tree.root();
    for child in &description.children {
        add_node(&mut tree, root, child, base, &mut links)?;
    }

    for (link, target_path) in links {
        match resolve_path(&tree, &target_path) {
            Some(target) => tree.retarget_link(link, target),
            None => {
                // A self-link degrades to an empty container at write time.
                warn!("link target {:?} does not exist", target_path);
                tree.retarget_link(link, link);
            }
        }
    }

    Ok(tree)
}

fn add_node(
    tree: &mut PropertyTree,
    parent: NodeId,
    description: &JsonNode,
    base: &Path,
    links: &mut Vec<(NodeId, String)>,
) -> Result<()> {
    let value = match &description.value {
        JsonValue::Empty => PropertyValue::Empty,
        JsonValue::Integer { value } => PropertyValue::Integer(*value),
        JsonValue::Float { value } => PropertyValue::Float(*value),
        JsonValue::String { value } => PropertyValue::String(value.clone()),
        JsonValue::Point { x, y } => PropertyValue::Point(*x, *y),
        JsonValue::Canvas {
            width,
            height,
            file,
        } => {
            let data = read_payload(base, file)?;
            let expected = *width as usize * *height as usize * 4;
            if data.len() != expected {
                return Err(miette!(
                    "{} holds {} bytes, {}x{} pixels need {}",
                    file.display(),
                    data.len(),
                    width,
                    height,
                    expected
                ));
            }
            PropertyValue::Canvas(nx_pkg::tree::Canvas::new(*width, *height, data))
        }
        JsonValue::Audio {
            duration_ms,
            file,
            header_file,
        } => {
            let data = read_payload(base, file)?;
            let header = match header_file {
                Some(path) => read_payload(base, path)?,
                None => Vec::new(),
            };
            PropertyValue::Audio(nx_pkg::tree::Audio {
                duration_ms: *duration_ms,
                header,
                data,
            })
        }
        // Placeholder target; patched once every node exists.
        JsonValue::Link { .. } => PropertyValue::Link(tree.root()),
    };

    let id = tree.add_child(parent, description.name.clone(), value);
    if let JsonValue::Link { target } = &description.value {
        links.push((id, target.clone()));
    }

    for child in &description.children {
        add_node(tree, id, child, base, links)?;
    }

    Ok(())
}

fn read_payload(base: &Path, file: &Path) -> Result<Vec<u8>> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        base.join(file)
    };
    std::fs::read(&path)
        .into_diagnostic()
        .context(format!("reading payload {}", path.display()))
}

fn resolve_path(tree: &PropertyTree, path: &str) -> Option<NodeId> {
    let mut node = tree.root();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        node = tree
            .children(node)
            .iter()
            .copied()
            .find(|&child| tree.name(child) == segment)?;
    }
    Some(node)
}
