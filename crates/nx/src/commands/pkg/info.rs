use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};

use nx_pkg::NxArchive;

#[derive(Args)]
pub struct InfoArgs {
    /// An input NX file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", self.file.display()))?;
        let archive = NxArchive::new(f)?;
        let header = archive.header();

        println!("{}", self.file.display());
        println!("  nodes:               {}", header.node_count);
        println!("  node block offset:   0x{:X}", header.node_block_offset);
        println!("  strings:             {}", header.string_count);
        println!("  string table offset: 0x{:X}", header.string_table_offset);
        println!("  blobs:               {}", header.blob_count);
        println!("  blob table offset:   0x{:X}", header.blob_table_offset);

        Ok(())
    }
}
