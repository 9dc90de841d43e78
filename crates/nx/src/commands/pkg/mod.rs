pub mod info;
pub mod pack;
pub mod tree;

#[derive(clap::Subcommand)]
pub enum PkgCommands {
    /// Convert a property tree description into an NX container
    Pack(pack::PackArgs),
    /// Print the header of an NX container
    Info(info::InfoArgs),
    /// Print the node hierarchy of an NX container
    Tree(tree::TreeArgs),
}

impl PkgCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PkgCommands::Pack(pack) => pack.handle(),
            PkgCommands::Info(info) => info.handle(),
            PkgCommands::Tree(tree) => tree.handle(),
        }
    }
}
