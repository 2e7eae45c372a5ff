use byte_unit::Byte;
use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum ExtentFsCli {
    /// create a new file system
    Mkfs(MkfsArgs),
    /// print the counters of a file system
    Stats(StatsArgs),
    /// list a directory of a file system
    Ls(LsArgs),
    /// print a file of a file system to stdout
    Cat(CatArgs),
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the inode count of the file system
    #[clap(short, long)]
    pub inode_count: u32,
    /// create or resize the image file to this size, e.g. `1MiB`;
    /// the current file size is used when absent
    #[clap(short, long, value_parser = parse_size)]
    pub size: Option<u64>,
    /// overwrite an image that already holds a file system
    #[clap(short, long)]
    pub force: bool,
    /// zero the whole image before formatting
    #[clap(short, long)]
    pub zero: bool,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "print file system counters")]
pub struct StatsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "list a directory")]
pub struct LsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// absolute path of the directory inside the file system
    #[clap(default_value = "/")]
    pub path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "print a file")]
pub struct CatArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// absolute path of the file inside the file system
    pub path: String,
}

/// accept a plain byte count or a size with a unit, like `4096`, `1MiB` or `2 MB`
fn parse_size(size: &str) -> Result<u64, String> {
    let bytes = Byte::from_str(size).map_err(|e| e.to_string())?;
    u64::try_from(bytes.get_bytes()).map_err(|e| e.to_string())
}
