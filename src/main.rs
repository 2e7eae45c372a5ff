use clap::Parser;
use extentfs::cli_interface::ExtentFsCli;
use std::io::Write;
/// a CLI interface to users to create our filesystem on an image file,
/// or look inside an existing one.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = ExtentFsCli::parse();
    match args {
        ExtentFsCli::Mkfs(args) => {
            //create a new file system
            extentfs::mkfs::mkfs(
                &args.image_file_path,
                args.size,
                args.inode_count,
                args.force,
                args.zero,
            )?;
        }
        ExtentFsCli::Stats(args) => {
            let stats = extentfs::inspect::stats(&args.image_file_path)?;
            println!("{}", extentfs::inspect::render_stats(&stats));
        }
        ExtentFsCli::Ls(args) => {
            for name in extentfs::inspect::list(&args.image_file_path, &args.path)? {
                println!("{name}");
            }
        }
        ExtentFsCli::Cat(args) => {
            let content = extentfs::inspect::cat(&args.image_file_path, &args.path)?;
            std::io::stdout().write_all(&content)?;
        }
    }
    Ok(())
}
