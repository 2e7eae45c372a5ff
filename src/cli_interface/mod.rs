//! command line definitions of the `extentfs` tool
mod cli_struct;
pub use cli_struct::*;
