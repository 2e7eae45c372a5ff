pub mod cli_interface;
mod fs;
pub mod inspect;
pub mod mkfs;
pub mod utils;
pub use fs::*;
