//! helpers shared by the engine and the command line tools
pub mod codec;
pub mod fs_size_calculator;
pub mod time_util;
