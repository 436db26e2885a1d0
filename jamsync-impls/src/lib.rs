mod memory;
mod ytdlp;

pub use memory::*;
pub use ytdlp::*;
