pub mod header;
pub mod utils;

pub use header::{draw_header, HeaderInfo};
pub use utils::{tag_color, truncate};
