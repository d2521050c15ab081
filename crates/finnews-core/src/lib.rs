pub mod error;
pub mod parse;
pub mod types;

pub use error::*;
pub use parse::{extract_json_object, parse_signal, strip_think_block};
pub use types::*;
