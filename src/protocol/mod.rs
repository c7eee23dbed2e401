//! Line-oriented text protocol
//!
//! One command per line, arguments separated by whitespace, command names
//! case-insensitive. Each command produces exactly one `\r\n`-terminated
//! reply (INFO replies span several lines ending in `\r\n`).

pub mod command;
pub mod parser;
pub mod response;

pub use command::Command;
pub use parser::{ParseResult, find_line_end, parse, parse_line};
pub use response::{NIL, ResponseWriter};
