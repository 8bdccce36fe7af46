pub mod mhtml;

pub use mhtml::{MhtmlParser, ParseError};
