pub mod archive;
pub mod config;
pub mod export;
pub mod markup;
pub mod models;
pub mod observer;
pub mod parsers;
pub mod segmenter;

// Re-export commonly used types
pub use config::ExtractConfig;
pub use export::ExportFormat;
pub use models::{ChatSession, ChatTurn, Sender};
pub use observer::{ExtractEvent, ExtractObserver, TracingObserver};
pub use parsers::{MhtmlParser, ParseError};
pub use segmenter::TurnSegmenter;
