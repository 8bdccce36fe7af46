pub mod message;
pub mod session;

pub use message::{ChatTurn, Sender};
pub use session::ChatSession;
