pub mod connection;
pub mod handler;
pub mod types;

pub use connection::{SessionRegistry, SessionSignal};
pub use handler::ws_handler;
