mod connection;
pub mod route;

pub use connection::ConnectionHandler;
pub use route::{router, AppState};
