pub mod config;
pub mod error;
pub mod handler;
pub mod inbound;
pub mod message;
pub mod message_id;
pub mod mime;
pub mod routes;
pub mod signature;
pub mod transport;

pub use config::*;
pub use error::*;
pub use handler::*;
pub use inbound::*;
pub use message::*;
pub use message_id::*;
pub use mime::*;
pub use routes::*;
pub use signature::*;
pub use transport::*;
