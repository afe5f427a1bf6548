pub extern crate serde;
pub extern crate serde_json;

mod error;
mod identity;
mod message;

pub use error::*;
pub use identity::*;
pub use message::*;
