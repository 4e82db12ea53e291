pub mod events;
pub mod identity;

mod error;

pub use error::{Error, Result};
