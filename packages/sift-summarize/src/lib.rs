pub mod summarizer;

mod error;

pub use error::{Error, Result};
pub use summarizer::Summarizer;
