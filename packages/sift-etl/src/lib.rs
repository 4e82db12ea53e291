pub mod delete;
pub mod ingest;
pub mod pipeline;
pub mod processor;

mod error;

pub use delete::DeleteHandler;
pub use error::{Error, Result};
pub use ingest::IngestHandler;
pub use pipeline::Pipeline;
pub use processor::{EtlProcessor, MarkdownProcessor, PdfProcessor};
