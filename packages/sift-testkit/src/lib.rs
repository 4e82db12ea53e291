//! Hermetic fakes for every external seam. Nothing here talks to a real
//! service; tests that need live Postgres or Qdrant live behind `#[ignore]`
//! in the crates that own those clients.

pub mod fakes;

pub use fakes::{
	MemoryBroker, MemoryMessageStore, MemoryObjectStore, MemoryVectorIndex, RecordingDeadLetter,
	ScriptedGenerator, StubEmbedder,
};
