pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Unknown object namespace in key {key:?}.")]
	UnknownNamespace { key: String },
	#[error("Object key {key:?} has {actual} segments, namespace {namespace} requires {expected}.")]
	SegmentCount { key: String, namespace: &'static str, expected: usize, actual: usize },
	#[error("Object key {key:?} contains an empty segment.")]
	EmptySegment { key: String },
	#[error("Unknown file type {0:?}.")]
	UnknownFileType(String),
}
