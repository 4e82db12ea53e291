use crate::{Error, Result};

/// Storage namespaces with distinct object-key layouts. Ingest and delete
/// both derive identity through [`ObjectIdentity::parse`], so the two sides
/// can never disagree on which rows a document owns.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Namespace {
	/// `knowledge-base/{tenant}/{title}`
	KnowledgeBase,
	/// `upload/{tenant}/{session}/{title}`
	Upload,
}
impl Namespace {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::KnowledgeBase => "knowledge-base",
			Self::Upload => "upload",
		}
	}

	fn from_segment(segment: &str) -> Option<Self> {
		match segment {
			"knowledge-base" => Some(Self::KnowledgeBase),
			"upload" => Some(Self::Upload),
			_ => None,
		}
	}

	fn segment_count(&self) -> usize {
		match self {
			Self::KnowledgeBase => 3,
			Self::Upload => 4,
		}
	}
}

/// The join key between the metadata row, the object-store key, and the
/// vector rows' payload columns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectIdentity {
	pub namespace: Namespace,
	pub tenant: String,
	pub title: String,
}
impl ObjectIdentity {
	pub fn parse(key: &str) -> Result<Self> {
		let segments: Vec<&str> = key.split('/').collect();

		if segments.iter().any(|segment| segment.is_empty()) {
			return Err(Error::EmptySegment { key: key.to_string() });
		}

		let namespace = Namespace::from_segment(segments[0])
			.ok_or_else(|| Error::UnknownNamespace { key: key.to_string() })?;
		let expected = namespace.segment_count();

		if segments.len() != expected {
			return Err(Error::SegmentCount {
				key: key.to_string(),
				namespace: namespace.as_str(),
				expected,
				actual: segments.len(),
			});
		}

		Ok(Self {
			namespace,
			tenant: segments[1].to_string(),
			title: segments[segments.len() - 1].to_string(),
		})
	}
}

pub fn knowledge_base_key(tenant: &str, title: &str) -> String {
	[Namespace::KnowledgeBase.as_str(), tenant, title].join("/")
}

pub fn upload_key(tenant: &str, session: &str, title: &str) -> String {
	[Namespace::Upload.as_str(), tenant, session, title].join("/")
}
