use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FileType {
	#[serde(rename = "pdf")]
	Pdf,
	#[serde(rename = "md")]
	Markdown,
}
impl FileType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pdf => "pdf",
			Self::Markdown => "md",
		}
	}
}
impl FromStr for FileType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pdf" => Ok(Self::Pdf),
			"md" | "markdown" => Ok(Self::Markdown),
			other => Err(Error::UnknownFileType(other.to_string())),
		}
	}
}

/// Published when a document upload has landed in the object store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestEvent {
	pub file_type: FileType,
	pub object_name: String,
}

/// Published when a document's metadata row has been removed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
	pub file_type: FileType,
	pub object_name: String,
}

/// Published after a conversation turn completes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummarizeEvent {
	pub msg_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ingest_event_round_trips_wire_format() {
		let raw = r#"{"file_type":"pdf","object_name":"knowledge-base/u1/report.pdf"}"#;
		let event: IngestEvent = serde_json::from_str(raw).unwrap();

		assert_eq!(event.file_type, FileType::Pdf);
		assert_eq!(event.object_name, "knowledge-base/u1/report.pdf");
	}

	#[test]
	fn file_type_parses_from_extension() {
		assert_eq!("pdf".parse::<FileType>().unwrap(), FileType::Pdf);
		assert_eq!("md".parse::<FileType>().unwrap(), FileType::Markdown);
		assert!("docx".parse::<FileType>().is_err());
	}

	#[test]
	fn summarize_event_carries_message_ids() {
		let event: SummarizeEvent = serde_json::from_str(r#"{"msg_ids":[42,7]}"#).unwrap();

		assert_eq!(event.msg_ids, vec![42, 7]);
	}
}
