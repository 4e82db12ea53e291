use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ConversationMessage {
	pub id: i64,
	pub session_id: i64,
	pub role: String,
	pub content: String,
	pub summary: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct KnowledgeDocument {
	pub tenant: String,
	pub file_name: String,
	pub file_type: String,
	pub status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct BrokerMessage {
	pub msg_id: Uuid,
	pub topic: String,
	pub tag: String,
	pub payload: Vec<u8>,
	pub status: String,
	pub attempts: i32,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
