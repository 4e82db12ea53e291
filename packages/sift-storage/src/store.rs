use async_trait::async_trait;

use crate::{Result, db::Db, models::ConversationMessage};

#[derive(Clone, Debug)]
pub struct SummaryUpdate {
	pub id: i64,
	pub summary: String,
}

/// Conversation-message access used by the summarization worker. A trait so
/// the worker's skip and flush rules can be exercised without Postgres.
#[async_trait]
pub trait MessageStore: Send + Sync {
	async fn message_by_id(&self, id: i64) -> Result<Option<ConversationMessage>>;

	/// Applies every update in one transaction. Either all summaries land or
	/// none do.
	async fn update_summaries(&self, updates: &[SummaryUpdate]) -> Result<()>;
}

#[async_trait]
impl MessageStore for Db {
	async fn message_by_id(&self, id: i64) -> Result<Option<ConversationMessage>> {
		let msg = sqlx::query_as::<_, ConversationMessage>(
			"SELECT * FROM conversation_messages WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(msg)
	}

	async fn update_summaries(&self, updates: &[SummaryUpdate]) -> Result<()> {
		if updates.is_empty() {
			return Ok(());
		}

		let mut tx = self.pool.begin().await?;

		for update in updates {
			sqlx::query("UPDATE conversation_messages SET summary = $1 WHERE id = $2")
				.bind(update.summary.as_str())
				.bind(update.id)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
