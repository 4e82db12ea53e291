use std::sync::Arc;

use async_trait::async_trait;
use sift_domain::{events::DeleteEvent, identity::ObjectIdentity};
use sift_mq::{Handler, HandlerResult, Message};
use sift_providers::ObjectStore;
use sift_storage::{db::Db, queries};

use crate::{Error, EtlProcessor, Result};

/// Consumes delete events: drop the document's vector rows, remove the
/// stored object, and clear the metadata row. Every step tolerates the
/// target already being gone, so a redelivered delete converges instead of
/// failing.
pub struct DeleteHandler {
	object_store: Arc<dyn ObjectStore>,
	processors: Vec<Arc<dyn EtlProcessor>>,
	db: Option<Db>,
}
impl DeleteHandler {
	pub fn new(object_store: Arc<dyn ObjectStore>, processors: Vec<Arc<dyn EtlProcessor>>) -> Self {
		Self { object_store, processors, db: None }
	}

	pub fn with_db(mut self, db: Db) -> Self {
		self.db = Some(db);

		self
	}

	async fn run(&self, msg: &Message) -> Result<()> {
		let event: DeleteEvent = serde_json::from_slice(&msg.payload)?;
		let identity = ObjectIdentity::parse(&event.object_name)?;
		let processor = self
			.processors
			.iter()
			.find(|p| p.can_process(event.file_type))
			.ok_or(Error::NoProcessor { file_type: event.file_type.as_str() })?;

		processor.delete_vectors(&identity).await?;
		self.object_store.delete(&event.object_name).await?;

		if let Some(db) = &self.db {
			let removed = queries::delete_document(db, &identity.tenant, &identity.title).await?;

			if removed == 0 {
				tracing::info!(
					object = %event.object_name,
					"Metadata row already absent during delete.",
				);
			}
		}

		tracing::info!(msg_id = %msg.msg_id, object = %event.object_name, "Deleted document.");

		Ok(())
	}
}
#[async_trait]
impl Handler for DeleteHandler {
	async fn handle(&self, msg: &Message) -> HandlerResult {
		self.run(msg).await.map_err(Into::into)
	}
}
