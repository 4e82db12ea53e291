use std::sync::Arc;

use async_trait::async_trait;
use sift_domain::{events::IngestEvent, identity::ObjectIdentity};
use sift_mq::{Handler, HandlerResult, Message};
use sift_providers::ObjectStore;
use sift_storage::{db::Db, queries};

use crate::{Error, EtlProcessor, Result};

/// Consumes ingest events: fetch the object, hand it to the processor for
/// its file type, and mark the metadata row ready.
pub struct IngestHandler {
	object_store: Arc<dyn ObjectStore>,
	processors: Vec<Arc<dyn EtlProcessor>>,
	db: Option<Db>,
}
impl IngestHandler {
	pub fn new(object_store: Arc<dyn ObjectStore>, processors: Vec<Arc<dyn EtlProcessor>>) -> Self {
		Self { object_store, processors, db: None }
	}

	pub fn with_db(mut self, db: Db) -> Self {
		self.db = Some(db);

		self
	}

	async fn run(&self, msg: &Message) -> Result<()> {
		let event: IngestEvent = serde_json::from_slice(&msg.payload)?;
		let identity = ObjectIdentity::parse(&event.object_name)?;
		let processor = self
			.processors
			.iter()
			.find(|p| p.can_process(event.file_type))
			.ok_or(Error::NoProcessor { file_type: event.file_type.as_str() })?;
		let bytes = self.object_store.get(&event.object_name).await?;
		let written = processor.execute(&identity, &bytes).await?;

		tracing::info!(
			msg_id = %msg.msg_id,
			object = %event.object_name,
			rows = written,
			"Ingested document.",
		);

		// The document is already searchable at this point. A failed status
		// flip is logged, not retried, so the ingest cannot re-run and
		// duplicate the rows just written.
		if let Some(db) = &self.db
			&& let Err(err) =
				queries::set_document_status(db, &identity.tenant, &identity.title, queries::DOC_STATUS_READY)
					.await
		{
			tracing::warn!(
				object = %event.object_name,
				error = %err,
				"Failed to mark document ready.",
			);
		}

		Ok(())
	}
}
#[async_trait]
impl Handler for IngestHandler {
	async fn handle(&self, msg: &Message) -> HandlerResult {
		self.run(msg).await.map_err(Into::into)
	}
}
