//! End-to-end flow over the in-memory broker: publish events, deliver them
//! through a dispatcher, and observe the vector index and object store.

use std::sync::Arc;

use sift_domain::{
	events::{DeleteEvent, FileType, IngestEvent},
	identity::knowledge_base_key,
};
use sift_etl::{
	DeleteHandler, EtlProcessor, IngestHandler, MarkdownProcessor, PdfProcessor, Pipeline,
};
use sift_mq::{Dispatcher, Producer, ReliableSender};
use sift_storage::vector::{RowFilter, VectorIndex};
use sift_testkit::fakes::{
	MemoryBroker, MemoryObjectStore, MemoryVectorIndex, RecordingDeadLetter, StubEmbedder,
};

fn embedding_cfg() -> sift_config::EmbeddingProviderConfig {
	sift_config::EmbeddingProviderConfig {
		api_base: "http://embedder.local".to_string(),
		api_key: "k".to_string(),
		path: "/embeddings".to_string(),
		model: "m".to_string(),
		dimensions: 8,
		batch_size: 10,
		timeout_ms: 1_000,
		default_headers: Default::default(),
	}
}

struct Harness {
	broker: Arc<MemoryBroker>,
	store: Arc<MemoryObjectStore>,
	index: Arc<MemoryVectorIndex>,
	dead_letter: Arc<RecordingDeadLetter>,
}

async fn harness(max_redelivery: u32) -> Harness {
	let broker = Arc::new(MemoryBroker::default());
	let store = Arc::new(MemoryObjectStore::default());
	let index = Arc::new(MemoryVectorIndex::default());
	let dead_letter = Arc::new(RecordingDeadLetter::default());
	let pipeline = Arc::new(Pipeline::new(
		Arc::new(StubEmbedder::new(8)),
		index.clone(),
		&sift_config::Chunking::default(),
		&embedding_cfg(),
	));
	let processors: Vec<Arc<dyn EtlProcessor>> = vec![
		Arc::new(PdfProcessor::new(pipeline.clone())),
		Arc::new(MarkdownProcessor::new(pipeline)),
	];
	let mut dispatcher = Dispatcher::new(max_redelivery).with_dead_letter(dead_letter.clone());

	dispatcher.register(
		sift_mq::TOPIC_KNOWLEDGE_BASE,
		sift_mq::TAG_ETL,
		Arc::new(IngestHandler::new(store.clone(), processors.clone())),
	);
	dispatcher.register(
		sift_mq::TOPIC_KNOWLEDGE_BASE,
		sift_mq::TAG_DELETE,
		Arc::new(DeleteHandler::new(store.clone(), processors)),
	);
	dispatcher.bind(broker.as_ref()).await.unwrap();

	Harness { broker, store, index, dead_letter }
}

async fn publish_ingest(harness: &Harness, file_type: FileType, key: &str) {
	let event = IngestEvent { file_type, object_name: key.to_string() };

	harness
		.broker
		.publish(
			sift_mq::TOPIC_KNOWLEDGE_BASE,
			sift_mq::TAG_ETL,
			serde_json::to_vec(&event).unwrap(),
		)
		.await
		.unwrap();
}

#[tokio::test]
async fn ingest_scenario_indexes_the_expected_chunk_count() {
	let harness = harness(5).await;
	let key = knowledge_base_key("u1", "guide.md");
	// 12000 chars at 4000-char chunks with 400 overlap: stride 3600, so
	// ceil(12000 / 3600) = 4 chunks.
	let body = "y".repeat(12_000);

	harness.store.insert(&key, body.as_bytes());
	publish_ingest(&harness, FileType::Markdown, &key).await;

	assert_eq!(harness.broker.deliver_pending().await, 0);

	let rows = harness.index.rows_matching(&RowFilter::document("u1", "guide.md"));

	assert_eq!(rows.len(), 4);
	assert!(rows.iter().all(|row| row.vector.len() == 8));
}

#[tokio::test]
async fn pdf_ingest_scenario_indexes_extracted_text() {
	let harness = harness(5).await;
	let key = knowledge_base_key("u1", "report.pdf");

	harness.store.insert(&key, include_bytes!("fixtures/report.pdf"));
	publish_ingest(&harness, FileType::Pdf, &key).await;

	assert_eq!(harness.broker.deliver_pending().await, 0);

	let rows = harness.index.rows_matching(&RowFilter::document("u1", "report.pdf"));

	assert_eq!(rows.len(), 1);
	assert!(rows[0].text.contains("Hello vector search"));
	assert_eq!(rows[0].vector.len(), 8);
}

#[tokio::test]
async fn delete_scenario_leaves_zero_rows() {
	let harness = harness(5).await;
	let key = knowledge_base_key("u1", "guide.md");

	harness.store.insert(&key, "some markdown body".as_bytes());
	publish_ingest(&harness, FileType::Markdown, &key).await;
	harness.broker.deliver_pending().await;

	let filter = RowFilter::document("u1", "guide.md");
	let hits = harness.index.search(vec![0.; 8], 10, &filter).await.unwrap();

	assert!(!hits.is_empty());

	let event = DeleteEvent { file_type: FileType::Markdown, object_name: key.clone() };

	harness
		.broker
		.publish(
			sift_mq::TOPIC_KNOWLEDGE_BASE,
			sift_mq::TAG_DELETE,
			serde_json::to_vec(&event).unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(harness.broker.deliver_pending().await, 0);

	assert!(harness.index.search(vec![0.; 8], 10, &filter).await.unwrap().is_empty());
	assert_eq!(harness.store.deleted_keys(), vec![key]);
}

#[tokio::test]
async fn failing_ingest_is_redelivered_then_dead_lettered() {
	// The object is never uploaded, so every delivery fails.
	let harness = harness(2).await;
	let key = knowledge_base_key("u1", "missing.md");

	publish_ingest(&harness, FileType::Markdown, &key).await;

	assert_eq!(harness.broker.deliver_pending().await, 1);
	assert_eq!(harness.broker.deliver_pending().await, 1);
	// Third delivery hits the ceiling and routes to the sink.
	assert_eq!(harness.broker.deliver_pending().await, 0);
	assert_eq!(harness.broker.queued_len(), 0);

	let seen = harness.dead_letter.seen();

	assert_eq!(seen.len(), 1);
	assert_eq!(seen[0].0.reconsume_times, 2);
}

#[tokio::test]
async fn sender_delivers_through_the_broker() {
	let harness = harness(5).await;
	let sender = ReliableSender::new(harness.broker.clone(), &sift_config::Mq::default());
	let event = IngestEvent {
		file_type: FileType::Markdown,
		object_name: knowledge_base_key("u1", "guide.md"),
	};

	harness.store.insert(&event.object_name, b"body");
	sender
		.send(sift_mq::TOPIC_KNOWLEDGE_BASE, sift_mq::TAG_ETL, &event)
		.await
		.unwrap();
	harness.broker.deliver_pending().await;

	assert_eq!(harness.index.rows().len(), 1);
}
