mod error;

pub use error::{Error, Result};

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sift_etl::{DeleteHandler, EtlProcessor, IngestHandler, MarkdownProcessor, PdfProcessor, Pipeline};
use sift_mq::{Dispatcher, PushConsumer};
use sift_providers::{HttpObjectStore, OpenAiEmbedder, OpenAiGenerator};
use sift_storage::{
	broker::{PgConsumer, PgDeadLetter},
	db::Db,
	vector::QdrantStore,
};
use sift_summarize::Summarizer;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> Result<()> {
	let config = sift_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = Arc::new(QdrantStore::new(&config.storage.qdrant)?);

	qdrant.ensure_collection().await?;

	let embedder = Arc::new(OpenAiEmbedder::new(config.providers.embedding.clone())?);
	let generator = Arc::new(OpenAiGenerator::new(config.providers.generation.clone())?);
	let object_store = Arc::new(HttpObjectStore::new(config.storage.object_store.clone())?);
	let pipeline = Arc::new(Pipeline::new(
		embedder,
		qdrant,
		&config.chunking,
		&config.providers.embedding,
	));
	let processors: Vec<Arc<dyn EtlProcessor>> = vec![
		Arc::new(PdfProcessor::new(pipeline.clone())),
		Arc::new(MarkdownProcessor::new(pipeline)),
	];
	let ingest = Arc::new(
		IngestHandler::new(object_store.clone(), processors.clone()).with_db(db.clone()),
	);
	let delete = Arc::new(DeleteHandler::new(object_store, processors).with_db(db.clone()));
	let summarizer =
		Arc::new(Summarizer::new(Arc::new(db.clone()), generator, &config.summarize));
	let dead_letter = Arc::new(PgDeadLetter::new(db.pool.clone()));

	let knowledge_consumer =
		PgConsumer::new(db.pool.clone(), sift_mq::CONSUMER_GROUP_KNOWLEDGE_BASE, &config.mq);
	let mut knowledge_dispatcher = Dispatcher::new(config.mq.max_redelivery)
		.with_dead_letter(dead_letter.clone());

	knowledge_dispatcher.register(sift_mq::TOPIC_KNOWLEDGE_BASE, sift_mq::TAG_ETL, ingest);
	knowledge_dispatcher.register(sift_mq::TOPIC_KNOWLEDGE_BASE, sift_mq::TAG_DELETE, delete);

	let _knowledge_routes = knowledge_dispatcher.bind(&knowledge_consumer).await?;

	let context_consumer =
		PgConsumer::new(db.pool.clone(), sift_mq::CONSUMER_GROUP_AGENT_CONTEXT, &config.mq);
	let mut context_dispatcher =
		Dispatcher::new(config.mq.max_redelivery).with_dead_letter(dead_letter);

	context_dispatcher.register(
		sift_mq::TOPIC_AGENT_CONTEXT,
		sift_mq::TAG_SUMMARIZE,
		summarizer.clone(),
	);

	let _context_routes = context_dispatcher.bind(&context_consumer).await?;

	knowledge_consumer.start().await?;
	context_consumer.start().await?;
	tracing::info!("Worker started.");

	let mut flush_tick =
		tokio::time::interval(Duration::from_millis(config.summarize.flush_interval_ms));

	loop {
		tokio::select! {
			_ = flush_tick.tick() => summarizer.flush_due().await,
			result = tokio::signal::ctrl_c() => {
				if let Err(err) = result {
					tracing::error!(error = %err, "Failed to listen for shutdown signal.");
				}

				break;
			},
		}
	}

	tracing::info!("Shutting down.");
	knowledge_consumer.shutdown().await?;
	context_consumer.shutdown().await?;
	// Consumers are stopped, so nothing can repopulate the pending batch.
	summarizer.drain().await;

	Ok(())
}
