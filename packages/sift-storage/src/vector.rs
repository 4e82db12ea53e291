use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
		PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value,
		value::Kind,
	},
};
use uuid::Uuid;

use crate::Result;

/// One document chunk bound for the vector index. `tenant` and `title`
/// repeat the document identity on every row so bulk deletes can target a
/// single document.
#[derive(Clone, Debug)]
pub struct VectorRow {
	pub vector: Vec<f32>,
	pub text: String,
	pub tenant: String,
	pub title: String,
}

#[derive(Clone, Debug)]
pub struct ScoredChunk {
	pub text: String,
	pub score: f32,
}

/// Row selection by document identity. `title: None` selects every row the
/// tenant owns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowFilter {
	pub tenant: String,
	pub title: Option<String>,
}
impl RowFilter {
	pub fn document(tenant: &str, title: &str) -> Self {
		Self { tenant: tenant.to_string(), title: Some(title.to_string()) }
	}

	pub fn tenant(tenant: &str) -> Self {
		Self { tenant: tenant.to_string(), title: None }
	}

	/// Human-readable rendering, used in logs only; the wire format is the
	/// store's own condition type.
	pub fn expression(&self) -> String {
		match &self.title {
			Some(title) => format!("tenant == '{}' and title == '{}'", self.tenant, title),
			None => format!("tenant == '{}'", self.tenant),
		}
	}
}

/// Vector index capability: upsert rows, search with a filter, bulk-delete
/// by filter. Rows are never updated in place.
#[async_trait]
pub trait VectorIndex: Send + Sync {
	async fn upsert(&self, rows: Vec<VectorRow>) -> Result<()>;
	async fn search(&self, vector: Vec<f32>, k: u64, filter: &RowFilter)
	-> Result<Vec<ScoredChunk>>;
	async fn delete_by_filter(&self, filter: &RowFilter) -> Result<()>;
}

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &sift_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(&self.collection).vectors_config(
					qdrant_client::qdrant::VectorParamsBuilder::new(
						u64::from(self.vector_dim),
						Distance::Cosine,
					),
				),
			)
			.await?;

		Ok(())
	}

	fn filter_conditions(filter: &RowFilter) -> Filter {
		let mut conditions = vec![Condition::matches("tenant", filter.tenant.clone())];

		if let Some(title) = &filter.title {
			conditions.push(Condition::matches("title", title.clone()));
		}

		Filter::must(conditions)
	}
}
#[async_trait]
impl VectorIndex for QdrantStore {
	async fn upsert(&self, rows: Vec<VectorRow>) -> Result<()> {
		let mut points = Vec::with_capacity(rows.len());

		for row in rows {
			let mut payload_map = HashMap::new();

			payload_map.insert("text".to_string(), Value::from(row.text));
			payload_map.insert("tenant".to_string(), Value::from(row.tenant));
			payload_map.insert("title".to_string(), Value::from(row.title));

			// Random point ids: a replayed ingest duplicates rows instead of
			// overwriting them, which is why delete must run before re-ingest.
			points.push(PointStruct::new(
				Uuid::new_v4().to_string(),
				row.vector,
				Payload::from(payload_map),
			));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	async fn search(
		&self,
		vector: Vec<f32>,
		k: u64,
		filter: &RowFilter,
	) -> Result<Vec<ScoredChunk>> {
		let search = SearchPointsBuilder::new(self.collection.clone(), vector, k)
			.filter(Self::filter_conditions(filter))
			.with_payload(true);
		let response = self.client.search_points(search).await?;
		let mut chunks = Vec::with_capacity(response.result.len());

		for point in response.result {
			let text = point
				.payload
				.get("text")
				.and_then(|value| match &value.kind {
					Some(Kind::StringValue(text)) => Some(text.clone()),
					_ => None,
				})
				.unwrap_or_default();

			chunks.push(ScoredChunk { text, score: point.score });
		}

		Ok(chunks)
	}

	async fn delete_by_filter(&self, filter: &RowFilter) -> Result<()> {
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(Self::filter_conditions(filter))
			.wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => Ok(()),
			Err(err) if is_not_found_error(&err) => {
				// Deleting rows that were never ingested, or a second delete
				// of the same document, is a no-op.
				tracing::info!(
					filter = %filter.expression(),
					"Vector rows missing during delete.",
				);

				Ok(())
			},
			Err(err) => Err(err.into()),
		}
	}
}

fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_lowercase();

	(message.contains("not found") || message.contains("404")) && message.contains("point")
}
