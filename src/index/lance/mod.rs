
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{ChunkPayload, CollectionSpec, ScoredPayload, VectorIndex, new_record_id};
use crate::{ChatError, Result};

/// Per-table state learned when a collection is ensured
#[derive(Debug, Clone, Copy)]
struct TableState {
    dimension: usize,
    /// Insertion counter stored with every row; orders equal-score results
    next_seq: u64,
}

/// Durable index backed by LanceDB tables, one table per collection
pub struct LanceIndex {
    connection: Connection,
    tables: RwLock<HashMap<String, TableState>>,
}

fn db_error(context: &str) -> impl FnOnce(lancedb::Error) -> ChatError + '_ {
    move |e| ChatError::Database(format!("{}: {}", context, e))
}

impl LanceIndex {
    /// Open (or create) a LanceDB database in `path`
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            ChatError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            ChatError::Database(format!("Failed to connect to LanceDB: {}", e))
        })?;

        Ok(Self {
            connection,
            tables: RwLock::new(HashMap::new()),
        })
    }

    fn schema(dimension: usize) -> Result<Arc<Schema>> {
        let list_size = i32::try_from(dimension).map_err(|_| {
            ChatError::Database(format!("Vector dimension {} is too large", dimension))
        })?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    list_size,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("seq", DataType::UInt64, false),
            Field::new("ingested_at", DataType::Utf8, false),
        ])))
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))
    }

    /// Vector dimension recorded in an existing table's schema
    async fn existing_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(db_error("Failed to get table schema"))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                ChatError::Database("Could not find vector column or determine dimension".into())
            })
    }

    /// State of an ensured collection, or an error naming the missing collection
    async fn table_state(&self, name: &str) -> Result<TableState> {
        self.tables
            .read()
            .await
            .get(name)
            .copied()
            .ok_or_else(|| ChatError::Database(format!("Collection '{}' does not exist", name)))
    }

    fn record_batch(
        dimension: usize,
        id: &str,
        vector: Vec<f32>,
        payload: &ChunkPayload,
        seq: u64,
    ) -> Result<RecordBatch> {
        let schema = Self::schema(dimension)?;
        let list_size = i32::try_from(dimension)
            .map_err(|_| ChatError::Database("Vector dimension overflow".into()))?;

        let item = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            item,
            list_size,
            Arc::new(Float32Array::from(vector)),
            None,
        )
        .map_err(|e| ChatError::Database(format!("Failed to create vector array: {}", e)))?;

        let columns: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![id])),
            Arc::new(vectors),
            Arc::new(StringArray::from(vec![payload.text.as_str()])),
            Arc::new(StringArray::from(vec![payload.document_id.as_str()])),
            Arc::new(UInt32Array::from(vec![payload.chunk_index])),
            Arc::new(UInt64Array::from(vec![seq])),
            Arc::new(StringArray::from(vec![payload.ingested_at.as_str()])),
        ];

        RecordBatch::try_new(schema, columns)
            .map_err(|e| ChatError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Turn one result batch into scored payloads paired with their insertion sequence
    fn parse_batch(batch: &RecordBatch) -> Result<Vec<(u64, ScoredPayload)>> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let document_ids = string_column(batch, "document_id")?;
        let ingested = string_column(batch, "ingested_at")?;
        let chunk_indices = typed_column::<UInt32Array>(batch, "chunk_index")?;
        let seqs = typed_column::<UInt64Array>(batch, "seq")?;
        let distances = typed_column::<Float32Array>(batch, "_distance")?;

        let rows = (0..batch.num_rows())
            .map(|row| {
                if distances.is_null(row) {
                    return Err(ChatError::Database(format!(
                        "Missing distance for record {}",
                        ids.value(row)
                    )));
                }

                let scored = ScoredPayload {
                    id: ids.value(row).to_string(),
                    payload: ChunkPayload {
                        text: texts.value(row).to_string(),
                        document_id: document_ids.value(row).to_string(),
                        chunk_index: chunk_indices.value(row),
                        ingested_at: ingested.value(row).to_string(),
                    },
                    // Cosine distance is 1 - similarity
                    score: 1.0 - distances.value(row),
                };
                Ok((seqs.value(row), scored))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Up to `window` nearest records, ordered by score then insertion sequence
    async fn nearest(
        table: &Table,
        query: &[f32],
        window: usize,
    ) -> Result<Vec<(u64, ScoredPayload)>> {
        let mut stream = table
            .vector_search(query)
            .map_err(db_error("Failed to create vector search"))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(window)
            .execute()
            .await
            .map_err(db_error("Failed to execute search"))?;

        let mut ranked = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_error("Failed to read result stream"))?
        {
            ranked.extend(Self::parse_batch(&batch)?);
        }

        ranked.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score.total_cmp(&a.score).then_with(|| seq_a.cmp(seq_b))
        });
        Ok(ranked)
    }
}

/// Whether a candidate past the cutoff still ties with the last result that would be
/// kept, meaning records outside the window could share that score
fn tie_crosses_cutoff(ranked: &[(u64, ScoredPayload)], limit: usize) -> bool {
    if ranked.len() <= limit {
        return false;
    }
    match (ranked.get(limit.saturating_sub(1)), ranked.last()) {
        (Some((_, kept)), Some((_, weakest))) => weakest.score >= kept.score,
        _ => false,
    }
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ChatError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ChatError::Database(format!("Invalid {} column type", name)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column::<StringArray>(batch, name)
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables"))?;

        if table_names.contains(&spec.name) {
            let table = self.open_table(&spec.name).await?;
            let dimension = Self::existing_dimension(&table).await?;
            if dimension != spec.dimension {
                return Err(ChatError::Database(format!(
                    "Collection '{}' exists with {} dimensions, expected {}",
                    spec.name, dimension, spec.dimension
                )));
            }

            let rows = table
                .count_rows(None)
                .await
                .map_err(db_error("Failed to count rows"))?;
            debug!(
                "Collection '{}' already exists with {} records",
                spec.name, rows
            );
            tables.insert(
                spec.name.clone(),
                TableState {
                    dimension,
                    next_seq: rows as u64,
                },
            );
            return Ok(false);
        }

        self.connection
            .create_empty_table(&spec.name, Self::schema(spec.dimension)?)
            .execute()
            .await
            .map_err(db_error("Failed to create table"))?;

        tables.insert(
            spec.name.clone(),
            TableState {
                dimension: spec.dimension,
                next_seq: 0,
            },
        );
        info!(
            "Created collection '{}' ({} dimensions, {})",
            spec.name, spec.dimension, spec.distance
        );
        Ok(true)
    }

    async fn upsert(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: ChunkPayload,
    ) -> Result<String> {
        // Held across the write so sequence numbers follow insertion order
        let mut tables = self.tables.write().await;
        let state = tables
            .get_mut(collection)
            .ok_or_else(|| ChatError::Database(format!("Collection '{}' does not exist", collection)))?;

        if vector.len() != state.dimension {
            return Err(ChatError::Database(format!(
                "Vector has {} dimensions but collection '{}' expects {}",
                vector.len(),
                collection,
                state.dimension
            )));
        }

        let id = new_record_id();
        let batch = Self::record_batch(state.dimension, &id, vector, &payload, state.next_seq)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = self.open_table(collection).await?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(db_error("Failed to insert record"))?;

        state.next_seq = state.next_seq.saturating_add(1);
        debug!("Stored record {} in '{}'", id, collection);
        Ok(id)
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPayload>> {
        let state = self.table_state(collection).await?;
        if query.len() != state.dimension {
            return Err(ChatError::Database(format!(
                "Query has {} dimensions but collection '{}' expects {}",
                query.len(),
                collection,
                state.dimension
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table(collection).await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))?;
        if rows == 0 {
            debug!("Collection '{}' is empty", collection);
            return Ok(Vec::new());
        }

        // Widen the candidate window until every record tied with the last kept
        // score is in it, so ties resolve by sequence rather than by scan order
        let mut window = limit.saturating_add(1).min(rows);
        let mut ranked = loop {
            let candidates = Self::nearest(&table, query, window).await?;
            if window >= rows || !tie_crosses_cutoff(&candidates, limit) {
                break candidates;
            }
            window = window.saturating_mul(2).min(rows);
            debug!(
                "Ties at the cutoff in '{}', widening search to {} candidates",
                collection, window
            );
        };
        ranked.truncate(limit);

        if ranked.len() < limit.min(rows) {
            warn!(
                "Search in '{}' returned {} results, expected {}",
                collection,
                ranked.len(),
                limit.min(rows)
            );
        }

        Ok(ranked.into_iter().map(|(_, scored)| scored).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.table_state(collection).await?;
        let table = self.open_table(collection).await?;
        table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))
    }
}
