//! Database operations for the index module

use crate::crawler::{CrawledDocument, DocumentType};
use crate::index::error::DbError;
use crate::index::registry::InstitutionRegistry;
use crate::index::schema;
use crate::index::{Document, IndexedDocument, StoredEmbedding, Summary};
use crate::model::embedding::{EmbeddingConversion, from_binary};
use chrono::{DateTime, Utc};
use libsql::{Connection, Row, Rows, params};
use tracing::{debug, instrument};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "d.id, d.url, d.title, d.school_id, d.type, d.metadata, \
     d.image_metadata, d.content, d.indexed_at";

/// Database manager for the document store
#[derive(Clone)]
pub struct Database {
    conn: Connection,
    registry: InstitutionRegistry,
}

impl Database {
    /// Create a new database manager
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection) -> Result<Self, DbError> {
        schema::initialize_schema(&conn).await?;

        Ok(Self {
            conn,
            registry: InstitutionRegistry::default(),
        })
    }

    /// Create a new database manager from a path
    pub async fn new_from_path(path: &str) -> Result<Self, DbError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DbError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn).await
    }

    /// Use `registry` to assign institutions to inserted documents
    pub fn with_registry(mut self, registry: InstitutionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &InstitutionRegistry {
        &self.registry
    }

    /// Whether any document is stored under `url`
    pub async fn document_exists(&self, url: &str) -> Result<bool, DbError> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM documents WHERE url = ? LIMIT 1", params![url])
            .await
            .map_err(|e| DbError::Query(format!("Failed to look up document: {}", e)))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DbError::Data(format!("Failed to look up document: {}", e))),
        }
    }

    /// Insert a crawled document, classifying it with the institution registry
    pub async fn insert_document(&self, document: &CrawledDocument) -> Result<Document, DbError> {
        insert_document(&self.conn, &self.registry, document).await
    }

    /// Insert the summary of a stored document
    pub async fn insert_summary(&self, document_id: &str, summary: &str) -> Result<Summary, DbError> {
        insert_summary(&self.conn, document_id, summary).await
    }

    /// Insert the embedding of a stored summary
    pub async fn insert_embedding(
        &self,
        summary_id: &str,
        model: &str,
        vector: &[f64],
    ) -> Result<StoredEmbedding, DbError> {
        insert_embedding(&self.conn, summary_id, model, vector).await
    }

    /// Insert a document with its summary and embedding atomically
    ///
    /// Either all three rows are written or none is, so a document is never
    /// left behind without a summary. Returns the joined view of the new rows.
    #[instrument(skip(self, document, summary, vector), fields(url = %document.url))]
    pub async fn index_document(
        &self,
        document: &CrawledDocument,
        summary: &str,
        model: &str,
        vector: &[f64],
    ) -> Result<IndexedDocument, DbError> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to start transaction: {}", e)))?;

        let document = insert_document(&tx, &self.registry, document).await?;
        let summary = insert_summary(&tx, &document.id, summary).await?;
        let embedding = insert_embedding(&tx, &summary.id, model, vector).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        debug!("Indexed document {}", document.id);
        Ok(IndexedDocument {
            document,
            summary: summary.summary,
            model: embedding.model,
            embedding: embedding.vector,
        })
    }

    /// All documents that have both a summary and an embedding, in insertion order
    #[instrument(skip(self))]
    pub async fn get_all_documents(&self) -> Result<Vec<IndexedDocument>, DbError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS}, s.summary, e.model, e.embedding
             FROM documents d
             INNER JOIN summaries s ON s.document_id = d.id
             INNER JOIN embeddings e ON e.summary_id = s.id
             ORDER BY d.rowid, s.rowid, e.rowid"
        );
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to get documents: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            let blob: Vec<u8> = row
                .get(11)
                .map_err(|e| DbError::Data(format!("Failed to get embedding: {}", e)))?;
            let embedding = from_binary(&blob)
                .ok_or_else(|| DbError::Data(format!("Malformed embedding of {} bytes", blob.len())))?;

            documents.push(IndexedDocument {
                document: row_to_document(&row)?,
                summary: row
                    .get(9)
                    .map_err(|e| DbError::Data(format!("Failed to get summary: {}", e)))?,
                model: row
                    .get(10)
                    .map_err(|e| DbError::Data(format!("Failed to get model: {}", e)))?,
                embedding,
            });
        }

        debug!("Loaded {} indexed documents", documents.len());
        Ok(documents)
    }

    /// Every stored document, indexed or not
    pub async fn list_documents(&self) -> Result<Vec<Document>, DbError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents d ORDER BY d.rowid");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to list documents: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            documents.push(row_to_document(&row)?);
        }
        Ok(documents)
    }

    /// Number of stored documents
    pub async fn count_documents(&self) -> Result<usize, DbError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(|e| DbError::Query(format!("Failed to count documents: {}", e)))?;

        let row = next_row(&mut rows)
            .await?
            .ok_or_else(|| DbError::Data("No row returned from COUNT".to_string()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DbError::Data(format!("Failed to get count: {}", e)))?;
        Ok(count as usize)
    }
}

async fn next_row(rows: &mut Rows) -> Result<Option<Row>, DbError> {
    rows.next()
        .await
        .map_err(|e| DbError::Data(format!("Failed to read row: {}", e)))
}

async fn insert_document(
    conn: &Connection,
    registry: &InstitutionRegistry,
    document: &CrawledDocument,
) -> Result<Document, DbError> {
    if document.content.trim().is_empty() {
        return Err(DbError::Data(format!(
            "Document {} has no content",
            document.url
        )));
    }

    let id = Uuid::new_v4().to_string();
    let indexed_at = Utc::now();
    let (doc_type, school_id) = registry.classify(&document.url);
    let metadata = serde_json::to_string(&document.metadata)
        .map_err(|e| DbError::Data(format!("Failed to encode metadata: {}", e)))?;
    let image_metadata = serde_json::to_string(&document.image_metadata)
        .map_err(|e| DbError::Data(format!("Failed to encode image metadata: {}", e)))?;

    conn.execute(
        "INSERT INTO documents (id, url, title, school_id, type, metadata, image_metadata, content, indexed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.clone(),
            document.url.clone(),
            document.title.clone(),
            school_id,
            doc_type.as_str(),
            metadata,
            image_metadata,
            document.content.clone(),
            indexed_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DbError::Query(format!("Failed to add document: {}", e)))?;

    Ok(Document {
        id,
        url: document.url.clone(),
        title: document.title.clone(),
        school_id,
        doc_type,
        metadata: document.metadata.clone(),
        image_metadata: document.image_metadata.clone(),
        content: document.content.clone(),
        indexed_at,
    })
}

async fn insert_summary(
    conn: &Connection,
    document_id: &str,
    summary: &str,
) -> Result<Summary, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO summaries (id, document_id, summary) VALUES (?, ?, ?)",
        params![id.clone(), document_id, summary],
    )
    .await
    .map_err(|e| DbError::Query(format!("Failed to add summary: {}", e)))?;
    Ok(Summary {
        id,
        document_id: document_id.to_string(),
        summary: summary.to_string(),
    })
}

async fn insert_embedding(
    conn: &Connection,
    summary_id: &str,
    model: &str,
    vector: &[f64],
) -> Result<StoredEmbedding, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO embeddings (id, summary_id, model, embedding) VALUES (?, ?, ?, ?)",
        params![
            id.clone(),
            summary_id,
            model,
            libsql::Value::Blob(vector.to_binary()),
        ],
    )
    .await
    .map_err(|e| DbError::Query(format!("Failed to add embedding: {}", e)))?;
    Ok(StoredEmbedding {
        id,
        summary_id: summary_id.to_string(),
        model: model.to_string(),
        vector: vector.to_vec(),
    })
}

/// Convert the leading document columns of a row to a Document
fn row_to_document(row: &Row) -> Result<Document, DbError> {
    let doc_type: String = row
        .get(4)
        .map_err(|e| DbError::Data(format!("Failed to get type: {}", e)))?;
    let metadata: String = row
        .get(5)
        .map_err(|e| DbError::Data(format!("Failed to get metadata: {}", e)))?;
    let image_metadata: String = row
        .get(6)
        .map_err(|e| DbError::Data(format!("Failed to get image_metadata: {}", e)))?;
    let indexed_at: String = row
        .get(8)
        .map_err(|e| DbError::Data(format!("Failed to get indexed_at: {}", e)))?;

    Ok(Document {
        id: row
            .get(0)
            .map_err(|e| DbError::Data(format!("Failed to get id: {}", e)))?,
        url: row
            .get(1)
            .map_err(|e| DbError::Data(format!("Failed to get url: {}", e)))?,
        title: row
            .get(2)
            .map_err(|e| DbError::Data(format!("Failed to get title: {}", e)))?,
        school_id: row
            .get::<Option<i64>>(3)
            .map_err(|e| DbError::Data(format!("Failed to get school_id: {}", e)))?,
        doc_type: DocumentType::parse(&doc_type)
            .ok_or_else(|| DbError::Data(format!("Unknown document type: {}", doc_type)))?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| DbError::Data(format!("Failed to decode metadata: {}", e)))?,
        image_metadata: serde_json::from_str(&image_metadata)
            .map_err(|e| DbError::Data(format!("Failed to decode image metadata: {}", e)))?,
        content: row
            .get(7)
            .map_err(|e| DbError::Data(format!("Failed to get content: {}", e)))?,
        indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
            .map_err(|e| DbError::Data(format!("Failed to parse indexed_at: {}", e)))?
            .with_timezone(&Utc),
    })
}
