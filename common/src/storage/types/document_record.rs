use chrono::NaiveDate;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(DocumentRecord, "document", {
    name: String,
    document_text: String,
    #[serde(default)]
    analysis_payload: Option<String>,
    security_percentage: f64,
    response_time: f64,
    risk_level: String,
    owner_id: String
});

/// Compact listing entry for an owner's documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentPreview {
    pub id: String,
    pub name: String,
    pub risk_level: String,
}

impl DocumentRecord {
    pub fn new(
        name: String,
        document_text: String,
        analysis_payload: String,
        security_percentage: f64,
        response_time: f64,
        risk_level: String,
        owner_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name,
            document_text,
            analysis_payload: Some(analysis_payload),
            security_percentage,
            response_time,
            risk_level,
            owner_id,
        }
    }

    /// Calendar day of the last write, used for dashboard windowing.
    pub fn updated_date(&self) -> NaiveDate {
        self.updated_at.date_naive()
    }

    pub fn preview(&self) -> DocumentPreview {
        DocumentPreview {
            id: self.id.clone(),
            name: self.name.clone(),
            risk_level: self.risk_level.clone(),
        }
    }

    /// All documents of one owner, most recently updated first.
    pub async fn find_all_by_owner(
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let documents: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table_name) WHERE owner_id = $owner_id ORDER BY updated_at DESC",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("owner_id", owner_id.to_owned()))
            .await?
            .take(0)?;

        Ok(documents)
    }

    pub async fn list_previews(
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<DocumentPreview>, AppError> {
        let documents = Self::find_all_by_owner(owner_id, db).await?;
        Ok(documents.iter().map(Self::preview).collect())
    }

    /// Fetches a document and verifies that `owner_id` owns it.
    pub async fn find_for_owner(
        id: &str,
        owner_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let document: Option<Self> = db.get_item(id).await?;
        let document = document.ok_or_else(|| AppError::NotFound(format!("document {id}")))?;

        if document.owner_id != owner_id {
            return Err(AppError::Auth("The document is not owned by this user".into()));
        }

        Ok(document)
    }
}
