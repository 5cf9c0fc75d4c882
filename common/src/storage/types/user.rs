use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};
use uuid::Uuid;

stored_object!(User, "user", {
    email: String,
    #[serde(default)]
    api_key: Option<String>
});

impl User {
    pub fn new(email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            email,
            api_key: None,
        }
    }

    /// Registers a new owner. The email is trimmed and must look like an address.
    pub async fn create_new(email: String, db: &SurrealDbClient) -> Result<Self, AppError> {
        let email = email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }

        if Self::find_by_email(&email, db).await?.is_some() {
            return Err(AppError::Validation(format!(
                "A user with email {email} already exists"
            )));
        }

        let user: Option<User> = db.store_item(Self::new(email)).await?;
        user.ok_or(AppError::InternalError("User failed to create".into()))
    }

    pub async fn find_by_email(
        email: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let user: Option<User> = db
            .client
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email.to_string()))
            .await?
            .take(0)?;

        Ok(user)
    }

    pub async fn find_by_api_key(
        api_key: &str,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let user: Option<User> = db
            .client
            .query("SELECT * FROM user WHERE api_key = $api_key LIMIT 1")
            .bind(("api_key", api_key.to_string()))
            .await?
            .take(0)?;

        Ok(user)
    }

    pub async fn set_api_key(id: &str, db: &SurrealDbClient) -> Result<String, AppError> {
        let api_key = format!("sk_{}", Uuid::new_v4().simple());

        let user: Option<User> = db
            .client
            .query(
                "UPDATE type::thing('user', $id)
                SET api_key = $api_key, updated_at = time::now()
                RETURN AFTER",
            )
            .bind(("id", id.to_owned()))
            .bind(("api_key", api_key.clone()))
            .await?
            .take(0)?;

        if user.is_some() {
            Ok(api_key)
        } else {
            Err(AppError::NotFound(format!("user {id}")))
        }
    }

    pub async fn revoke_api_key(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        let user: Option<User> = db
            .client
            .query(
                "UPDATE type::thing('user', $id)
                SET api_key = NONE, updated_at = time::now()
                RETURN AFTER",
            )
            .bind(("id", id.to_owned()))
            .await?
            .take(0)?;

        if user.is_some() {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("user {id}")))
        }
    }
}
