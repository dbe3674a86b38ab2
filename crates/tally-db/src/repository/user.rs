//! # User Repository
//!
//! Staff accounts. Salespeople own sales and receive commission; admins and
//! managers run the commission screens.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_email, validate_name, validate_new_user};
use tally_core::{NewUser, User};

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Lists users by name. Inactive users are included only on request.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, active, avatar_url, created_at, updated_at
            FROM users
            WHERE active = 1 OR ?1
            ORDER BY name
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, active, avatar_url, created_at, updated_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, active, avatar_url, created_at, updated_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Creates a user.
    ///
    /// ## Returns
    /// * `Ok(User)` - Inserted user with generated id and timestamps
    /// * `Err(DbError::UniqueViolation)` - Email already registered
    pub async fn insert(&self, new: &NewUser) -> DbResult<User> {
        validate_new_user(new)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            email: normalize_email(&new.email),
            role: new.role,
            active: true,
            avatar_url: new.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, role = ?user.role, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, role, active, avatar_url, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.active)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &user.email),
            other => other,
        })?;

        Ok(user)
    }

    /// Updates name, email, role, active flag and avatar.
    pub async fn update(&self, user: &User) -> DbResult<()> {
        validate_name("name", &user.name)?;
        validate_email(&user.email)?;

        debug!(id = %user.id, "Updating user");

        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = ?2,
                email = ?3,
                role = ?4,
                active = ?5,
                avatar_url = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&user.id)
        .bind(user.name.trim())
        .bind(normalize_email(&user.email))
        .bind(user.role)
        .bind(user.active)
        .bind(&user.avatar_url)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", &user.id));
        }

        Ok(())
    }

    /// Deletes a user. Fails with a foreign key violation while sales
    /// still reference them; deactivate instead.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Carla Mendes".to_string(),
            email: email.to_string(),
            role: Role::Salesperson,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_user_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        let user = repo.insert(&new_user("Carla@Improve.com")).await.unwrap();
        assert_eq!(user.email, "carla@improve.com");

        let found = repo.get_by_email("CARLA@improve.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let mut changed = found.clone();
        changed.role = Role::Manager;
        changed.active = false;
        repo.update(&changed).await.unwrap();

        assert!(repo.list(false).await.unwrap().is_empty());
        let all = repo.list(true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].role, Role::Manager);

        repo.delete(&user.id).await.unwrap();
        assert!(repo.get_by_id(&user.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&user.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        repo.insert(&new_user("carla@improve.com")).await.unwrap();
        let err = repo.insert(&new_user(" carla@improve.com")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { value, .. } if value == "carla@improve.com"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.users().insert(&new_user("carla")).await,
            Err(DbError::Domain(_))
        ));
    }
}
