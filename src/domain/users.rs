//! User profile queries

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{repair_workout_days, DocType, UserProfile};
use crate::query::{Selector, ViewQuery};
use crate::schema::USERS;
use crate::timestamp;
use crate::Database;

use super::row_document;

fn username_selector(username: &str) -> Selector {
    Selector::new()
        .eq("type", DocType::UserProfile.as_str())
        .eq("username", username)
}

impl Database {
    /// Find a profile by username
    ///
    /// Profiles written with a list-valued `preferred_workout_days` are
    /// returned with the first element as the value.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let found = self.store().find(&username_selector(username)).await?;
        match found.into_iter().next() {
            Some(doc) => Ok(Some(UserProfile::from_document(doc)?)),
            None => {
                debug!("No user named {}", username);
                Ok(None)
            }
        }
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(!self.store().find(&username_selector(username)).await?.is_empty())
    }

    /// Create a profile, refusing a username that is already taken
    ///
    /// The check and the write are separate requests; two concurrent
    /// registrations of the same name can both succeed.
    pub async fn create_user(&self, user: UserProfile) -> Result<String> {
        if self.username_exists(&user.username).await? {
            return Err(Error::UsernameTaken {
                username: user.username,
            });
        }
        let (id, _) = self.store().save_kind(&user).await?;
        info!("Created user {} with ID: {}", user.username, id);
        Ok(id)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self.store().get(user_id).await? {
            Some(doc) => Ok(Some(UserProfile::from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let query = ViewQuery::new().key(email).include_docs(true).limit(1);
        let rows = self.store().query_view(USERS, "by_email", &query).await?;
        match rows.into_iter().next().and_then(row_document) {
            Some(doc) => Ok(Some(UserProfile::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Store a new Hevy API key on a profile
    ///
    /// Returns the new `(id, rev)`, or `None` when the user does not exist.
    pub async fn update_user_hevy_api_key(
        &self,
        user_id: &str,
        api_key: &str,
    ) -> Result<Option<(String, String)>> {
        let Some(mut doc) = self.store().get(user_id).await? else {
            return Ok(None);
        };

        repair_workout_days(&mut doc);
        doc.set("hevy_api_key", api_key)
            .set("hevy_api_key_updated_at", timestamp::format(&Utc::now()));

        let saved = self.store().update(doc).await?;
        info!("Updated Hevy API key for user {}", user_id);
        Ok(Some(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = Database::in_memory().await.unwrap();
        let mut user = UserProfile::new("alice");
        user.email = Some("alice@example.com".to_string());
        let id = db.create_user(user).await.unwrap();

        let found = db.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id.as_deref(), Some(id.as_str()));
        assert!(db.username_exists("alice").await.unwrap());
        assert!(!db.username_exists("bob").await.unwrap());

        let by_email = db.get_user_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.username, "alice");
        assert!(db.get_user_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.create_user(UserProfile::new("alice")).await.unwrap();
        let err = db.create_user(UserProfile::new("alice")).await.unwrap_err();
        assert!(matches!(err, Error::UsernameTaken { username } if username == "alice"));
    }

    #[tokio::test]
    async fn test_list_valued_workout_days_are_repaired_on_read() {
        let db = Database::in_memory().await.unwrap();
        db.store()
            .save(&json!({
                "_id": "u1",
                "type": "user_profile",
                "username": "carol",
                "preferred_workout_days": [4, 5]
            }))
            .await
            .unwrap();

        let user = db.find_user_by_username("carol").await.unwrap().unwrap();
        assert_eq!(user.preferred_workout_days, Some(4));

        // the stored document is not rewritten by a read
        let raw = db.store().get("u1").await.unwrap().unwrap();
        assert_eq!(raw.get("preferred_workout_days"), Some(&json!([4, 5])));
    }

    #[tokio::test]
    async fn test_update_hevy_api_key() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_user(UserProfile::new("dave")).await.unwrap();

        let (saved_id, rev) = db
            .update_user_hevy_api_key(&id, "key-123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved_id, id);
        assert!(rev.starts_with("2-"));

        let user = db.get_user(&id).await.unwrap().unwrap();
        assert_eq!(user.hevy_api_key.as_deref(), Some("key-123"));
        assert!(user.hevy_api_key_updated_at.is_some());

        assert!(db.update_user_hevy_api_key("missing", "k").await.unwrap().is_none());
    }
}
