use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::UserStore;
use super::repo_types::User;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.iter().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.find(|u| u.id == id))
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        anyhow::ensure!(
            users.iter().all(|u| u.email != email),
            "duplicate email {email}"
        );
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}
