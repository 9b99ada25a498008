//! User profile storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use formmonkey_core::{Error, ProfileMutation, ProfileStore, Result, UserProfile};

/// Profile store backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|p| (p.user_id.clone(), p))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save(&self, profile: &UserProfile) -> Result<()> {
        check_user_id(&profile.user_id)?;
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn update(&self, user_id: &str, mutation: ProfileMutation<'_>) -> Result<bool> {
        check_user_id(user_id)?;
        // The write guard spans load, mutation and store.
        let mut profiles = self.profiles.write().await;
        let changed = match profiles.get_mut(user_id) {
            Some(profile) => mutation(profile),
            None => {
                let mut profile = UserProfile::new(user_id);
                let changed = mutation(&mut profile);
                if changed {
                    profiles.insert(user_id.to_string(), profile);
                }
                changed
            }
        };
        Ok(changed)
    }
}

fn check_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::InvalidInput("user_id must not be empty".into()));
    }
    Ok(())
}
