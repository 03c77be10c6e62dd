use crate::core::decode;
use crate::domain::model::{AuthUser, Role, UserProfile};
use crate::domain::ports::DocumentStore;
use crate::utils::error::{MangaError, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

pub const USERS_COLLECTION: &str = "users";

pub fn user_path(uid: &str) -> String {
    format!("{}/{}", USERS_COLLECTION, uid)
}

/// The signed-in user for the lifetime of one client, or nobody.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<AuthUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&AuthUser> {
        self.user.as_ref().ok_or(MangaError::Unauthenticated)
    }

    pub fn sign_out(&mut self) {
        self.user = None;
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Records a login. Existing profiles keep their role and creation time;
    /// new profiles start as plain users.
    pub async fn save_user(&self, user: &AuthUser) -> Result<UserProfile> {
        let path = user_path(&user.uid);
        let now = Utc::now();

        if self.store.get(&path).await?.is_some() {
            self.store
                .merge(
                    &path,
                    json!({
                        "email": user.email,
                        "displayName": user.display_name,
                        "photoURL": user.photo_url,
                        "lastLoginAt": now.timestamp_millis(),
                    }),
                )
                .await?;
        } else {
            let profile = UserProfile {
                uid: user.uid.clone(),
                email: user.email.clone(),
                display_name: user.display_name.clone(),
                photo_url: user.photo_url.clone(),
                role: "user".to_string(),
                created_at: Some(now),
                last_login_at: Some(now),
            };
            self.store.set(&path, serde_json::to_value(&profile)?).await?;
            tracing::info!("👤 New user profile created for {}", user.uid);
        }

        self.profile(&user.uid)
            .await?
            .ok_or_else(|| MangaError::store(format!("profile {} vanished after write", user.uid)))
    }

    /// Starts a session. A failure to record the profile is logged and does
    /// not block the sign-in.
    pub async fn sign_in(&self, user: AuthUser) -> Session {
        if let Err(e) = self.save_user(&user).await {
            tracing::warn!("Failed to save user {}: {}", user.uid, e);
        }
        Session::signed_in(user)
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        match self.store.get(&user_path(uid)).await? {
            Some(doc) => {
                let mut profile: UserProfile = decode(&doc)?;
                profile.uid = doc.id;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub async fn is_admin(&self, uid: &str) -> Result<bool> {
        Ok(self
            .profile(uid)
            .await?
            .map(|p| p.role() == Role::Admin)
            .unwrap_or(false))
    }

    /// The session's user, if it belongs to an admin.
    pub async fn require_admin<'a>(&self, session: &'a Session) -> Result<&'a AuthUser> {
        let user = session.require_user()?;
        if self.is_admin(&user.uid).await? {
            Ok(user)
        } else {
            Err(MangaError::Forbidden {
                reason: "admin role required".to_string(),
            })
        }
    }
}
