// Passwordless sign-in: magic-link issuance, verification and sessions.
// State is in memory only.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{WatchError, WatchResult};
use crate::services::allow_list::{normalize_email, AllowList};

/// A single-use sign-in link
#[derive(Debug, Clone)]
pub struct MagicLink {
    pub email: String,
    pub token: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingLink {
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionTables {
    links: HashMap<String, PendingLink>,
    sessions: HashMap<Uuid, Session>,
    users: HashMap<String, Uuid>,
    last_sent: HashMap<String, DateTime<Utc>>,
}

pub struct SessionService {
    allow_list: Arc<AllowList>,
    base_url: String,
    link_ttl: Duration,
    session_ttl: Duration,
    resend_cooldown: Duration,
    tables: RwLock<SessionTables>,
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}

impl SessionService {
    pub fn new(allow_list: Arc<AllowList>, config: &ApiConfig) -> Self {
        Self {
            allow_list,
            base_url: config.public_base_url.trim_end_matches('/').to_string(),
            link_ttl: seconds(config.magic_link_ttl_secs),
            session_ttl: seconds(config.session_ttl_secs),
            resend_cooldown: seconds(config.resend_cooldown_secs),
            tables: RwLock::new(SessionTables::default()),
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn resend_cooldown_secs(&self) -> u64 {
        self.resend_cooldown.num_seconds().max(0) as u64
    }

    /// Issue a sign-in link for an allow-listed email.
    ///
    /// The link is written to the log; there is no mail transport.
    pub async fn request_sign_in(&self, email: &str) -> WatchResult<MagicLink> {
        if email.trim().is_empty() {
            return Err(WatchError::EmailRequired);
        }
        if !self.allow_list.is_allowed(email) {
            tracing::info!("Sign-in refused for address not on the allow-list");
            return Err(WatchError::EmailNotAllowed);
        }
        let email = normalize_email(email);
        let now = Utc::now();

        let mut tables = self.tables.write().await;
        tables.links.retain(|_, link| link.expires_at > now);

        if let Some(sent_at) = tables.last_sent.get(&email) {
            let ready_at = *sent_at + self.resend_cooldown;
            if ready_at > now {
                let remaining_ms = (ready_at - now).num_milliseconds();
                return Err(WatchError::ResendCooldown {
                    seconds: ((remaining_ms + 999) / 1000) as u64,
                });
            }
        }

        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.link_ttl;
        tables.links.insert(
            token.clone(),
            PendingLink {
                email: email.clone(),
                expires_at,
            },
        );
        tables.last_sent.insert(email.clone(), now);

        let url = format!("{}/auth/verify?token={}", self.base_url, token);
        tracing::info!("Sign-in link for {}: {}", email, url);

        Ok(MagicLink {
            email,
            token,
            url,
            expires_at,
        })
    }

    /// Consume a sign-in token and open a session
    pub async fn verify(&self, token: &str) -> WatchResult<Session> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, session| session.expires_at > now);

        let link = tables.links.remove(token).ok_or(WatchError::InvalidToken)?;
        tables.links.retain(|_, pending| pending.expires_at > now);
        if link.expires_at <= now {
            return Err(WatchError::InvalidToken);
        }
        // The allow-list may have changed since the link was sent
        if !self.allow_list.is_allowed(&link.email) {
            return Err(WatchError::EmailNotAllowed);
        }

        let user_id = *tables
            .users
            .entry(link.email.clone())
            .or_insert_with(Uuid::new_v4);
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            email: link.email,
            expires_at: now + self.session_ttl,
        };
        tables.sessions.insert(session.id, session.clone());

        tracing::info!("Session opened for user {}", user_id);
        Ok(session)
    }

    /// Live session for `id`; expired sessions are dropped
    pub async fn session(&self, id: Uuid) -> Option<Session> {
        let now = Utc::now();
        {
            let tables = self.tables.read().await;
            match tables.sessions.get(&id) {
                Some(session) if session.expires_at > now => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.tables.write().await.sessions.remove(&id);
        None
    }

    pub async fn sign_out(&self, id: Uuid) -> bool {
        self.tables.write().await.sessions.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(cooldown_secs: u64, session_ttl_secs: u64) -> SessionService {
        let config = ApiConfig {
            public_base_url: "https://watch.example.com/".into(),
            resend_cooldown_secs: cooldown_secs,
            session_ttl_secs,
            ..ApiConfig::default()
        };
        SessionService::new(Arc::new(AllowList::new(["owner@example.com"])), &config)
    }

    #[tokio::test]
    async fn test_sign_in_round_trip() {
        let sessions = service(30, 3600);
        let link = sessions.request_sign_in(" Owner@Example.com ").await.unwrap();
        assert_eq!(link.email, "owner@example.com");
        assert_eq!(
            link.url,
            format!("https://watch.example.com/auth/verify?token={}", link.token)
        );

        let session = sessions.verify(&link.token).await.unwrap();
        assert_eq!(session.email, "owner@example.com");
        assert_eq!(sessions.session(session.id).await, Some(session.clone()));

        // tokens are single use
        assert!(matches!(
            sessions.verify(&link.token).await,
            Err(WatchError::InvalidToken)
        ));

        assert!(sessions.sign_out(session.id).await);
        assert_eq!(sessions.session(session.id).await, None);
    }

    #[tokio::test]
    async fn test_sign_in_validation() {
        let sessions = service(30, 3600);
        assert!(matches!(
            sessions.request_sign_in("   ").await,
            Err(WatchError::EmailRequired)
        ));
        assert!(matches!(
            sessions.request_sign_in("stranger@example.com").await,
            Err(WatchError::EmailNotAllowed)
        ));
    }

    #[tokio::test]
    async fn test_resend_cooldown() {
        let sessions = service(30, 3600);
        sessions.request_sign_in("owner@example.com").await.unwrap();

        match sessions.request_sign_in("owner@example.com").await {
            Err(WatchError::ResendCooldown { seconds }) => assert!(seconds > 0 && seconds <= 30),
            other => panic!("expected cooldown, got {:?}", other),
        }

        let no_cooldown = service(0, 3600);
        no_cooldown.request_sign_in("owner@example.com").await.unwrap();
        no_cooldown.request_sign_in("owner@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_same_email_keeps_user_id() {
        let sessions = service(0, 3600);
        let first = sessions.request_sign_in("owner@example.com").await.unwrap();
        let second = sessions.request_sign_in("owner@example.com").await.unwrap();

        let a = sessions.verify(&first.token).await.unwrap();
        let b = sessions.verify(&second.token).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.user_id, b.user_id);
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let sessions = service(0, 0);
        let link = sessions.request_sign_in("owner@example.com").await.unwrap();
        let session = sessions.verify(&link.token).await.unwrap();
        assert_eq!(sessions.session(session.id).await, None);
        assert!(!sessions.sign_out(session.id).await);
    }

    #[tokio::test]
    async fn test_verify_prunes_expired_sessions() {
        let sessions = service(0, 0);
        let first = sessions.request_sign_in("owner@example.com").await.unwrap();
        let stale = sessions.verify(&first.token).await.unwrap();

        let second = sessions.request_sign_in("owner@example.com").await.unwrap();
        let fresh = sessions.verify(&second.token).await.unwrap();

        let tables = sessions.tables.read().await;
        assert!(!tables.sessions.contains_key(&stale.id));
        assert!(tables.sessions.contains_key(&fresh.id));
        assert_eq!(tables.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let sessions = service(0, 3600);
        assert!(matches!(
            sessions.verify("not-a-token").await,
            Err(WatchError::InvalidToken)
        ));
    }
}
