//! Device session identity and the per-match exclusive-edit claim.
//!
//! The claim is advisory: writers consult [`SessionManager::check_match_session`]
//! before mutating a match. Every check fails open so a broken store never
//! blocks scoring; lock, unlock and PIN checks fail closed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::SESSION_ID_KEY;
use crate::models::MatchId;
use crate::services::DatabaseService;
use crate::util::unix_millis_now;
use crate::Result;

/// Claim state of one match as seen from this device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Another device holds the claim
    pub locked: bool,
    /// The stored claim, if any
    pub session_id: Option<String>,
    /// This device holds the claim
    pub is_current_session: bool,
}

#[derive(Clone)]
pub struct SessionManager {
    db: DatabaseService,
    cached: Arc<Mutex<Option<String>>>,
}

impl SessionManager {
    pub fn new(db: DatabaseService) -> Self {
        Self {
            db,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Use a fixed identity instead of the stored one
    pub fn with_session_id(db: DatabaseService, session_id: impl Into<String>) -> Self {
        Self {
            db,
            cached: Arc::new(Mutex::new(Some(session_id.into()))),
        }
    }

    /// This device's identity, created and persisted on first use
    pub async fn session_id(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(session_id) = cached.as_ref() {
            return Ok(session_id.clone());
        }

        let session_id = match self.db.get_setting(SESSION_ID_KEY).await? {
            Some(stored) if !stored.trim().is_empty() => stored,
            _ => {
                let generated = generate_session_id();
                self.db.set_setting(SESSION_ID_KEY, &generated).await?;
                tracing::info!(session_id = %generated, "Created device session id");
                generated
            }
        };
        *cached = Some(session_id.clone());
        Ok(session_id)
    }

    /// Forget the identity; the next call to [`Self::session_id`] makes a new one
    pub async fn reset(&self) -> Result<()> {
        let mut cached = self.cached.lock().await;
        self.db.remove_setting(SESSION_ID_KEY).await?;
        *cached = None;
        Ok(())
    }

    pub async fn check_match_session(&self, match_id: Option<MatchId>) -> SessionStatus {
        let Some(match_id) = match_id else {
            return SessionStatus::default();
        };
        match self.try_check(match_id).await {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(%match_id, "Session check failed, treating match as unlocked: {}", error);
                SessionStatus::default()
            }
        }
    }

    async fn try_check(&self, match_id: MatchId) -> Result<SessionStatus> {
        let Some(game) = self.db.get_match(match_id).await? else {
            return Ok(SessionStatus::default());
        };
        let Some(stored) = game.session_id.filter(|id| !id.is_empty()) else {
            return Ok(SessionStatus::default());
        };

        let is_current = stored == self.session_id().await?;
        Ok(SessionStatus {
            locked: !is_current,
            session_id: Some(stored),
            is_current_session: is_current,
        })
    }

    /// Claim the match for this device
    pub async fn lock_match_session(&self, match_id: Option<MatchId>) -> bool {
        let Some(match_id) = match_id else {
            return false;
        };
        let result = async {
            let session_id = self.session_id().await?;
            self.db.set_match_session(match_id, Some(&session_id)).await
        }
        .await;
        log_claim_result("lock", match_id, result)
    }

    /// Drop any claim on the match
    pub async fn unlock_match_session(&self, match_id: Option<MatchId>) -> bool {
        let Some(match_id) = match_id else {
            return false;
        };
        let result = self.db.set_match_session(match_id, None).await;
        log_claim_result("unlock", match_id, result)
    }

    /// Gate for remote access to a match
    pub async fn verify_game_pin(&self, match_id: Option<MatchId>, pin: &str) -> bool {
        let Some(match_id) = match_id else {
            return false;
        };
        match self.db.get_match(match_id).await {
            Ok(Some(game)) if game.test => false,
            Ok(Some(game)) => game
                .game_pin
                .filter(|stored| !stored.is_empty())
                .map_or(true, |stored| stored == pin),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!(%match_id, "PIN check failed: {}", error);
                false
            }
        }
    }
}

fn log_claim_result(action: &str, match_id: MatchId, result: Result<bool>) -> bool {
    match result {
        Ok(true) => {
            tracing::info!(%match_id, "Session {action} applied");
            true
        }
        Ok(false) => {
            tracing::warn!(%match_id, "Session {action} skipped: no such match");
            false
        }
        Err(error) => {
            tracing::warn!(%match_id, "Session {action} failed: {}", error);
            false
        }
    }
}

/// `<device>-<random>-<time>`, each part lowercase base 36 or hex
fn generate_session_id() -> String {
    let mut hasher = DefaultHasher::new();
    for key in ["HOSTNAME", "COMPUTERNAME", "USER", "USERNAME"] {
        std::env::var(key).ok().hash(&mut hasher);
    }
    std::env::consts::OS.hash(&mut hasher);
    std::env::consts::ARCH.hash(&mut hasher);

    let random = Uuid::new_v4().simple().to_string();
    let millis = u64::try_from(unix_millis_now()).unwrap_or_default();
    format!(
        "{}-{}-{}",
        to_base36(hasher.finish()),
        &random[..12],
        to_base36(millis)
    )
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Match;
    use pretty_assertions::assert_eq;

    async fn db_with_match(pin: Option<&str>, test: bool) -> (DatabaseService, MatchId) {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let game = Match {
            game_pin: pin.map(str::to_string),
            test,
            ..Match::default()
        };
        let id = db.create_match(&game).await.unwrap();
        (db, id)
    }

    #[test]
    fn generated_ids_have_three_parts() {
        let id = generate_session_id();
        assert_eq!(id.split('-').count(), 3);
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn base36_encodes() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn session_id_is_persisted_and_reset() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let first = SessionManager::new(db.clone()).session_id().await.unwrap();
        let again = SessionManager::new(db.clone()).session_id().await.unwrap();
        assert_eq!(first, again);

        let manager = SessionManager::new(db.clone());
        manager.reset().await.unwrap();
        assert_eq!(db.get_setting(SESSION_ID_KEY).await.unwrap(), None);
        assert_ne!(manager.session_id().await.unwrap(), first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lock_is_exclusive_between_two_devices() {
        let (db, id) = db_with_match(None, false).await;
        let device_a = SessionManager::with_session_id(db.clone(), "a-1-1");
        let device_b = SessionManager::with_session_id(db.clone(), "b-2-2");

        assert_eq!(device_a.check_match_session(Some(id)).await, SessionStatus::default());
        assert!(device_a.lock_match_session(Some(id)).await);

        let mine = device_a.check_match_session(Some(id)).await;
        assert!(!mine.locked);
        assert!(mine.is_current_session);

        let theirs = device_b.check_match_session(Some(id)).await;
        assert!(theirs.locked);
        assert!(!theirs.is_current_session);
        assert_eq!(theirs.session_id.as_deref(), Some("a-1-1"));

        assert!(device_a.unlock_match_session(Some(id)).await);
        assert!(!device_b.check_match_session(Some(id)).await.locked);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn null_and_missing_matches() {
        let (db, _) = db_with_match(None, false).await;
        let manager = SessionManager::with_session_id(db, "a-1-1");

        assert_eq!(manager.check_match_session(None).await, SessionStatus::default());
        assert_eq!(
            manager.check_match_session(Some(MatchId(99))).await,
            SessionStatus::default()
        );
        assert!(!manager.lock_match_session(None).await);
        assert!(!manager.lock_match_session(Some(MatchId(99))).await);
        assert!(!manager.unlock_match_session(None).await);
        assert!(!manager.verify_game_pin(None, "1234").await);
        assert!(!manager.verify_game_pin(Some(MatchId(99)), "1234").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pin_gate() {
        let (db, open) = db_with_match(None, false).await;
        let manager = SessionManager::with_session_id(db.clone(), "a-1-1");
        assert!(manager.verify_game_pin(Some(open), "anything").await);

        let guarded = db
            .create_match(&Match {
                game_pin: Some("5678".to_string()),
                ..Match::default()
            })
            .await
            .unwrap();
        assert!(manager.verify_game_pin(Some(guarded), "5678").await);
        assert!(!manager.verify_game_pin(Some(guarded), "1234").await);
        assert!(!manager.verify_game_pin(Some(guarded), "5678 ").await);

        let fixture = db
            .create_match(&Match {
                game_pin: Some("5678".to_string()),
                test: true,
                ..Match::default()
            })
            .await
            .unwrap();
        assert!(!manager.verify_game_pin(Some(fixture), "5678").await);
    }
}
