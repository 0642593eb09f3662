//! Per-login session workspace.
//!
//! A login issues an opaque bearer token; only its SHA-256 digest is used
//! as the key. Each session owns a workspace holding the current analysis,
//! the uploaded image and the patient info. Sessions expire after a period
//! of inactivity and are dropped on logout.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::crypto::{generate_token, hash_token};
use crate::imaging::UploadedImage;
use crate::models::PatientInfo;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session store lock poisoned")]
    LockPoisoned,
}

/// Working state of one session. Never shared across sessions.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub analysis: Option<AnalysisResult>,
    pub image: Option<UploadedImage>,
    pub patient: PatientInfo,
    /// Identifier printed on exported reports for the current analysis.
    pub report_id: Option<String>,
    /// Persisted report row for the current analysis.
    pub stored_report: Option<Uuid>,
}

/// Caller identity, injected into request extensions by the auth layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub username: String,
    pub token_hash: [u8; 32],
}

struct Session {
    user_id: Uuid,
    username: String,
    last_seen: Instant,
    workspace: Workspace,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<[u8; 32], Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<[u8; 32], Session>>, SessionError> {
        self.sessions.lock().map_err(|_| SessionError::LockPoisoned)
    }

    /// Open a session and return the raw bearer token.
    pub fn create(&self, user_id: Uuid, username: &str) -> Result<String, SessionError> {
        self.create_at(user_id, username, Instant::now())
    }

    fn create_at(&self, user_id: Uuid, username: &str, now: Instant) -> Result<String, SessionError> {
        let token = generate_token();
        let mut sessions = self.lock()?;
        Self::purge(&mut sessions, self.idle_timeout, now);
        sessions.insert(
            hash_token(&token),
            Session {
                user_id,
                username: username.to_string(),
                last_seen: now,
                workspace: Workspace::default(),
            },
        );
        tracing::debug!(user_id = %user_id, active = sessions.len(), "Session opened");
        Ok(token)
    }

    /// Resolve a bearer token and mark the session active. Expired sessions
    /// are removed together with their workspace.
    pub fn authenticate(&self, token: &str) -> Result<Option<RequestContext>, SessionError> {
        self.authenticate_at(token, Instant::now())
    }

    fn authenticate_at(
        &self,
        token: &str,
        now: Instant,
    ) -> Result<Option<RequestContext>, SessionError> {
        let token_hash = hash_token(token);
        let mut sessions = self.lock()?;

        match sessions.get_mut(&token_hash) {
            None => return Ok(None),
            Some(session) if now.saturating_duration_since(session.last_seen) <= self.idle_timeout => {
                session.last_seen = now;
                return Ok(Some(RequestContext {
                    user_id: session.user_id,
                    username: session.username.clone(),
                    token_hash,
                }));
            }
            Some(_) => {}
        }

        if let Some(session) = sessions.remove(&token_hash) {
            tracing::info!(user_id = %session.user_id, "Session expired");
        }
        Ok(None)
    }

    /// Run `f` against the workspace of a live session.
    pub fn with_workspace<R>(
        &self,
        token_hash: &[u8; 32],
        f: impl FnOnce(&mut Workspace) -> R,
    ) -> Result<Option<R>, SessionError> {
        let mut sessions = self.lock()?;
        Ok(sessions.get_mut(token_hash).map(|s| f(&mut s.workspace)))
    }

    /// Drop a session and its workspace. Returns whether it existed.
    pub fn remove(&self, token_hash: &[u8; 32]) -> Result<bool, SessionError> {
        Ok(self.lock()?.remove(token_hash).is_some())
    }

    pub fn active_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock()?.len())
    }

    fn purge(sessions: &mut HashMap<[u8; 32], Session>, idle: Duration, now: Instant) {
        sessions.retain(|_, s| now.saturating_duration_since(s.last_seen) <= idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientDetails;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(1800))
    }

    fn later(secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(secs)
    }

    #[test]
    fn token_resolves_to_user() {
        let store = store();
        let user = Uuid::new_v4();
        let token = store.create(user, "alice").unwrap();

        let ctx = store.authenticate(&token).unwrap().unwrap();
        assert_eq!(ctx.user_id, user);
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.token_hash, hash_token(&token));
    }

    #[test]
    fn unknown_token_rejected() {
        let store = store();
        assert!(store.authenticate("nope").unwrap().is_none());
    }

    #[test]
    fn idle_session_expires_and_is_removed() {
        let store = store();
        let token = store.create(Uuid::new_v4(), "alice").unwrap();

        assert!(store.authenticate_at(&token, later(1801)).unwrap().is_none());
        assert_eq!(store.active_count().unwrap(), 0);
    }

    #[test]
    fn activity_keeps_session_alive() {
        let store = store();
        let token = store.create(Uuid::new_v4(), "alice").unwrap();
        assert!(store.authenticate_at(&token, later(1700)).unwrap().is_some());
        assert!(store.authenticate_at(&token, later(3400)).unwrap().is_some());
    }

    #[test]
    fn workspaces_are_isolated() {
        let store = store();
        let a = store.create(Uuid::new_v4(), "alice").unwrap();
        let b = store.create(Uuid::new_v4(), "bob").unwrap();

        store
            .with_workspace(&hash_token(&a), |ws| {
                ws.patient = PatientInfo {
                    name: "Jane".into(),
                    patient_id: "P1".into(),
                    details: PatientDetails::default(),
                };
            })
            .unwrap()
            .unwrap();

        let other = store
            .with_workspace(&hash_token(&b), |ws| ws.patient.name.clone())
            .unwrap()
            .unwrap();
        assert_eq!(other, "");
    }

    #[test]
    fn logout_drops_workspace() {
        let store = store();
        let token = store.create(Uuid::new_v4(), "alice").unwrap();
        let hash = hash_token(&token);

        assert!(store.remove(&hash).unwrap());
        assert!(!store.remove(&hash).unwrap());
        assert!(store.authenticate(&token).unwrap().is_none());
        assert!(store.with_workspace(&hash, |_| ()).unwrap().is_none());
    }

    #[test]
    fn creating_a_session_purges_stale_ones() {
        let store = store();
        store.create(Uuid::new_v4(), "old").unwrap();
        store.create_at(Uuid::new_v4(), "new", later(4000)).unwrap();
        assert_eq!(store.active_count().unwrap(), 1);
    }
}
