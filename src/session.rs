//! Per-visitor session context and the in-memory store holding it.
//!
//! A session is created on first load and cleared on explicit reset or
//! after the configured idle TTL. Nothing is persisted beyond the process.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::guide::{BuyersGuide, GuideView};
use crate::models::{AnswerMap, QuizResult, Sector, UserData};
use crate::questions::{self, QuestionView};
use crate::quiz::{FormKind, QuizMachine, QuizStep};

/// Opaque id: creation timestamp plus a random suffix.
pub fn generate_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub cookie_consent: bool,
}

/// Partial preference update; absent fields keep their value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub theme: Option<Theme>,
    pub cookie_consent: Option<bool>,
}

/// Which screen the visitor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Landing,
    Quiz,
    Confirmation,
    BuyersGuide,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub preferences: Preferences,
    pub sector: Option<Sector>,
    pub stage: Stage,
    pub quiz: QuizMachine,
    pub user_data: UserData,
    pub result: Option<QuizResult>,
    pub guide: Option<BuyersGuide>,
}

impl QuizSession {
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            preferences: Preferences::default(),
            sector: None,
            stage: Stage::Landing,
            quiz: QuizMachine::new(questions::all()),
            user_data: UserData::default(),
            result: None,
            guide: None,
        }
    }

    /// Chooses the sector and enters the quiz. The sector is fixed once the
    /// first answer is recorded.
    pub fn select_sector(&mut self, sector: Sector) -> Result<(), AppError> {
        if self.sector == Some(sector) {
            if self.stage == Stage::Landing {
                self.stage = Stage::Quiz;
            }
            return Ok(());
        }
        let started =
            !self.quiz.answers().is_empty() || !matches!(self.stage, Stage::Landing | Stage::Quiz);
        if started {
            return Err(AppError::Conflict(
                "sector cannot change once the quiz has started".to_string(),
            ));
        }

        self.sector = Some(sector);
        self.stage = Stage::Quiz;
        Ok(())
    }

    pub fn require_sector(&self) -> Result<Sector, AppError> {
        self.sector
            .ok_or_else(|| AppError::Conflict("choose a sector first".to_string()))
    }

    pub fn apply_preferences(&mut self, update: PreferencesUpdate) {
        if let Some(theme) = update.theme {
            self.preferences.theme = theme;
        }
        if let Some(consent) = update.cookie_consent {
            self.preferences.cookie_consent = consent;
        }
    }

    pub fn pending_form(&self) -> Option<FormKind> {
        match self.stage {
            Stage::Quiz => self.quiz.pending_form(),
            _ => None,
        }
    }

    pub fn result(&self) -> Result<&QuizResult, AppError> {
        self.result
            .as_ref()
            .ok_or_else(|| AppError::Conflict("quiz has no result yet".to_string()))
    }

    pub fn guide_mut(&mut self) -> Result<&mut BuyersGuide, AppError> {
        self.guide
            .as_mut()
            .ok_or_else(|| AppError::Conflict("buyer's guide is not open".to_string()))
    }

    pub fn guide(&self) -> Result<&BuyersGuide, AppError> {
        self.guide
            .as_ref()
            .ok_or_else(|| AppError::Conflict("buyer's guide is not open".to_string()))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let quiz = self.quiz.questions();
        let current_question = match (self.sector, self.stage, self.quiz.current_index()) {
            (Some(sector), Stage::Quiz, Some(index)) => Some(QuestionView::render(
                index,
                &quiz[index],
                quiz.len(),
                sector,
            )),
            _ => None,
        };

        SessionSnapshot {
            session_id: self.id.clone(),
            created_at: self.created_at,
            preferences: self.preferences,
            sector: self.sector,
            stage: self.stage,
            quiz_step: (self.stage == Stage::Quiz).then(|| self.quiz.step()),
            current_question,
            question_count: quiz.len(),
            answers: self.quiz.answers().clone(),
            user_data: self.user_data.clone(),
            has_result: self.result.is_some(),
            guide: self.guide.as_ref().map(BuyersGuide::view),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub preferences: Preferences,
    pub sector: Option<Sector>,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_step: Option<QuizStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionView>,
    pub question_count: usize,
    pub answers: AnswerMap,
    pub user_data: UserData,
    pub has_result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide: Option<GuideView>,
}

pub type SharedSession = Arc<Mutex<QuizSession>>;

/// In-memory session store with idle expiry.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, SharedSession>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_idle(ttl)
                .max_capacity(100_000)
                .build(),
        }
    }

    pub async fn create(&self) -> SharedSession {
        let id = generate_session_id();
        let session = Arc::new(Mutex::new(QuizSession::new(id.clone())));
        self.cache.insert(id.clone(), session.clone()).await;
        tracing::debug!("Created session {}", id);
        session
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession, AppError> {
        self.cache
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }

    pub async fn remove(&self, id: &str) {
        self.cache.invalidate(id).await;
        tracing::debug!("Cleared session {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_sector_locked_after_first_answer() {
        let mut session = QuizSession::new("s".into());
        session.select_sector(Sector::Venue).unwrap();
        session.select_sector(Sector::HouseOfWorship).unwrap();
        session.quiz.answer(0, "7-8").unwrap();

        assert!(session.select_sector(Sector::Venue).is_err());
        assert!(session.select_sector(Sector::HouseOfWorship).is_ok());
        assert_eq!(session.sector, Some(Sector::HouseOfWorship));
    }

    #[test]
    fn test_reselecting_sector_keeps_later_stage() {
        let mut session = QuizSession::new("s".into());
        session.select_sector(Sector::Venue).unwrap();
        session.stage = Stage::BuyersGuide;

        session.select_sector(Sector::Venue).unwrap();
        assert_eq!(session.stage, Stage::BuyersGuide);
        assert_eq!(session.pending_form(), None);
        assert!(session.select_sector(Sector::HouseOfWorship).is_err());
    }

    #[test]
    fn test_snapshot_renders_current_question() {
        let mut session = QuizSession::new("s".into());
        assert!(session.snapshot().current_question.is_none());

        session.select_sector(Sector::HouseOfWorship).unwrap();
        let snapshot = session.snapshot();
        let question = snapshot.current_question.unwrap();
        assert_eq!(question.index, 0);
        assert_eq!(snapshot.stage, Stage::Quiz);
    }

    #[test]
    fn test_preferences_partial_update() {
        let mut session = QuizSession::new("s".into());
        session.apply_preferences(PreferencesUpdate {
            theme: Some(Theme::Dark),
            cookie_consent: None,
        });
        session.apply_preferences(PreferencesUpdate {
            theme: None,
            cookie_consent: Some(true),
        });

        assert_eq!(
            session.preferences,
            Preferences {
                theme: Theme::Dark,
                cookie_consent: true
            }
        );
    }

    #[tokio::test]
    async fn test_store_create_get_remove() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create().await;
        let id = session.lock().await.id.clone();

        assert!(store.get(&id).await.is_ok());
        store.remove(&id).await;
        assert!(matches!(store.get(&id).await, Err(AppError::NotFound(_))));
    }
}
