use crate::config::Config;
use crate::crm::CrmQueue;
use crate::entry::EntryParams;
use crate::errors::AppError;
use crate::forms::{ContactForm, EmailCaptureForm, ProfileForm};
use crate::funnel::{
    self, AnswerResponse, DownloadResponse, NavigationResponse, ProfileResponse, StartResponse,
    SummaryResponse,
};
use crate::guide::{GuideView, NavigateRequest, SectionContent};
use crate::insights::InsightService;
use crate::models::{AnswerRequest, QuestionsQuery, QuizResult, Sector, SectorRequest};
use crate::questions::{self, QuestionView};
use crate::session::{PreferencesUpdate, SessionSnapshot, SessionStore};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Live quiz sessions, expired after `session_ttl_secs` of inactivity.
    pub sessions: SessionStore,
    /// Outbound CRM queue; the dispatcher owns the receiving end.
    pub crm: CrmQueue,
    /// AI insight generation (degrades to a generic message without a key).
    pub insights: InsightService,
}

impl AppState {
    pub fn new(config: Config, crm: CrmQueue) -> Self {
        Self {
            sessions: SessionStore::new(Duration::from_secs(config.session_ttl_secs)),
            insights: InsightService::new(&config),
            crm,
            config,
        }
    }
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "led-quiz-api",
            "version": env!("CARGO_PKG_VERSION"),
            "insights_configured": state.insights.is_configured(),
            "crm_configured": state.config.hubspot_token.is_some()
        })),
    )
}

/// GET /api/v1/questions?sector=church|venue
///
/// Renders the question bank with sector-specific wording.
pub async fn list_questions(
    Query(params): Query<QuestionsQuery>,
) -> Result<Json<Vec<QuestionView>>, AppError> {
    let key = params
        .sector
        .ok_or_else(|| AppError::BadRequest("sector query parameter is required".to_string()))?;
    let sector = Sector::from_key(&key)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown sector: {}", key)))?;

    Ok(Json(questions::render_all(sector)))
}

/// POST /api/v1/sessions
///
/// Starts a session. The optional body carries the landing URL parameters
/// used to pre-select a sector.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<EntryParams>>,
) -> (StatusCode, Json<StartResponse>) {
    let params = body.map(|Json(p)| p).unwrap_or_default();
    tracing::info!("POST /sessions - entry params: {:?}", params);

    let response = funnel::start_session(&state, params).await;
    (StatusCode::CREATED, Json(response))
}

/// GET /api/v1/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(funnel::snapshot(&state, &id).await?))
}

/// DELETE /api/v1/sessions/:id
///
/// Clears everything about the session and returns a fresh one.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    tracing::info!("DELETE /sessions/{}", id);
    let fresh = funnel::reset_session(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(fresh)))
}

/// PUT /api/v1/sessions/:id/sector
pub async fn select_sector(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SectorRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    tracing::info!("PUT /sessions/{}/sector - {}", id, payload.sector);
    Ok(Json(funnel::choose_sector(&state, &id, payload.sector).await?))
}

/// PUT /api/v1/sessions/:id/preferences
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<PreferencesUpdate>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(funnel::update_preferences(&state, &id, payload).await?))
}

/// POST /api/v1/sessions/:id/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    Ok(Json(funnel::record_answer(&state, &id, payload).await?))
}

/// POST /api/v1/sessions/:id/transition
///
/// Called once the transitional message has been shown.
pub async fn complete_transition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(funnel::finish_transition(&state, &id).await?))
}

/// POST /api/v1/sessions/:id/contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(form): Json<ContactForm>,
) -> Result<Json<QuizResult>, AppError> {
    tracing::info!("POST /sessions/{}/contact", id);
    Ok(Json(funnel::submit_contact_form(&state, &id, form).await?))
}

/// POST /api/v1/sessions/:id/email-capture
pub async fn submit_email_capture(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(form): Json<EmailCaptureForm>,
) -> Result<Json<QuizResult>, AppError> {
    tracing::info!("POST /sessions/{}/email-capture", id);
    Ok(Json(funnel::submit_email_capture(&state, &id, form).await?))
}

/// GET /api/v1/sessions/:id/result
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<QuizResult>, AppError> {
    Ok(Json(funnel::result(&state, &id).await?))
}

/// GET /api/v1/sessions/:id/guide
pub async fn get_guide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GuideView>, AppError> {
    Ok(Json(funnel::guide_view(&state, &id).await?))
}

/// GET /api/v1/sessions/:id/guide/sections/:number
///
/// Gated sections return 409 until the profile is complete.
pub async fn get_guide_section(
    State(state): State<Arc<AppState>>,
    Path((id, number)): Path<(String, u8)>,
) -> Result<Json<SectionContent>, AppError> {
    Ok(Json(funnel::guide_section(&state, &id, number).await?))
}

/// POST /api/v1/sessions/:id/guide/navigate
pub async fn navigate_guide(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<NavigationResponse>, AppError> {
    Ok(Json(funnel::navigate_guide(&state, &id, request).await?))
}

/// POST /api/v1/sessions/:id/guide/profile
pub async fn submit_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<ProfileResponse>, AppError> {
    tracing::info!("POST /sessions/{}/guide/profile", id);
    Ok(Json(funnel::submit_profile(&state, &id, form).await?))
}

/// GET /api/v1/sessions/:id/guide/summary
pub async fn get_guide_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    Ok(Json(funnel::guide_summary(&state, &id).await?))
}

/// POST /api/v1/sessions/:id/guide/summary/download
///
/// Records the export and returns the filename the client should save as.
pub async fn download_guide_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    tracing::info!("POST /sessions/{}/guide/summary/download", id);
    Ok(Json(funnel::record_summary_download(&state, &id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_questions_requires_known_sector() {
        let missing = list_questions(Query(QuestionsQuery { sector: None })).await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        let unknown = list_questions(Query(QuestionsQuery {
            sector: Some("school".into()),
        }))
        .await;
        assert!(matches!(unknown, Err(AppError::BadRequest(_))));

        let Json(rendered) = list_questions(Query(QuestionsQuery {
            sector: Some("venue".into()),
        }))
        .await
        .unwrap();
        assert_eq!(rendered.len(), 5);
        assert!(rendered[4].is_final);
    }
}
