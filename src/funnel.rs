/// Session workflow shared by the HTTP handlers.
///
/// Each operation locks one session, applies the domain transition and
/// queues the matching CRM calls:
/// 1. Entry routing and sector selection
/// 2. Quiz answers, classification on completion
/// 3. Lead-capture form submission, insight generation, result
/// 4. Buyer's guide navigation, progressive profile, summary export
use serde::Serialize;
use serde_json::json;

use crate::crm::events;
use crate::entry::{self, EntryDecision, EntryParams};
use crate::errors::AppError;
use crate::forms::{ContactForm, EmailCaptureForm, ProfileForm, Validate};
use crate::guide::{
    BuyersGuide, GuideError, GuideSummary, GuideView, NavigateRequest, NavigationOutcome,
    SectionContent,
};
use crate::handlers::AppState;
use crate::insights::InsightRequest;
use crate::models::{AnswerRequest, Destination, QuizResult, Sector, UserData};
use crate::questions::{self, BUDGET_QUESTION};
use crate::quiz::{AnswerOutcome, FormKind, QuizError};
use crate::scoring;
use crate::session::{PreferencesUpdate, QuizSession, SessionSnapshot, Stage};

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub entry: EntryDecision,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub outcome: AnswerOutcome,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    #[serde(flatten)]
    pub outcome: NavigationOutcome,
    pub guide: GuideView,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub moved_to: Option<u8>,
    pub guide: GuideView,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: GuideSummary,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub filename: String,
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::UnknownOption { .. } => AppError::BadRequest(err.to_string()),
            _ => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<GuideError> for AppError {
    fn from(err: GuideError) -> Self {
        match err {
            GuideError::UnknownSection(_) => AppError::NotFound(err.to_string()),
            GuideError::Validation(errors) => AppError::Validation(errors),
            _ => AppError::Conflict(err.to_string()),
        }
    }
}

/// Creates a session and applies URL-driven sector detection.
pub async fn start_session(state: &AppState, params: EntryParams) -> StartResponse {
    let params = params.resolved();
    let decision = entry::route_entry(&params);

    let shared = state.sessions.create().await;
    let mut session = shared.lock().await;

    if let Some(sector) = decision.sector {
        // A fresh session always accepts a sector.
        if session.select_sector(sector).is_ok() {
            tracing::info!("Session {} entered quiz directly as {}", session.id, sector);
            state.crm.track(
                &session.id,
                events::SECTOR_SELECTED,
                json!({ "sector": sector.as_str(), "source": "url" }),
            );
        }
    }

    StartResponse {
        entry: decision,
        session: session.snapshot(),
    }
}

pub async fn snapshot(state: &AppState, id: &str) -> Result<SessionSnapshot, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    Ok(session.snapshot())
}

pub async fn choose_sector(
    state: &AppState,
    id: &str,
    sector: Sector,
) -> Result<SessionSnapshot, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;

    let changed = session.sector != Some(sector);
    session.select_sector(sector)?;
    if changed {
        state.crm.track(
            id,
            events::SECTOR_SELECTED,
            json!({ "sector": sector.as_str(), "source": "landing" }),
        );
    }

    Ok(session.snapshot())
}

pub async fn update_preferences(
    state: &AppState,
    id: &str,
    update: PreferencesUpdate,
) -> Result<SessionSnapshot, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;
    session.apply_preferences(update);
    Ok(session.snapshot())
}

pub async fn record_answer(
    state: &AppState,
    id: &str,
    request: AnswerRequest,
) -> Result<AnswerResponse, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;

    session.require_sector()?;
    if session.stage != Stage::Quiz {
        return Err(AppError::Conflict("quiz is not in progress".to_string()));
    }

    let outcome = session.quiz.answer(request.question_index, &request.value)?;
    let question = &questions::all()[request.question_index];
    let points = session
        .quiz
        .answers()
        .get(&request.question_index)
        .map(|a| a.points)
        .unwrap_or(0);

    tracing::debug!(
        "Session {} answered Q{} = {} ({} pts)",
        id,
        request.question_index,
        request.value,
        points
    );
    state.crm.track(
        id,
        events::QUESTION_ANSWERED,
        json!({
            "question_index": request.question_index,
            "category": question.category,
            "value": request.value,
            "points": points,
        }),
    );

    if let AnswerOutcome::Completed { form } = outcome {
        annotate_classification(&mut session);
        let score = session.user_data.assessment_score.unwrap_or(0);
        let status = session.user_data.lead_status;

        tracing::info!(
            "Session {} completed quiz: score {} ({:?}), showing {} form",
            id,
            score,
            status,
            form.as_str()
        );
        state.crm.upsert_contact(id, &session.user_data);
        state.crm.track(
            id,
            events::QUIZ_COMPLETED,
            json!({ "score": score, "lead_status": status }),
        );
        state
            .crm
            .track(id, events::FORM_SHOWN, json!({ "form": form.as_str() }));
    }

    Ok(AnswerResponse {
        outcome,
        session: session.snapshot(),
    })
}

/// Attaches score, lead status, lifecycle stage and timeline to the lead.
fn annotate_classification(session: &mut QuizSession) {
    let answers = session.quiz.answers();
    let score = scoring::total_score(answers);
    let status = scoring::classify(score);
    let timeline = answers
        .get(&BUDGET_QUESTION)
        .and_then(|a| questions::timeline_for(&a.value))
        .map(str::to_string);

    session.user_data.merge(UserData {
        assessment_score: Some(score),
        lead_status: Some(status),
        lifecycle_stage: Some(scoring::lifecycle_stage(status)),
        timeline,
        ..Default::default()
    });
}

pub async fn finish_transition(state: &AppState, id: &str) -> Result<SessionSnapshot, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;
    session.quiz.complete_transition()?;
    Ok(session.snapshot())
}

fn require_pending_form(session: &QuizSession, expected: FormKind) -> Result<(), AppError> {
    match session.pending_form() {
        Some(form) if form == expected => Ok(()),
        Some(form) => Err(AppError::Conflict(format!(
            "the {} form is pending, not {}",
            form.as_str(),
            expected.as_str()
        ))),
        None => Err(AppError::Conflict(
            "no lead-capture form is pending".to_string(),
        )),
    }
}

pub async fn submit_contact_form(
    state: &AppState,
    id: &str,
    form: ContactForm,
) -> Result<QuizResult, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;

    require_pending_form(&session, FormKind::Contact)?;
    form.validate()?;
    finish_quiz(state, &mut session, FormKind::Contact, form.into_user_data()).await
}

pub async fn submit_email_capture(
    state: &AppState,
    id: &str,
    form: EmailCaptureForm,
) -> Result<QuizResult, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;

    require_pending_form(&session, FormKind::EmailCapture)?;
    form.validate()?;
    finish_quiz(
        state,
        &mut session,
        FormKind::EmailCapture,
        form.into_user_data(),
    )
    .await
}

/// Builds the terminal result. Insight failures never block it.
async fn finish_quiz(
    state: &AppState,
    session: &mut QuizSession,
    form: FormKind,
    form_data: UserData,
) -> Result<QuizResult, AppError> {
    if session.result.is_some() {
        return Err(AppError::Conflict("quiz result already recorded".to_string()));
    }
    let sector = session.require_sector()?;
    session.user_data.merge(form_data);

    let questions = session.quiz.questions();
    let answers = session.quiz.answers().clone();
    let score = scoring::total_score(&answers);
    let max_score = scoring::max_score(questions);
    let lead_status = scoring::classify(score);

    let insight = state
        .insights
        .generate(InsightRequest {
            sector,
            score,
            max_score,
            questions,
            answers: &answers,
        })
        .await;

    let destination = match form {
        FormKind::Contact => Destination::Confirmation,
        FormKind::EmailCapture => Destination::BuyersGuide,
    };

    let result = QuizResult {
        user_data: session.user_data.clone(),
        lead_status,
        score,
        max_score,
        score_percentage: scoring::score_percentage(score, max_score),
        category_breakdown: scoring::category_breakdown(questions, &answers),
        answers,
        insights: insight.insights,
        insights_error: insight.error,
        destination,
        completed_at: chrono::Utc::now(),
    };

    session.result = Some(result.clone());
    session.stage = match destination {
        Destination::Confirmation => Stage::Confirmation,
        Destination::BuyersGuide => Stage::BuyersGuide,
    };

    state.crm.upsert_contact(&session.id, &session.user_data);
    state.crm.track(
        &session.id,
        events::FORM_SUBMITTED,
        json!({
            "form": form.as_str(),
            "score": score,
            "lead_status": lead_status,
            "insights": result.insights.is_some(),
        }),
    );

    if destination == Destination::BuyersGuide {
        session.guide = Some(BuyersGuide::new(session.user_data.clone()));
        state
            .crm
            .track(&session.id, events::SECTION_VIEWED, json!({ "section": 1 }));
    }

    tracing::info!(
        "Session {} finished: {} lead, {}/{}, destination {:?}",
        session.id,
        lead_status,
        score,
        max_score,
        destination
    );

    Ok(result)
}

pub async fn result(state: &AppState, id: &str) -> Result<QuizResult, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    session.result().cloned()
}

pub async fn guide_view(state: &AppState, id: &str) -> Result<GuideView, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    Ok(session.guide()?.view())
}

pub async fn guide_section(
    state: &AppState,
    id: &str,
    number: u8,
) -> Result<SectionContent, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    let sector = session.require_sector()?;
    Ok(session.guide()?.content(number, sector)?)
}

pub async fn navigate_guide(
    state: &AppState,
    id: &str,
    request: NavigateRequest,
) -> Result<NavigationResponse, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;
    let guide = session.guide_mut()?;

    let outcome = guide.apply(request)?;
    match outcome {
        NavigationOutcome::Moved { section } => {
            state
                .crm
                .track(id, events::SECTION_VIEWED, json!({ "section": section }));
        }
        NavigationOutcome::Unchanged { .. } => {}
        NavigationOutcome::ProfileRequired { requested } => {
            state.crm.track(
                id,
                events::PROFILE_GATE_SHOWN,
                json!({ "requested_section": requested }),
            );
        }
    }

    Ok(NavigationResponse {
        outcome,
        guide: guide.view(),
    })
}

pub async fn submit_profile(
    state: &AppState,
    id: &str,
    form: ProfileForm,
) -> Result<ProfileResponse, AppError> {
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;
    let guide = session.guide_mut()?;

    let moved_to = guide.submit_profile(form)?;
    let working = guide.user_data().clone();
    let view = guide.view();

    state.crm.upsert_contact(id, &working);
    state.crm.track(id, events::PROFILE_COMPLETED, json!({}));
    if let Some(section) = moved_to {
        state
            .crm
            .track(id, events::SECTION_VIEWED, json!({ "section": section }));
    }
    session.user_data.merge(working);

    Ok(ProfileResponse {
        moved_to,
        guide: view,
    })
}

pub async fn guide_summary(state: &AppState, id: &str) -> Result<SummaryResponse, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;

    let summary = GuideSummary::build(session.result()?, session.guide()?, session.require_sector()?);
    let text = summary.render_text();
    Ok(SummaryResponse { summary, text })
}

pub async fn record_summary_download(
    state: &AppState,
    id: &str,
) -> Result<DownloadResponse, AppError> {
    let summary = guide_summary(state, id).await?.summary;

    state.crm.track(
        id,
        events::PDF_DOWNLOADED,
        json!({ "filename": summary.export_filename }),
    );

    Ok(DownloadResponse {
        filename: summary.export_filename,
    })
}

/// Clears the session and starts a fresh one with a new id.
pub async fn reset_session(state: &AppState, id: &str) -> Result<SessionSnapshot, AppError> {
    state.sessions.get(id).await?;
    state.sessions.remove(id).await;
    state.crm.track(id, events::SESSION_RESET, json!({}));

    let shared = state.sessions.create().await;
    let session = shared.lock().await;
    tracing::info!("Session {} reset, new session {}", id, session.id);
    Ok(session.snapshot())
}
