/// End-to-end quiz flows through the session workflow
/// Gemini is mocked with wiremock; CRM events are read back from the queue journal
use led_quiz_api::config::Config;
use led_quiz_api::crm::{events, CrmQueue};
use led_quiz_api::entry::EntryParams;
use led_quiz_api::errors::AppError;
use led_quiz_api::forms::{ContactForm, EmailCaptureForm, ProfileForm};
use led_quiz_api::funnel;
use led_quiz_api::guide::{
    BuyersGuide, NavigateRequest, NavigationOutcome, EXPORT_FILENAME_FALLBACK,
};
use led_quiz_api::handlers::AppState;
use led_quiz_api::insights::INSIGHTS_ERROR_MESSAGE;
use led_quiz_api::models::{
    AnswerRequest, Destination, LeadStatus, LifecycleStage, Sector, UserData,
};
use led_quiz_api::quiz::{AnswerOutcome, FormKind};
use led_quiz_api::session::Stage;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(gemini_base_url: String, gemini_api_key: Option<&str>) -> Config {
    Config {
        port: 3000,
        gemini_api_key: gemini_api_key.map(str::to_string),
        gemini_model: "test-model".to_string(),
        gemini_base_url,
        hubspot_token: None,
        hubspot_base_url: "http://127.0.0.1:9".to_string(),
        session_ttl_secs: 60,
    }
}

fn create_test_state(config: Config) -> AppState {
    let (crm, _rx) = CrmQueue::new();
    AppState::new(config, crm)
}

async fn mount_insights(server: &MockServer) {
    let insights = serde_json::json!({
        "summary": "You are ready to move.",
        "actionable_steps": ["Walk the room", "Confirm budget", "Book a consult"]
    });
    let body = serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": insights.to_string() }] }
        }]
    });

    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .and(header("x-goog-api-key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(server)
        .await;
}

async fn new_session(state: &AppState, sector: Sector) -> String {
    let started = funnel::start_session(state, EntryParams::default()).await;
    let id = started.session.session_id;
    funnel::choose_sector(state, &id, sector).await.unwrap();
    id
}

fn answer(index: usize, value: &str) -> AnswerRequest {
    AnswerRequest {
        question_index: index,
        value: value.to_string(),
    }
}

/// Answers all five questions, completing the transition before the last one.
async fn answer_all(state: &AppState, id: &str, values: [&str; 5]) -> AnswerOutcome {
    for (index, value) in values.iter().take(4).enumerate() {
        funnel::record_answer(state, id, answer(index, value))
            .await
            .unwrap();
    }
    funnel::finish_transition(state, id).await.unwrap();
    funnel::record_answer(state, id, answer(4, values[4]))
        .await
        .unwrap()
        .outcome
}

#[tokio::test]
async fn test_top_answers_route_to_contact_and_confirmation() {
    let mock_server = MockServer::start().await;
    mount_insights(&mock_server).await;
    let state = create_test_state(create_test_config(mock_server.uri(), Some("test_key")));
    let id = new_session(&state, Sector::HouseOfWorship).await;

    let outcome = answer_all(
        &state,
        &id,
        ["9-10", "1000+", "yes_now", "urgent_problem", "committed"],
    )
    .await;
    assert_eq!(
        outcome,
        AnswerOutcome::Completed {
            form: FormKind::Contact
        }
    );

    let form = ContactForm {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: "Grace@Example.org".into(),
        phone: "(415) 555-0134".into(),
        organization: "First Community Church".into(),
        ..Default::default()
    };
    let result = funnel::submit_contact_form(&state, &id, form).await.unwrap();

    assert_eq!(result.score, 20);
    assert_eq!(result.max_score, 20);
    assert_eq!(result.score_percentage, 100);
    assert_eq!(result.lead_status, LeadStatus::Hot);
    assert_eq!(result.destination, Destination::Confirmation);
    assert_eq!(result.answers.len(), 5);
    assert_eq!(result.user_data.email.as_deref(), Some("grace@example.org"));
    assert_eq!(
        result.user_data.lifecycle_stage,
        Some(LifecycleStage::SalesQualifiedLead)
    );
    assert_eq!(result.user_data.timeline.as_deref(), Some("0-3 months"));

    let insights = result.insights.expect("insights should be present");
    assert_eq!(insights.actionable_steps.len(), 3);
    assert!(result.insights_error.is_none());

    let snapshot = funnel::snapshot(&state, &id).await.unwrap();
    assert_eq!(snapshot.stage, Stage::Confirmation);
    assert!(snapshot.has_result);

    assert_eq!(
        state.crm.event_names_for(&id),
        vec![
            events::SECTOR_SELECTED,
            events::QUESTION_ANSWERED,
            events::QUESTION_ANSWERED,
            events::QUESTION_ANSWERED,
            events::QUESTION_ANSWERED,
            events::QUESTION_ANSWERED,
            events::QUIZ_COMPLETED,
            events::FORM_SHOWN,
            events::FORM_SUBMITTED,
        ]
    );
}

#[tokio::test]
async fn test_exploring_lead_gets_guide_without_insights() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = new_session(&state, Sector::Venue).await;

    let outcome = answer_all(
        &state,
        &id,
        ["4-6", "200-499", "raising_funds", "curious", "exploring"],
    )
    .await;
    assert_eq!(
        outcome,
        AnswerOutcome::Completed {
            form: FormKind::EmailCapture
        }
    );

    // Wrong form for this route
    let wrong = funnel::submit_contact_form(&state, &id, ContactForm::default()).await;
    assert!(matches!(wrong, Err(AppError::Conflict(_))));

    let result = funnel::submit_email_capture(
        &state,
        &id,
        EmailCaptureForm {
            first_name: "Sam".into(),
            email: "sam@arena.example".into(),
        },
    )
    .await
    .unwrap();

    assert_eq!(result.score, 8);
    assert_eq!(result.lead_status, LeadStatus::Warm);
    assert_eq!(result.destination, Destination::BuyersGuide);
    assert!(result.insights.is_none());
    assert_eq!(result.insights_error.as_deref(), Some(INSIGHTS_ERROR_MESSAGE));

    let guide = funnel::guide_view(&state, &id).await.unwrap();
    assert_eq!(guide.active_section, 1);
    assert!(guide.profile_complete);

    let moved = funnel::navigate_guide(&state, &id, NavigateRequest::Section { section: 2 })
        .await
        .unwrap();
    assert_eq!(moved.outcome, NavigationOutcome::Moved { section: 2 });
    assert_eq!(moved.guide.completed_sections, vec![1]);

    let download = funnel::record_summary_download(&state, &id).await.unwrap();
    assert_eq!(download.filename, EXPORT_FILENAME_FALLBACK);

    let names = state.crm.event_names_for(&id);
    assert!(names.iter().any(|n| n == events::PDF_DOWNLOADED));
    assert_eq!(
        names.iter().filter(|n| *n == events::SECTION_VIEWED).count(),
        2
    );
}

#[tokio::test]
async fn test_high_intent_ready_to_talk_routes_to_contact() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = new_session(&state, Sector::Venue).await;

    let outcome = answer_all(
        &state,
        &id,
        ["1-3", "under-200", "not_yet", "curious", "ready_to_talk"],
    )
    .await;

    assert_eq!(
        outcome,
        AnswerOutcome::Completed {
            form: FormKind::Contact
        }
    );
    let snapshot = funnel::snapshot(&state, &id).await.unwrap();
    assert_eq!(
        snapshot.user_data.lead_status,
        Some(LeadStatus::Warm),
        "classification is attached before the form"
    );
    assert_eq!(
        snapshot.user_data.lifecycle_stage,
        Some(LifecycleStage::MarketingQualifiedLead)
    );
}

#[tokio::test]
async fn test_final_answer_waits_for_transition() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = new_session(&state, Sector::HouseOfWorship).await;

    for (index, value) in ["7-8", "500-999", "yes_next_year"].iter().enumerate() {
        let response = funnel::record_answer(&state, &id, answer(index, value))
            .await
            .unwrap();
        assert!(matches!(response.outcome, AnswerOutcome::Advanced { .. }));
    }
    let response = funnel::record_answer(&state, &id, answer(3, "planned_upgrade"))
        .await
        .unwrap();
    assert!(matches!(
        response.outcome,
        AnswerOutcome::Transitioning { next: 4, .. }
    ));

    let early = funnel::record_answer(&state, &id, answer(4, "committed")).await;
    assert!(matches!(early, Err(AppError::Conflict(_))));

    funnel::finish_transition(&state, &id).await.unwrap();
    let unknown = funnel::record_answer(&state, &id, answer(4, "maybe")).await;
    assert!(matches!(unknown, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_answer_requires_sector() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let started = funnel::start_session(&state, EntryParams::default()).await;
    assert!(!started.entry.skip_landing);

    let result =
        funnel::record_answer(&state, &started.session.session_id, answer(0, "9-10")).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_landing_url_preselects_sector() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let started = funnel::start_session(
        &state,
        EntryParams {
            landing_url: Some("https://example.com/?utm_campaign=hospitality_q3".into()),
            ..Default::default()
        },
    )
    .await;

    assert!(started.entry.skip_landing);
    assert_eq!(started.session.sector, Some(Sector::Venue));
    assert_eq!(started.session.stage, Stage::Quiz);
    assert_eq!(
        state.crm.event_names_for(&started.session.session_id),
        vec![events::SECTOR_SELECTED]
    );
}

#[tokio::test]
async fn test_invalid_contact_form_reports_every_field() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = new_session(&state, Sector::HouseOfWorship).await;
    answer_all(
        &state,
        &id,
        ["9-10", "1000+", "yes_now", "new_build", "committed"],
    )
    .await;

    let result = funnel::submit_contact_form(
        &state,
        &id,
        ContactForm {
            email: "not-an-email".into(),
            phone: "12345".into(),
            ..Default::default()
        },
    )
    .await;

    match result {
        Err(AppError::Validation(errors)) => {
            for field in ["first_name", "last_name", "email", "phone", "organization"] {
                assert!(errors.get(field).is_some(), "missing error for {}", field);
            }
        }
        other => panic!("expected validation error, got {:?}", other.map(|r| r.score)),
    }

    // Still waiting on the form
    let snapshot = funnel::snapshot(&state, &id).await.unwrap();
    assert_eq!(snapshot.stage, Stage::Quiz);
    assert!(!snapshot.has_result);
}

#[tokio::test]
async fn test_reset_clears_session() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = new_session(&state, Sector::Venue).await;
    funnel::record_answer(&state, &id, answer(0, "9-10"))
        .await
        .unwrap();

    let fresh = funnel::reset_session(&state, &id).await.unwrap();

    assert_ne!(fresh.session_id, id);
    assert_eq!(fresh.stage, Stage::Landing);
    assert!(fresh.answers.is_empty());
    assert!(matches!(
        funnel::snapshot(&state, &id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(state
        .crm
        .event_names_for(&id)
        .iter()
        .any(|n| n == events::SESSION_RESET));
}

/// Runs the exploring route up to an open buyer's guide.
async fn open_guide(state: &AppState, sector: Sector) -> String {
    let id = new_session(state, sector).await;
    answer_all(
        state,
        &id,
        ["4-6", "200-499", "raising_funds", "curious", "exploring"],
    )
    .await;
    funnel::submit_email_capture(
        state,
        &id,
        EmailCaptureForm {
            first_name: "Sam".into(),
            email: "sam@arena.example".into(),
        },
    )
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn test_finished_session_cannot_reenter_quiz() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = open_guide(&state, Sector::Venue).await;
    funnel::navigate_guide(&state, &id, NavigateRequest::Section { section: 4 })
        .await
        .unwrap();

    let snapshot = funnel::choose_sector(&state, &id, Sector::Venue)
        .await
        .unwrap();
    assert_eq!(snapshot.stage, Stage::BuyersGuide);

    let guide = funnel::guide_view(&state, &id).await.unwrap();
    assert_eq!(guide.active_section, 4);
    assert_eq!(guide.completed_sections, vec![1]);

    let again = funnel::submit_email_capture(
        &state,
        &id,
        EmailCaptureForm {
            first_name: "Sam".into(),
            email: "sam@arena.example".into(),
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(
        state
            .crm
            .event_names_for(&id)
            .iter()
            .filter(|n| *n == events::FORM_SUBMITTED)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_profile_gate_through_session() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = open_guide(&state, Sector::HouseOfWorship).await;

    // Guide opened for a lead without an email
    {
        let shared = state.sessions.get(&id).await.unwrap();
        let mut session = shared.lock().await;
        session.guide = Some(BuyersGuide::new(UserData {
            first_name: Some("Sam".into()),
            ..Default::default()
        }));
    }

    let gated = funnel::navigate_guide(&state, &id, NavigateRequest::Section { section: 2 })
        .await
        .unwrap();
    assert_eq!(
        gated.outcome,
        NavigationOutcome::ProfileRequired { requested: 2 }
    );
    assert_eq!(gated.guide.active_section, 1);
    assert!(matches!(
        funnel::guide_section(&state, &id, 2).await,
        Err(AppError::Conflict(_))
    ));

    let profile = funnel::submit_profile(
        &state,
        &id,
        ProfileForm {
            city: "Austin".into(),
            state: "TX".into(),
            email: "sam@grace.example".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(profile.moved_to, Some(2));
    assert_eq!(profile.guide.active_section, 2);
    assert!(profile.guide.profile_complete);

    let snapshot = funnel::snapshot(&state, &id).await.unwrap();
    assert_eq!(snapshot.user_data.city.as_deref(), Some("Austin"));
    assert_eq!(snapshot.user_data.state.as_deref(), Some("TX"));

    let names = state.crm.event_names_for(&id);
    assert!(names.iter().any(|n| n == events::PROFILE_GATE_SHOWN));
    assert!(names.iter().any(|n| n == events::PROFILE_COMPLETED));
}

#[tokio::test]
async fn test_revisiting_active_section_is_not_tracked() {
    let state = create_test_state(create_test_config("http://127.0.0.1:9".into(), None));
    let id = open_guide(&state, Sector::Venue).await;

    let stay = funnel::navigate_guide(&state, &id, NavigateRequest::Section { section: 1 })
        .await
        .unwrap();

    assert_eq!(stay.outcome, NavigationOutcome::Unchanged { section: 1 });
    assert_eq!(
        state
            .crm
            .event_names_for(&id)
            .iter()
            .filter(|n| *n == events::SECTION_VIEWED)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_insights_without_steps_are_omitted_from_result() {
    let mock_server = MockServer::start().await;
    let body = serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": r#"{"summary":"x"}"# }] }
        }]
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = create_test_state(create_test_config(mock_server.uri(), Some("test_key")));
    let id = new_session(&state, Sector::Venue).await;
    answer_all(
        &state,
        &id,
        ["7-8", "500-999", "yes_next_year", "planned_upgrade", "committed"],
    )
    .await;

    let result = funnel::submit_contact_form(
        &state,
        &id,
        ContactForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@venue.example".into(),
            phone: "303-555-0199".into(),
            organization: "Blue Note Hall".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(result.destination, Destination::Confirmation);
    assert!(result.insights.is_none());
    assert_eq!(result.insights_error.as_deref(), Some(INSIGHTS_ERROR_MESSAGE));
}
