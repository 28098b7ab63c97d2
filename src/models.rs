use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============ Domain Models ============

/// Customer vertical driving copy and theming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    /// Churches and other houses of worship.
    #[serde(rename = "church")]
    HouseOfWorship,
    /// Venues, hospitality and general business.
    #[serde(rename = "venue")]
    Venue,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::HouseOfWorship => "church",
            Sector::Venue => "venue",
        }
    }

    /// Parses the canonical key (`church` / `venue`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "church" => Some(Sector::HouseOfWorship),
            "venue" => Some(Sector::Venue),
            _ => None,
        }
    }

    /// Human label used in prompts and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Sector::HouseOfWorship => "house of worship",
            Sector::Venue => "venue / business",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of copy with one variant per sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorText {
    pub church: &'static str,
    pub venue: &'static str,
}

impl SectorText {
    pub const fn same(text: &'static str) -> Self {
        Self {
            church: text,
            venue: text,
        }
    }

    pub fn get(&self, sector: Sector) -> &'static str {
        match sector {
            Sector::HouseOfWorship => self.church,
            Sector::Venue => self.venue,
        }
    }
}

/// A recorded answer: the chosen option tag and the points it carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub value: String,
    pub points: u32,
}

/// All answers recorded so far, keyed by question index.
pub type AnswerMap = BTreeMap<usize, Answer>;

/// Coarse sales-readiness classification derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Cold,
    Warm,
    Hot,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Cold => "cold",
            LeadStatus::Warm => "warm",
            LeadStatus::Hot => "hot",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRM lifecycle stage (HubSpot internal values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Lead,
    #[serde(rename = "marketingqualifiedlead")]
    MarketingQualifiedLead,
    #[serde(rename = "salesqualifiedlead")]
    SalesQualifiedLead,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Lead => "lead",
            LifecycleStage::MarketingQualifiedLead => "marketingqualifiedlead",
            LifecycleStage::SalesQualifiedLead => "salesqualifiedlead",
        }
    }
}

/// Contact record accumulated over the session.
///
/// Filled in stages: quiz classification first, then whichever lead-capture
/// form was completed, then optionally the buyer's guide profile form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_stage: Option<LifecycleStage>,
}

impl UserData {
    /// Overwrites fields with every `Some` value present in `newer`.
    pub fn merge(&mut self, newer: UserData) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.first_name, newer.first_name);
        take(&mut self.last_name, newer.last_name);
        take(&mut self.email, newer.email);
        take(&mut self.phone, newer.phone);
        take(&mut self.organization, newer.organization);
        take(&mut self.city, newer.city);
        take(&mut self.state, newer.state);
        take(&mut self.assessment_score, newer.assessment_score);
        take(&mut self.lead_status, newer.lead_status);
        take(&mut self.timeline, newer.timeline);
        take(&mut self.lifecycle_stage, newer.lifecycle_stage);
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Flattens the record into CRM contact properties.
    pub fn to_crm_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                props.insert(key.to_string(), v);
            }
        };

        put("firstname", self.first_name.as_ref().map(|v| json!(v)));
        put("lastname", self.last_name.as_ref().map(|v| json!(v)));
        put("email", self.email.as_ref().map(|v| json!(v)));
        put("phone", self.phone.as_ref().map(|v| json!(v)));
        put("company", self.organization.as_ref().map(|v| json!(v)));
        put("city", self.city.as_ref().map(|v| json!(v)));
        put("state", self.state.as_ref().map(|v| json!(v)));
        put("assessment_score", self.assessment_score.map(|v| json!(v)));
        put(
            "lead_temperature",
            self.lead_status.map(|v| json!(v.as_str())),
        );
        put("timeline", self.timeline.as_ref().map(|v| json!(v)));
        put(
            "lifecyclestage",
            self.lifecycle_stage.map(|v| json!(v.as_str())),
        );

        props
    }
}

/// AI-generated narrative: a summary plus exactly three action steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub actionable_steps: [String; 3],
}

/// Points earned in one question category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub points: u32,
    pub max_points: u32,
}

/// Which result screen the lead lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Confirmation,
    BuyersGuide,
}

/// Terminal aggregate built once the lead-capture form is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub user_data: UserData,
    pub lead_status: LeadStatus,
    pub score: u32,
    pub max_score: u32,
    pub score_percentage: u32,
    pub answers: AnswerMap,
    pub category_breakdown: Vec<CategoryScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
    /// Generic message shown when insights could not be generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights_error: Option<String>,
    pub destination: Destination,
    pub completed_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request payload for answering a question.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_index: usize,
    pub value: String,
}

/// Request payload for choosing a sector on the landing page.
#[derive(Debug, Deserialize)]
pub struct SectorRequest {
    pub sector: Sector,
}

/// Query parameters for rendering the question bank.
#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub sector: Option<String>,
}
