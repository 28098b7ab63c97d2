//! Buyer's guide pager.
//!
//! Six fixed sections fetched one at a time. Sections 2 and 3 are gated on
//! a complete profile: navigating there without an email on file parks the
//! request and asks for the progressive profile form, whose submission
//! resumes the parked navigation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::forms::{FieldErrors, ProfileForm, Validate};
use crate::models::{CategoryScore, Insights, LeadStatus, QuizResult, Sector, SectorText, UserData};

pub const SECTION_COUNT: u8 = 6;
pub const GATED_SECTIONS: [u8; 2] = [2, 3];
pub const EXPORT_FILENAME_FALLBACK: &str = "LED-Buyers-Guide-Summary.pdf";

pub struct GuideSection {
    pub number: u8,
    pub slug: &'static str,
    pub title: &'static str,
    pub headline: SectorText,
    pub key_points: &'static [SectorText],
}

pub static SECTIONS: [GuideSection; 6] = [
    GuideSection {
        number: 1,
        slug: "welcome",
        title: "Your Assessment at a Glance",
        headline: SectorText {
            church: "Where your ministry stands today",
            venue: "Where your venue stands today",
        },
        key_points: &[
            SectorText::same("How your answers compare with similar organizations"),
            SectorText::same("What this guide covers and how to use it"),
        ],
    },
    GuideSection {
        number: 2,
        slug: "market-intelligence",
        title: "Market Intelligence",
        headline: SectorText {
            church: "How churches are adopting LED walls",
            venue: "How venues are monetizing LED displays",
        },
        key_points: &[
            SectorText::same("LED pricing has fallen steadily while brightness has climbed"),
            SectorText {
                church: "Projection struggles in rooms with daylight and high ceilings",
                venue: "Sponsor-ready screens pay for themselves in many venues",
            },
            SectorText::same("Fine-pitch panels now fit viewing distances under ten feet"),
        ],
    },
    GuideSection {
        number: 3,
        slug: "investment",
        title: "Investment Planning",
        headline: SectorText::same("What an LED project really costs"),
        key_points: &[
            SectorText::same("Panel, processing, structure and install each carry their own line"),
            SectorText {
                church: "Capital campaigns, leasing and phased rollouts",
                venue: "Leasing, financing and sponsorship offsets",
            },
            SectorText::same("Total cost of ownership beats projection within a few years"),
        ],
    },
    GuideSection {
        number: 4,
        slug: "technology",
        title: "Technology Essentials",
        headline: SectorText::same("Pixel pitch, brightness and processing explained"),
        key_points: &[
            SectorText::same("Choose pixel pitch from your closest viewing distance"),
            SectorText::same("Brightness in nits matters more than resolution in bright rooms"),
            SectorText::same("Processing and content control decide day-to-day ease of use"),
        ],
    },
    GuideSection {
        number: 5,
        slug: "process",
        title: "Our Process",
        headline: SectorText::same("From site survey to switch-on"),
        key_points: &[
            SectorText::same("Consultation and site survey"),
            SectorText::same("Design, rendering and proposal"),
            SectorText::same("Installation, training and ongoing support"),
        ],
    },
    GuideSection {
        number: 6,
        slug: "summary",
        title: "Your Summary",
        headline: SectorText::same("Everything in one printable page"),
        key_points: &[SectorText::same(
            "Your score, category breakdown and recommended next steps",
        )],
    },
];

pub fn section(number: u8) -> Option<&'static GuideSection> {
    SECTIONS.iter().find(|s| s.number == number)
}

pub fn is_gated(number: u8) -> bool {
    GATED_SECTIONS.contains(&number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

/// Either a target section or a pager direction.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum NavigateRequest {
    Section { section: u8 },
    Step { direction: Direction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    Moved { section: u8 },
    /// Target is already the active section.
    Unchanged { section: u8 },
    ProfileRequired { requested: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideError {
    UnknownSection(u8),
    AtFirstSection,
    AtLastSection,
    /// Content requested for a gated section before the profile is complete.
    ProfileRequired(u8),
    Validation(FieldErrors),
}

impl fmt::Display for GuideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuideError::UnknownSection(n) => write!(f, "section {} does not exist", n),
            GuideError::AtFirstSection => write!(f, "already at the first section"),
            GuideError::AtLastSection => write!(f, "already at the last section"),
            GuideError::ProfileRequired(n) => {
                write!(f, "section {} requires a completed profile", n)
            }
            GuideError::Validation(errors) => {
                write!(f, "invalid profile: {}", errors.field_names().join(", "))
            }
        }
    }
}

impl std::error::Error for GuideError {}

#[derive(Debug, Clone)]
pub struct BuyersGuide {
    active_section: u8,
    completed_sections: BTreeSet<u8>,
    pending_section: Option<u8>,
    profile_prompted: bool,
    user_data: UserData,
}

impl BuyersGuide {
    /// Opens the guide at section 1 with a working copy of the lead's data.
    pub fn new(user_data: UserData) -> Self {
        Self {
            active_section: 1,
            completed_sections: BTreeSet::new(),
            pending_section: None,
            profile_prompted: false,
            user_data,
        }
    }

    pub fn active_section(&self) -> u8 {
        self.active_section
    }

    pub fn completed_sections(&self) -> &BTreeSet<u8> {
        &self.completed_sections
    }

    pub fn pending_section(&self) -> Option<u8> {
        self.pending_section
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub fn profile_complete(&self) -> bool {
        self.user_data.has_email()
    }

    pub fn can_go_previous(&self) -> bool {
        self.active_section > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.active_section < SECTION_COUNT
    }

    pub fn navigate(&mut self, target: u8) -> Result<NavigationOutcome, GuideError> {
        if section(target).is_none() {
            return Err(GuideError::UnknownSection(target));
        }
        if target == self.active_section {
            return Ok(NavigationOutcome::Unchanged { section: target });
        }

        if is_gated(target) && !self.profile_complete() {
            tracing::debug!("Section {} gated until profile completes", target);
            self.pending_section = Some(target);
            self.profile_prompted = true;
            return Ok(NavigationOutcome::ProfileRequired { requested: target });
        }

        self.move_to(target);
        Ok(NavigationOutcome::Moved { section: target })
    }

    pub fn step(&mut self, direction: Direction) -> Result<NavigationOutcome, GuideError> {
        match direction {
            Direction::Next if !self.can_go_next() => Err(GuideError::AtLastSection),
            Direction::Previous if !self.can_go_previous() => Err(GuideError::AtFirstSection),
            Direction::Next => self.navigate(self.active_section + 1),
            Direction::Previous => self.navigate(self.active_section - 1),
        }
    }

    pub fn apply(&mut self, request: NavigateRequest) -> Result<NavigationOutcome, GuideError> {
        match request {
            NavigateRequest::Section { section } => self.navigate(section),
            NavigateRequest::Step { direction } => self.step(direction),
        }
    }

    /// Validates and merges the profile form, then resumes any parked
    /// navigation. Returns the section moved to, if any.
    pub fn submit_profile(&mut self, form: ProfileForm) -> Result<Option<u8>, GuideError> {
        form.validate().map_err(GuideError::Validation)?;
        self.user_data.merge(form.into_user_data());

        Ok(self.pending_section.take().map(|target| {
            self.move_to(target);
            target
        }))
    }

    /// Content is only served for sections the lead may currently view.
    pub fn content(&self, number: u8, sector: Sector) -> Result<SectionContent, GuideError> {
        let section = section(number).ok_or(GuideError::UnknownSection(number))?;
        if is_gated(number) && !self.profile_complete() {
            return Err(GuideError::ProfileRequired(number));
        }
        Ok(SectionContent::render(section, sector))
    }

    fn move_to(&mut self, target: u8) {
        if target != self.active_section {
            self.completed_sections.insert(self.active_section);
        }
        self.active_section = target;
        self.pending_section = None;
    }

    pub fn view(&self) -> GuideView {
        GuideView {
            active_section: self.active_section,
            completed_sections: self.completed_sections.iter().copied().collect(),
            profile_complete: self.profile_complete(),
            profile_prompted: self.profile_prompted,
            pending_section: self.pending_section,
            can_go_previous: self.can_go_previous(),
            can_go_next: self.can_go_next(),
            sections: SECTIONS
                .iter()
                .map(|s| SectionEntry {
                    number: s.number,
                    slug: s.slug,
                    title: s.title,
                    gated: is_gated(s.number) && !self.profile_complete(),
                })
                .collect(),
            user_data: self.user_data.clone(),
        }
    }
}

// ============ Views ============

#[derive(Debug, Clone, Serialize)]
pub struct SectionEntry {
    pub number: u8,
    pub slug: &'static str,
    pub title: &'static str,
    pub gated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuideView {
    pub active_section: u8,
    pub completed_sections: Vec<u8>,
    pub profile_complete: bool,
    pub profile_prompted: bool,
    pub pending_section: Option<u8>,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub sections: Vec<SectionEntry>,
    pub user_data: UserData,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionContent {
    pub number: u8,
    pub slug: &'static str,
    pub title: &'static str,
    pub headline: &'static str,
    pub key_points: Vec<&'static str>,
}

impl SectionContent {
    fn render(section: &GuideSection, sector: Sector) -> Self {
        Self {
            number: section.number,
            slug: section.slug,
            title: section.title,
            headline: section.headline.get(sector),
            key_points: section.key_points.iter().map(|p| p.get(sector)).collect(),
        }
    }
}

/// Data behind the printable summary section.
#[derive(Debug, Clone, Serialize)]
pub struct GuideSummary {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub sector: Sector,
    pub score: u32,
    pub max_score: u32,
    pub score_percentage: u32,
    pub lead_status: LeadStatus,
    pub category_breakdown: Vec<CategoryScore>,
    pub insights: Option<Insights>,
    pub completed_sections: Vec<u8>,
    pub export_filename: String,
}

impl GuideSummary {
    /// Builds the summary from the result plus the guide's newer user data.
    pub fn build(result: &QuizResult, guide: &BuyersGuide, sector: Sector) -> Self {
        let mut user_data = result.user_data.clone();
        user_data.merge(guide.user_data().clone());

        let location = match (user_data.city.as_deref(), user_data.state.as_deref()) {
            (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
            (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
            (None, None) => None,
        };

        Self {
            name: user_data.full_name(),
            organization: user_data.organization.clone(),
            location,
            sector,
            score: result.score,
            max_score: result.max_score,
            score_percentage: result.score_percentage,
            lead_status: result.lead_status,
            category_breakdown: result.category_breakdown.clone(),
            insights: result.insights.clone(),
            completed_sections: guide.completed_sections().iter().copied().collect(),
            export_filename: export_filename(&user_data),
        }
    }

    /// Plain-text rendering for printing.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        out.push_str("LED Display Buyer's Guide - Summary\n\n");
        if let Some(name) = &self.name {
            out.push_str(&format!("Prepared for: {}\n", name));
        }
        if let Some(org) = &self.organization {
            out.push_str(&format!("Organization: {}\n", org));
        }
        if let Some(location) = &self.location {
            out.push_str(&format!("Location: {}\n", location));
        }
        out.push_str(&format!("Sector: {}\n\n", self.sector.label()));

        out.push_str(&format!(
            "Readiness score: {}/{} ({}%) - {}\n",
            self.score,
            self.max_score,
            self.score_percentage,
            self.lead_status.as_str().to_uppercase()
        ));
        for category in &self.category_breakdown {
            out.push_str(&format!(
                "  {}: {}/{}\n",
                category.category, category.points, category.max_points
            ));
        }

        if let Some(insights) = &self.insights {
            out.push_str(&format!("\n{}\n\nNext steps:\n", insights.summary));
            for (i, step) in insights.actionable_steps.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        out
    }
}

/// PDF filename from the lead's last name, or a fixed fallback.
pub fn export_filename(user_data: &UserData) -> String {
    let last_name: String = user_data
        .last_name
        .as_deref()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect();

    if last_name.is_empty() {
        EXPORT_FILENAME_FALLBACK.to_string()
    } else {
        format!("LED-Buyers-Guide-{}.pdf", last_name)
    }
}
