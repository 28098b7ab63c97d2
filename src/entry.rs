//! Landing-page routing from URL query parameters.

use serde::{Deserialize, Serialize};

use crate::models::Sector;

const CHURCH_KEYWORDS: [&str; 7] = [
    "church", "worship", "ministry", "faith", "chapel", "parish", "congregation",
];
const VENUE_KEYWORDS: [&str; 8] = [
    "venue",
    "business",
    "hospitality",
    "restaurant",
    "hotel",
    "arena",
    "stadium",
    "retail",
];

/// Query parameters a landing URL may carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryParams {
    pub sector: Option<String>,
    pub org: Option<String>,
    pub utm_campaign: Option<String>,
    /// Full landing URL; its query string is read when the fields above are absent.
    pub landing_url: Option<String>,
}

impl EntryParams {
    /// Extracts the recognised parameters from a full URL.
    pub fn from_url(raw: &str) -> Result<Self, url::ParseError> {
        let parsed = url::Url::parse(raw)?;
        let mut params = Self::default();

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "sector" => params.sector = Some(value.into_owned()),
                "org" => params.org = Some(value.into_owned()),
                "utm_campaign" => params.utm_campaign = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(params)
    }

    /// Fills missing fields from `landing_url`, if one was given and parses.
    pub fn resolved(self) -> Self {
        let Some(raw) = self.landing_url.as_deref() else {
            return self;
        };

        match Self::from_url(raw) {
            Ok(from_url) => Self {
                sector: self.sector.or(from_url.sector),
                org: self.org.or(from_url.org),
                utm_campaign: self.utm_campaign.or(from_url.utm_campaign),
                landing_url: self.landing_url,
            },
            Err(e) => {
                tracing::warn!("Ignoring unparseable landing URL: {}", e);
                self
            }
        }
    }
}

fn match_keywords(text: &str) -> Option<Sector> {
    let text = text.to_lowercase();
    if CHURCH_KEYWORDS.iter().any(|k| text.contains(k)) {
        Some(Sector::HouseOfWorship)
    } else if VENUE_KEYWORDS.iter().any(|k| text.contains(k)) {
        Some(Sector::Venue)
    } else {
        None
    }
}

/// Detects a sector from `sector`, then `org`, then a hospitality campaign.
pub fn detect_sector(params: &EntryParams) -> Option<Sector> {
    [params.sector.as_deref(), params.org.as_deref()]
        .into_iter()
        .flatten()
        .find_map(match_keywords)
        .or_else(|| {
            params
                .utm_campaign
                .as_deref()
                .filter(|c| c.to_lowercase().contains("hospitality"))
                .map(|_| Sector::Venue)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryDecision {
    pub sector: Option<Sector>,
    /// Jump straight into the quiz when the sector is already known.
    pub skip_landing: bool,
}

pub fn route_entry(params: &EntryParams) -> EntryDecision {
    let sector = detect_sector(params);
    EntryDecision {
        sector,
        skip_landing: sector.is_some(),
    }
}
