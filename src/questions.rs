//! The fixed assessment: five ordered questions with sector-keyed copy.

use serde::Serialize;

use crate::models::{Sector, SectorText};

/// One selectable answer.
#[derive(Debug, Clone, Copy)]
pub struct QuestionOption {
    pub value: &'static str,
    pub text: SectorText,
    pub points: u32,
}

/// Before/after comparison shown alongside one question.
#[derive(Debug, Clone, Copy)]
pub struct TwoPaths {
    pub problem: SectorText,
    pub solution: SectorText,
}

#[derive(Debug, Clone, Copy)]
pub struct Question {
    pub category: &'static str,
    pub text: SectorText,
    pub options: &'static [QuestionOption],
    pub two_paths: Option<TwoPaths>,
}

impl Question {
    pub fn option(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Highest point weight among this question's options.
    pub fn max_points(&self) -> u32 {
        self.options.iter().map(|o| o.points).max().unwrap_or(0)
    }
}

const fn opt(value: &'static str, text: SectorText, points: u32) -> QuestionOption {
    QuestionOption {
        value,
        text,
        points,
    }
}

pub static QUESTIONS: [Question; 5] = [
    Question {
        category: "Vision",
        text: SectorText {
            church: "How important is visual impact to the way your congregation experiences worship?",
            venue: "How important is visual impact to the experience your guests have?",
        },
        options: &[
            opt("9-10", SectorText::same("9-10: It is central to what we do"), 4),
            opt("7-8", SectorText::same("7-8: Very important"), 3),
            opt("4-6", SectorText::same("4-6: Somewhat important"), 2),
            opt("1-3", SectorText::same("1-3: Nice to have"), 1),
        ],
        two_paths: None,
    },
    Question {
        category: "Audience",
        text: SectorText {
            church: "How many people attend your largest weekly service?",
            venue: "How many guests does your space hold at capacity?",
        },
        options: &[
            opt("1000+", SectorText::same("1,000 or more"), 4),
            opt("500-999", SectorText::same("500 to 999"), 3),
            opt("200-499", SectorText::same("200 to 499"), 2),
            opt("under-200", SectorText::same("Fewer than 200"), 1),
        ],
        two_paths: None,
    },
    Question {
        category: "Budget",
        text: SectorText {
            church: "Has your leadership set aside funds for a display project?",
            venue: "Do you have budget allocated for a display upgrade?",
        },
        options: &[
            opt(
                "yes_now",
                SectorText::same("Yes, funds are available now"),
                4,
            ),
            opt(
                "yes_next_year",
                SectorText::same("Yes, in next year's budget"),
                3,
            ),
            opt(
                "raising_funds",
                SectorText {
                    church: "We are planning a capital campaign",
                    venue: "We are seeking financing or investors",
                },
                2,
            ),
            opt("not_yet", SectorText::same("Not yet"), 0),
        ],
        two_paths: None,
    },
    Question {
        category: "Urgency",
        text: SectorText {
            church: "What best describes why you are looking at LED walls?",
            venue: "What best describes why you are looking at LED displays?",
        },
        options: &[
            opt(
                "urgent_problem",
                SectorText {
                    church: "Our projectors are failing and services suffer",
                    venue: "Our current screens are hurting the guest experience",
                },
                4,
            ),
            opt(
                "planned_upgrade",
                SectorText::same("A planned upgrade or renovation"),
                3,
            ),
            opt(
                "new_build",
                SectorText::same("New construction or expansion"),
                3,
            ),
            opt(
                "curious",
                SectorText::same("Just curious about what is possible"),
                1,
            ),
        ],
        two_paths: Some(TwoPaths {
            problem: SectorText {
                church: "Washed-out projection, lyrics nobody in the back can read, and volunteers fighting bulbs every Sunday.",
                venue: "Dim screens, dated signage and guests looking at their phones instead of your brand.",
            },
            solution: SectorText {
                church: "A bright LED wall that reads in daylight, carries every song and sermon point, and just turns on.",
                venue: "A vivid LED display that draws every eye, sells sponsorships and runs itself.",
            },
        }),
    },
    Question {
        category: "Commitment",
        text: SectorText::same("Where are you in your decision process?"),
        options: &[
            opt(
                "committed",
                SectorText::same("We are ready to move forward"),
                4,
            ),
            opt(
                "ready_to_talk",
                SectorText::same("Ready to talk with a specialist"),
                3,
            ),
            opt(
                "exploring",
                SectorText::same("Exploring options and gathering information"),
                1,
            ),
            opt(
                "general_interest",
                SectorText::same("Just general interest for now"),
                0,
            ),
        ],
        two_paths: None,
    },
];

/// The question bank in order.
pub fn all() -> &'static [Question] {
    &QUESTIONS
}

/// Maps the budget answer to the timeline annotation sent to the CRM.
pub fn timeline_for(budget_value: &str) -> Option<&'static str> {
    match budget_value {
        "yes_now" => Some("0-3 months"),
        "yes_next_year" => Some("6-12 months"),
        "raising_funds" => Some("12+ months"),
        "not_yet" => Some("undetermined"),
        _ => None,
    }
}

/// Index of the budget question.
pub const BUDGET_QUESTION: usize = 2;

// ============ Rendered views ============

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub value: &'static str,
    pub text: &'static str,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TwoPathsView {
    pub problem: &'static str,
    pub solution: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub category: &'static str,
    pub text: &'static str,
    pub options: Vec<OptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_paths: Option<TwoPathsView>,
    pub is_final: bool,
}

impl QuestionView {
    pub fn render(index: usize, question: &Question, total: usize, sector: Sector) -> Self {
        Self {
            index,
            category: question.category,
            text: question.text.get(sector),
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    value: o.value,
                    text: o.text.get(sector),
                    points: o.points,
                })
                .collect(),
            two_paths: question.two_paths.map(|tp| TwoPathsView {
                problem: tp.problem.get(sector),
                solution: tp.solution.get(sector),
            }),
            is_final: index + 1 == total,
        }
    }
}

/// Renders the whole bank for a sector.
pub fn render_all(sector: Sector) -> Vec<QuestionView> {
    let total = QUESTIONS.len();
    QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, q)| QuestionView::render(i, q, total, sector))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_option_values_unique_per_question() {
        for q in all() {
            let values: HashSet<_> = q.options.iter().map(|o| o.value).collect();
            assert_eq!(values.len(), q.options.len(), "{}", q.category);
        }
    }

    #[test]
    fn test_only_one_question_has_two_paths() {
        assert_eq!(all().iter().filter(|q| q.two_paths.is_some()).count(), 1);
    }

    #[test]
    fn test_render_uses_sector_copy() {
        let church = render_all(Sector::HouseOfWorship);
        let venue = render_all(Sector::Venue);

        assert_ne!(church[0].text, venue[0].text);
        assert!(church[4].is_final);
        assert!(!church[3].is_final);
        assert!(venue[3].two_paths.is_some());
    }

    #[test]
    fn test_timeline_mapping_covers_budget_options() {
        for option in all()[BUDGET_QUESTION].options {
            assert!(timeline_for(option.value).is_some(), "{}", option.value);
        }
    }
}
