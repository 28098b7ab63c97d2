use crate::models::{AnswerMap, CategoryScore, LeadStatus, LifecycleStage};
use crate::questions::Question;

/// Minimum score classified as hot.
pub const HOT_THRESHOLD: u32 = 12;
/// Minimum score classified as warm.
pub const WARM_THRESHOLD: u32 = 6;

/// Sum of the points of every recorded answer. Unanswered questions count zero.
pub fn total_score(answers: &AnswerMap) -> u32 {
    answers.values().map(|a| a.points).sum()
}

/// Threshold classifier: >= 12 hot, >= 6 warm, otherwise cold.
pub fn classify(score: u32) -> LeadStatus {
    if score >= HOT_THRESHOLD {
        LeadStatus::Hot
    } else if score >= WARM_THRESHOLD {
        LeadStatus::Warm
    } else {
        LeadStatus::Cold
    }
}

/// Authoritative maximum: the sum of each question's best option.
pub fn max_score(questions: &[Question]) -> u32 {
    questions.iter().map(Question::max_points).sum()
}

/// Gauge percentage, clamped to 100.
pub fn score_percentage(score: u32, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    ((score.min(max) as f64 / max as f64) * 100.0).round() as u32
}

pub fn lifecycle_stage(status: LeadStatus) -> LifecycleStage {
    match status {
        LeadStatus::Hot => LifecycleStage::SalesQualifiedLead,
        LeadStatus::Warm => LifecycleStage::MarketingQualifiedLead,
        LeadStatus::Cold => LifecycleStage::Lead,
    }
}

/// Points per category in question order; categories shared by several
/// questions are folded together.
pub fn category_breakdown(questions: &[Question], answers: &AnswerMap) -> Vec<CategoryScore> {
    let mut breakdown: Vec<CategoryScore> = Vec::new();

    for (index, question) in questions.iter().enumerate() {
        let points = answers.get(&index).map(|a| a.points).unwrap_or(0);
        match breakdown
            .iter_mut()
            .find(|c| c.category == question.category)
        {
            Some(entry) => {
                entry.points += points;
                entry.max_points += question.max_points();
            }
            None => breakdown.push(CategoryScore {
                category: question.category.to_string(),
                points,
                max_points: question.max_points(),
            }),
        }
    }

    breakdown
}
