//! Quiz state machine.
//!
//! `Question(0) -> ... -> Question(n-2) -> Transitioning -> Question(n-1) -> Form`.
//! Answering the final question picks the lead-capture form from the
//! answer's value. There is no backward transition.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::models::{Answer, AnswerMap};
use crate::questions::Question;

/// Pause before auto-advancing to the next question.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(600);
/// Extra pause before the final question while the transitional message shows.
pub const TRANSITION_DELAY: Duration = Duration::from_millis(2500);

/// Final answers that route to the full contact form.
pub const HIGH_INTENT_VALUES: [&str; 2] = ["committed", "ready_to_talk"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// Full contact form, leads to the confirmation screen.
    Contact,
    /// Lightweight email capture, leads to the buyer's guide.
    EmailCapture,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::EmailCapture => "email_capture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum QuizStep {
    Question { index: usize },
    Transitioning { next: usize },
    Form { form: FormKind },
}

/// What the front end should do after an answer is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Advanced { next: usize, delay_ms: u64 },
    Transitioning { next: usize, delay_ms: u64 },
    Completed { form: FormKind },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    /// The index is not the question currently shown.
    NotCurrentQuestion { expected: Option<usize>, got: usize },
    UnknownOption { index: usize, value: String },
    NotTransitioning,
    AlreadyComplete,
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizError::NotCurrentQuestion {
                expected: Some(expected),
                got,
            } => write!(f, "question {} is not active (current: {})", got, expected),
            QuizError::NotCurrentQuestion { expected: None, got } => {
                write!(f, "question {} is not active", got)
            }
            QuizError::UnknownOption { index, value } => {
                write!(f, "'{}' is not an option of question {}", value, index)
            }
            QuizError::NotTransitioning => write!(f, "quiz is not transitioning"),
            QuizError::AlreadyComplete => write!(f, "quiz is already complete"),
        }
    }
}

impl std::error::Error for QuizError {}

/// Routes the final answer to a lead-capture form.
pub fn route_for(final_value: &str) -> FormKind {
    if HIGH_INTENT_VALUES.contains(&final_value) {
        FormKind::Contact
    } else {
        FormKind::EmailCapture
    }
}

#[derive(Debug, Clone)]
pub struct QuizMachine {
    questions: &'static [Question],
    step: QuizStep,
    answers: AnswerMap,
}

impl QuizMachine {
    pub fn new(questions: &'static [Question]) -> Self {
        Self {
            questions,
            step: QuizStep::Question { index: 0 },
            answers: AnswerMap::new(),
        }
    }

    pub fn step(&self) -> QuizStep {
        self.step
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn questions(&self) -> &'static [Question] {
        self.questions
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.step {
            QuizStep::Question { index } => Some(index),
            _ => None,
        }
    }

    pub fn pending_form(&self) -> Option<FormKind> {
        match self.step {
            QuizStep::Form { form } => Some(form),
            _ => None,
        }
    }

    /// Records an answer for the active question and advances.
    pub fn answer(&mut self, index: usize, value: &str) -> Result<AnswerOutcome, QuizError> {
        let current = match self.step {
            QuizStep::Question { index } => index,
            QuizStep::Form { .. } => return Err(QuizError::AlreadyComplete),
            QuizStep::Transitioning { .. } => {
                return Err(QuizError::NotCurrentQuestion {
                    expected: None,
                    got: index,
                })
            }
        };
        if index != current {
            return Err(QuizError::NotCurrentQuestion {
                expected: Some(current),
                got: index,
            });
        }

        let option = self.questions[index]
            .option(value)
            .ok_or_else(|| QuizError::UnknownOption {
                index,
                value: value.to_string(),
            })?;

        self.answers.insert(
            index,
            Answer {
                value: option.value.to_string(),
                points: option.points,
            },
        );

        let last = self.questions.len() - 1;
        let outcome = if index == last {
            let form = route_for(option.value);
            self.step = QuizStep::Form { form };
            AnswerOutcome::Completed { form }
        } else if index + 1 == last {
            self.step = QuizStep::Transitioning { next: last };
            AnswerOutcome::Transitioning {
                next: last,
                delay_ms: (AUTO_ADVANCE_DELAY + TRANSITION_DELAY).as_millis() as u64,
            }
        } else {
            self.step = QuizStep::Question { index: index + 1 };
            AnswerOutcome::Advanced {
                next: index + 1,
                delay_ms: AUTO_ADVANCE_DELAY.as_millis() as u64,
            }
        };

        Ok(outcome)
    }

    /// Ends the transitional message and shows the final question.
    pub fn complete_transition(&mut self) -> Result<usize, QuizError> {
        match self.step {
            QuizStep::Transitioning { next } => {
                self.step = QuizStep::Question { index: next };
                Ok(next)
            }
            _ => Err(QuizError::NotTransitioning),
        }
    }
}
