//! Lead-capture forms and their synchronous field validation.
//!
//! Validation runs on submit and reports every invalid field at once.

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::UserData;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Field name -> message, one entry per invalid field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.0.keys().copied().collect()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn required(&mut self, field: &'static str, label: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, format!("{} is required", label));
            false
        } else {
            true
        }
    }

    fn email(&mut self, field: &'static str, value: &str) {
        if self.required(field, "Email", value) && !is_valid_email(value) {
            self.add(field, "Please enter a valid email address");
        }
    }
}

/// Synchronous form validation.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Basic `local@domain.tld` check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email.trim())
}

/// A phone is valid when it carries exactly 10 digits, formatting ignored.
pub fn is_valid_phone(raw: &str) -> bool {
    digits(raw).len() == 10
}

fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalizes a 10-digit US phone to E.164 for the CRM.
///
/// Uses the phonenumber library (port of Google's libphonenumber); numbers
/// it does not recognise as valid US numbers fall back to `+1` plus digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits = digits(raw);
    if digits.len() != 10 {
        return None;
    }

    match phonenumber::parse(Some(CountryId::US), &digits) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Normalized phone {} -> {}", raw, formatted);
            Some(formatted)
        }
        _ => {
            tracing::debug!("Phone {} not recognised as US number, keeping digits", raw);
            Some(format!("+1{}", digits))
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Full contact form shown to high-intent leads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
    pub city: String,
    pub state: String,
}

impl Validate for ContactForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        errors.required("first_name", "First name", &self.first_name);
        errors.required("last_name", "Last name", &self.last_name);
        errors.email("email", &self.email);
        if errors.required("phone", "Phone", &self.phone) && !is_valid_phone(&self.phone) {
            errors.add("phone", "Please enter a 10-digit phone number");
        }
        errors.required("organization", "Organization", &self.organization);

        errors.into_result()
    }
}

impl ContactForm {
    pub fn into_user_data(self) -> UserData {
        let phone = normalize_phone(&self.phone).or_else(|| non_empty(self.phone));
        UserData {
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            email: non_empty(self.email.to_lowercase()),
            phone,
            organization: non_empty(self.organization),
            city: non_empty(self.city),
            state: non_empty(self.state),
            ..Default::default()
        }
    }
}

/// Lightweight email capture shown to exploring leads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailCaptureForm {
    pub first_name: String,
    pub email: String,
}

impl Validate for EmailCaptureForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.email("email", &self.email);
        errors.into_result()
    }
}

impl EmailCaptureForm {
    pub fn into_user_data(self) -> UserData {
        UserData {
            first_name: non_empty(self.first_name),
            email: non_empty(self.email.to_lowercase()),
            ..Default::default()
        }
    }
}

/// Progressive profile form gating the buyer's guide.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub city: String,
    pub state: String,
    pub email: String,
}

impl Validate for ProfileForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.required("city", "City", &self.city);
        errors.required("state", "State", &self.state);
        errors.email("email", &self.email);
        errors.into_result()
    }
}

impl ProfileForm {
    pub fn into_user_data(self) -> UserData {
        UserData {
            city: non_empty(self.city),
            state: non_empty(self.state),
            email: non_empty(self.email.to_lowercase()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_contact() -> ContactForm {
        ContactForm {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.org".into(),
            phone: "(512) 555-0142".into(),
            organization: "First Community Church".into(),
            city: "Austin".into(),
            state: "TX".into(),
        }
    }

    #[test]
    fn test_valid_contact_form_passes() {
        assert!(valid_contact().validate().is_ok());
    }

    #[test]
    fn test_contact_form_reports_all_invalid_fields() {
        let form = ContactForm {
            email: "not-an-email".into(),
            phone: "555-0142".into(),
            ..Default::default()
        };

        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.field_names(),
            vec!["email", "first_name", "last_name", "organization", "phone"]
        );
        assert_eq!(
            errors.get("email"),
            Some("Please enter a valid email address")
        );
        assert_eq!(
            errors.get("phone"),
            Some("Please enter a 10-digit phone number")
        );
    }

    #[test]
    fn test_missing_email_reports_required_not_format() {
        let errors = EmailCaptureForm::default().validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is required"));
    }

    #[test]
    fn test_phone_digit_count() {
        assert!(is_valid_phone("5125550142"));
        assert!(is_valid_phone("(512) 555-0142"));
        assert!(!is_valid_phone("512-555-014"));
        assert!(!is_valid_phone("1-512-555-0142"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email(" user+tag@example.co.uk "));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user example@x.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn test_profile_form_requires_city_and_state() {
        let form = ProfileForm {
            email: "lead@example.com".into(),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field_names(), vec!["city", "state"]);
    }

    #[test]
    fn test_contact_into_user_data_normalizes() {
        let data = ContactForm {
            email: "Grace@Example.org".into(),
            city: "  ".into(),
            ..valid_contact()
        }
        .into_user_data();

        assert_eq!(data.email.as_deref(), Some("grace@example.org"));
        assert_eq!(data.city, None);
        assert!(data.phone.as_deref().is_some_and(|p| p.starts_with("+1")));
        assert_eq!(data.phone.as_deref().map(str::len), Some(12));
    }
}
