//! Core data structures shared across adapters and the registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::automation::page::ScreenshotRef;

/// Kind of a fillable form control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Number,
    Select,
    Checkbox,
    Radio,
    File,
    Textarea,
    Hidden,
    Date,
    #[default]
    Unknown,
}

impl FieldKind {
    /// Derive the kind from a tag name plus the `type` attribute.
    pub fn from_markup(tag: &str, type_attr: Option<&str>) -> Self {
        match tag {
            "textarea" => FieldKind::Textarea,
            "select" => FieldKind::Select,
            "input" => match type_attr.unwrap_or("text") {
                "email" => FieldKind::Email,
                "tel" => FieldKind::Phone,
                "number" => FieldKind::Number,
                "checkbox" => FieldKind::Checkbox,
                "radio" => FieldKind::Radio,
                "file" => FieldKind::File,
                "hidden" => FieldKind::Hidden,
                "date" => FieldKind::Date,
                _ => FieldKind::Text,
            },
            _ => FieldKind::Unknown,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Number => "number",
            FieldKind::Select => "select",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::File => "file",
            FieldKind::Textarea => "textarea",
            FieldKind::Hidden => "hidden",
            FieldKind::Date => "date",
            FieldKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One discovered input/select/textarea on a page.
///
/// The selector must uniquely address the element at extraction time; labels
/// and attributes fall back to empty strings when the page omits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    pub kind: FieldKind,
    pub name: String,
    pub id: String,
    pub label: String,
    pub placeholder: String,
    pub required: bool,
    pub value: String,
    /// Option texts, populated for selects only.
    pub options: Vec<String>,
    pub visible: bool,
    pub enabled: bool,
}

/// One prior position on the candidate's profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub description: String,
}

/// One education entry on the candidate's profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    pub school: String,
    pub degree: String,
    pub field: String,
}

/// Normalized applicant profile. Read-only from the adapters' perspective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub github_url: Option<String>,
    pub expected_salary: Option<String>,
    pub years_experience: Option<u32>,
    pub available_start_date: Option<String>,
    pub notice_period: Option<String>,
    pub preferred_location: Option<String>,
    pub work_authorized: bool,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub resume_path: Option<String>,
}

impl CandidateData {
    /// Combined name for platforms with a single full-name field.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Normalized job-posting context. Read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobData {
    pub title: String,
    pub company: String,
    pub description: String,
    pub requirements: String,
    /// Pre-generated cover-letter text, when available.
    pub cover_letter: Option<String>,
}

/// Outcome of one fill attempt.
///
/// `fields_filled` entries are `key:kind` pairs; failed and needs-review
/// entries are plain keys. Confidence is always recomputed from these lists,
/// never inherited from a previous attempt.
#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub success: bool,
    pub platform: String,
    pub fields_filled: Vec<String>,
    pub fields_failed: Vec<String>,
    pub fields_needs_review: Vec<String>,
    pub screenshots: Vec<ScreenshotRef>,
    pub confidence: f32,
    pub captcha_detected: bool,
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl AdapterResult {
    /// Terminal failure carrying only an error description.
    pub fn failure(platform: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            platform: platform.into(),
            fields_filled: Vec::new(),
            fields_failed: Vec::new(),
            fields_needs_review: Vec::new(),
            screenshots: Vec::new(),
            confidence: 0.0,
            captcha_detected: false,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    /// Attempt blocked by a page-level challenge before any field was touched.
    pub fn captcha_blocked(
        platform: impl Into<String>,
        screenshots: Vec<ScreenshotRef>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            captcha_detected: true,
            screenshots,
            ..Self::failure(platform, description.into())
        }
    }

    /// Denominator of the confidence formula.
    pub fn total_fields(&self) -> usize {
        self.fields_filled.len() + self.fields_failed.len() + self.fields_needs_review.len()
    }
}
