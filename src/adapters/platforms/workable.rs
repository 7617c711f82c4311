//! Adapter for the Workable ATS family.
//!
//! Workable serves localized forms, so the adapter detects the form language
//! before filling and records it for the caller. Screening questions live in
//! `data-ui='question'` containers and follow a small set of shapes.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::adapters::support::{
    FillSettings, advance_form_steps, capture_screenshot, confidence_score, extract_field,
    fill_first_match, question_key,
};
use crate::adapters::types::{
    AdapterResult, CandidateData, EducationEntry, ExperienceEntry, FieldKind, FormField, JobData,
};
use crate::adapters::PlatformAdapter;
use crate::automation::captcha::CaptchaDetector;
use crate::automation::page::{ElementHandle, PageHandle};

const PLATFORM: &str = "workable";

const URL_MARKERS: &[&str] = &["workable.com", "apply.workable"];

const PAGE_INDICATORS: &[&str] = &[
    "div[class*='workable']",
    "form[action*='workable']",
    "script[src*='workable']",
    "meta[content*='Workable']",
    "div[data-ui='application-form']",
];

/// Workable prefixes candidate inputs with a stable id scheme.
const FORM_STRUCTURE_PROBE: &str = "input[id^='candidate_']";

const FIRST_NAME_SELECTORS: &[&str] = &[
    "input[id='candidate_firstname']",
    "input[name='candidate[firstname]']",
    "input[name='firstname']",
];
const LAST_NAME_SELECTORS: &[&str] = &[
    "input[id='candidate_lastname']",
    "input[name='candidate[lastname]']",
    "input[name='lastname']",
];
const EMAIL_SELECTORS: &[&str] = &[
    "input[id='candidate_email']",
    "input[name='candidate[email]']",
    "input[type='email']",
];
const PHONE_SELECTORS: &[&str] = &[
    "input[id='candidate_phone']",
    "input[name='candidate[phone]']",
    "input[type='tel']",
];
const RESUME_SELECTORS: &[&str] = &[
    "input[id='candidate_resume']",
    "input[name='candidate[resume]']",
    "input[type='file']",
];
const COVER_LETTER_SELECTORS: &[&str] = &[
    "textarea[id='candidate_cover_letter']",
    "textarea[name='candidate[cover_letter]']",
    "textarea[placeholder*='cover']",
];
const SUMMARY_SELECTORS: &[&str] = &[
    "textarea[id='candidate_summary']",
    "textarea[name='candidate[summary]']",
];

const QUESTION_CONTAINER: &str = "div[data-ui='question']";
const EXPERIENCE_SECTION: &str = "div[data-ui='experience-section']";
const EDUCATION_SECTION: &str = "div[data-ui='education-section']";

/// Word lists used to guess the form language when the `lang` attribute is
/// missing. Checked in order; English is the fallback.
const LANGUAGE_HINTS: &[(&str, &[&str])] = &[
    ("fr", &["prénom", "nom de famille", "postuler", "téléphone"]),
    ("es", &["nombre", "apellido", "solicitar", "teléfono"]),
    ("it", &["nome", "cognome", "candidati", "telefono"]),
    ("de", &["vorname", "nachname", "bewerben", "telefon"]),
];

pub struct WorkableAdapter {
    settings: FillSettings,
    captcha: CaptchaDetector,
    success_threshold: f32,
}

impl WorkableAdapter {
    pub fn new() -> Self {
        Self::with_settings(FillSettings::default())
    }

    pub fn with_settings(settings: FillSettings) -> Self {
        Self {
            settings,
            captcha: CaptchaDetector::new(),
            success_threshold: 0.7,
        }
    }

    /// `html lang` attribute first, then body-text word hints.
    async fn detect_language(&self, page: &dyn PageHandle) -> String {
        if let Ok(Some(html)) = page.find_element("html").await
            && let Ok(Some(lang)) = html.attribute("lang").await
            && lang.len() >= 2
        {
            return lang[..2].to_lowercase();
        }

        let body = page.content().await.unwrap_or_default().to_lowercase();
        for (code, words) in LANGUAGE_HINTS {
            if words.iter().filter(|w| body.contains(*w)).count() >= 2 {
                return (*code).to_string();
            }
        }
        "en".to_string()
    }

    fn identity_fields(
        candidate: &CandidateData,
    ) -> Vec<(&'static str, String, &'static [&'static str])> {
        vec![
            ("first_name", candidate.first_name.clone(), FIRST_NAME_SELECTORS),
            ("last_name", candidate.last_name.clone(), LAST_NAME_SELECTORS),
            ("email", candidate.email.clone(), EMAIL_SELECTORS),
            ("phone", candidate.phone.clone(), PHONE_SELECTORS),
        ]
    }

    async fn handle_screening_questions(
        &self,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        fields_filled: &mut Vec<String>,
        fields_needs_review: &mut Vec<String>,
    ) {
        let Ok(containers) = page.find_elements(QUESTION_CONTAINER).await else {
            return;
        };

        for container in containers {
            let text = container.text().await.unwrap_or_default().to_lowercase();
            if text.is_empty() {
                continue;
            }

            if ["relocate", "available", "authorized", "eligible"]
                .iter()
                .any(|kw| text.contains(kw))
            {
                if self.answer_yes_radio(container.as_ref()).await {
                    fields_filled.push(format!("screening_yes:{}", FieldKind::Radio));
                } else {
                    fields_needs_review.push(question_key("screening", &text));
                }
            } else if text.contains("salary") || text.contains("compensation") {
                let filled = match &candidate.expected_salary {
                    Some(salary) => self.fill_container_input(container.as_ref(), salary).await,
                    None => false,
                };
                if filled {
                    fields_filled.push(format!("expected_salary:{}", FieldKind::Text));
                } else {
                    fields_needs_review.push("expected_salary".to_string());
                }
            } else if text.contains("notice") {
                let notice = candidate
                    .notice_period
                    .clone()
                    .unwrap_or_else(|| "2 weeks".to_string());
                if self.fill_container_input(container.as_ref(), &notice).await {
                    fields_filled.push(format!("notice_period:{}", FieldKind::Text));
                } else {
                    fields_needs_review.push("notice_period".to_string());
                }
            } else {
                fields_needs_review.push(question_key("screening", &text));
            }
        }
    }

    async fn answer_yes_radio(&self, container: &dyn ElementHandle) -> bool {
        let Ok(radios) = container.find_elements("input[type='radio']").await else {
            return false;
        };
        for radio in radios {
            let value = radio
                .attribute("value")
                .await
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_lowercase();
            if value.contains("yes") || value == "true" {
                return match radio.is_selected().await {
                    Ok(true) => true,
                    Ok(false) => radio.click().await.is_ok(),
                    Err(_) => false,
                };
            }
        }
        false
    }

    async fn fill_container_input(&self, container: &dyn ElementHandle, value: &str) -> bool {
        match container
            .find_element("input[type='text'], input[type='number'], textarea")
            .await
        {
            Ok(Some(input)) => {
                input.clear().await.is_ok() && input.set_value(value).await.is_ok()
            }
            _ => false,
        }
    }

    /// Workable repeats the section inputs per entry; only the first entry's
    /// inputs are filled, further history stays for manual review.
    async fn fill_experience_section(
        &self,
        page: &dyn PageHandle,
        entries: &[ExperienceEntry],
        fields_filled: &mut Vec<String>,
        fields_needs_review: &mut Vec<String>,
    ) {
        let Ok(Some(section)) = page.find_element(EXPERIENCE_SECTION).await else {
            return;
        };
        let Some(entry) = entries.first() else {
            fields_needs_review.push("experience".to_string());
            return;
        };

        let parts = [
            ("input[name*='title']", entry.title.as_str(), "experience_title"),
            ("input[name*='company']", entry.company.as_str(), "experience_company"),
            ("textarea[name*='description']", entry.description.as_str(), "experience_summary"),
        ];
        for (selector, value, key) in parts {
            if value.is_empty() {
                continue;
            }
            let filled = match section.find_element(selector).await {
                Ok(Some(input)) => {
                    input.clear().await.is_ok() && input.set_value(value).await.is_ok()
                }
                _ => false,
            };
            if filled {
                fields_filled.push(format!("{key}:{}", FieldKind::Text));
            } else {
                fields_needs_review.push(key.to_string());
            }
        }
        if entries.len() > 1 {
            fields_needs_review.push("experience_additional".to_string());
        }
    }

    async fn fill_education_section(
        &self,
        page: &dyn PageHandle,
        entries: &[EducationEntry],
        fields_filled: &mut Vec<String>,
        fields_needs_review: &mut Vec<String>,
    ) {
        let Ok(Some(section)) = page.find_element(EDUCATION_SECTION).await else {
            return;
        };
        let Some(entry) = entries.first() else {
            fields_needs_review.push("education".to_string());
            return;
        };

        let parts = [
            ("input[name*='school']", entry.school.as_str(), "education_school"),
            ("input[name*='degree']", entry.degree.as_str(), "education_degree"),
            ("input[name*='field']", entry.field.as_str(), "education_field"),
        ];
        for (selector, value, key) in parts {
            if value.is_empty() {
                continue;
            }
            let filled = match section.find_element(selector).await {
                Ok(Some(input)) => {
                    input.clear().await.is_ok() && input.set_value(value).await.is_ok()
                }
                _ => false,
            };
            if filled {
                fields_filled.push(format!("{key}:{}", FieldKind::Text));
            } else {
                fields_needs_review.push(key.to_string());
            }
        }
    }
}

impl Default for WorkableAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for WorkableAdapter {
    fn platform_name(&self) -> &'static str {
        PLATFORM
    }

    async fn detect_platform(&self, page: &dyn PageHandle, url: &Url) -> bool {
        let url_str = url.as_str();
        if URL_MARKERS.iter().any(|marker| url_str.contains(marker)) {
            return true;
        }

        for indicator in PAGE_INDICATORS {
            if let Ok(elements) = page.find_elements(indicator).await
                && !elements.is_empty()
            {
                log::info!("workable detected via: {indicator}");
                return true;
            }
        }

        match page.find_elements(FORM_STRUCTURE_PROBE).await {
            Ok(elements) if elements.len() > 2 => {
                log::info!("workable detected via candidate-id structure");
                true
            }
            _ => false,
        }
    }

    async fn get_form_fields(&self, page: &dyn PageHandle) -> HashMap<String, FormField> {
        let mut fields = HashMap::new();

        if let Ok(elements) = page.find_elements("input, textarea, select").await {
            for element in &elements {
                let field = extract_field(page, element.as_ref()).await;
                if !field.name.is_empty() || !field.id.is_empty() {
                    let key = if field.id.is_empty() {
                        field.name.clone()
                    } else {
                        field.id.clone()
                    };
                    fields.insert(key, field);
                }
            }
        }

        log::info!("found {} form fields on workable page", fields.len());
        fields
    }

    async fn fill_form(
        &self,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        job: &JobData,
    ) -> AdapterResult {
        let mut screenshots = Vec::new();
        if let Some(shot) = capture_screenshot(page, PLATFORM, "initial").await {
            screenshots.push(shot);
        }

        let captcha = self.captcha.detect(page).await;
        if captcha.detected {
            return AdapterResult::captcha_blocked(
                PLATFORM,
                screenshots,
                "CAPTCHA detected - manual intervention required",
            );
        }

        let language = self.detect_language(page).await;
        log::info!("workable form language: {language}");

        let mut fields_filled = Vec::new();
        let mut fields_failed = Vec::new();
        let mut fields_needs_review = Vec::new();

        for (key, value, selectors) in Self::identity_fields(candidate) {
            if value.is_empty() {
                continue;
            }
            if fill_first_match(page, selectors, &value, FieldKind::Text, &self.settings).await {
                fields_filled.push(format!("{key}:{}", FieldKind::Text));
            } else {
                fields_failed.push(key.to_string());
            }
        }

        if let Some(resume) = &candidate.resume_path {
            if fill_first_match(page, RESUME_SELECTORS, resume, FieldKind::File, &self.settings)
                .await
            {
                fields_filled.push(format!("resume:{}", FieldKind::File));
            } else {
                fields_needs_review.push("resume".to_string());
            }
        }

        if let Some(cover_letter) = &job.cover_letter
            && fill_first_match(
                page,
                COVER_LETTER_SELECTORS,
                cover_letter,
                FieldKind::Textarea,
                &self.settings,
            )
            .await
        {
            fields_filled.push(format!("cover_letter:{}", FieldKind::Textarea));
        }

        if !candidate.skills.is_empty() {
            let summary = candidate.skills.join(", ");
            if fill_first_match(page, SUMMARY_SELECTORS, &summary, FieldKind::Textarea, &self.settings)
                .await
            {
                fields_filled.push(format!("summary:{}", FieldKind::Textarea));
            }
        }

        self.fill_experience_section(
            page,
            &candidate.experience,
            &mut fields_filled,
            &mut fields_needs_review,
        )
        .await;
        self.fill_education_section(
            page,
            &candidate.education,
            &mut fields_filled,
            &mut fields_needs_review,
        )
        .await;
        self.handle_screening_questions(page, candidate, &mut fields_filled, &mut fields_needs_review)
            .await;

        let steps = advance_form_steps(page, &self.settings).await;

        if let Some(shot) = capture_screenshot(page, PLATFORM, "final").await {
            screenshots.push(shot);
        }

        let total = fields_filled.len() + fields_failed.len() + fields_needs_review.len();
        let confidence = confidence_score(fields_filled.len(), fields_failed.len(), total);

        AdapterResult {
            success: confidence >= self.success_threshold,
            platform: PLATFORM.to_string(),
            fields_filled,
            fields_failed,
            fields_needs_review,
            screenshots,
            confidence,
            captcha_detected: false,
            error: None,
            metadata: HashMap::from([
                ("form_language".to_string(), language),
                ("steps_completed".to_string(), steps.to_string()),
            ]),
        }
    }
}
