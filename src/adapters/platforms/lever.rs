//! Adapter for the Lever ATS family.
//!
//! Lever pages load their forms after an AJAX round-trip and lean on custom
//! div-based dropdowns, so text fields use the retrying fill path and the
//! dropdown handler drives `li[role='option']` lists directly.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::time::sleep;
use url::Url;

use crate::adapters::support::{
    FillSettings, advance_form_steps, capture_screenshot, confidence_score, extract_field,
    fill_field_with_retry, fill_first_match, question_key, wait_for_field,
};
use crate::adapters::types::{AdapterResult, CandidateData, FieldKind, FormField, JobData};
use crate::adapters::PlatformAdapter;
use crate::automation::captcha::CaptchaDetector;
use crate::automation::page::{ElementHandle, PageHandle};

const PLATFORM: &str = "lever";

const URL_MARKERS: &[&str] = &["lever.co", "jobs.lever"];

const PAGE_INDICATORS: &[&str] = &[
    "div[class*='lever']",
    "form[action*='lever']",
    "script[src*='lever']",
    "meta[content*='Lever']",
    "div.application-form",
    "div[data-qa='application-form']",
];

/// Lever's characteristic structured-URL inputs.
const FORM_STRUCTURE_PROBE: &str = "input[name='urls[LinkedIn]'], input[name='urls[Website]']";

const FORM_READY_SELECTOR: &str = "form, .application-form";

const NAME_SELECTORS: &[&str] = &[
    "input[name='name']",
    "input[name='fullname']",
    "input[placeholder*='Full name']",
    "input[placeholder*='Name']",
];
const EMAIL_SELECTORS: &[&str] = &[
    "input[name='email']",
    "input[type='email']",
    "input[placeholder*='Email']",
];
const PHONE_SELECTORS: &[&str] = &[
    "input[name='phone']",
    "input[type='tel']",
    "input[placeholder*='Phone']",
];
const LINKEDIN_SELECTORS: &[&str] = &[
    "input[name='urls[LinkedIn]']",
    "input[placeholder*='linkedin']",
    "input[name='linkedin']",
];
const WEBSITE_SELECTORS: &[&str] = &[
    "input[name='urls[Website]']",
    "input[name='urls[Portfolio]']",
    "input[placeholder*='website']",
    "input[placeholder*='portfolio']",
];
const GITHUB_SELECTORS: &[&str] = &[
    "input[name='urls[GitHub]']",
    "input[placeholder*='github']",
];
const RESUME_SELECTORS: &[&str] = &[
    "input[name='resume']",
    "input[type='file']",
    "input[accept*='.pdf']",
];
const COVER_LETTER_SELECTORS: &[&str] = &[
    "textarea[name='comments']",
    "textarea[name='cover_letter']",
    "textarea[placeholder*='cover']",
    "textarea[placeholder*='message']",
];

const DROPDOWN_SELECTOR: &str = "div[role='button'][aria-haspopup='listbox'], select";
const DROPDOWN_OPTION_SELECTOR: &str = "li[role='option']";
const QUESTION_CONTAINER: &str = ".posting-question, div[class*='question']";

pub struct LeverAdapter {
    settings: FillSettings,
    captcha: CaptchaDetector,
    success_threshold: f32,
}

impl LeverAdapter {
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

    /// Lever combines first and last name into one field.
    fn identity_fields(
        candidate: &CandidateData,
    ) -> Vec<(&'static str, String, &'static [&'static str])> {
        vec![
            ("name", candidate.full_name(), NAME_SELECTORS),
            ("email", candidate.email.clone(), EMAIL_SELECTORS),
            ("phone", candidate.phone.clone(), PHONE_SELECTORS),
            (
                "linkedin",
                candidate.linkedin_url.clone().unwrap_or_default(),
                LINKEDIN_SELECTORS,
            ),
            (
                "website",
                candidate.portfolio_url.clone().unwrap_or_default(),
                WEBSITE_SELECTORS,
            ),
            (
                "github",
                candidate.github_url.clone().unwrap_or_default(),
                GITHUB_SELECTORS,
            ),
        ]
    }

    /// Custom listbox-style dropdowns: referral source and location
    /// preference are answered, everything else goes to review.
    async fn handle_dropdowns(
        &self,
        page: &dyn PageHandle,
        candidate: &CandidateData,
        fields_filled: &mut Vec<String>,
        fields_needs_review: &mut Vec<String>,
    ) {
        let Ok(dropdowns) = page.find_elements(DROPDOWN_SELECTOR).await else {
            return;
        };

        for dropdown in dropdowns {
            let label = self.dropdown_label(dropdown.as_ref()).await;
            if label.is_empty() {
                continue;
            }

            if label.contains("hear") || label.contains("source") {
                if self.pick_dropdown_option(page, dropdown.as_ref(), "other").await {
                    fields_filled.push(format!("referral_source:{}", FieldKind::Select));
                } else {
                    fields_needs_review.push("referral_source".to_string());
                }
            } else if label.contains("location") || label.contains("office") {
                let preferred = candidate
                    .preferred_location
                    .clone()
                    .unwrap_or_else(|| "Remote".to_string());
                if self
                    .pick_dropdown_option(page, dropdown.as_ref(), &preferred.to_lowercase())
                    .await
                {
                    fields_filled.push(format!("location_preference:{}", FieldKind::Select));
                } else {
                    fields_needs_review.push("location_preference".to_string());
                }
            } else {
                fields_needs_review.push(question_key("dropdown", &label));
            }
        }
    }

    async fn dropdown_label(&self, dropdown: &dyn ElementHandle) -> String {
        if let Ok(Some(aria)) = dropdown.attribute("aria-label").await
            && !aria.is_empty()
        {
            return aria.to_lowercase();
        }
        if let Ok(Some(label)) = dropdown.find_element("label, .label").await
            && let Ok(text) = label.text().await
        {
            return text.to_lowercase();
        }
        String::new()
    }

    /// Native selects take the option directly; custom listboxes are opened
    /// and the matching (or first) option clicked.
    async fn pick_dropdown_option(
        &self,
        page: &dyn PageHandle,
        dropdown: &dyn ElementHandle,
        wanted: &str,
    ) -> bool {
        if matches!(dropdown.tag_name().await.as_deref(), Ok("select")) {
            return dropdown.select_option(wanted).await.is_ok();
        }

        if dropdown.click().await.is_err() {
            return false;
        }
        sleep(self.settings.input_pause).await;

        let Ok(options) = page.find_elements(DROPDOWN_OPTION_SELECTOR).await else {
            return false;
        };
        let mut fallback = None;
        for option in options {
            let text = option.text().await.unwrap_or_default().to_lowercase();
            if text.contains(wanted) {
                return option.click().await.is_ok();
            }
            if fallback.is_none() {
                fallback = Some(option);
            }
        }
        match fallback {
            Some(option) => option.click().await.is_ok(),
            None => false,
        }
    }

    async fn handle_custom_questions(
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

            if ["visa", "authorized", "sponsorship"]
                .iter()
                .any(|kw| text.contains(kw))
            {
                if self.answer_yes_radio(container.as_ref()).await {
                    fields_filled.push(format!("work_authorization:{}", FieldKind::Radio));
                } else {
                    fields_needs_review.push("work_authorization".to_string());
                }
            } else if text.contains("experience") && text.contains("year") {
                let years = candidate.years_experience.unwrap_or(0).to_string();
                let filled = match container
                    .find_element("input[type='text'], input[type='number']")
                    .await
                {
                    Ok(Some(input)) => {
                        input.clear().await.is_ok() && input.set_value(&years).await.is_ok()
                    }
                    _ => false,
                };
                if filled {
                    fields_filled.push(format!("years_experience:{}", FieldKind::Number));
                } else {
                    fields_needs_review.push("years_experience".to_string());
                }
            } else {
                fields_needs_review.push(question_key("question", &text));
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
            if value.contains("yes") {
                return match radio.is_selected().await {
                    Ok(true) => true,
                    Ok(false) => radio.click().await.is_ok(),
                    Err(_) => false,
                };
            }
        }
        false
    }
}

impl Default for LeverAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for LeverAdapter {
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
                log::info!("lever detected via: {indicator}");
                return true;
            }
        }

        match page.find_elements(FORM_STRUCTURE_PROBE).await {
            Ok(elements) if !elements.is_empty() => {
                log::info!("lever detected via url-fields structure");
                true
            }
            _ => false,
        }
    }

    async fn get_form_fields(&self, page: &dyn PageHandle) -> HashMap<String, FormField> {
        let mut fields = HashMap::new();

        // Lever renders the form after an AJAX round-trip.
        if wait_for_field(page, FORM_READY_SELECTOR, self.settings.field_wait)
            .await
            .is_none()
        {
            log::warn!("timeout waiting for lever form to load");
        } else {
            sleep(self.settings.settle).await;
        }

        if let Ok(elements) = page.find_elements("input, textarea, select").await {
            for element in &elements {
                let field = extract_field(page, element.as_ref()).await;
                if !field.name.is_empty() || !field.id.is_empty() {
                    let key = if field.name.is_empty() {
                        field.id.clone()
                    } else {
                        field.name.clone()
                    };
                    fields.insert(key, field);
                }
            }
        }

        if let Ok(groups) = page
            .find_elements("div[class*='field'], .postings-group")
            .await
        {
            for group in &groups {
                let Ok(Some(label_el)) = group.find_element("label, .posting-field-label").await
                else {
                    continue;
                };
                let Ok(Some(input)) = group.find_element("input, textarea, select").await else {
                    continue;
                };
                let mut field = extract_field(page, input.as_ref()).await;
                field.label = label_el.text().await.unwrap_or_default();
                fields.insert(format!("field_{}", fields.len()), field);
            }
        }

        log::info!("found {} form fields on lever page", fields.len());
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

        let mut fields_filled = Vec::new();
        let mut fields_failed = Vec::new();
        let mut fields_needs_review = Vec::new();

        for (key, value, selectors) in Self::identity_fields(candidate) {
            if value.is_empty() {
                continue;
            }
            let mut filled = false;
            for selector in selectors {
                if fill_field_with_retry(page, selector, &value, FieldKind::Text, &self.settings)
                    .await
                {
                    fields_filled.push(format!("{key}:{}", FieldKind::Text));
                    filled = true;
                    break;
                }
            }
            // Only the critical identity fields count as hard failures; the
            // optional profile URLs go to review instead.
            if !filled {
                if matches!(key, "name" | "email") {
                    fields_failed.push(key.to_string());
                } else {
                    fields_needs_review.push(key.to_string());
                }
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

        self.handle_dropdowns(page, candidate, &mut fields_filled, &mut fields_needs_review)
            .await;
        self.handle_custom_questions(page, candidate, &mut fields_filled, &mut fields_needs_review)
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
            metadata: HashMap::from([("steps_completed".to_string(), steps.to_string())]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::page::testing::{FakeElement, FakePage};
    use std::time::Duration;

    fn quick_settings() -> FillSettings {
        FillSettings {
            field_wait: Duration::from_millis(20),
            input_pause: Duration::from_millis(1),
            settle: Duration::from_millis(1),
            retry_wait: Duration::from_millis(1),
            max_fill_retries: 2,
            max_form_steps: 10,
        }
    }

    #[tokio::test]
    async fn detects_by_structured_url_fields() {
        let adapter = LeverAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://careers.acme.test/apply")
            .with_element(FORM_STRUCTURE_PROBE, FakeElement::new("input"));
        let url = Url::parse("https://careers.acme.test/apply").unwrap();
        assert!(adapter.detect_platform(&page, &url).await);
    }

    #[tokio::test]
    async fn fills_combined_name_field() {
        let adapter = LeverAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://jobs.lever.co/acme/1")
            .with_element(FORM_READY_SELECTOR, FakeElement::new("form"))
            .with_element("input[name='name']", FakeElement::new("input"))
            .with_element("input[name='email']", FakeElement::new("input"));

        let candidate = CandidateData {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.test".into(),
            ..Default::default()
        };
        let result = adapter.fill_form(&page, &candidate, &JobData::default()).await;

        assert!(result.success);
        assert_eq!(result.fields_filled.len(), 2);
        assert!(page
            .fills()
            .iter()
            .any(|(selector, value)| selector == "input[name='name']" && value == "Grace Hopper"));
    }

    #[tokio::test]
    async fn missing_critical_fields_count_as_failures() {
        let adapter = LeverAdapter::with_settings(quick_settings());
        // Empty page: name and email fail hard, the phone miss is surfaced
        // for review so every attempted field lands in exactly one list.
        let page = FakePage::new("https://jobs.lever.co/acme/1");
        let candidate = CandidateData {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.test".into(),
            phone: "+1 555 0101".into(),
            ..Default::default()
        };

        let result = adapter.fill_form(&page, &candidate, &JobData::default()).await;

        assert!(!result.success);
        assert_eq!(result.fields_failed, vec!["name".to_string(), "email".to_string()]);
        assert_eq!(result.fields_needs_review, vec!["phone".to_string()]);
        assert_eq!(
            result.total_fields(),
            result.fields_failed.len() + result.fields_needs_review.len()
        );
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn referral_dropdown_prefers_other_option() {
        let adapter = LeverAdapter::with_settings(quick_settings());
        let dropdown = FakeElement::new("div").with_attr("aria-label", "How did you hear about us?");
        let page = FakePage::new("https://jobs.lever.co/acme/1")
            .with_element(FORM_READY_SELECTOR, FakeElement::new("form"))
            .with_element(DROPDOWN_SELECTOR, dropdown)
            .with_element(
                DROPDOWN_OPTION_SELECTOR,
                FakeElement::new("li").with_text("Job board"),
            )
            .with_element(
                DROPDOWN_OPTION_SELECTOR,
                FakeElement::new("li").with_text("Other"),
            );

        let result = adapter
            .fill_form(&page, &CandidateData::default(), &JobData::default())
            .await;

        assert!(result
            .fields_filled
            .iter()
            .any(|key| key.starts_with("referral_source")));
    }
}
