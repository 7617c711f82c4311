//! Adapter for the Greenhouse ATS family.
//!
//! Greenhouse forms are the most regular of the supported vendors: native
//! inputs named under the `job_application[...]` prefix, custom screening
//! questions wrapped in `div[class*='field']` containers.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::adapters::support::{
    FillSettings, advance_form_steps, capture_screenshot, confidence_score, extract_field,
    fill_field, fill_first_match, question_key,
};
use crate::adapters::types::{AdapterResult, CandidateData, FieldKind, FormField, JobData};
use crate::adapters::PlatformAdapter;
use crate::automation::captcha::CaptchaDetector;
use crate::automation::page::{ElementHandle, PageHandle};

const PLATFORM: &str = "greenhouse";

const URL_MARKERS: &[&str] = &["greenhouse.io", "boards.greenhouse"];

const PAGE_INDICATORS: &[&str] = &[
    "div[id*='greenhouse']",
    "div[class*='greenhouse']",
    "form[action*='greenhouse']",
    "script[src*='greenhouse']",
    "meta[content*='Greenhouse']",
];

/// Field-name prefix probe: more than two prefixed inputs is a strong signal.
const FORM_STRUCTURE_PROBE: &str = "input[name^='job_application']";

const FIRST_NAME_SELECTORS: &[&str] = &[
    "input[name='job_application[first_name]']",
    "input#first_name",
    "input[name='first_name']",
];
const LAST_NAME_SELECTORS: &[&str] = &[
    "input[name='job_application[last_name]']",
    "input#last_name",
    "input[name='last_name']",
];
const EMAIL_SELECTORS: &[&str] = &[
    "input[name='job_application[email]']",
    "input#email",
    "input[type='email']",
];
const PHONE_SELECTORS: &[&str] = &[
    "input[name='job_application[phone]']",
    "input#phone",
    "input[type='tel']",
];
const LINKEDIN_SELECTORS: &[&str] = &[
    "input[name='job_application[linkedin_profile]']",
    "input[placeholder*='linkedin']",
];
const WEBSITE_SELECTORS: &[&str] = &[
    "input[name='job_application[website]']",
    "input[placeholder*='website']",
    "input[placeholder*='portfolio']",
];
const RESUME_SELECTORS: &[&str] = &[
    "input[name='job_application[resume]']",
    "input[type='file'][accept*='pdf']",
    "input[type='file']",
];
const COVER_LETTER_SELECTORS: &[&str] = &[
    "textarea[name='job_application[cover_letter_text]']",
    "textarea#cover_letter",
    "textarea[name='cover_letter']",
];

const QUESTION_CONTAINER: &str = "div[class*='field']";

pub struct GreenhouseAdapter {
    settings: FillSettings,
    captcha: CaptchaDetector,
    success_threshold: f32,
}

impl GreenhouseAdapter {
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

    /// Identity fields in the fixed mapping order required by the contract.
    fn identity_fields(
        candidate: &CandidateData,
    ) -> Vec<(&'static str, String, FieldKind, &'static [&'static str])> {
        vec![
            ("first_name", candidate.first_name.clone(), FieldKind::Text, FIRST_NAME_SELECTORS),
            ("last_name", candidate.last_name.clone(), FieldKind::Text, LAST_NAME_SELECTORS),
            ("email", candidate.email.clone(), FieldKind::Email, EMAIL_SELECTORS),
            ("phone", candidate.phone.clone(), FieldKind::Phone, PHONE_SELECTORS),
            (
                "linkedin",
                candidate.linkedin_url.clone().unwrap_or_default(),
                FieldKind::Text,
                LINKEDIN_SELECTORS,
            ),
            (
                "website",
                candidate.portfolio_url.clone().unwrap_or_default(),
                FieldKind::Text,
                WEBSITE_SELECTORS,
            ),
        ]
    }

    /// Greenhouse custom screening questions: work authorization, salary,
    /// start date, years of experience. Unknown questions go to review.
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
            let Ok(Some(label_el)) = container.find_element("label").await else {
                continue;
            };
            let label = label_el.text().await.unwrap_or_default().to_lowercase();
            if label.is_empty() {
                continue;
            }

            if ["authorized", "visa", "sponsorship"]
                .iter()
                .any(|kw| label.contains(kw))
            {
                if self.answer_yes_radio(container.as_ref()).await {
                    fields_filled.push(format!("work_authorization:{}", FieldKind::Radio));
                } else {
                    fields_needs_review.push("work_authorization".to_string());
                }
            } else if label.contains("salary") || label.contains("compensation") {
                match &candidate.expected_salary {
                    Some(salary) if !salary.is_empty() => {
                        if self
                            .fill_container_input(
                                container.as_ref(),
                                "input[type='text'], input[type='number']",
                                salary,
                            )
                            .await
                        {
                            fields_filled.push(format!("salary_expectation:{}", FieldKind::Text));
                        } else {
                            fields_needs_review.push("salary_expectation".to_string());
                        }
                    }
                    _ => fields_needs_review.push("salary_expectation".to_string()),
                }
            } else if label.contains("start") && label.contains("date") {
                let start = candidate
                    .available_start_date
                    .clone()
                    .unwrap_or_else(|| "Immediately".to_string());
                if self
                    .fill_container_input(
                        container.as_ref(),
                        "input[type='date'], input[type='text']",
                        &start,
                    )
                    .await
                {
                    fields_filled.push(format!("start_date:{}", FieldKind::Date));
                } else {
                    fields_needs_review.push("start_date".to_string());
                }
            } else if label.contains("years") && label.contains("experience") {
                let years = candidate.years_experience.unwrap_or(0).to_string();
                if self.fill_experience_control(container.as_ref(), &years).await {
                    fields_filled.push(format!("years_experience:{}", FieldKind::Number));
                } else {
                    fields_needs_review.push("years_experience".to_string());
                }
            } else {
                fields_needs_review.push(question_key("custom_question", &label));
            }
        }
    }

    async fn answer_yes_radio(&self, container: &dyn ElementHandle) -> bool {
        let Ok(Some(radio)) = container
            .find_element("input[value='yes'], input[value='true']")
            .await
        else {
            return false;
        };
        match radio.is_selected().await {
            Ok(true) => true,
            Ok(false) => radio.click().await.is_ok(),
            Err(_) => false,
        }
    }

    async fn fill_container_input(
        &self,
        container: &dyn ElementHandle,
        selector: &str,
        value: &str,
    ) -> bool {
        let Ok(Some(input)) = container.find_element(selector).await else {
            return false;
        };
        input.clear().await.is_ok() && input.set_value(value).await.is_ok()
    }

    async fn fill_experience_control(&self, container: &dyn ElementHandle, years: &str) -> bool {
        let Ok(Some(control)) = container.find_element("input, select").await else {
            return false;
        };
        match control.tag_name().await.as_deref() {
            Ok("select") => control.select_option(years).await.is_ok(),
            Ok(_) => control.clear().await.is_ok() && control.set_value(years).await.is_ok(),
            Err(_) => false,
        }
    }
}

impl Default for GreenhouseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for GreenhouseAdapter {
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
                log::info!("greenhouse detected via: {indicator}");
                return true;
            }
        }

        match page.find_elements(FORM_STRUCTURE_PROBE).await {
            Ok(elements) if elements.len() > 2 => {
                log::info!("greenhouse detected via form structure");
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
                    let key = if field.name.is_empty() {
                        field.id.clone()
                    } else {
                        field.name.clone()
                    };
                    fields.insert(key, field);
                }
            }
        }

        // Custom question widgets keep their inputs nested under the container.
        if let Ok(containers) = page.find_elements(QUESTION_CONTAINER).await {
            for container in &containers {
                let Ok(Some(label_el)) = container.find_element("label").await else {
                    continue;
                };
                let Ok(Some(input)) = container.find_element("input, textarea, select").await
                else {
                    continue;
                };
                let mut field = extract_field(page, input.as_ref()).await;
                field.label = label_el.text().await.unwrap_or_default();
                fields.insert(format!("custom_{}", fields.len()), field);
            }
        }

        log::info!("found {} form fields on greenhouse page", fields.len());
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

        // A page-level challenge blocks every field regardless of adapter.
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

        for (key, value, kind, selectors) in Self::identity_fields(candidate) {
            if value.is_empty() {
                continue;
            }
            if fill_first_match(page, selectors, &value, kind, &self.settings).await {
                fields_filled.push(format!("{key}:{kind}"));
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

        if let Some(cover_letter) = &job.cover_letter {
            if fill_first_match(
                page,
                COVER_LETTER_SELECTORS,
                cover_letter,
                FieldKind::Textarea,
                &self.settings,
            )
            .await
            {
                fields_filled.push(format!("cover_letter:{}", FieldKind::Textarea));
            } else {
                fields_needs_review.push("cover_letter".to_string());
            }
        }

        self.handle_custom_questions(page, candidate, &mut fields_filled, &mut fields_needs_review)
            .await;

        let steps = advance_form_steps(page, &self.settings).await;
        if steps > 0 {
            log::info!("navigated through {steps} form steps");
        }

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
            max_fill_retries: 1,
            max_form_steps: 10,
        }
    }

    fn candidate() -> CandidateData {
        CandidateData {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.test".into(),
            phone: "+1 555 0100".into(),
            linkedin_url: Some("https://linkedin.test/in/ada".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn detects_by_url_marker() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://boards.greenhouse.io/acme/jobs/1");
        let url = Url::parse("https://boards.greenhouse.io/acme/jobs/1").unwrap();
        assert!(adapter.detect_platform(&page, &url).await);
    }

    #[tokio::test]
    async fn detects_by_form_structure_probe() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let mut page = FakePage::new("https://careers.acme.test/apply");
        for _ in 0..3 {
            page = page.with_element(FORM_STRUCTURE_PROBE, FakeElement::new("input"));
        }
        let url = Url::parse("https://careers.acme.test/apply").unwrap();
        assert!(adapter.detect_platform(&page, &url).await);
    }

    #[tokio::test]
    async fn unrelated_page_is_not_detected() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://careers.acme.test/apply");
        let url = Url::parse("https://careers.acme.test/apply").unwrap();
        assert!(!adapter.detect_platform(&page, &url).await);
    }

    #[tokio::test]
    async fn clean_fill_reaches_full_confidence() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://boards.greenhouse.io/acme/jobs/1")
            .with_element(
                "input[name='job_application[first_name]']",
                FakeElement::new("input"),
            )
            .with_element(
                "input[name='job_application[last_name]']",
                FakeElement::new("input"),
            )
            .with_element(
                "input[name='job_application[email]']",
                FakeElement::new("input").with_attr("type", "email"),
            )
            .with_element(
                "input[name='job_application[phone]']",
                FakeElement::new("input").with_attr("type", "tel"),
            )
            .with_element(
                "input[name='job_application[linkedin_profile]']",
                FakeElement::new("input"),
            );

        let result = adapter
            .fill_form(&page, &candidate(), &JobData::default())
            .await;

        assert!(result.success);
        assert_eq!(result.fields_filled.len(), 5);
        assert!(result.fields_failed.is_empty());
        assert_eq!(result.confidence, 1.0);
        assert!(!result.captcha_detected);
    }

    #[tokio::test]
    async fn captcha_gate_short_circuits_before_any_fill() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let page = FakePage::new("https://boards.greenhouse.io/acme/jobs/1")
            .with_element("iframe[src*='recaptcha']", FakeElement::new("iframe"))
            .with_element(
                "input[name='job_application[first_name]']",
                FakeElement::new("input"),
            );

        let result = adapter
            .fill_form(&page, &candidate(), &JobData::default())
            .await;

        assert!(!result.success);
        assert!(result.captcha_detected);
        assert!(result.fields_filled.is_empty());
        assert!(result.fields_failed.is_empty());
        assert_eq!(result.confidence, 0.0);
        // No field interaction happened before the gate returned.
        assert!(page.fills().is_empty());
    }

    #[tokio::test]
    async fn unknown_custom_question_goes_to_review() {
        let adapter = GreenhouseAdapter::with_settings(quick_settings());
        let container = FakeElement::new("div").with_child(
            "label",
            FakeElement::new("label").with_text("Why do you want to work here?"),
        );
        let page = FakePage::new("https://boards.greenhouse.io/acme/jobs/1")
            .with_element(QUESTION_CONTAINER, container);

        let result = adapter
            .fill_form(&page, &CandidateData::default(), &JobData::default())
            .await;

        assert_eq!(result.fields_needs_review.len(), 1);
        assert!(result.fields_needs_review[0].starts_with("custom_question_"));
    }
}
