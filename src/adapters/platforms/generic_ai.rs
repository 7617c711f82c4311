//! AI-assisted fallback adapter for unrecognized platforms.
//!
//! Every discovered field is handed to an external field mapper together with
//! candidate, job, and optional retrieved context. The adapter only applies
//! mappings the provider is confident about; everything else is surfaced for
//! manual review. Runs last in the cascade and claims every page.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::adapters::support::{
    FillSettings, advance_form_steps, capture_screenshot, confidence_score, extract_field,
    fill_field,
};
use crate::adapters::types::{AdapterResult, CandidateData, FieldKind, FormField, JobData};
use crate::adapters::PlatformAdapter;
use crate::automation::captcha::CaptchaDetector;
use crate::automation::page::PageHandle;
use crate::external_deps::context::{ContextRetriever, snippets_or_empty};
use crate::external_deps::field_mapper::{
    FieldMapper, FieldMappingRequest, JobSummary, NEEDS_REVIEW,
};

const PLATFORM: &str = "generic";

/// Mappings below this are treated as guesses and left for review.
const MIN_MAPPING_CONFIDENCE: f32 = 0.5;

const CONTEXT_SNIPPET_LIMIT: usize = 3;

pub struct GenericAiAdapter {
    settings: FillSettings,
    captcha: CaptchaDetector,
    mapper: Arc<dyn FieldMapper>,
    context: Option<Arc<dyn ContextRetriever>>,
    success_threshold: f32,
}

impl GenericAiAdapter {
    pub fn new(
        mapper: Arc<dyn FieldMapper>,
        context: Option<Arc<dyn ContextRetriever>>,
    ) -> Self {
        Self::with_settings(mapper, context, FillSettings::default())
    }

    pub fn with_settings(
        mapper: Arc<dyn FieldMapper>,
        context: Option<Arc<dyn ContextRetriever>>,
        settings: FillSettings,
    ) -> Self {
        Self {
            settings,
            captcha: CaptchaDetector::new(),
            mapper,
            context,
            success_threshold: 0.6,
        }
    }

    /// Selector preference for applying a mapping: id beats name.
    fn selector_for(field: &FormField) -> Option<String> {
        if !field.id.is_empty() {
            return Some(format!("#{}", field.id));
        }
        if !field.name.is_empty() {
            let tag = match field.kind {
                FieldKind::Textarea => "textarea",
                FieldKind::Select => "select",
                _ => "input",
            };
            return Some(format!("{tag}[name='{}']", field.name));
        }
        if !field.selector.is_empty() {
            return Some(field.selector.clone());
        }
        None
    }
}

#[async_trait]
impl PlatformAdapter for GenericAiAdapter {
    fn platform_name(&self) -> &'static str {
        PLATFORM
    }

    /// The fallback claims every page; the registry skips it during normal
    /// detection and only reaches for it explicitly.
    async fn detect_platform(&self, _page: &dyn PageHandle, _url: &Url) -> bool {
        true
    }

    async fn get_form_fields(&self, page: &dyn PageHandle) -> HashMap<String, FormField> {
        let mut fields = HashMap::new();

        if let Ok(elements) = page.find_elements("input, textarea, select").await {
            for (index, element) in elements.iter().enumerate() {
                let field = extract_field(page, element.as_ref()).await;
                let key = if !field.name.is_empty() {
                    field.name.clone()
                } else if !field.id.is_empty() {
                    field.id.clone()
                } else {
                    format!("field_{index}")
                };
                fields.insert(key, field);
            }
        }

        log::info!("generic adapter discovered {} fields", fields.len());
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

        let discovered = self.get_form_fields(page).await;
        let total_analyzed = discovered.len();

        let query = format!("{} {} application form filling", job.title, job.company);
        let context =
            snippets_or_empty(self.context.as_deref(), &query, CONTEXT_SNIPPET_LIMIT).await;

        let request = FieldMappingRequest {
            fields: discovered.clone().into_iter().collect(),
            candidate: candidate.clone(),
            job: JobSummary {
                title: job.title.clone(),
                company: job.company.clone(),
                requirements: job.requirements.clone(),
            },
            context,
        };

        let mappings = match self.mapper.map_fields(&request).await {
            Ok(mappings) => mappings,
            Err(err) => {
                log::error!("field mapping failed: {err}");
                return AdapterResult::failure(PLATFORM, err.to_string());
            }
        };

        let mut fields_filled = Vec::new();
        let mut fields_failed = Vec::new();
        let mut fields_needs_review = Vec::new();
        let mut mapping_confidence_sum = 0.0f32;
        let mut mapping_count = 0usize;

        for (key, mapping) in &mappings {
            mapping_confidence_sum += mapping.confidence;
            mapping_count += 1;

            if mapping.confidence < MIN_MAPPING_CONFIDENCE
                || mapping.value.is_empty()
                || mapping.value == NEEDS_REVIEW
            {
                fields_needs_review.push(key.clone());
                continue;
            }

            let Some(selector) = discovered.get(key).and_then(Self::selector_for) else {
                fields_needs_review.push(key.clone());
                continue;
            };

            if fill_field(page, &selector, &mapping.value, mapping.kind, &self.settings).await {
                fields_filled.push(format!("{key}:{}", mapping.kind));
            } else {
                fields_failed.push(key.clone());
            }
        }

        let steps = advance_form_steps(page, &self.settings).await;

        if let Some(shot) = capture_screenshot(page, PLATFORM, "final").await {
            screenshots.push(shot);
        }

        let total = fields_filled.len() + fields_failed.len() + fields_needs_review.len();
        let fill_confidence =
            confidence_score(fields_filled.len(), fields_failed.len(), total);
        let mapping_confidence = if mapping_count == 0 {
            0.0
        } else {
            mapping_confidence_sum / mapping_count as f32
        };
        // The provider's own certainty tempers the raw fill ratio.
        let confidence = (fill_confidence + mapping_confidence) / 2.0;

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
                (
                    "ai_mapping_confidence".to_string(),
                    format!("{mapping_confidence:.2}"),
                ),
                (
                    "total_fields_analyzed".to_string(),
                    total_analyzed.to_string(),
                ),
                ("steps_completed".to_string(), steps.to_string()),
            ]),
        }
    }
}
