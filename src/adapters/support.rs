//! Shared form-filling helpers used by every platform adapter.
//!
//! Per-field waits are bounded: a field that never becomes actionable
//! degrades to a failed field, it does not abort the attempt.

use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, sleep};

use crate::adapters::types::{FieldKind, FormField};
use crate::automation::page::{ElementHandle, PageHandle, ScreenshotRef};

/// Poll cadence while waiting for a field to appear.
const FIELD_POLL: Duration = Duration::from_millis(250);

/// Candidate selectors for multi-step "continue" controls, most specific first.
const NEXT_STEP_SELECTORS: &[&str] = &[
    "button[type='submit']:not([disabled])",
    "button[data-ui='next']",
    "input[type='submit']",
    "a.next-button",
];

/// Timing knobs shared by all adapters.
#[derive(Debug, Clone)]
pub struct FillSettings {
    /// Bounded wait for a field to become actionable.
    pub field_wait: Duration,
    /// Pause between locating an element and interacting with it.
    pub input_pause: Duration,
    /// Settle interval after a multi-step navigation click.
    pub settle: Duration,
    /// Back-off between retries on dynamically loaded fields.
    pub retry_wait: Duration,
    pub max_fill_retries: usize,
    /// Hard bound on multi-step navigation, even on malformed forms.
    pub max_form_steps: usize,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            field_wait: Duration::from_secs(10),
            input_pause: Duration::from_millis(300),
            settle: Duration::from_secs(2),
            retry_wait: Duration::from_secs(1),
            max_fill_retries: 3,
            max_form_steps: 10,
        }
    }
}

/// `clamp01(filled/total - 0.5 * failed/total)`.
///
/// Failures are penalized twice as hard as successes are rewarded: a wrongly
/// skipped required field costs more than an extra field left for review.
pub fn confidence_score(filled: usize, failed: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let success_rate = filled as f32 / total as f32;
    let failure_penalty = (failed as f32 / total as f32) * 0.5;
    (success_rate - failure_penalty).clamp(0.0, 1.0)
}

/// Wait until the selector resolves to an element, up to `wait`.
pub(crate) async fn wait_for_field(
    page: &dyn PageHandle,
    selector: &str,
    wait: Duration,
) -> Option<Box<dyn ElementHandle>> {
    let deadline = Instant::now() + wait;
    loop {
        match page.find_element(selector).await {
            Ok(Some(element)) => return Some(element),
            Ok(None) => {}
            Err(err) => log::debug!("lookup failed for '{selector}': {err}"),
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(FIELD_POLL.min(deadline - now)).await;
    }
}

/// Fill a single field, dispatching on its kind. Returns `false` on timeout
/// or interaction failure; the caller records the field as failed.
pub(crate) async fn fill_field(
    page: &dyn PageHandle,
    selector: &str,
    value: &str,
    kind: FieldKind,
    settings: &FillSettings,
) -> bool {
    let Some(element) = wait_for_field(page, selector, settings.field_wait).await else {
        log::warn!("timeout waiting for field: {selector}");
        return false;
    };
    sleep(settings.input_pause).await;

    let outcome = match kind {
        FieldKind::Select => element.select_option(value).await,
        FieldKind::Checkbox | FieldKind::Radio => match element.is_selected().await {
            Ok(true) => Ok(()),
            Ok(false) => element.click().await,
            Err(err) => Err(err),
        },
        FieldKind::File | FieldKind::Hidden => element.set_value(value).await,
        _ => match element.clear().await {
            Ok(()) => element.set_value(value).await,
            Err(err) => Err(err),
        },
    };

    match outcome {
        Ok(()) => true,
        Err(err) => {
            log::error!("error filling field {selector}: {err}");
            false
        }
    }
}

/// Try selectors in order; the first that fills wins.
pub(crate) async fn fill_first_match(
    page: &dyn PageHandle,
    selectors: &[&str],
    value: &str,
    kind: FieldKind,
    settings: &FillSettings,
) -> bool {
    for selector in selectors {
        if fill_field(page, selector, value, kind, settings).await {
            return true;
        }
    }
    false
}

/// Retrying variant for forms that render fields after AJAX settles.
pub(crate) async fn fill_field_with_retry(
    page: &dyn PageHandle,
    selector: &str,
    value: &str,
    kind: FieldKind,
    settings: &FillSettings,
) -> bool {
    for attempt in 0..settings.max_fill_retries.max(1) {
        if fill_field(page, selector, value, kind, settings).await {
            return true;
        }
        if attempt + 1 < settings.max_fill_retries {
            sleep(settings.retry_wait).await;
        }
    }
    log::debug!(
        "failed to fill {selector} after {} attempts",
        settings.max_fill_retries.max(1)
    );
    false
}

/// Extract a [`FormField`] description from a located element.
///
/// Missing attributes collapse to empty strings; the label falls back through
/// `label[for=…]`, `aria-label`, and the placeholder.
pub(crate) async fn extract_field(page: &dyn PageHandle, element: &dyn ElementHandle) -> FormField {
    let tag = element.tag_name().await.unwrap_or_default();
    let attr = |name: &'static str| async move {
        element.attribute(name).await.ok().flatten().unwrap_or_default()
    };

    let id = attr("id").await;
    let name = attr("name").await;
    let type_attr = element.attribute("type").await.ok().flatten();
    let kind = FieldKind::from_markup(&tag, type_attr.as_deref());

    let selector = if !id.is_empty() {
        format!("#{id}")
    } else if !name.is_empty() {
        format!("{tag}[name='{name}']")
    } else {
        tag.clone()
    };

    let mut field = FormField {
        selector,
        kind,
        label: find_label(page, element, &id).await,
        placeholder: attr("placeholder").await,
        required: element
            .attribute("required")
            .await
            .ok()
            .flatten()
            .is_some(),
        value: attr("value").await,
        visible: element.is_visible().await.unwrap_or(false),
        enabled: element.is_enabled().await.unwrap_or(false),
        options: Vec::new(),
        id,
        name,
    };

    if kind == FieldKind::Select
        && let Ok(options) = element.find_elements("option").await
    {
        for option in &options {
            field.options.push(option.text().await.unwrap_or_default());
        }
    }

    field
}

/// Label discovery with empty-string fallback.
pub(crate) async fn find_label(
    page: &dyn PageHandle,
    element: &dyn ElementHandle,
    id: &str,
) -> String {
    if !id.is_empty()
        && let Ok(Some(label)) = page.find_element(&format!("label[for='{id}']")).await
        && let Ok(text) = label.text().await
        && !text.is_empty()
    {
        return text;
    }

    if let Ok(Some(aria)) = element.attribute("aria-label").await
        && !aria.is_empty()
    {
        return aria;
    }

    element
        .attribute("placeholder")
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Walk "continue/next" controls until none remain or the step bound hits.
///
/// Each activation requires a visible, enabled control and is followed by a
/// fixed settle interval before the page is re-scanned.
pub(crate) async fn advance_form_steps(page: &dyn PageHandle, settings: &FillSettings) -> usize {
    let mut steps = 0;
    while steps < settings.max_form_steps {
        let mut control = None;
        for selector in NEXT_STEP_SELECTORS {
            let Ok(elements) = page.find_elements(selector).await else {
                continue;
            };
            for element in elements {
                let visible = element.is_visible().await.unwrap_or(false);
                let enabled = element.is_enabled().await.unwrap_or(false);
                if visible && enabled {
                    control = Some(element);
                    break;
                }
            }
            if control.is_some() {
                break;
            }
        }

        let Some(control) = control else { break };
        if let Err(err) = control.click().await {
            log::warn!("error navigating multi-step form: {err}");
            break;
        }
        sleep(settings.settle).await;
        steps += 1;
    }
    steps
}

/// Best-effort screenshot; a capture failure only omits the reference.
pub(crate) async fn capture_screenshot(
    page: &dyn PageHandle,
    platform: &str,
    label: &str,
) -> Option<ScreenshotRef> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    match page
        .screenshot(&format!("{platform}_{label}_{timestamp}"))
        .await
    {
        Ok(reference) => Some(reference),
        Err(err) => {
            log::warn!("screenshot capture failed ({platform}/{label}): {err}");
            None
        }
    }
}

/// Truncated, lowercased question label used as a needs-review key.
pub(crate) fn question_key(prefix: &str, label: &str) -> String {
    let label = label.to_lowercase();
    let short: String = label.chars().take(30).collect();
    format!("{prefix}_{}", short.trim())
}
