//! CAPTCHA detection gate.
//!
//! Stateless scanner invoked at the start of every fill attempt. Three
//! independent channels are scored (structural DOM indicators, page-text
//! phrases, URL markers) and the highest-confidence signal wins, with ties
//! resolved in favour of the structural channel since it is the most
//! specific.

use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tokio::time::{Instant, sleep};

use crate::automation::page::PageHandle;

/// Challenge families the detector can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptchaKind {
    Recaptcha,
    Hcaptcha,
    Turnstile,
    ImageCaptcha,
    TextCaptcha,
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptchaKind::Recaptcha => "recaptcha",
            CaptchaKind::Hcaptcha => "hcaptcha",
            CaptchaKind::Turnstile => "turnstile",
            CaptchaKind::ImageCaptcha => "image_captcha",
            CaptchaKind::TextCaptcha => "text_captcha",
        };
        f.write_str(name)
    }
}

/// Outcome of one CAPTCHA scan.
#[derive(Debug, Clone)]
pub struct CaptchaDetectionResult {
    pub detected: bool,
    pub kind: Option<CaptchaKind>,
    pub confidence: f32,
    pub description: String,
}

impl CaptchaDetectionResult {
    fn clear() -> Self {
        Self {
            detected: false,
            kind: None,
            confidence: 0.0,
            description: String::new(),
        }
    }
}

/// Structural indicator list per challenge family, checked in order.
/// The widget vendors score higher than the generic image/text markers.
struct IndicatorSet {
    kind: CaptchaKind,
    confidence: f32,
    selectors: &'static [&'static str],
}

static INDICATOR_SETS: &[IndicatorSet] = &[
    IndicatorSet {
        kind: CaptchaKind::Recaptcha,
        confidence: 0.9,
        selectors: &[
            "div[class*='recaptcha']",
            "div[class*='g-recaptcha']",
            "iframe[src*='recaptcha']",
            "script[src*='recaptcha']",
            "textarea[name='g-recaptcha-response']",
        ],
    },
    IndicatorSet {
        kind: CaptchaKind::Hcaptcha,
        confidence: 0.9,
        selectors: &[
            "div[class*='h-captcha']",
            "iframe[src*='hcaptcha']",
            "script[src*='hcaptcha']",
            "textarea[name='h-captcha-response']",
        ],
    },
    IndicatorSet {
        kind: CaptchaKind::Turnstile,
        confidence: 0.9,
        selectors: &[
            "div[class*='cf-turnstile']",
            "iframe[src*='turnstile']",
            "script[src*='turnstile']",
        ],
    },
    IndicatorSet {
        kind: CaptchaKind::ImageCaptcha,
        confidence: 0.8,
        selectors: &[
            "img[src*='captcha']",
            "input[name*='captcha']",
            "div[class*='captcha']",
            "span[class*='captcha']",
        ],
    },
    IndicatorSet {
        kind: CaptchaKind::TextCaptcha,
        confidence: 0.8,
        selectors: &[
            "input[name*='captcha']",
            "label[for*='captcha']",
            "div[class*='captcha']",
        ],
    },
];

/// Phrases associated with human-verification challenges.
static TEXT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"captcha",
        r"verify.*human",
        r"prove.*robot",
        r"security.*check",
        r"human.*verification",
        r"robot.*check",
        r"please.*verify",
        r"enter.*code",
        r"type.*characters",
    ]
    .iter()
    .map(|pattern| build_pattern(pattern))
    .collect()
});

fn build_pattern(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .unwrap_or_else(|err| panic!("invalid captcha text pattern `{pattern}`: {err}"))
}

/// Stateless page-level challenge scanner.
#[derive(Debug, Clone, Default)]
pub struct CaptchaDetector;

impl CaptchaDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan the current page for a CAPTCHA challenge.
    ///
    /// The scan never fails: page-handle errors on individual indicators are
    /// treated as "indicator absent".
    pub async fn detect(&self, page: &dyn PageHandle) -> CaptchaDetectionResult {
        let structural = self.structural_channel(page).await;

        let content = page.content().await.unwrap_or_default();
        let text_confidence = Self::text_channel(&content);

        let url = page
            .current_url()
            .await
            .map(|url| url.as_str().to_string())
            .unwrap_or_default();
        let url_confidence = Self::url_channel(&url);

        // Highest channel wins; the structural channel takes ties.
        let mut best = structural;
        if text_confidence > best.confidence {
            best = CaptchaDetectionResult {
                detected: true,
                kind: Some(CaptchaKind::TextCaptcha),
                confidence: text_confidence,
                description: format!(
                    "page text matches human-verification phrases ({text_confidence:.2} confidence)"
                ),
            };
        }
        if url_confidence > best.confidence {
            best = CaptchaDetectionResult {
                detected: true,
                kind: None,
                confidence: url_confidence,
                description: format!("url carries challenge markers ({url_confidence:.2} confidence)"),
            };
        }

        if best.detected {
            log::warn!("captcha detected: {}", best.description);
            best
        } else {
            CaptchaDetectionResult::clear()
        }
    }

    /// Block until the challenge clears or the timeout elapses.
    ///
    /// Returns `true` when the page no longer reports a challenge. A timeout
    /// reports `false` rather than an error; the caller decides whether to
    /// abort or retry.
    pub async fn wait_for_resolution(
        &self,
        page: &dyn PageHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.detect(page).await.detected {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!("captcha unresolved after {timeout:?}");
                return false;
            }
            sleep(poll_interval.min(deadline - now)).await;
        }
    }

    async fn structural_channel(&self, page: &dyn PageHandle) -> CaptchaDetectionResult {
        for set in INDICATOR_SETS {
            for selector in set.selectors {
                let Ok(elements) = page.find_elements(selector).await else {
                    continue;
                };
                for element in &elements {
                    if element.is_visible().await.unwrap_or(false) {
                        return CaptchaDetectionResult {
                            detected: true,
                            kind: Some(set.kind),
                            confidence: set.confidence,
                            description: format!(
                                "detected {} via indicator '{selector}' ({:.2} confidence)",
                                set.kind, set.confidence
                            ),
                        };
                    }
                }
            }
        }
        CaptchaDetectionResult::clear()
    }

    /// Phrase-count scoring: 0 -> 0.0, 1 -> 0.3, 2 -> 0.6, 3+ -> 0.8.
    fn text_channel(content: &str) -> f32 {
        let matches = TEXT_PATTERNS
            .iter()
            .filter(|pattern| pattern.is_match(content))
            .count();
        match matches {
            0 => 0.0,
            1 => 0.3,
            2 => 0.6,
            _ => 0.8,
        }
    }

    fn url_channel(url: &str) -> f32 {
        let url = url.to_lowercase();
        if url.contains("captcha") {
            0.7
        } else if url.contains("verify") {
            0.5
        } else if url.contains("security") {
            0.3
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::page::testing::{FakeElement, FakePage};

    #[test]
    fn text_channel_scales_with_distinct_matches() {
        assert_eq!(CaptchaDetector::text_channel("nothing to see"), 0.0);
        assert_eq!(CaptchaDetector::text_channel("please verify your email"), 0.3);
        assert_eq!(
            CaptchaDetector::text_channel("please verify that you are a human being"),
            0.6
        );
        assert_eq!(
            CaptchaDetector::text_channel(
                "please verify you are human: prove you are not a robot and enter the code"
            ),
            0.8
        );
    }

    #[test]
    fn url_channel_ranks_markers() {
        assert_eq!(CaptchaDetector::url_channel("https://x.test/captcha"), 0.7);
        assert_eq!(CaptchaDetector::url_channel("https://x.test/verify-email"), 0.5);
        assert_eq!(CaptchaDetector::url_channel("https://x.test/security"), 0.3);
        assert_eq!(CaptchaDetector::url_channel("https://x.test/jobs"), 0.0);
    }

    #[tokio::test]
    async fn structural_match_beats_text_channel() {
        let page = FakePage::new("https://jobs.example.test/apply")
            .with_content("please verify you are human")
            .with_element("iframe[src*='recaptcha']", FakeElement::new("iframe"));

        let result = CaptchaDetector::new().detect(&page).await;
        assert!(result.detected);
        assert_eq!(result.kind, Some(CaptchaKind::Recaptcha));
        assert_eq!(result.confidence, 0.9);
    }

    #[tokio::test]
    async fn clean_page_reports_nothing() {
        let page = FakePage::new("https://jobs.example.test/apply")
            .with_content("<form><input name='email'></form>");

        let result = CaptchaDetector::new().detect(&page).await;
        assert!(!result.detected);
        assert_eq!(result.confidence, 0.0);
        assert!(result.kind.is_none());
    }

    #[tokio::test]
    async fn url_only_signal_is_reported() {
        let page = FakePage::new("https://jobs.example.test/security/check")
            .with_content("<html></html>");

        let result = CaptchaDetector::new().detect(&page).await;
        assert!(result.detected);
        assert_eq!(result.confidence, 0.3);
        assert!(result.kind.is_none());
    }

    #[tokio::test]
    async fn resolution_wait_returns_immediately_when_clear() {
        let page = FakePage::new("https://jobs.example.test/apply").with_content("<html></html>");
        let resolved = CaptchaDetector::new()
            .wait_for_resolution(&page, Duration::from_millis(50), Duration::from_millis(10))
            .await;
        assert!(resolved);
    }

    #[tokio::test]
    async fn resolution_wait_times_out_on_persistent_challenge() {
        let page = FakePage::new("https://jobs.example.test/apply")
            .with_element("div[class*='g-recaptcha']", FakeElement::new("div"));
        let resolved = CaptchaDetector::new()
            .wait_for_resolution(&page, Duration::from_millis(40), Duration::from_millis(10))
            .await;
        assert!(!resolved);
    }
}
