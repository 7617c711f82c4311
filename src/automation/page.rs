//! Browser page capability contracts.
//!
//! The orchestration core never drives a browser itself. Everything it needs
//! from the automation layer is expressed through [`PageHandle`] and
//! [`ElementHandle`], implemented elsewhere on top of whatever driver the
//! host application uses. Every operation is fallible and potentially slow;
//! callers are expected to bound waits themselves.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Result alias used by the page capability.
pub type PageResult<T> = Result<T, PageError>;

/// Errors surfaced by page-handle implementations.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("no element matches selector '{0}'")]
    ElementNotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("element interaction failed: {0}")]
    Interaction(String),
    #[error("screenshot capture failed: {0}")]
    Screenshot(String),
    #[error("driver error: {0}")]
    Driver(String),
}

/// Opaque reference to a captured screenshot artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRef(pub String);

impl fmt::Display for ScreenshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a single located DOM element.
///
/// Selectors are resolved against live, mutable remote UI, so a handle can go
/// stale at any point; implementations report that as [`PageError::Interaction`].
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn click(&self) -> PageResult<()>;
    async fn clear(&self) -> PageResult<()>;
    async fn set_value(&self, value: &str) -> PageResult<()>;
    /// Select an option on a native `<select>` by visible text or value.
    async fn select_option(&self, option: &str) -> PageResult<()>;
    async fn is_visible(&self) -> PageResult<bool>;
    async fn is_enabled(&self) -> PageResult<bool>;
    async fn is_selected(&self) -> PageResult<bool>;
    async fn tag_name(&self) -> PageResult<String>;
    async fn text(&self) -> PageResult<String>;
    async fn attribute(&self, name: &str) -> PageResult<Option<String>>;
    /// Scoped lookup relative to this element.
    async fn find_element(&self, selector: &str) -> PageResult<Option<Box<dyn ElementHandle>>>;
    async fn find_elements(&self, selector: &str) -> PageResult<Vec<Box<dyn ElementHandle>>>;
}

/// Handle to one exclusive browser page/session.
///
/// A page handle is owned by exactly one in-flight application attempt and is
/// not safe to share across concurrent tasks.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(&self, url: &Url) -> PageResult<()>;
    async fn find_element(&self, selector: &str) -> PageResult<Option<Box<dyn ElementHandle>>>;
    async fn find_elements(&self, selector: &str) -> PageResult<Vec<Box<dyn ElementHandle>>>;
    /// Rendered page content (HTML).
    async fn content(&self) -> PageResult<String>;
    async fn current_url(&self) -> PageResult<Url>;
    async fn screenshot(&self, tag: &str) -> PageResult<ScreenshotRef>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory page used by unit tests across the crate.

    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeElementInner {
        tag: String,
        attrs: HashMap<String, String>,
        text: String,
        visible: bool,
        enabled: bool,
        selected: Mutex<bool>,
        value: Mutex<String>,
        children: HashMap<String, Vec<FakeElement>>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeElement {
        inner: Arc<FakeElementInner>,
        fill_log: Option<Arc<Mutex<Vec<(String, String)>>>>,
        key: String,
    }

    impl FakeElement {
        pub(crate) fn new(tag: &str) -> Self {
            Self {
                inner: Arc::new(FakeElementInner {
                    tag: tag.to_string(),
                    visible: true,
                    enabled: true,
                    ..Default::default()
                }),
                fill_log: None,
                key: String::new(),
            }
        }

        pub(crate) fn with_attr(self, name: &str, value: &str) -> Self {
            let mut inner = FakeElementInner {
                tag: self.inner.tag.clone(),
                attrs: self.inner.attrs.clone(),
                text: self.inner.text.clone(),
                visible: self.inner.visible,
                enabled: self.inner.enabled,
                selected: Mutex::new(*self.inner.selected.lock().unwrap()),
                value: Mutex::new(self.inner.value.lock().unwrap().clone()),
                children: self.inner.children.clone(),
            };
            inner.attrs.insert(name.to_string(), value.to_string());
            Self {
                inner: Arc::new(inner),
                ..self
            }
        }

        pub(crate) fn with_text(self, text: &str) -> Self {
            let inner = FakeElementInner {
                tag: self.inner.tag.clone(),
                attrs: self.inner.attrs.clone(),
                text: text.to_string(),
                visible: self.inner.visible,
                enabled: self.inner.enabled,
                selected: Mutex::new(*self.inner.selected.lock().unwrap()),
                value: Mutex::new(self.inner.value.lock().unwrap().clone()),
                children: self.inner.children.clone(),
            };
            Self {
                inner: Arc::new(inner),
                ..self
            }
        }

        pub(crate) fn with_child(self, selector: &str, child: FakeElement) -> Self {
            let mut inner = FakeElementInner {
                tag: self.inner.tag.clone(),
                attrs: self.inner.attrs.clone(),
                text: self.inner.text.clone(),
                visible: self.inner.visible,
                enabled: self.inner.enabled,
                selected: Mutex::new(*self.inner.selected.lock().unwrap()),
                value: Mutex::new(self.inner.value.lock().unwrap().clone()),
                children: self.inner.children.clone(),
            };
            inner.children.entry(selector.to_string()).or_default().push(child);
            Self {
                inner: Arc::new(inner),
                ..self
            }
        }

        fn tracked(&self, log: Arc<Mutex<Vec<(String, String)>>>, key: String) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
                fill_log: Some(log),
                key,
            }
        }

        fn record(&self, value: &str) {
            if let Some(log) = &self.fill_log {
                log.lock().unwrap().push((self.key.clone(), value.to_string()));
            }
        }
    }

    #[async_trait]
    impl ElementHandle for FakeElement {
        async fn click(&self) -> PageResult<()> {
            *self.inner.selected.lock().unwrap() = true;
            self.record("<click>");
            Ok(())
        }

        async fn clear(&self) -> PageResult<()> {
            self.inner.value.lock().unwrap().clear();
            Ok(())
        }

        async fn set_value(&self, value: &str) -> PageResult<()> {
            *self.inner.value.lock().unwrap() = value.to_string();
            self.record(value);
            Ok(())
        }

        async fn select_option(&self, option: &str) -> PageResult<()> {
            *self.inner.value.lock().unwrap() = option.to_string();
            self.record(option);
            Ok(())
        }

        async fn is_visible(&self) -> PageResult<bool> {
            Ok(self.inner.visible)
        }

        async fn is_enabled(&self) -> PageResult<bool> {
            Ok(self.inner.enabled)
        }

        async fn is_selected(&self) -> PageResult<bool> {
            Ok(*self.inner.selected.lock().unwrap())
        }

        async fn tag_name(&self) -> PageResult<String> {
            Ok(self.inner.tag.clone())
        }

        async fn text(&self) -> PageResult<String> {
            Ok(self.inner.text.clone())
        }

        async fn attribute(&self, name: &str) -> PageResult<Option<String>> {
            Ok(self.inner.attrs.get(name).cloned())
        }

        async fn find_element(&self, selector: &str) -> PageResult<Option<Box<dyn ElementHandle>>> {
            Ok(self
                .inner
                .children
                .get(selector)
                .and_then(|els| els.first())
                .map(|el| {
                    let tracked = match &self.fill_log {
                        Some(log) => el.tracked(Arc::clone(log), format!("{}>{selector}", self.key)),
                        None => el.clone(),
                    };
                    Box::new(tracked) as Box<dyn ElementHandle>
                }))
        }

        async fn find_elements(&self, selector: &str) -> PageResult<Vec<Box<dyn ElementHandle>>> {
            Ok(self
                .inner
                .children
                .get(selector)
                .map(|els| {
                    els.iter()
                        .map(|el| {
                            let tracked = match &self.fill_log {
                                Some(log) => {
                                    el.tracked(Arc::clone(log), format!("{}>{selector}", self.key))
                                }
                                None => el.clone(),
                            };
                            Box::new(tracked) as Box<dyn ElementHandle>
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    /// Page whose selector lookups are scripted ahead of time.
    pub(crate) struct FakePage {
        url: Url,
        content: String,
        elements: HashMap<String, Vec<FakeElement>>,
        fills: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FakePage {
        pub(crate) fn new(url: &str) -> Self {
            Self {
                url: Url::parse(url).expect("valid test url"),
                content: String::new(),
                elements: HashMap::new(),
                fills: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn with_content(mut self, content: &str) -> Self {
            self.content = content.to_string();
            self
        }

        pub(crate) fn with_element(mut self, selector: &str, element: FakeElement) -> Self {
            self.elements
                .entry(selector.to_string())
                .or_default()
                .push(element);
            self
        }

        /// `(selector, value)` pairs recorded by `set_value`/`select_option`/`click`.
        pub(crate) fn fills(&self) -> Vec<(String, String)> {
            self.fills.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageHandle for FakePage {
        async fn navigate(&self, _url: &Url) -> PageResult<()> {
            Ok(())
        }

        async fn find_element(&self, selector: &str) -> PageResult<Option<Box<dyn ElementHandle>>> {
            Ok(self.elements.get(selector).and_then(|els| els.first()).map(|el| {
                Box::new(el.tracked(Arc::clone(&self.fills), selector.to_string()))
                    as Box<dyn ElementHandle>
            }))
        }

        async fn find_elements(&self, selector: &str) -> PageResult<Vec<Box<dyn ElementHandle>>> {
            Ok(self
                .elements
                .get(selector)
                .map(|els| {
                    els.iter()
                        .map(|el| {
                            Box::new(el.tracked(Arc::clone(&self.fills), selector.to_string()))
                                as Box<dyn ElementHandle>
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn content(&self) -> PageResult<String> {
            Ok(self.content.clone())
        }

        async fn current_url(&self) -> PageResult<Url> {
            Ok(self.url.clone())
        }

        async fn screenshot(&self, tag: &str) -> PageResult<ScreenshotRef> {
            Ok(ScreenshotRef(format!("memory://{tag}.png")))
        }
    }
}
