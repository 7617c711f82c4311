//! Browser automation boundary.
//!
//! Capability traits for the externally provided page driver plus the
//! CAPTCHA detection gate that runs against it.

pub mod captcha;
pub mod page;

pub use captcha::{CaptchaDetectionResult, CaptchaDetector, CaptchaKind};
pub use page::{ElementHandle, PageError, PageHandle, PageResult, ScreenshotRef};
