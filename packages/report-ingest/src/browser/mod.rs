//! `BrowserDriver` implementations.

#[cfg(feature = "browser")]
pub mod chrome;
pub mod fixture;

#[cfg(feature = "browser")]
pub use chrome::{ChromeBrowser, ChromeElement};
pub use fixture::{FixtureElement, HtmlFixtureBrowser};
