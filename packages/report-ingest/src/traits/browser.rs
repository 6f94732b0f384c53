use async_trait::async_trait;
use regex::Regex;

use crate::error::DriverResult;

/// An interactive browser session.
///
/// Element handles are only meaningful for the page that produced them; a
/// handle used after navigation or pagination may fail with
/// `DriverError::StaleElement`.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Element: Clone + Send + Sync;

    /// Load a URL in the session's tab.
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// First substring of the rendered page text matching `pattern`.
    async fn find_text_matching(&self, pattern: &Regex) -> DriverResult<Option<String>>;

    /// All elements matching a CSS selector, in document order.
    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<Self::Element>>;

    /// Descendants of `element` matching a CSS selector, in document order.
    async fn find_within(
        &self,
        element: &Self::Element,
        selector: &str,
    ) -> DriverResult<Vec<Self::Element>>;

    /// Visible text of an element.
    async fn read_text(&self, element: &Self::Element) -> DriverResult<String>;

    /// Attribute value, or DOM property for names like `textContent`.
    async fn read_attribute(&self, element: &Self::Element, name: &str)
        -> DriverResult<Option<String>>;

    async fn scroll_into_view(&self, element: &Self::Element) -> DriverResult<()>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;
}
