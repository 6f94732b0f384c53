//! Browser driver over canned HTML pages.
//!
//! Routes map a URL substring to a sequence of pages. Navigating to a routed
//! URL shows its first page; clicking any enabled element advances to the
//! next page of the route, the way a pagination control would. Unrouted URLs
//! render an empty document.
//!
//! Documents are re-parsed on every call; element handles are document-order
//! ordinals tagged with the page generation they were read from.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{DriverError, DriverResult};
use crate::traits::BrowserDriver;

const EMPTY_PAGE: &str = "<html><head></head><body></body></html>";

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    pages: Vec<String>,
    fail: bool,
}

#[derive(Debug, Default)]
struct Session {
    route: Option<usize>,
    page: usize,
    generation: u64,
}

/// Handle to an element of the page that was current when it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureElement {
    generation: u64,
    ordinal: usize,
}

#[derive(Debug, Default)]
pub struct HtmlFixtureBrowser {
    routes: Vec<Route>,
    unreadable: Vec<String>,
    session: RwLock<Session>,
    navigations: RwLock<Vec<String>>,
    clicks: AtomicUsize,
}

impl HtmlFixtureBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` in order for URLs containing `pattern`.
    ///
    /// Earlier routes win when several patterns match.
    pub fn with_route(mut self, pattern: impl Into<String>, pages: Vec<String>) -> Self {
        self.routes.push(Route {
            pattern: pattern.into(),
            pages,
            fail: false,
        });
        self
    }

    /// Fail navigation to URLs containing `pattern`.
    pub fn with_failing_route(mut self, pattern: impl Into<String>) -> Self {
        self.routes.push(Route {
            pattern: pattern.into(),
            pages: Vec::new(),
            fail: true,
        });
        self
    }

    /// Fail `read_text` on elements matching `selector`.
    pub fn with_unreadable_text(mut self, selector: impl Into<String>) -> Self {
        self.unreadable.push(selector.into());
        self
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.read().unwrap().clone()
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    fn current(&self) -> (String, u64) {
        let session = self.session.read().unwrap();
        let html = session
            .route
            .and_then(|r| self.routes.get(r))
            .and_then(|r| r.pages.get(session.page))
            .map(String::as_str)
            .unwrap_or(EMPTY_PAGE);
        (html.to_string(), session.generation)
    }

    /// Run `f` against the element behind `handle` on the current page.
    fn with_element<R>(
        &self,
        handle: &FixtureElement,
        f: impl FnOnce(ElementRef<'_>, &[ElementRef<'_>]) -> DriverResult<R>,
    ) -> DriverResult<R> {
        let (html, generation) = self.current();
        if handle.generation != generation {
            return Err(DriverError::StaleElement);
        }

        let document = Html::parse_document(&html);
        let all = elements(&document);
        let element = all.get(handle.ordinal).copied().ok_or(DriverError::StaleElement)?;
        f(element, &all)
    }

    fn select(&self, scope: Option<&FixtureElement>, selector: &str) -> DriverResult<Vec<FixtureElement>> {
        let parsed = parse_selector(selector)?;
        let handles = |all: &[ElementRef<'_>], matches: Vec<ElementRef<'_>>, generation: u64| {
            matches
                .iter()
                .filter_map(|m| all.iter().position(|e| e.id() == m.id()))
                .map(|ordinal| FixtureElement { generation, ordinal })
                .collect::<Vec<_>>()
        };

        match scope {
            Some(handle) => self.with_element(handle, |element, all| {
                Ok(handles(all, element.select(&parsed).collect(), handle.generation))
            }),
            None => {
                let (html, generation) = self.current();
                let document = Html::parse_document(&html);
                let all = elements(&document);
                Ok(handles(&all, document.select(&parsed).collect(), generation))
            }
        }
    }

    fn advance(&self) {
        let mut session = self.session.write().unwrap();
        let pages = session
            .route
            .and_then(|r| self.routes.get(r))
            .map(|r| r.pages.len())
            .unwrap_or(0);

        if session.page + 1 < pages {
            session.page += 1;
            session.generation += 1;
        }
    }
}

fn elements(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn parse_selector(selector: &str) -> DriverResult<Selector> {
    Selector::parse(selector).map_err(|e| DriverError::Query {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Rendered text: whitespace runs collapsed, ends trimmed.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl BrowserDriver for HtmlFixtureBrowser {
    type Element = FixtureElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.navigations.write().unwrap().push(url.to_string());

        let route = self.routes.iter().position(|r| url.contains(&r.pattern));
        if let Some(index) = route {
            if self.routes[index].fail {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                });
            }
        }

        let mut session = self.session.write().unwrap();
        session.route = route;
        session.page = 0;
        session.generation += 1;
        Ok(())
    }

    async fn find_text_matching(&self, pattern: &Regex) -> DriverResult<Option<String>> {
        let (html, _) = self.current();
        let document = Html::parse_document(&html);
        let text = visible_text(document.root_element());
        Ok(pattern.find(&text).map(|m| m.as_str().to_string()))
    }

    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<FixtureElement>> {
        self.select(None, selector)
    }

    async fn find_within(&self, element: &FixtureElement, selector: &str) -> DriverResult<Vec<FixtureElement>> {
        self.select(Some(element), selector)
    }

    async fn read_text(&self, element: &FixtureElement) -> DriverResult<String> {
        let unreadable = self
            .unreadable
            .iter()
            .map(|s| parse_selector(s))
            .collect::<DriverResult<Vec<_>>>()?;

        self.with_element(element, |el, _| {
            if unreadable.iter().any(|s| s.matches(&el)) {
                return Err(DriverError::Interaction("text not readable".into()));
            }
            Ok(visible_text(el))
        })
    }

    async fn read_attribute(&self, element: &FixtureElement, name: &str) -> DriverResult<Option<String>> {
        self.with_element(element, |el, _| {
            Ok(match name {
                "textContent" => Some(el.text().collect::<String>()),
                "innerText" => Some(visible_text(el)),
                _ => el.value().attr(name).map(str::to_string),
            })
        })
    }

    async fn scroll_into_view(&self, element: &FixtureElement) -> DriverResult<()> {
        self.with_element(element, |_, _| Ok(()))
    }

    async fn click(&self, element: &FixtureElement) -> DriverResult<()> {
        self.with_element(element, |el, _| match el.value().attr("disabled") {
            Some(_) => Err(DriverError::Interaction("element is disabled".into())),
            None => Ok(()),
        })?;

        self.clicks.fetch_add(1, Ordering::SeqCst);
        self.advance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<html><body>{}</body></html>", body)
    }

    #[tokio::test]
    async fn test_unrouted_url_is_empty_page() {
        let browser = HtmlFixtureBrowser::new();
        browser.navigate("https://example.test/anything").await.unwrap();

        assert!(browser.find_elements("tr").await.unwrap().is_empty());
        assert_eq!(browser.navigations(), vec!["https://example.test/anything"]);
    }

    #[tokio::test]
    async fn test_reads_text_attributes_and_scoped_elements() {
        let browser = HtmlFixtureBrowser::new().with_route(
            "convo-list",
            vec![page(
                r#"<p>Hiển thị 1 - 2 trong   tổng số <b>2</b></p>
                <table><tr><td><img title="Agent A"></td><td> x  y </td></tr></table>"#,
            )],
        );
        browser.navigate("https://example.test/convo-list?c=1").await.unwrap();

        let total = Regex::new(r"tổng số\s+(\d+)").unwrap();
        assert_eq!(
            browser.find_text_matching(&total).await.unwrap().as_deref(),
            Some("tổng số 2")
        );

        let row = browser.find_elements("tr").await.unwrap().remove(0);
        let cells = browser.find_within(&row, "td").await.unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(browser.read_text(&cells[1]).await.unwrap(), "x y");

        let img = browser.find_within(&cells[0], "img").await.unwrap().remove(0);
        assert_eq!(
            browser.read_attribute(&img, "title").await.unwrap().as_deref(),
            Some("Agent A")
        );
        assert_eq!(browser.read_attribute(&img, "alt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_click_advances_and_invalidates_handles() {
        let browser = HtmlFixtureBrowser::new().with_route(
            "call-list",
            vec![page("<button>next</button><p>one</p>"), page("<button disabled>next</button><p>two</p>")],
        );
        browser.navigate("/call-list").await.unwrap();

        let next = browser.find_elements("button").await.unwrap().remove(0);
        browser.click(&next).await.unwrap();
        assert!(matches!(browser.read_text(&next).await, Err(DriverError::StaleElement)));

        let p = browser.find_elements("p").await.unwrap().remove(0);
        assert_eq!(browser.read_text(&p).await.unwrap(), "two");

        let disabled = browser.find_elements("button").await.unwrap().remove(0);
        assert_eq!(
            browser.read_attribute(&disabled, "disabled").await.unwrap().as_deref(),
            Some("")
        );
        assert!(browser.click(&disabled).await.is_err());
        assert_eq!(browser.click_count(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_text_only_affects_matching_elements() {
        let browser = HtmlFixtureBrowser::new()
            .with_route("call-list", vec![page("<table><tr><td>0901</td></tr></table>")])
            .with_unreadable_text("tr");
        browser.navigate("/call-list").await.unwrap();

        let row = browser.find_elements("tr").await.unwrap().remove(0);
        assert!(matches!(browser.read_text(&row).await, Err(DriverError::Interaction(_))));

        let cell = browser.find_within(&row, "td").await.unwrap().remove(0);
        assert_eq!(browser.read_text(&cell).await.unwrap(), "0901");
    }

    #[tokio::test]
    async fn test_failing_route_and_bad_selector() {
        let browser = HtmlFixtureBrowser::new().with_failing_route("down");
        assert!(matches!(
            browser.navigate("https://down.test").await,
            Err(DriverError::Navigation { .. })
        ));
        assert!(matches!(
            browser.find_elements("tr[").await,
            Err(DriverError::Query { .. })
        ));
    }
}
