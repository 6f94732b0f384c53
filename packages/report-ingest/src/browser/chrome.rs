//! Live driver over an already-running, already-authenticated Chrome.
//!
//! Chrome must be started with `--remote-debugging-port` and logged in to the
//! reporting application. Login is not handled here.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::task::JoinHandle;

use crate::error::{DriverError, DriverResult};
use crate::traits::BrowserDriver;

/// Handle to a DOM node in the session's tab.
#[derive(Debug, Clone)]
pub struct ChromeElement(Arc<Element>);

pub struct ChromeBrowser {
    // Dropping the browser closes the connection, so it lives as long as the driver.
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeBrowser {
    /// Attach to Chrome's DevTools endpoint and adopt its first tab.
    pub async fn connect(debugger_url: &str) -> DriverResult<Self> {
        let (browser, mut handler) = Browser::connect(debugger_url)
            .await
            .map_err(|e| DriverError::Session(format!("connect {}: {}", debugger_url, e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "DevTools handler error");
                }
            }
        });

        let page = match browser.pages().await.map_err(session)?.into_iter().next() {
            Some(page) => page,
            None => browser.new_page("about:blank").await.map_err(session)?,
        };

        tracing::info!(debugger_url, "Attached to browser");
        Ok(Self {
            _browser: browser,
            page,
            handler,
        })
    }

    async fn js_string(&self, element: &ChromeElement, function: &str) -> DriverResult<Option<String>> {
        let returns = element
            .0
            .call_js_fn(function, false)
            .await
            .map_err(interaction)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}

impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn session(e: CdpError) -> DriverError {
    DriverError::Session(e.to_string())
}

fn interaction(e: CdpError) -> DriverError {
    let message = e.to_string();
    if message.contains("No node") || message.contains("not attached") {
        DriverError::StaleElement
    } else {
        DriverError::Interaction(message)
    }
}

fn query(selector: &str, e: CdpError) -> DriverError {
    DriverError::Query {
        selector: selector.to_string(),
        reason: e.to_string(),
    }
}

fn wrap(elements: Vec<Element>) -> Vec<ChromeElement> {
    elements.into_iter().map(|e| ChromeElement(Arc::new(e))).collect()
}

#[async_trait]
impl BrowserDriver for ChromeBrowser {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn find_text_matching(&self, pattern: &Regex) -> DriverResult<Option<String>> {
        let text: String = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(session)?
            .into_value()
            .map_err(|e| DriverError::Session(e.to_string()))?;
        Ok(pattern.find(&text).map(|m| m.as_str().to_string()))
    }

    async fn find_elements(&self, selector: &str) -> DriverResult<Vec<ChromeElement>> {
        // Nothing matching is an empty list, not an error.
        match self.page.find_elements(selector).await {
            Ok(found) => Ok(wrap(found)),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(query(selector, e)),
        }
    }

    async fn find_within(&self, element: &ChromeElement, selector: &str) -> DriverResult<Vec<ChromeElement>> {
        match element.0.find_elements(selector).await {
            Ok(found) => Ok(wrap(found)),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(query(selector, e)),
        }
    }

    async fn read_text(&self, element: &ChromeElement) -> DriverResult<String> {
        let text = element.0.inner_text().await.map_err(interaction)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn read_attribute(&self, element: &ChromeElement, name: &str) -> DriverResult<Option<String>> {
        match name {
            "textContent" => self.js_string(element, "function() { return this.textContent; }").await,
            "innerText" => self.js_string(element, "function() { return this.innerText; }").await,
            _ => element.0.attribute(name).await.map_err(interaction),
        }
    }

    async fn scroll_into_view(&self, element: &ChromeElement) -> DriverResult<()> {
        element
            .0
            .call_js_fn("function() { this.scrollIntoView({block: 'end'}); }", false)
            .await
            .map_err(interaction)?;
        Ok(())
    }

    async fn click(&self, element: &ChromeElement) -> DriverResult<()> {
        // Pointer clicks on the pager are intercepted by the sticky footer.
        element
            .0
            .call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(interaction)?;
        Ok(())
    }
}
