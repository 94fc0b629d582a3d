//! Page Abstraction
//!
//! Element lookup, waits and input for one browser tab. Node ids returned by
//! a lookup stay valid until the next lookup on the same page.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::cdp::{MouseEventType, Session};
use crate::error::{Error, Result};
use crate::human::Human;
use crate::selector::Selector;

/// Global counter for unique marker attributes so concurrent text lookups
/// never see each other's marks
static MARKER_COUNTER: AtomicU64 = AtomicU64::new(0);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A browser tab
pub struct Page {
    session: Session,
    human_input: bool,
}

impl Page {
    pub(crate) fn new(session: Session, human_input: bool) -> Self {
        Self {
            session,
            human_input,
        }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.session.navigate(url).await
    }

    pub async fn url(&self) -> Result<String> {
        self.session.frame_url().await
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// All elements currently matching `selector`, in document order. A union
    /// that needs text matching lists each part's matches in turn.
    pub async fn query(&self, selector: &Selector) -> Result<Vec<i32>> {
        if let Some(css) = selector.to_css() {
            return self.query_css(&css).await;
        }
        let Selector::AnyOf(parts) = selector else {
            return self.query_text(selector).await;
        };

        let mut nodes = Vec::new();
        for part in parts {
            let found = match part.to_css() {
                Some(css) => self.query_css(&css).await?,
                None => self.query_text(part).await?,
            };
            for node in found {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    async fn query_css(&self, css: &str) -> Result<Vec<i32>> {
        let root = self.session.document().await?;
        self.session.query_selector_all(root, css).await
    }

    /// Mark text matches with a unique attribute in the page, collect them by
    /// that attribute, then remove the marks
    async fn query_text(&self, selector: &Selector) -> Result<Vec<i32>> {
        let Selector::Text { scope, needles } = selector else {
            return Err(Error::ElementNotFound(selector.to_string()));
        };

        let marker_attr = format!(
            "data-restock-{}",
            MARKER_COUNTER.fetch_add(1, Ordering::SeqCst)
        );
        let own_text_only = scope == "*";

        let js = format!(
            r#"
            (() => {{
                const needles = {needles};
                const ownText = (el) => Array.from(el.childNodes)
                    .filter((n) => n.nodeType === Node.TEXT_NODE)
                    .map((n) => n.textContent)
                    .join('');
                const fullText = (el) => el.innerText || el.textContent || el.value || '';
                const textOf = {own_text_only} ? ownText : fullText;
                let count = 0;
                for (const el of document.querySelectorAll({scope})) {{
                    const t = textOf(el);
                    if (needles.some((n) => t.includes(n))) {{
                        el.setAttribute({marker}, 'true');
                        count++;
                    }}
                }}
                return count;
            }})()
            "#,
            needles = serde_json::to_string(needles)?,
            own_text_only = own_text_only,
            scope = serde_json::to_string(scope)?,
            marker = serde_json::to_string(&marker_attr)?,
        );

        let count = self.session.evaluate(&js).await?.as_u64().unwrap_or(0);
        if count == 0 {
            return Ok(Vec::new());
        }

        let root = self.session.document().await?;
        let nodes = self
            .session
            .query_selector_all(root, &format!("[{}]", marker_attr))
            .await?;

        let cleanup_js = format!(
            "document.querySelectorAll('[{0}]').forEach((el) => el.removeAttribute('{0}'))",
            marker_attr
        );
        self.session.evaluate(&cleanup_js).await?;

        Ok(nodes)
    }

    /// Wait until at least one element matches
    pub async fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<Vec<i32>> {
        let what = format!("'{}' not found", selector);
        poll_until(&what, timeout, || async {
            let nodes = self.query(selector).await?;
            Ok::<_, Error>((!nodes.is_empty()).then_some(nodes))
        })
        .await
    }

    /// Rendered with a box and not disabled
    pub async fn is_clickable(&self, node_id: i32) -> Result<bool> {
        match self.session.box_model(node_id).await {
            Ok(model) if model.center().is_some() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.is_not_rendered() => return Ok(false),
            Err(e) => return Err(e),
        }
        let enabled = self
            .session
            .call_on_node(node_id, "function() { return !this.disabled; }")
            .await?;
        Ok(enabled.as_bool().unwrap_or(false))
    }

    /// Wait until a matching element is clickable, returning the first one
    pub async fn wait_for_clickable(&self, selector: &Selector, timeout: Duration) -> Result<i32> {
        let what = format!("'{}' not clickable", selector);
        poll_until(&what, timeout, || async {
            for node in self.query(selector).await? {
                if self.is_clickable(node).await? {
                    return Ok(Some(node));
                }
            }
            Ok::<_, Error>(None)
        })
        .await
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Scroll the element into view and click its center
    pub async fn click(&self, node_id: i32) -> Result<()> {
        self.session
            .call_on_node(
                node_id,
                "function() { this.scrollIntoView({block: 'center', inline: 'center'}); }",
            )
            .await?;
        sleep(Duration::from_millis(50)).await;

        let (x, y) = self
            .session
            .box_model(node_id)
            .await?
            .center()
            .ok_or_else(|| Error::ElementNotFound(format!("node {} has no box", node_id)))?;

        if self.human_input {
            return Human::new(&self.session).move_and_click(x, y).await;
        }

        self.session.mouse(MouseEventType::MousePressed, x, y).await?;
        sleep(Duration::from_millis(50)).await;
        self.session.mouse(MouseEventType::MouseReleased, x, y).await
    }

    /// Click into a field, clear it, and type `text`
    pub async fn type_into(&self, node_id: i32, text: &str) -> Result<()> {
        self.click(node_id).await?;
        self.session.focus(node_id).await?;
        self.session
            .call_on_node(
                node_id,
                "function() { if ('value' in this) { this.select(); this.value = ''; } }",
            )
            .await?;

        if self.human_input {
            Human::new(&self.session).type_text(text).await
        } else {
            self.session.insert_text(text).await
        }
    }

    /// Visible text of an element, trimmed
    pub async fn text(&self, node_id: i32) -> Result<String> {
        let value = self
            .session
            .call_on_node(
                node_id,
                "function() { return (this.innerText || this.textContent || '').trim(); }",
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

/// Retry `attempt` every [`POLL_INTERVAL`] until it yields a value or
/// `timeout` passes. Lookup errors mid-render count as "not yet"; a closed
/// browser or a broken transport ends the wait at once.
async fn poll_until<T, F, Fut>(what: &str, timeout: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut last_error = None;

    loop {
        match attempt().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e @ (Error::Closed | Error::Transport { .. })) => return Err(e),
            Err(e) => {
                tracing::debug!("{}, retrying after: {}", what, e);
                last_error = Some(e);
            }
        }

        if start.elapsed() >= timeout {
            let detail = match last_error {
                Some(e) => format!("{} within {}ms (last error: {})", what, timeout.as_millis(), e),
                None => format!("{} within {}ms", what, timeout.as_millis()),
            };
            return Err(Error::Timeout(detail));
        }

        sleep(POLL_INTERVAL).await;
    }
}
