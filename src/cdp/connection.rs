//! CDP Connection/Session Management
//!
//! A [`Connection`] talks to the browser endpoint; a [`Session`] is attached
//! to one page target and carries the page-level commands.

use std::sync::Arc;

use super::transport::Transport;
use super::types::*;
use crate::error::{Error, Result};

/// A CDP connection to Chrome
pub struct Connection {
    transport: Arc<Transport>,
}

impl Connection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Get browser version info
    pub async fn version(&self) -> Result<BrowserVersion> {
        self.transport.call(None, &BrowserGetVersion {}).await
    }

    /// Open a tab and attach a flat session to it
    pub async fn open_page(&self, url: &str) -> Result<Session> {
        let target = self
            .transport
            .call(
                None,
                &TargetCreateTarget {
                    url: url.to_string(),
                },
            )
            .await?;

        let attached = self
            .transport
            .call(
                None,
                &TargetAttachToTarget {
                    target_id: target.target_id.clone(),
                    flatten: true,
                },
            )
            .await?;

        Ok(Session {
            transport: Arc::clone(&self.transport),
            session_id: attached.session_id,
            target_id: target.target_id,
        })
    }

    /// Ask Chrome to exit, then tear down the transport
    pub async fn close(&self) -> Result<()> {
        if !self.transport.is_detached() {
            let _ = self.transport.call(None, &BrowserClose {}).await;
        }
        self.transport.close().await
    }
}

/// A CDP session attached to a specific target
pub struct Session {
    transport: Arc<Transport>,
    session_id: String,
    target_id: String,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Send a command to this session
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.transport.call(Some(&self.session_id), command).await
    }

    pub async fn page_enable(&self) -> Result<()> {
        self.call(&PageEnable {}).await?;
        Ok(())
    }

    /// Navigate, surfacing Chrome's net error text as a navigation error
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self
            .call(&PageNavigate {
                url: url.to_string(),
            })
            .await?;
        match result.error_text {
            Some(error) => Err(Error::Navigation(format!("{}: {}", url, error))),
            None => Ok(()),
        }
    }

    pub async fn add_script_on_new_document(&self, source: &str) -> Result<()> {
        self.call(&PageAddScriptToEvaluateOnNewDocument {
            source: source.to_string(),
        })
        .await?;
        Ok(())
    }

    /// URL of the top-level frame
    pub async fn frame_url(&self) -> Result<String> {
        let tree = self.call(&PageGetFrameTree {}).await?;
        Ok(tree.frame_tree.frame.url)
    }

    pub async fn mouse(&self, kind: MouseEventType, x: f64, y: f64) -> Result<()> {
        let (button, click_count) = match kind {
            MouseEventType::MouseMoved => (None, None),
            _ => (Some(MouseButton::Left), Some(1)),
        };
        self.call(&InputDispatchMouseEvent {
            r#type: kind,
            x,
            y,
            button,
            click_count,
        })
        .await?;
        Ok(())
    }

    /// Type one character as a `char` key event
    pub async fn key_char(&self, ch: char) -> Result<()> {
        self.call(&InputDispatchKeyEvent {
            r#type: KeyEventType::Char,
            text: Some(ch.to_string()),
            key: None,
            code: None,
        })
        .await?;
        Ok(())
    }

    /// Press and release a named key (e.g. `Backspace`)
    pub async fn key_press(&self, key: &str) -> Result<()> {
        for kind in [KeyEventType::KeyDown, KeyEventType::KeyUp] {
            self.call(&InputDispatchKeyEvent {
                r#type: kind,
                text: None,
                key: Some(key.to_string()),
                code: Some(key.to_string()),
            })
            .await?;
        }
        Ok(())
    }

    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.call(&InputInsertText {
            text: text.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Node id of the document root
    pub async fn document(&self) -> Result<i32> {
        let doc = self.call(&DOMGetDocument { depth: 0 }).await?;
        Ok(doc.root.node_id)
    }

    pub async fn query_selector_all(&self, node_id: i32, selector: &str) -> Result<Vec<i32>> {
        let result = self
            .call(&DOMQuerySelectorAll {
                node_id,
                selector: selector.to_string(),
            })
            .await?;
        Ok(result.node_ids.into_iter().filter(|&id| id != 0).collect())
    }

    pub async fn box_model(&self, node_id: i32) -> Result<BoxModel> {
        let result = self.call(&DOMGetBoxModel { node_id }).await?;
        Ok(result.model)
    }

    pub async fn focus(&self, node_id: i32) -> Result<()> {
        self.call(&DOMFocus { node_id }).await?;
        Ok(())
    }

    /// Run `function() { ... }` with `this` bound to the node, returning its value
    pub async fn call_on_node(&self, node_id: i32, function: &str) -> Result<serde_json::Value> {
        let resolved = self
            .call(&DOMResolveNode {
                node_id,
                object_group: "restock".to_string(),
            })
            .await?;
        let object_id = resolved
            .object
            .object_id
            .ok_or_else(|| Error::cdp("DOM.resolveNode", -1, "No object_id returned"))?;

        let result = self
            .call(&RuntimeCallFunctionOn {
                function_declaration: function.to_string(),
                object_id,
                return_by_value: true,
            })
            .await?;
        into_value(result)
    }

    /// Evaluate an expression in the page, returning its value
    pub async fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .call(&RuntimeEvaluate {
                expression: expression.to_string(),
                return_by_value: true,
                await_promise: true,
            })
            .await?;
        into_value(result)
    }
}

fn into_value(result: EvaluateResult) -> Result<serde_json::Value> {
    if let Some(exception) = result.exception_details {
        return Err(Error::Script(format!(
            "{} at {}:{}",
            exception.text, exception.line_number, exception.column_number
        )));
    }
    Ok(result.result.value.unwrap_or(serde_json::Value::Null))
}
