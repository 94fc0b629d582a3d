//! Hand-written CDP types for the handful of commands the restock flow sends
//!
//! Each request type implements [`Command`], which ties it to its method name
//! and response type so call sites stay typed end to end.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A CDP request with a fixed method name and typed response
pub trait Command: Serialize {
    const METHOD: &'static str;
    type Response: DeserializeOwned;
}

/// Response for commands whose result we ignore
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

macro_rules! command {
    ($ty:ty, $method:literal, $response:ty) => {
        impl Command for $ty {
            const METHOD: &'static str = $method;
            type Response = $response;
        }
    };
}

// === Browser ===

#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowserGetVersion {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowserClose {}

command!(BrowserGetVersion, "Browser.getVersion", BrowserVersion);
command!(BrowserClose, "Browser.close", Empty);

// === Target ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreateTarget {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreateTargetResult {
    #[serde(default)]
    pub target_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAttachToTarget {
    pub target_id: String,
    pub flatten: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAttachToTargetResult {
    #[serde(default)]
    pub session_id: String,
}

command!(TargetCreateTarget, "Target.createTarget", TargetCreateTargetResult);
command!(
    TargetAttachToTarget,
    "Target.attachToTarget",
    TargetAttachToTargetResult
);

// === Page ===

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageEnable {}

#[derive(Debug, Clone, Serialize)]
pub struct PageNavigate {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNavigateResult {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageAddScriptToEvaluateOnNewDocument {
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageGetFrameTree {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGetFrameTreeResult {
    #[serde(default)]
    pub frame_tree: FrameTree,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameTree {
    #[serde(default)]
    pub frame: Frame,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
}

command!(PageEnable, "Page.enable", Empty);
command!(PageNavigate, "Page.navigate", PageNavigateResult);
command!(
    PageAddScriptToEvaluateOnNewDocument,
    "Page.addScriptToEvaluateOnNewDocument",
    Empty
);
command!(PageGetFrameTree, "Page.getFrameTree", PageGetFrameTreeResult);

// === Input ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDispatchMouseEvent {
    pub r#type: MouseEventType,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
    MouseMoved,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDispatchKeyEvent {
    pub r#type: KeyEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
    Char,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputInsertText {
    pub text: String,
}

command!(InputDispatchMouseEvent, "Input.dispatchMouseEvent", Empty);
command!(InputDispatchKeyEvent, "Input.dispatchKeyEvent", Empty);
command!(InputInsertText, "Input.insertText", Empty);

// === DOM ===

#[derive(Debug, Clone, Serialize)]
pub struct DOMGetDocument {
    pub depth: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DOMGetDocumentResult {
    #[serde(default)]
    pub root: DOMNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMNode {
    #[serde(default)]
    pub node_id: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMQuerySelectorAll {
    pub node_id: i32,
    pub selector: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMQuerySelectorAllResult {
    #[serde(default)]
    pub node_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMGetBoxModel {
    pub node_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DOMGetBoxModelResult {
    #[serde(default)]
    pub model: BoxModel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxModel {
    /// Content quad as `[x1, y1, x2, y2, x3, y3, x4, y4]`
    #[serde(default)]
    pub content: Vec<f64>,
}

impl BoxModel {
    pub fn center(&self) -> Option<(f64, f64)> {
        let c = self.content.get(..8)?;
        let x = (c[0] + c[2] + c[4] + c[6]) / 4.0;
        let y = (c[1] + c[3] + c[5] + c[7]) / 4.0;
        Some((x, y))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMResolveNode {
    pub node_id: i32,
    pub object_group: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DOMResolveNodeResult {
    #[serde(default)]
    pub object: RemoteObject,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DOMFocus {
    pub node_id: i32,
}

command!(DOMGetDocument, "DOM.getDocument", DOMGetDocumentResult);
command!(
    DOMQuerySelectorAll,
    "DOM.querySelectorAll",
    DOMQuerySelectorAllResult
);
command!(DOMGetBoxModel, "DOM.getBoxModel", DOMGetBoxModelResult);
command!(DOMResolveNode, "DOM.resolveNode", DOMResolveNodeResult);
command!(DOMFocus, "DOM.focus", Empty);

// === Runtime ===

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvaluate {
    pub expression: String,
    pub return_by_value: bool,
    pub await_promise: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCallFunctionOn {
    pub function_declaration: String,
    pub object_id: String,
    pub return_by_value: bool,
}

/// Shared result shape of `Runtime.evaluate` and `Runtime.callFunctionOn`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    #[serde(default)]
    pub result: RemoteObject,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub text: String,
    #[serde(default)]
    pub line_number: i32,
    #[serde(default)]
    pub column_number: i32,
}

command!(RuntimeEvaluate, "Runtime.evaluate", EvaluateResult);
command!(RuntimeCallFunctionOn, "Runtime.callFunctionOn", EvaluateResult);
