//! Extension descriptor wiring.
//!
//! A descriptor is a JSON tree produced by the UI-side registry. The tree is
//! opaque except for function nodes: any object carrying a `"__function"` key
//! describes a stub to wire into an extension's service registry. Top-level
//! keys name the extensions the subtrees belong to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::services::{ServiceFn, ServiceRegistry};

/// Key marking a function node inside a descriptor tree.
pub const FUNCTION_KEY: &str = "__function";

/// Options attached to a descriptor function node.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FunctionOptions {
    /// Run the function in this process instead of forwarding it.
    #[serde(rename = "runLocal", default)]
    pub run_local: bool,
}

/// A function node parsed out of a descriptor tree.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionNode {
    /// Full dotted name of the function.
    #[serde(rename = "__function")]
    pub function: String,

    /// Node options.
    #[serde(default)]
    pub options: FunctionOptions,

    /// Declared parameter names. Accepted for descriptor compatibility;
    /// local functions are bound by name, not synthesized from these.
    #[serde(default)]
    pub args: Vec<String>,

    /// Source text for `runLocal` nodes. Accepted and ignored; local
    /// functions come from a statically registered table.
    #[serde(default)]
    pub body: Option<String>,
}

impl FunctionNode {
    /// Parse a function node from a descriptor object, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get(FUNCTION_KEY).is_some() {
            serde_json::from_value(value.clone()).ok()
        } else {
            None
        }
    }
}

/// A single outbound call ready for the wire.
///
/// Created per call, serialized into the `callFunction` event payload, not
/// retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    /// Extension making the call.
    pub extension_id: String,
    /// Dotted name of the function to call.
    pub function_name: String,
    /// Ordered call arguments.
    pub arguments: Vec<Value>,
}

impl PendingCall {
    /// Create a pending call.
    pub fn new(
        extension_id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            function_name: function_name.into(),
            arguments,
        }
    }

    /// Event payload form: `[extension_id, function_name, arguments]`.
    pub fn into_payload(self) -> Vec<Value> {
        vec![
            Value::String(self.extension_id),
            Value::String(self.function_name),
            Value::Array(self.arguments),
        ]
    }
}

/// Factory building invokables for descriptor function nodes.
///
/// The two build paths mirror the two stub flavors the bridge wires:
/// descriptor-described functions (local or forwarding, with callback
/// conversion) and plain named wrappers (forwarding only).
pub trait StubFactory: Send + Sync {
    /// Build an invokable for a descriptor function node.
    ///
    /// `runLocal` nodes resolve against a statically registered local
    /// function table; anything else forwards across the process boundary.
    fn create_function(
        &self,
        services: &Arc<ServiceRegistry>,
        node: &FunctionNode,
    ) -> Result<ServiceFn>;

    /// Build a plain forwarding wrapper for a dotted name.
    fn create_wrapper(&self, services: &Arc<ServiceRegistry>, name: &str) -> ServiceFn;
}

/// Walk a descriptor subtree, yielding every function node found.
pub fn collect_function_nodes(tree: &Value) -> Vec<FunctionNode> {
    let mut nodes = Vec::new();
    walk(tree, &mut nodes);
    nodes
}

fn walk(value: &Value, out: &mut Vec<FunctionNode>) {
    let Some(object) = value.as_object() else {
        return;
    };
    if let Some(node) = FunctionNode::from_value(value) {
        out.push(node);
        return;
    }
    for child in object.values() {
        walk(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_node_parsing() {
        let value = json!({
            "__function": "ui.log",
            "options": { "runLocal": true },
            "args": ["message"],
            "body": "console.log(message);"
        });

        let node = FunctionNode::from_value(&value).unwrap();
        assert_eq!(node.function, "ui.log");
        assert!(node.options.run_local);
        assert_eq!(node.args, vec!["message"]);

        assert!(FunctionNode::from_value(&json!({ "plain": 1 })).is_none());
    }

    #[test]
    fn test_collect_function_nodes_recurses_namespaces() {
        let tree = json!({
            "ui": {
                "log": { "__function": "ui.log" },
                "dialogs": {
                    "show": { "__function": "ui.dialogs.show" }
                }
            },
            "version": "1.0"
        });

        let mut names: Vec<String> = collect_function_nodes(&tree)
            .into_iter()
            .map(|n| n.function)
            .collect();
        names.sort();
        assert_eq!(names, vec!["ui.dialogs.show", "ui.log"]);
    }

    #[test]
    fn test_pending_call_payload() {
        let call = PendingCall::new("foo", "a.b", vec![json!(1), json!("x")]);
        let payload = call.into_payload();
        assert_eq!(payload, vec![json!("foo"), json!("a.b"), json!([1, "x"])]);
    }
}
