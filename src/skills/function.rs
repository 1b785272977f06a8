//! Adapter turning a plain function into a [`Tool`].
//!
//! Most tools are synchronous and only need their parameters; a few need
//! the session. The handler shape decides whether the context is
//! forwarded, so plain handlers never have to accept one.

use async_trait::async_trait;
use serde_json::Value;

use super::{Tool, ToolContext};

/// Handler without access to the session.
pub type PlainHandler = fn(&Value) -> anyhow::Result<Value>;

/// Handler that reads or mutates the session context.
pub type ContextHandler = fn(&Value, &mut ToolContext) -> anyhow::Result<Value>;

enum Handler {
    Plain(PlainHandler),
    WithContext(ContextHandler),
}

/// A [`Tool`] backed by a plain function pointer.
pub struct FunctionTool {
    name: &'static str,
    description: &'static str,
    schema: Value,
    handler: Handler,
}

impl FunctionTool {
    pub fn new(
        name: &'static str,
        description: &'static str,
        schema: Value,
        handler: PlainHandler,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            handler: Handler::Plain(handler),
        }
    }

    pub fn with_context(
        name: &'static str,
        description: &'static str,
        schema: Value,
        handler: ContextHandler,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            handler: Handler::WithContext(handler),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, params: Value, context: &mut ToolContext) -> anyhow::Result<Value> {
        match self.handler {
            Handler::Plain(f) => f(&params),
            Handler::WithContext(f) => f(&params, context),
        }
    }
}

/// Reads an optional unsigned integer parameter, falling back to `default`.
///
/// Negative numbers are treated as zero so the caller's clamping applies.
pub(crate) fn int_param(params: &Value, key: &str, default: u64) -> u64 {
    match params.get(key) {
        Some(v) if v.is_i64() && v.as_i64().unwrap_or(0) < 0 => 0,
        Some(v) => v.as_u64().unwrap_or(default),
        None => default,
    }
}

/// Reads a required string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    params[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}
