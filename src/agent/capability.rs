//! Capabilities are the agent's tools: a name, a description the model
//! reads, a JSON schema for the arguments, and a handler.
//!
//! Tables are declared statically per store and concatenated by the
//! assembler, so the full tool surface is visible in one place per module
//! rather than discovered at runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

type BoxFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type Handler = Box<dyn Fn(Value) -> BoxFuture + Send + Sync>;

pub struct Capability {
    name: &'static str,
    description: &'static str,
    parameters: Value,
    handler: Handler,
}

impl Capability {
    /// A capability backed by an async handler.
    pub fn new<P, F, Fut>(name: &'static str, description: &'static str, f: F) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Capability {
            name,
            description,
            parameters: parameter_schema::<P>(),
            handler: Box::new(move |args| {
                let params = match parse_args::<P>(args) {
                    Ok(p) => p,
                    Err(e) => return Box::pin(async move { Err::<Value, Error>(e) }),
                };
                Box::pin(f(params))
            }),
        }
    }

    /// A capability backed by synchronous work, run on the blocking pool.
    /// This is the constructor the SQLite-backed stores use.
    pub fn blocking<P, F>(name: &'static str, description: &'static str, f: F) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(P) -> Result<Value> + Send + Sync + Clone + 'static,
    {
        Capability::new(name, description, move |params: P| {
            let f = f.clone();
            async move {
                tokio::task::spawn_blocking(move || f(params))
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "blocking capability panicked");
                        Error::Processing
                    })?
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Run the capability against raw JSON arguments from the model.
    pub async fn invoke(&self, args: Value) -> Result<Value> {
        (self.handler)(args).await
    }

    /// The OpenAI-style tool declaration sent with completion requests.
    pub fn to_tool_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).finish()
    }
}

/// Argument structs for capabilities that take none. Kept as a real struct
/// so every capability advertises an object schema.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

fn parse_args<P: DeserializeOwned>(args: Value) -> Result<P> {
    // Models sometimes send null or omit arguments entirely for
    // parameterless tools.
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| Error::Validation(format!("invalid arguments: {e}")))
}

fn parameter_schema<P: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(P)).unwrap_or_else(|_| json!({"type": "object"}))
}

/// Take the connection lock, mapping a poisoned mutex to an opaque error.
pub fn lock_db(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| {
        tracing::error!(error = %e, "database mutex poisoned");
        Error::Processing
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoParams {
        message: String,
    }

    #[tokio::test]
    async fn invoke_deserializes_arguments() {
        let cap = Capability::new("echo", "Echo the message back.", |p: EchoParams| async move {
            Ok(json!({ "echo": p.message }))
        });
        let out = cap.invoke(json!({ "message": "hi" })).await.unwrap();
        assert_eq!(out, json!({ "echo": "hi" }));
    }

    #[tokio::test]
    async fn bad_arguments_surface_as_validation_errors() {
        let cap = Capability::new("echo", "Echo the message back.", |p: EchoParams| async move {
            Ok(json!({ "echo": p.message }))
        });
        let err = cap.invoke(json!({ "message": 7 })).await;
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn null_arguments_are_treated_as_empty() {
        let cap = Capability::new("ping", "Respond with pong.", |_: EmptyParams| async {
            Ok(json!("pong"))
        });
        assert_eq!(cap.invoke(Value::Null).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn blocking_handlers_run_off_the_async_thread() {
        let cap = Capability::blocking("add", "Add one.", |p: EchoParams| {
            Ok(json!(format!("{}!", p.message)))
        });
        let out = cap.invoke(json!({ "message": "done" })).await.unwrap();
        assert_eq!(out, json!("done!"));
    }

    #[test]
    fn tool_spec_carries_the_schema() {
        let cap = Capability::new("echo", "Echo the message back.", |p: EchoParams| async move {
            Ok(json!(p.message))
        });
        let spec = cap.to_tool_spec();
        assert_eq!(spec["function"]["name"], "echo");
        assert!(spec["function"]["parameters"]["properties"]["message"].is_object());
    }
}
