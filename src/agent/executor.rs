//! The reasoning loop: ask the model what to do, run the tools it asks
//! for, feed the observations back, repeat until it answers.

use serde_json::{json, Value};

use crate::agent::capability::Capability;
use crate::error::{Error, Result};
use crate::provider::{ChatMessage, CompletionBackend, CompletionRequest, ModelSelection};

/// What the user sees when the model never produces an answer.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't process your request.";

/// One tool invocation, recorded in debug mode.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepTrace {
    pub tool: String,
    pub arguments: Value,
    pub result: Value,
}

#[derive(Debug)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<StepTrace>,
}

/// Run one capability call. Every failure becomes an observation the
/// model can read and recover from; nothing a tool does aborts the loop.
async fn dispatch(capabilities: &[Capability], name: &str, arguments: Value) -> Value {
    let Some(capability) = capabilities.iter().find(|c| c.name() == name) else {
        tracing::warn!(tool = name, "model requested unknown tool");
        return json!({ "error": format!("unknown tool: {name}") });
    };
    match capability.invoke(arguments).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(tool = name, error = %e, "tool call failed");
            json!({ "error": e.to_string() })
        }
    }
}

/// Drive the loop until the model answers in plain content, the step
/// budget runs out, or the provider fails hard. One retry is allowed
/// after a transient provider error.
pub async fn run(
    backend: &dyn CompletionBackend,
    selection: &ModelSelection,
    capabilities: &[Capability],
    mut messages: Vec<ChatMessage>,
    max_steps: usize,
    debug: bool,
) -> Result<AgentRun> {
    let tools: Vec<Value> = capabilities.iter().map(Capability::to_tool_spec).collect();
    let mut steps = Vec::new();
    let mut retried_transient = false;

    for step in 0..max_steps {
        let request = CompletionRequest {
            model: selection.model.clone(),
            temperature: selection.temperature,
            messages: messages.clone(),
            tools: tools.clone(),
        };
        let turn = match backend.complete(request).await {
            Ok(turn) => turn,
            Err(Error::Transient(e)) if !retried_transient => {
                tracing::warn!(step, error = %e, "transient provider error, re-thinking once");
                retried_transient = true;
                continue;
            }
            Err(e) => return Err(e),
        };

        if turn.tool_calls.is_empty() {
            match turn.content.filter(|c| !c.trim().is_empty()) {
                Some(answer) => return Ok(AgentRun { answer, steps }),
                // no answer and nothing to do: give up now rather than
                // burning the remaining steps
                None => break,
            }
        }

        messages.push(ChatMessage::assistant_tool_calls(
            turn.content,
            turn.tool_calls.iter().map(|c| c.raw.clone()).collect(),
        ));
        for call in turn.tool_calls {
            tracing::debug!(step, tool = %call.name, "running tool");
            let result = dispatch(capabilities, &call.name, call.arguments.clone()).await;
            if debug {
                steps.push(StepTrace {
                    tool: call.name.clone(),
                    arguments: call.arguments,
                    result: result.clone(),
                });
            }
            messages.push(ChatMessage::tool(call.id, result.to_string()));
        }
    }

    tracing::warn!(max_steps, "reasoning loop ended without an answer");
    Ok(AgentRun {
        answer: FALLBACK_ANSWER.to_string(),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::capability::EmptyParams;
    use crate::provider::{CompletionTurn, ModelSelection, Provider, ToolCallRequest};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a script of completion turns, one per call.
    struct ScriptedBackend {
        turns: Mutex<Vec<CompletionTurn>>,
    }

    impl ScriptedBackend {
        fn new(turns: Vec<CompletionTurn>) -> Self {
            ScriptedBackend {
                turns: Mutex::new(turns),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _request: CompletionRequest) -> crate::error::Result<CompletionTurn> {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                Ok(CompletionTurn::default())
            } else {
                Ok(turns.remove(0))
            }
        }
        async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
            Ok(vec![0.0; crate::semantic::EMBEDDING_DIM])
        }
    }

    fn selection() -> ModelSelection {
        ModelSelection::new(Provider::OpenAi, "gpt-4o-mini", 0.3)
    }

    fn ping_capability() -> Capability {
        Capability::new("ping", "Respond with pong.", |_: EmptyParams| async {
            Ok(json!("pong"))
        })
    }

    fn tool_turn(name: &str, arguments: Value) -> CompletionTurn {
        CompletionTurn {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: name.into(),
                arguments,
                raw: json!({"id": "call_1", "type": "function",
                            "function": {"name": name, "arguments": "{}"}}),
            }],
        }
    }

    fn answer_turn(text: &str) -> CompletionTurn {
        CompletionTurn {
            content: Some(text.into()),
            tool_calls: vec![],
        }
    }

    #[tokio::test]
    async fn direct_answer_ends_the_loop() {
        let backend = ScriptedBackend::new(vec![answer_turn("All done.")]);
        let run = run(&backend, &selection(), &[], vec![], 5, false).await.unwrap();
        assert_eq!(run.answer, "All done.");
        assert!(run.steps.is_empty());
    }

    #[tokio::test]
    async fn tool_calls_are_dispatched_then_answered() {
        let backend = ScriptedBackend::new(vec![
            tool_turn("ping", json!({})),
            answer_turn("pong received"),
        ]);
        let caps = vec![ping_capability()];
        let run = run(&backend, &selection(), &caps, vec![], 5, true).await.unwrap();
        assert_eq!(run.answer, "pong received");
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].tool, "ping");
        assert_eq!(run.steps[0].result, json!("pong"));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_an_observation_not_a_crash() {
        let backend = ScriptedBackend::new(vec![
            tool_turn("nonexistent", json!({})),
            answer_turn("recovered"),
        ]);
        let run = run(&backend, &selection(), &[], vec![], 5, true).await.unwrap();
        assert_eq!(run.answer, "recovered");
        assert!(run.steps[0].result["error"]
            .as_str()
            .unwrap()
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn invalid_arguments_become_an_observation() {
        let backend = ScriptedBackend::new(vec![
            tool_turn("ping", json!("not an object")),
            answer_turn("ok"),
        ]);
        let caps = vec![ping_capability()];
        let run = run(&backend, &selection(), &caps, vec![], 5, true).await.unwrap();
        assert!(run.steps[0].result["error"]
            .as_str()
            .unwrap()
            .contains("invalid arguments"));
    }

    #[tokio::test]
    async fn silence_yields_the_fallback_answer() {
        let backend = ScriptedBackend::new(vec![]);
        let run = run(&backend, &selection(), &[], vec![], 5, false).await.unwrap();
        assert_eq!(run.answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn step_budget_yields_the_fallback_answer() {
        // the model keeps calling tools forever
        let backend = ScriptedBackend::new(vec![
            tool_turn("ping", json!({})),
            tool_turn("ping", json!({})),
            tool_turn("ping", json!({})),
        ]);
        let caps = vec![ping_capability()];
        let run = run(&backend, &selection(), &caps, vec![], 2, false).await.unwrap();
        assert_eq!(run.answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn one_transient_error_is_retried() {
        struct FlakyBackend {
            failed: Mutex<bool>,
        }
        #[async_trait]
        impl CompletionBackend for FlakyBackend {
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> crate::error::Result<CompletionTurn> {
                let mut failed = self.failed.lock().unwrap();
                if !*failed {
                    *failed = true;
                    Err(Error::Transient("blip".into()))
                } else {
                    Ok(answer_turn("after retry"))
                }
            }
            async fn embed(&self, _text: &str) -> crate::error::Result<Vec<f32>> {
                Ok(vec![])
            }
        }

        let backend = FlakyBackend {
            failed: Mutex::new(false),
        };
        let run = run(&backend, &selection(), &[], vec![], 5, false).await.unwrap();
        assert_eq!(run.answer, "after retry");
    }
}
