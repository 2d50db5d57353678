use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use qa_healing::SelfHealingEngine;
use qa_transport::Transport;
use tower::{Service, ServiceExt};

use crate::model::{Action, StepResult, StepStatus, TestRunResult, TestSpec};

/// Everything one test run needs: the spec, its merged variables, and the
/// pooled context it executes in.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub spec: TestSpec,
    pub variables: HashMap<String, serde_json::Value>,
    pub context_id: String,
}

/// Runs one `ExecutionContext` to completion. Automatically implemented for
/// cloneable Tower services, mirroring how `spire_core::backend::Worker`
/// adapts a `Service` into a single-call async method.
pub trait StepExecutor: Clone + Send + 'static {
    fn run_test(self, cx: ExecutionContext) -> impl Future<Output = TestRunResult> + Send;
}

impl<S> StepExecutor for S
where
    S: Service<ExecutionContext, Response = TestRunResult, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    #[inline]
    async fn run_test(self, cx: ExecutionContext) -> TestRunResult {
        let mut this = self.clone();
        let ready = this.ready().await.expect("StepExecutor should be infallible");
        ready.call(cx).await.expect("StepExecutor should be infallible")
    }
}

/// Builds the reference `StepExecutor`: drives `Action`s against a pooled
/// browser context directly through `Transport`, healing a selector via
/// `SelfHealingEngine` the first time it fails to resolve.
pub fn browser_executor(transport: Transport, healing: Option<Arc<SelfHealingEngine>>) -> impl StepExecutor {
    tower::service_fn(move |cx: ExecutionContext| {
        let transport = transport.clone();
        let healing = healing.clone();
        async move { Ok::<_, Infallible>(run_spec(&transport, healing.as_deref(), cx).await) }
    })
}

async fn run_spec(transport: &Transport, healing: Option<&SelfHealingEngine>, cx: ExecutionContext) -> TestRunResult {
    let start = Instant::now();
    let context_id = cx.context_id;
    let mut variables = cx.variables;
    let mut steps = Vec::with_capacity(cx.spec.steps.len());

    for action in &cx.spec.steps {
        let step_start = Instant::now();
        match run_step(transport, healing, &context_id, action, &mut variables).await {
            Ok(()) => steps.push(StepResult {
                kind: action.kind(),
                status: StepStatus::Passed,
                error: None,
                duration: step_start.elapsed(),
            }),
            Err(message) => {
                steps.push(StepResult {
                    kind: action.kind(),
                    status: StepStatus::Failed,
                    error: Some(message.clone()),
                    duration: step_start.elapsed(),
                });
                let total_steps = cx.spec.steps.len();
                return TestRunResult {
                    test_name: cx.spec.name,
                    status: StepStatus::Failed,
                    steps,
                    total_steps,
                    error: Some(message),
                    duration: start.elapsed(),
                    retry_count: 0,
                };
            }
        }
    }

    TestRunResult::passed(cx.spec.name, steps, start.elapsed())
}

async fn run_step(
    transport: &Transport,
    healing: Option<&SelfHealingEngine>,
    context_id: &str,
    action: &Action,
    variables: &mut HashMap<String, serde_json::Value>,
) -> Result<(), String> {
    match action {
        Action::Navigate { url } => {
            let url = interpolate(url, variables);
            call(transport, context_id, "navigate", [("url", url.into())]).await
        }
        Action::Click { selector } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            call(transport, context_id, "click", [("selector", selector.into())]).await
        }
        Action::Fill { selector, value } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            let value = interpolate(value, variables);
            call(transport, context_id, "type", [("selector", selector.into()), ("text", value.into())]).await
        }
        Action::Select { selector, value } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            let value = interpolate(value, variables);
            call(transport, context_id, "pick", [("selector", selector.into()), ("value", value.into())]).await
        }
        Action::Hover { selector } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            call(transport, context_id, "highlight", [("selector", selector.into())]).await
        }
        Action::Scroll { selector, dx, dy } => match selector {
            Some(selector) => {
                let selector = resolve_selector(transport, healing, context_id, selector).await?;
                call(transport, context_id, "scrollToElement", [("selector", selector.into())]).await
            }
            None => call(transport, context_id, "scrollBy", [("dx", (*dx).into()), ("dy", (*dy).into())]).await,
        },
        Action::KeyPress { selector, key } => {
            let mut params = base_params(context_id);
            if let Some(selector) = selector {
                let selector = resolve_selector(transport, healing, context_id, selector).await?;
                params.insert("selector".to_string(), selector.into());
            }
            params.insert("key".to_string(), key.clone().into());
            invoke(transport, "pressKey", params).await
        }
        Action::Wait { selector, timeout_ms } => match selector {
            Some(selector) => {
                let selector = resolve_selector(transport, healing, context_id, selector).await?;
                call(transport, context_id, "waitForSelector", [("selector", selector.into())]).await
            }
            None => {
                let timeout_ms = timeout_ms.unwrap_or(1000);
                call(transport, context_id, "waitForTimeout", [("timeout_ms", timeout_ms.into())]).await
            }
        },
        Action::AssertText { selector, expected } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            let expected = interpolate(expected, variables);
            let actual = extract_text(transport, context_id, &selector).await?;
            if actual.contains(&expected) {
                Ok(())
            } else {
                Err(format!("expected text containing {expected:?}, found {actual:?}"))
            }
        }
        Action::AssertVisible { selector } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            if is_visible(transport, context_id, &selector).await {
                Ok(())
            } else {
                Err(format!("selector {selector:?} is not visible"))
            }
        }
        Action::Extract { selector, variable } => {
            let selector = resolve_selector(transport, healing, context_id, selector).await?;
            let text = extract_text(transport, context_id, &selector).await?;
            variables.insert(variable.clone(), serde_json::Value::String(text));
            Ok(())
        }
    }
}

/// Replaces every `{{name}}` placeholder with `variables["name"]`, the way
/// generated workflows template recorded literal values.
fn interpolate(template: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    let mut out = template.to_string();
    for (key, value) in variables {
        let needle = format!("{{{{{key}}}}}");
        if out.contains(&needle) {
            let replacement = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&needle, &replacement);
        }
    }
    out
}

/// Resolves `selector` against the page, healing it through `healing` the
/// first time a cheap visibility probe reports it missing.
async fn resolve_selector(
    transport: &Transport,
    healing: Option<&SelfHealingEngine>,
    context_id: &str,
    selector: &str,
) -> Result<String, String> {
    if is_visible(transport, context_id, selector).await {
        return Ok(selector.to_string());
    }
    let Some(healing) = healing else {
        return Err(format!("selector {selector:?} did not resolve and no healing engine is configured"));
    };
    let domain = current_domain(transport, context_id).await.unwrap_or_default();
    let result = healing.heal(&domain, context_id, selector, None).await;
    result.healed_selector.ok_or_else(|| format!("selector {selector:?} could not be healed: {:?}", result.error))
}

async fn current_domain(transport: &Transport, context_id: &str) -> Option<String> {
    let result = transport.execute_tool("getCurrentURL", base_params(context_id)).await.ok().flatten()?;
    let url = match result {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(obj) => obj.get("url").and_then(|v| v.as_str())?.to_string(),
        _ => return None,
    };
    url::Url::parse(&url).ok().and_then(|u| u.host_str().map(str::to_string))
}

async fn extract_text(transport: &Transport, context_id: &str, selector: &str) -> Result<String, String> {
    let mut params = base_params(context_id);
    params.insert("selector".to_string(), serde_json::Value::String(selector.to_string()));
    match transport.execute_tool("extractText", params).await {
        Ok(Some(serde_json::Value::String(text))) => Ok(text),
        Ok(Some(serde_json::Value::Object(obj))) => Ok(obj.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string()),
        Ok(_) => Ok(String::new()),
        Err(err) => Err(err.to_string()),
    }
}

async fn is_visible(transport: &Transport, context_id: &str, selector: &str) -> bool {
    let mut params = base_params(context_id);
    params.insert("selector".to_string(), serde_json::Value::String(selector.to_string()));
    match transport.execute_tool("isVisible", params).await {
        Ok(Some(serde_json::Value::Object(obj))) => obj.get("visible").and_then(|v| v.as_bool()).unwrap_or(false),
        Ok(Some(serde_json::Value::Bool(visible))) => visible,
        _ => false,
    }
}

fn base_params(context_id: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut params = serde_json::Map::new();
    params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
    params
}

async fn call<const N: usize>(transport: &Transport, context_id: &str, verb: &str, pairs: [(&str, serde_json::Value); N]) -> Result<(), String> {
    let mut params = base_params(context_id);
    for (key, value) in pairs {
        params.insert(key.to_string(), value);
    }
    invoke(transport, verb, params).await
}

async fn invoke(transport: &Transport, verb: &str, params: serde_json::Map<String, serde_json::Value>) -> Result<(), String> {
    transport.execute_tool(verb, params).await.map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;

    #[test]
    fn interpolate_substitutes_known_variable() {
        let mut vars = HashMap::new();
        vars.insert("user".to_string(), serde_json::Value::String("alice".to_string()));
        assert_eq!(interpolate("hello {{user}}", &vars), "hello alice");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholder_untouched() {
        let vars = HashMap::new();
        assert_eq!(interpolate("hello {{user}}", &vars), "hello {{user}}");
    }

    #[test]
    fn action_kind_labels_match_variant() {
        assert_eq!(Action::Navigate { url: "https://x".into() }.kind(), "navigate");
        assert_eq!(Action::AssertVisible { selector: "#x".into() }.kind(), "assert_visible");
    }
}
