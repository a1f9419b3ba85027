//! The built-in handler taxonomy. These are deliberately simple/simulated — real agent
//! logic (an LLM call, a sandboxed interpreter, ...) is an external collaborator and out of
//! scope for this crate; see the handler contract in [`crate::handler`].

use async_trait::async_trait;
use serde_json::{json, Value as Json};

use crate::handler::{Enqueuer, Handler};

pub fn plan(payload: Json) -> Json {
    let idea = payload.get("idea").and_then(Json::as_str).unwrap_or("");
    let module = payload.get("module").and_then(Json::as_str).unwrap_or("");

    let plan = if !idea.is_empty() && !module.is_empty() {
        format!("{idea} via {module}")
    } else if !idea.is_empty() {
        idea.to_string()
    } else {
        "no idea provided".to_string()
    };

    json!({ "plan": plan, "idea": idea, "module": module })
}

pub fn codegen(payload: Json) -> Json {
    let files = if let (Some(lang), Some(spec)) = (
        payload.get("lang").and_then(Json::as_str),
        payload.get("spec").and_then(Json::as_str),
    ) {
        vec![json!({
            "path": format!("src/generated.{}", extension_for(lang)),
            "content": format!("// {lang} scaffold for: {spec}\n"),
        })]
    } else {
        let module = payload.get("module").and_then(Json::as_str).unwrap_or("module");
        let idea = payload.get("idea").and_then(Json::as_str).unwrap_or("");
        vec![
            json!({
                "path": format!("src/{module}.py"),
                "content": format!("\"\"\"{idea}\"\"\"\n\n\ndef run():\n    raise NotImplementedError\n"),
            }),
            json!({
                "path": format!("tests/test_{module}.py"),
                "content": format!("from src.{module} import run\n\n\ndef test_run():\n    run()\n"),
            }),
        ]
    };

    json!({ "files": files })
}

fn extension_for(lang: &str) -> &str {
    match lang {
        "python" => "py",
        "javascript" => "js",
        "typescript" => "ts",
        "rust" => "rs",
        other => other,
    }
}

pub fn execute(payload: Json) -> Json {
    let command = payload.get("command").and_then(Json::as_str).unwrap_or("");
    json!({
        "simulated": true,
        "command": command,
        "stdout": format!("would run: {command}"),
        "stderr": "",
        "exit_code": 0,
    })
}

pub fn analyze(payload: Json) -> Json {
    let keys: Vec<&str> = payload
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default();

    json!({ "keys": keys, "count": keys.len() })
}

pub fn report(payload: Json) -> Json {
    let summary = payload
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    json!({ "summary": summary })
}

pub fn unknown(task: &str, payload: Json) -> Json {
    json!({
        "ok": false,
        "error": format!("unknown task: {task}"),
        "data": payload,
    })
}

struct UnknownHandler;

#[async_trait]
impl Handler for UnknownHandler {
    async fn call(&self, task: &str, payload: Json, _enqueuer: &dyn Enqueuer) -> Result<Json, String> {
        Ok(unknown(task, payload))
    }
}

pub fn unknown_handler() -> UnknownHandler {
    UnknownHandler
}

/// Orchestrator: re-enqueues `plan` and `codegen` as subjobs.
struct PipelineHandler;

#[async_trait]
impl Handler for PipelineHandler {
    async fn call(&self, _task: &str, payload: Json, enqueuer: &dyn Enqueuer) -> Result<Json, String> {
        let plan_id = enqueuer.enqueue("plan", payload.clone(), 0).await?;
        let generate_id = enqueuer.enqueue("codegen", payload, 0).await?;

        Ok(json!({
            "ok": true,
            "subjobs": { "plan": plan_id, "generate": generate_id },
        }))
    }
}

pub fn pipeline_handler() -> PipelineHandler {
    PipelineHandler
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_combines_idea_and_module() {
        let result = plan(json!({"idea": "demo", "module": "hello_mod"}));
        assert_eq!(result["plan"], json!("demo via hello_mod"));
    }

    #[test]
    fn codegen_from_idea_and_module_produces_src_and_test_files() {
        let result = codegen(json!({"idea": "a widget", "module": "widget"}));
        let files = result["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["path"], json!("src/widget.py"));
        assert_eq!(files[1]["path"], json!("tests/test_widget.py"));
    }

    #[test]
    fn codegen_from_lang_and_spec_produces_one_file() {
        let result = codegen(json!({"lang": "rust", "spec": "a parser"}));
        let files = result["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["path"], json!("src/generated.rs"));
    }

    #[test]
    fn analyze_summarises_keys() {
        let result = analyze(json!({"a": 1, "b": 2}));
        assert_eq!(result["count"], json!(2));
    }

    #[test]
    fn unknown_reports_task_name() {
        let result = unknown("no_such", json!({"x": 1}));
        assert_eq!(result["ok"], json!(false));
        assert_eq!(result["error"], json!("unknown task: no_such"));
        assert_eq!(result["data"], json!({"x": 1}));
    }
}
