//! Compilation Integration Tests
//!
//! Drives the compiler end to end against a scripted requester and a
//! temporary work directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipewright::core::{CacheStore, CompileError, CompileOptions, Compiler, TopicRequest};
use pipewright::domain::{Plan, ProcessingMode, ResultOrigin};
use pipewright::{Generation, RoleContext, RoleLoader, SnippetRequester};
use tempfile::TempDir;
use uuid::Uuid;

/// Answers by task description; unknown tasks fail
#[derive(Clone, Default)]
struct ScriptedRequester {
    answers: Arc<HashMap<String, String>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRequester {
    fn new(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: Arc::new(
                answers
                    .iter()
                    .map(|(task, answer)| (task.to_string(), answer.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnippetRequester for ScriptedRequester {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _role: &RoleContext, prompt: &str) -> Generation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let task = prompt
            .lines()
            .skip_while(|line| *line != "### Task")
            .nth(1)
            .unwrap_or_default();
        match self.answers.get(task) {
            Some(answer) => Generation::Ok(answer.clone()),
            None => Generation::Failed(format!("no answer for '{}'", task)),
        }
    }
}

const STEPS: &str = "\
Here is the plan:
1. List all files
2. Sort the list
3. Count lines in each file
";

fn answers() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "List all files",
            "```bash\n# Processing: Whole\n# Output Type: List\nfind . -type f\n```",
        ),
        (
            "Sort the list",
            "```bash\n# Processing: Per-Item\n# Output Type: List\nfind . -type f | sort \"$1\"\n```",
        ),
        (
            "Count lines in each file",
            "Sure!\n```sh\n# Output Type: Single\nwc -l \"$1\"\n```\nHope this helps.",
        ),
    ]
}

const EXPECTED_SCRIPT: &str = "#!/bin/bash
set -e

{
  find . -type f
} | \\
{
  sort
} | \\
{
  while read -r item; do
    set -- \"$item\"
    wc -l \"$1\"
  done
}
";

fn request(steps: &str) -> TopicRequest {
    TopicRequest {
        topic_id: "session.req_1.files".to_string(),
        req_idx: 1,
        title: "Count lines".to_string(),
        topic: "files".to_string(),
        skill: "shell".to_string(),
        steps_text: steps.to_string(),
    }
}

async fn compiler(
    temp: &TempDir,
    requester: &ScriptedRequester,
    strict_cache: bool,
    run_id: Uuid,
) -> Compiler {
    let cache = CacheStore::open(temp.path().join("cache")).await.unwrap();
    let options = CompileOptions {
        work_dir: temp.path().join("tmp"),
        strict_cache,
        max_steps: 20,
    };
    Compiler::new(Box::new(requester.clone()), cache, options, run_id)
}

fn role() -> RoleContext {
    RoleContext::builtin(vec!["shell".to_string()])
}

#[tokio::test]
async fn test_compile_writes_corrected_pipeline() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let run_id = Uuid::new_v4();
    let compiler = compiler(&temp, &requester, false, run_id).await;

    let compiled = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    assert_eq!(compiled.program.script(), EXPECTED_SCRIPT);
    assert_eq!(requester.calls(), 3);

    let path = temp.path().join("tmp").join(format!("{}.req_1.sh", run_id));
    assert_eq!(compiled.report.path, path);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), EXPECTED_SCRIPT);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    let steps = &compiled.report.steps;
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[1].snippet, "sort");
    assert_eq!(steps[1].processing, ProcessingMode::Whole);
    assert_eq!(steps[2].processing, ProcessingMode::PerItem);
    assert_eq!(compiled.report.cached_steps(), 0);
}

#[tokio::test]
async fn test_prompts_carry_previous_output_shape() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    let prompts = requester.prompts();
    assert!(prompts[0].contains("- Skill: shell\n- Input: Standard Input"));
    assert!(prompts[1].contains("- Input: Output from Step 1 (a list, one item per line)"));
    assert!(prompts[2].contains("- Input: Output from Step 2 (a list, one item per line)"));
}

#[tokio::test]
async fn test_recompile_is_idempotent_from_cache() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());

    let first = compiler(&temp, &requester, false, Uuid::new_v4())
        .await
        .compile_topic(&request(STEPS), &role())
        .await
        .unwrap();
    assert_eq!(requester.calls(), 3);

    let second = compiler(&temp, &requester, false, Uuid::new_v4())
        .await
        .compile_topic(&request(STEPS), &role())
        .await
        .unwrap();

    assert_eq!(requester.calls(), 3, "second run must not call the requester");
    assert_eq!(first.program.script(), second.program.script());
    assert!(second
        .program
        .steps()
        .iter()
        .all(|r| r.origin == ResultOrigin::Cached));
    assert_eq!(second.report.cached_steps(), 3);
}

#[tokio::test]
async fn test_partial_cache_resumes_missing_steps() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    compiler.compile_topic(&request(STEPS), &role()).await.unwrap();
    let removed = compiler
        .cache()
        .invalidate("session.req_1.files", Some(2))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let again = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    assert_eq!(requester.calls(), 4);
    assert_eq!(again.program.script(), EXPECTED_SCRIPT);
    assert_eq!(again.report.cached_steps(), 2);
}

#[tokio::test]
async fn test_strict_cache_miss_is_fatal() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, true, Uuid::new_v4()).await;

    let err = compiler
        .compile_topic(&request(STEPS), &role())
        .await
        .unwrap_err();

    assert!(matches!(err, CompileError::StrictCacheMiss { step: 1, .. }));
    assert_eq!(requester.calls(), 0);
}

#[tokio::test]
async fn test_strict_cache_replays_populated_cache() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());

    compiler(&temp, &requester, false, Uuid::new_v4())
        .await
        .compile_topic(&request(STEPS), &role())
        .await
        .unwrap();

    let replay = compiler(&temp, &requester, true, Uuid::new_v4())
        .await
        .compile_topic(&request(STEPS), &role())
        .await
        .unwrap();

    assert_eq!(replay.program.script(), EXPECTED_SCRIPT);
    assert_eq!(requester.calls(), 3);
}

#[tokio::test]
async fn test_corrupt_cache_entry_is_regenerated() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    let path = compiler.cache().entry_path("session.req_1.files", 1);
    std::fs::write(&path, "{ truncated").unwrap();

    let compiled = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    assert_eq!(compiled.program.script(), EXPECTED_SCRIPT);
    assert_eq!(requester.calls(), 3);
    // the corrupt record is left in place, never overwritten
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ truncated");
}

#[tokio::test]
async fn test_failed_generation_degrades_to_skipped_step() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&[
        ("List all files", "find . -type f"),
        ("Count lines in each file", "wc -l \"$1\""),
    ]);
    let strict = compiler(&temp, &requester, true, Uuid::new_v4()).await;
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    let compiled = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    let sort_step = &compiled.program.steps()[1];
    assert_eq!(
        sort_step.snippet,
        "# generation failed: no answer for 'Sort the list'"
    );
    assert!(sort_step.is_effectively_empty());
    assert_eq!(compiled.program.block_count(), 2);
    assert!(!compiled.program.script().contains("generation failed"));

    let cache = compiler.cache();
    let cached = cache.lookup("session.req_1.files", 2).await.unwrap();
    assert_eq!(cached.snippet, sort_step.snippet);

    // replay reuses the degraded step instead of asking again
    assert_eq!(requester.calls(), 3);
    let replay = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();
    assert_eq!(requester.calls(), 3);
    assert_eq!(replay.program.script(), compiled.program.script());

    let strict_replay = strict.compile_topic(&request(STEPS), &role()).await.unwrap();
    assert_eq!(strict_replay.program.script(), compiled.program.script());
    assert_eq!(requester.calls(), 3);
}

#[tokio::test]
async fn test_cache_write_failure_does_not_abort() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    // a plain file where the cache directory was
    let cache_dir = compiler.cache().dir().to_path_buf();
    std::fs::remove_dir_all(&cache_dir).unwrap();
    std::fs::write(&cache_dir, "not a directory").unwrap();

    let compiled = compiler.compile_topic(&request(STEPS), &role()).await.unwrap();

    assert_eq!(compiled.program.script(), EXPECTED_SCRIPT);
    assert_eq!(compiled.report.steps.len(), 3);
    assert!(compiled
        .program
        .steps()
        .iter()
        .all(|r| r.origin == ResultOrigin::Generated));
    assert_eq!(requester.calls(), 3);
    assert!(compiled.report.path.exists());
}

#[tokio::test]
async fn test_empty_step_list_yields_noop_program() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&answers());
    let compiler = compiler(&temp, &requester, false, Uuid::new_v4()).await;

    let compiled = compiler
        .compile_topic(&request("nothing that looks like a step"), &role())
        .await
        .unwrap();

    assert_eq!(compiled.program.script(), "#!/bin/bash\nset -e\n\n:\n");
    assert!(compiled.report.steps.is_empty());
    assert!(compiled.report.path.exists());
    assert_eq!(requester.calls(), 0);
}

#[tokio::test]
async fn test_compile_plan_uses_session_topic_ids() {
    let temp = TempDir::new().unwrap();
    let requester = ScriptedRequester::new(&[
        ("List all files", "find . -type f"),
        ("Show disk usage", "du -sh ."),
    ]);
    let run_id = Uuid::new_v4();
    let compiler = compiler(&temp, &requester, false, run_id).await;
    let roles = RoleLoader::new(temp.path().join("roles"), temp.path().join("config"));

    let plan = Plan::from_json(
        r#"{"planned_topics": [
            {"req_idx": 1, "title": "Files", "skill": "", "topic": "files", "refined_out": "1. List all files"},
            {"req_idx": 2, "title": "Disk", "skill": "", "topic": "disk", "refined_out": "Step 1: Show disk usage"}
        ]}"#,
    )
    .unwrap();

    let reports = compiler
        .compile_plan(&plan, "s42", &roles, "coder")
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].req_idx, 1);
    assert_eq!(reports[1].steps[0].snippet, "du -sh .");
    assert!(temp
        .path()
        .join("tmp")
        .join(format!("{}.req_2.sh", run_id))
        .exists());

    let cache = compiler.cache();
    assert!(cache.lookup("s42.req_1.files", 1).await.is_some());
    assert!(cache.lookup("s42.req_2.disk", 1).await.is_some());
}
