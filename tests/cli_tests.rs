// tests/cli_tests.rs
#![cfg(feature = "cli")]

use std::fs;
use std::path::PathBuf;

use datakit_pipeline::cli::{
    execute_check, function_doc, functions_overview, CheckOptions, CheckResult, CliError,
    LineResult,
};
use datakit_pipeline::{Engine, Function};

fn script_file(dir: &tempfile::TempDir, source: &str) -> PathBuf {
    let path = dir.path().join("script.p");
    fs::write(&path, source).unwrap();
    path
}

fn records(result: CheckResult) -> Vec<LineResult> {
    match result {
        CheckResult::Records(records) => records,
        CheckResult::SyntaxValid => panic!("expected records"),
    }
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_runs_each_line() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, r#"grok(_, "%{WORD:method} %{INT:code:int}") drop_origin_data()"#),
        input: Some("GET 200\n\nPOST 500\n".to_string()),
        ..CheckOptions::default()
    };

    let lines = records(execute_check(&options).unwrap());
    assert_eq!(
        lines,
        vec![
            LineResult {
                output: r#"{"code":200,"method":"GET"}"#.to_string(),
                dropped: false,
                error: None,
            },
            LineResult {
                output: r#"{"code":500,"method":"POST"}"#.to_string(),
                dropped: false,
                error: None,
            },
        ]
    );
}

#[test]
fn test_check_pretty_output() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, "drop_origin_data() add_key(a, 1.0)"),
        input: Some("x".to_string()),
        pretty: true,
        ..CheckOptions::default()
    };

    let lines = records(execute_check(&options).unwrap());
    assert_eq!(lines[0].output, "{\n  \"a\": 1.0\n}");
}

#[test]
fn test_check_reports_drop_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, "if _ == \"skip\" { drop() }\nurl_decode(_)"),
        input: Some("skip\n100%\n".to_string()),
        ..CheckOptions::default()
    };

    let lines = records(execute_check(&options).unwrap());
    assert!(lines[0].dropped);
    assert!(lines[0].error.is_none());
    assert!(!lines[1].dropped);
    assert!(lines[1].error.as_deref().unwrap().starts_with("line 2: url_decode()"));
}

#[test]
fn test_check_syntax_only() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, "add_key(a, 1)"),
        syntax_only: true,
        ..CheckOptions::default()
    };
    assert!(matches!(execute_check(&options).unwrap(), CheckResult::SyntaxValid));
}

#[test]
fn test_check_needs_input() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, "add_key(a, 1)"),
        ..CheckOptions::default()
    };
    assert!(matches!(execute_check(&options), Err(CliError::NoInput)));
}

#[test]
fn test_check_compile_error_names_file() {
    let dir = tempfile::tempdir().unwrap();
    let options = CheckOptions {
        script: script_file(&dir, "add_key(a"),
        input: Some("x".to_string()),
        ..CheckOptions::default()
    };
    let err = execute_check(&options).unwrap_err();
    assert!(matches!(err, CliError::Compile(_)));
    assert!(err.to_string().contains("script.p"));
}

#[test]
fn test_check_with_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("custom"), "TICKET [A-Z]+-[0-9]+\n").unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, "pattern_files = [\"custom\"]\n").unwrap();

    let options = CheckOptions {
        script: script_file(&dir, r#"grok(_, "%{TICKET:t}") drop_origin_data()"#),
        input: Some("see OPS-9".to_string()),
        config: Some(config),
        ..CheckOptions::default()
    };
    let lines = records(execute_check(&options).unwrap());
    assert_eq!(lines[0].output, r#"{"t":"OPS-9"}"#);
}

// ============================================================================
// funcs
// ============================================================================

#[test]
fn test_functions_overview_lists_everything() {
    let engine = Engine::new();
    let overview = functions_overview(engine.functions());

    assert!(overview.starts_with("PIPELINE FUNCTIONS\n"));
    for function in engine.functions().iter() {
        assert!(overview.contains(function.name()), "missing {}", function.name());
    }
    assert!(overview.contains("group_between(key, range, value, [new_key])"));
    assert!(overview.contains("strfmt(key, fmt, args...)"));
}

#[test]
fn test_function_doc() {
    let engine = Engine::new();

    let doc = function_doc(engine.functions(), "default_time").unwrap();
    assert!(doc.starts_with("default_time(key, [timezone])\n"));
    assert!(doc.contains("On error: runtime errors stop the run"));

    let doc = function_doc(engine.functions(), "RENAME").unwrap();
    assert!(doc.contains("statement is skipped"));

    let err = function_doc(engine.functions(), "nope").unwrap_err();
    assert!(matches!(err, CliError::UnknownFunction(ref name) if name == "nope"));
}
