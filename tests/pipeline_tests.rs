// tests/pipeline_tests.rs

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::thread;

use datakit_pipeline::config::SoftErrorLogConfig;
use datakit_pipeline::functions::{Args, CallContext, Param};
use datakit_pipeline::pipeline::State;
use datakit_pipeline::{
    CompileError, Engine, EngineConfig, FailurePolicy, FuncError, Function, GrokError, Pipeline,
    Point, Record, RunError, Value, Zone,
};
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_zone(Zone::parse("UTC").unwrap());
    engine
}

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

const NGINX: &str = r#"
# nginx access log
add_pattern("access_common", "%{IPORHOST:client_ip} %{NOTSPACE:http_ident} %{NOTSPACE:http_auth} \[%{HTTPDATE:time}\] \"%{WORD:http_method} %{NOTSPACE:http_url} HTTP/%{NUMBER:http_version}\" %{INT:status_code} %{INT:bytes}")

grok(_, "%{access_common}")

cast(status_code, "int")
cast(bytes, "int")

group_between(status_code, [200, 299], "OK", status)
group_between(status_code, [300, 399], "notice", status)
group_between(status_code, [400, 499], "warning", status)
group_between(status_code, [500, 599], "error", status)

nullif(http_ident, "-")
nullif(http_auth, "-")

default_time(time)
"#;

// ============================================================================
// End-to-end scripts
// ============================================================================

#[test]
fn test_nginx_access_log() {
    let script = engine().compile(NGINX).unwrap();
    let outcome = script.run(
        r#"127.0.0.1 - - [06/Jan/2017:16:16:37 +0000] "GET /index.html HTTP/1.1" 404 162"#,
    );
    assert!(outcome.is_ok(), "{:?}", outcome.error);

    let record = outcome.record;
    assert_eq!(record.get("client_ip"), Some(&string("127.0.0.1")));
    assert_eq!(record.get("http_method"), Some(&string("GET")));
    assert_eq!(record.get("http_url"), Some(&string("/index.html")));
    assert_eq!(record.get("status_code"), Some(&Value::Integer(404)));
    assert_eq!(record.get("bytes"), Some(&Value::Integer(162)));
    assert_eq!(record.get("status"), Some(&string("warning")));
    assert_eq!(record.get("time"), Some(&Value::Integer(1_483_719_397_000_000_000)));
    assert!(record.get("http_ident").is_none());
    assert!(record.get("http_auth").is_none());
}

#[test]
fn test_grok_then_rename() {
    let script = engine()
        .compile(
            r#"
            add_pattern("_hour", "(?:2[0123]|[01]?[0-9])")
            add_pattern("_minute", "(?:[0-5][0-9])")
            add_pattern("_second", "(?:(?:[0-5]?[0-9]|60)(?:[:.,][0-9]+)?)")
            add_pattern("_time", "(?:%{_hour}:%{_minute}(?::%{_second})?)")
            grok(_, "%{_time:time}")
            rename(logtime, time)
            "#,
        )
        .unwrap();

    let record = script.run("12:13:14").record;
    assert_eq!(record.get("logtime"), Some(&string("12:13:14")));
    assert!(record.get("time").is_none());
    assert_eq!(script.local_patterns().len(), 4);
}

#[test]
fn test_add_pattern_is_visible_before_its_declaration() {
    let script = engine()
        .compile(r#"grok(_, "%{_num:n:int}") add_pattern("_num", "\d+")"#)
        .unwrap();
    assert_eq!(script.run("n=42").record.get("n"), Some(&Value::Integer(42)));
}

#[test]
fn test_grok_no_match_leaves_record() {
    let outcome = engine().compile(r#"grok(_, "%{INT:n} items")"#).unwrap().run("none");
    assert!(outcome.is_ok());
    assert_eq!(outcome.record.len(), 1);
    assert_eq!(outcome.record.get("message"), Some(&string("none")));
}

#[test]
fn test_json_then_expr() {
    let script = engine()
        .compile("json(_, a.second) json(_, a.first) expr(a.second*10+(2+3)*5, total)")
        .unwrap();
    let record = script.run(r#"{"a": {"first": 2.3, "second": 2}}"#).record;

    assert_eq!(record.get("total"), Some(&Value::Integer(45)));
    assert_eq!(record.get("a.first"), Some(&Value::Float(2.3)));
}

#[test]
fn test_json_all_then_index_keys() {
    let record = engine()
        .compile("json_all()")
        .unwrap()
        .run(r#"{"a": {"x": 1}, "b": [10, 20]}"#)
        .record;

    let mut expected = HashMap::new();
    expected.insert("a.x".to_string(), Value::Integer(1));
    expected.insert("b[0]".to_string(), Value::Integer(10));
    expected.insert("b[1]".to_string(), Value::Integer(20));
    assert_eq!(record.fields(), &expected);
}

#[test]
fn test_raw_input_rewrite() {
    let record = engine()
        .compile(r#"grok(_, "%{WORD:a}") add_key(_, "replaced") grok(_, "%{WORD:b}")"#)
        .unwrap()
        .run("original")
        .record;
    assert_eq!(record.get("a"), Some(&string("original")));
    assert_eq!(record.get("b"), Some(&string("replaced")));
    assert_eq!(record.get("message"), Some(&string("original")));
}

// ============================================================================
// Conditionals
// ============================================================================

const LEVELS: &str = r#"
json(_, status)
if status >= 500 {
    add_key(level, "error")
} elif status >= 400 {
    add_key(level, "warn")
} else {
    add_key(level, "info")
}
"#;

#[test]
fn test_if_elif_else() {
    let script = engine().compile(LEVELS).unwrap();
    for (input, level) in [
        (r#"{"status": 503}"#, "error"),
        (r#"{"status": 404}"#, "warn"),
        (r#"{"status": 200}"#, "info"),
    ] {
        assert_eq!(script.run(input).record.get("level"), Some(&string(level)), "{}", input);
    }
}

#[test]
fn test_missing_key_condition_is_false() {
    let record = engine()
        .compile("if missing { add_key(a, 1) } else { add_key(b, 1) }")
        .unwrap()
        .run("")
        .record;
    assert!(record.get("a").is_none());
    assert_eq!(record.get("b"), Some(&Value::Integer(1)));
}

#[test]
fn test_missing_key_equals_nil() {
    let record = engine()
        .compile("if missing == nil { add_key(absent, true) }")
        .unwrap()
        .run("")
        .record;
    assert_eq!(record.get("absent"), Some(&Value::Boolean(true)));
}

#[test]
fn test_non_bool_condition_skips_whole_statement() {
    let outcome = engine()
        .compile(r#"add_key(s, "text") if s { add_key(a, 1) } else { add_key(b, 1) } add_key(c, 1)"#)
        .unwrap()
        .run("");
    assert!(outcome.is_ok());
    assert!(outcome.record.get("a").is_none());
    assert!(outcome.record.get("b").is_none());
    assert_eq!(outcome.record.get("c"), Some(&Value::Integer(1)));
}

#[test]
fn test_condition_error_skips_whole_statement() {
    let outcome = engine()
        .compile(r#"if missing + 1 > 0 { add_key(a, 1) } else { add_key(b, 1) }"#)
        .unwrap()
        .run("");
    assert!(outcome.is_ok());
    assert_eq!(outcome.record.len(), 1);
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_unknown_function_stops_the_run() {
    let outcome = engine()
        .compile("add_key(a, 1)\nno_such_function(x)\nadd_key(b, 2)")
        .unwrap()
        .run("");

    match outcome.error {
        Some(RunError::UnknownFunction { ref name, line }) => {
            assert_eq!(name, "no_such_function");
            assert_eq!(line, 2);
        }
        ref other => panic!("expected unknown function, got {:?}", other),
    }
    assert_eq!(outcome.record.get("a"), Some(&Value::Integer(1)));
    assert!(outcome.record.get("b").is_none());
}

#[test]
fn test_unknown_function_in_untaken_branch_is_harmless() {
    let outcome = engine()
        .compile("if false { no_such_function() } add_key(b, 2)")
        .unwrap()
        .run("");
    assert!(outcome.is_ok());
    assert_eq!(outcome.record.get("b"), Some(&Value::Integer(2)));
}

#[test]
fn test_run_error_message_names_line() {
    let outcome = engine()
        .compile("\n\nurl_decode(_)")
        .unwrap()
        .run("bad%zz");
    let message = outcome.error.unwrap().to_string();
    assert!(message.starts_with("line 3: url_decode(): "), "{}", message);
}

#[test]
fn test_soft_failures_are_sampled() {
    let config = EngineConfig {
        soft_error_log: SoftErrorLogConfig { burst: 1, every: 0 },
        ..EngineConfig::default()
    };
    let engine = Engine::from_config(config).unwrap();
    let script = engine.compile("rename(b, missing)").unwrap();

    for _ in 0..3 {
        assert!(script.run("").is_ok());
    }
    assert_eq!(engine.services().soft_errors.suppressed(), 2);
}

// ============================================================================
// Compile errors
// ============================================================================

#[test]
fn test_syntax_error() {
    let err = engine().compile("add_key(a, 1").unwrap_err();
    assert!(matches!(err, CompileError::Syntax(_)));
    assert!(err.to_string().starts_with("syntax error at 1:"));
}

#[test]
fn test_unknown_grok_pattern_fails_compile() {
    let err = engine().compile(r#"add_key(a, 1)
grok(_, "%{NOT_A_PATTERN:x}")"#).unwrap_err();
    match err {
        CompileError::Prepare {
            function,
            line,
            source: FuncError::Grok(GrokError::UnknownPattern(name)),
        } => {
            assert_eq!(function, "grok");
            assert_eq!(line, 2);
            assert_eq!(name, "NOT_A_PATTERN");
        }
        other => panic!("expected a prepare error, got {:?}", other),
    }
}

#[test]
fn test_grok_pattern_in_branch_is_compiled() {
    assert!(engine().compile(r#"if true { grok(_, "%{NOPE}") }"#).is_err());
}

#[test]
fn test_compile_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let err = engine().compile_file(dir.path().join("missing.p")).unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));

    let path = dir.path().join("broken.p");
    fs::write(&path, "add_key(a,").unwrap();
    let err = engine().compile_file(&path).unwrap_err();
    match err {
        CompileError::InFile { file, source } => {
            assert!(file.ends_with("broken.p"));
            assert!(matches!(*source, CompileError::Syntax(_)));
        }
        other => panic!("expected an in-file error, got {:?}", other),
    }
}

// ============================================================================
// Engine customisation
// ============================================================================

const TAG_PARAMS: &[Param] = &[Param::required("key"), Param::required("value")];

/// Stand-in for `add_key` that records where the value came from.
struct TaggingAddKey;

impl Function for TaggingAddKey {
    fn name(&self) -> &'static str {
        "add_key"
    }

    fn params(&self) -> &'static [Param] {
        TAG_PARAMS
    }

    fn call(&self, args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        let key = args.key(0)?;
        let value = args.literal(1)?;
        ctx.record.set(key, Value::String(format!("stub:{}", value)));
        Ok(())
    }
}

struct AlwaysFails(FailurePolicy);

impl Function for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn policy(&self) -> FailurePolicy {
        self.0
    }

    fn call(&self, _args: &Args<'_>, _ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        Err(FuncError::runtime("always_fails", "boom"))
    }
}

struct Explodes;

impl Function for Explodes {
    fn name(&self) -> &'static str {
        "explode"
    }

    fn params(&self) -> &'static [Param] {
        &[]
    }

    fn call(&self, _args: &Args<'_>, ctx: &mut CallContext<'_>) -> Result<(), FuncError> {
        ctx.record.set("partial", Value::Boolean(true));
        let empty: Vec<u8> = Vec::new();
        let index = ctx.record.len() + 2;
        Err(FuncError::runtime("explode", format!("unreachable {}", empty[index])))
    }
}

#[test]
fn test_function_substitution() {
    let original = engine();
    let mut substituted = original.clone();
    substituted.function_table_mut().register(TaggingAddKey);

    let source = "add_key(a, 1)";
    assert_eq!(
        substituted.compile(source).unwrap().run("").record.get("a"),
        Some(&string("stub:1"))
    );
    assert_eq!(
        original.compile(source).unwrap().run("").record.get("a"),
        Some(&Value::Integer(1))
    );
}

#[test]
fn test_custom_function_policy() {
    let mut engine = engine();
    engine
        .function_table_mut()
        .register(AlwaysFails(FailurePolicy::BestEffort));
    let outcome = engine.compile("always_fails() add_key(b, 1)").unwrap().run("");
    assert!(outcome.is_ok());
    assert_eq!(outcome.record.get("b"), Some(&Value::Integer(1)));

    engine
        .function_table_mut()
        .register(AlwaysFails(FailurePolicy::FailFast));
    let outcome = engine.compile("always_fails() add_key(b, 1)").unwrap().run("");
    assert!(matches!(outcome.error, Some(RunError::Function { .. })));
    assert!(outcome.record.get("b").is_none());
}

#[test]
fn test_handler_panic_stops_the_run() {
    let mut engine = engine();
    engine.function_table_mut().register(Explodes);
    let script = engine
        .compile("add_key(a, 1)\nexplode()\nadd_key(b, 2)")
        .unwrap();

    let outcome = script.run("line");
    match &outcome.error {
        Some(RunError::Panic(message)) => assert!(message.contains("index out of bounds"), "{}", message),
        other => panic!("expected a panic error, got {:?}", other),
    }
    assert_eq!(outcome.record.get("a"), Some(&Value::Integer(1)));
    assert_eq!(outcome.record.get("partial"), Some(&Value::Boolean(true)));
    assert!(outcome.record.get("b").is_none());

    // the script stays usable after a panicking run
    let again = script.run("line");
    assert!(matches!(again.error, Some(RunError::Panic(_))));
    assert_eq!(again.record.get("a"), Some(&Value::Integer(1)));
}

#[test]
fn test_removed_function_is_unknown() {
    let mut engine = engine();
    assert!(engine.function_table_mut().remove("drop").is_some());
    let outcome = engine.compile("drop()").unwrap().run("");
    assert!(matches!(outcome.error, Some(RunError::UnknownFunction { .. })));
}

#[test]
fn test_engine_wide_patterns() {
    let engine = engine();
    engine.patterns().add_global("TICKET", "[A-Z]+-[0-9]+");
    let record = engine
        .compile(r#"grok(_, "%{TICKET:ticket}")"#)
        .unwrap()
        .run("fixes OPS-1234")
        .record;
    assert_eq!(record.get("ticket"), Some(&string("OPS-1234")));
}

// ============================================================================
// Inputs
// ============================================================================

#[test]
fn test_run_point() {
    let script = engine()
        .compile(
            r#"
            json(_, tags.host, host)
            json(_, status)
            json(_, time)
            group_between(status, [500, 599], "error", level)
            "#,
        )
        .unwrap();
    let point = Point::new("nginx")
        .tag("host", "web-1")
        .field("status", 503i64)
        .at(1_000);

    let record = script.run_point(&point).record;
    assert_eq!(record.get("host"), Some(&string("web-1")));
    assert_eq!(record.get("level"), Some(&string("error")));
    assert_eq!(record.get("time"), Some(&Value::Integer(1_000)));
}

#[test]
fn test_run_record_with_fields() {
    let script = engine().compile("cast(code, \"int\") uppercase(message)").unwrap();

    let mut fields = HashMap::new();
    fields.insert("code".to_string(), string("201"));
    let outcome = script.run_record(Record::with_fields("hello", fields));

    assert_eq!(outcome.record.get("code"), Some(&Value::Integer(201)));
    assert_eq!(outcome.record.get("message"), Some(&string("HELLO")));
}

#[test]
fn test_runs_are_independent() {
    let script = engine().compile(r#"grok(_, "%{WORD:w}") add_key(seen, true)"#).unwrap();
    let first = script.run("one");
    let second = script.run("!!!");

    assert_eq!(first.record.get("w"), Some(&string("one")));
    assert!(second.record.get("w").is_none());
    assert_eq!(second.record.get("seen"), Some(&Value::Boolean(true)));
}

#[test]
fn test_concurrent_runs_share_one_script() {
    let script = Arc::new(engine().compile(LEVELS).unwrap());

    thread::scope(|scope| {
        for worker in 0..8 {
            let script = Arc::clone(&script);
            scope.spawn(move || {
                for i in 0..200 {
                    let status = 100 + (worker * 200 + i) % 500;
                    let input = format!(r#"{{"status": {}}}"#, status);
                    let expected = if status >= 500 {
                        "error"
                    } else if status >= 400 {
                        "warn"
                    } else {
                        "info"
                    };
                    let record = script.run(&input).record;
                    assert_eq!(record.get("level"), Some(&string(expected)));
                    assert_eq!(record.get("status"), Some(&Value::Integer(status)));
                }
            });
        }
    });
}

// ============================================================================
// Pipeline wrapper
// ============================================================================

#[test]
fn test_pipeline_run_and_result() {
    let mut pipeline = Pipeline::with_engine(&engine(), LEVELS).unwrap();
    assert_eq!(pipeline.state(), State::Compiled);

    pipeline.run(r#"{"status": 500}"#);
    assert_eq!(pipeline.state(), State::Completed);
    let (fields, error) = pipeline.result().unwrap();
    assert!(error.is_none());
    assert_eq!(fields.get("level"), Some(&string("error")));
    assert!(!pipeline.is_dropped());
}

#[test]
fn test_pipeline_keeps_last_error() {
    let mut pipeline = Pipeline::with_engine(&engine(), "nope()").unwrap();
    pipeline.run("x");
    assert!(matches!(
        pipeline.last_error(),
        Some(RunError::UnknownFunction { .. })
    ));
}

#[test]
fn test_pipeline_from_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("tag.p"), "add_key(source, \"file\")\n").unwrap();

    let config = EngineConfig {
        pipeline_dir: dir.path().to_path_buf(),
        ..EngineConfig::default()
    };
    let engine = Engine::from_config(config).unwrap();

    let mut pipeline = Pipeline::from_file(&engine, "tag.p").unwrap();
    let (fields, _) = pipeline.run("x").result().unwrap();
    assert_eq!(fields.get("source"), Some(&string("file")));

    assert!(matches!(
        Pipeline::from_file(&engine, "absent.p"),
        Err(CompileError::Io { .. })
    ));
}

#[test]
fn test_pipeline_run_point() {
    let mut pipeline = Pipeline::with_engine(&engine(), "json(_, measurement, name) drop()").unwrap();
    pipeline.run_point(&Point::new("cpu"));
    assert!(pipeline.is_dropped());
    assert_eq!(
        pipeline.outcome().unwrap().record.get("name"),
        Some(&string("cpu"))
    );
}
