use std::cell::Cell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;
use sluice_core::lifecycle::{self, LifecyclePolicy};
use sluice_core::{Result, Step, StepCore, StepError, StepExt, Wrapped};
use sluice_model::{ConfigError, ConfigModel, Context, FieldSpec, FieldType, Masked};

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    (result, logs)
}

fn count(logs: &str, needle: &str) -> usize {
    logs.matches(needle).count()
}

fn b_field() -> FieldSpec {
    FieldSpec::new("b", FieldType::Str)
}

struct Suffix {
    core: StepCore,
    a: String,
}

impl Suffix {
    fn new(a: &str) -> Self {
        Self {
            core: StepCore::of::<Suffix>([b_field()]),
            a: a.to_string(),
        }
    }
}

impl Step for Suffix {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        self.output().set("b", format!("{}-suffix", self.a));
        Ok(())
    }

    fn inputs(&self) -> serde_json::Value {
        json!({ "a": self.a })
    }
}

struct Parent {
    core: StepCore,
    a: String,
    executions: Cell<usize>,
}

impl Parent {
    fn with_core(core: StepCore, a: &str) -> Self {
        Self {
            core,
            a: a.to_string(),
            executions: Cell::new(0),
        }
    }
}

impl Step for Parent {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        self.executions.set(self.executions.get() + 1);
        self.output().set("b", self.a.to_uppercase());
        Ok(())
    }
}

/// Delegates to its embedded parent `delegations` times through `run`.
struct Child {
    parent: Parent,
    delegations: usize,
}

impl Child {
    fn new(a: &str, delegations: usize) -> Self {
        let core = StepCore::of::<Child>([b_field(), FieldSpec::new("c", FieldType::Int)]);
        Self {
            parent: Parent::with_core(core, a),
            delegations,
        }
    }
}

impl Step for Child {
    fn core(&self) -> &StepCore {
        self.parent.core()
    }

    fn execute(&self) -> Result<()> {
        for _ in 0..self.delegations {
            self.parent.run()?;
        }
        if self.delegations == 0 {
            self.output().set("b", "own");
        }
        self.output().set("c", 1);
        Ok(())
    }
}

struct GrandChild {
    child: Child,
}

impl Step for GrandChild {
    fn core(&self) -> &StepCore {
        self.child.core()
    }

    fn execute(&self) -> Result<()> {
        self.child.run()?;
        self.child.run()?;
        Ok(())
    }
}

#[derive(Default)]
struct CountingPolicy {
    starts: Cell<usize>,
    successes: Cell<usize>,
    errors: Cell<usize>,
}

impl LifecyclePolicy for CountingPolicy {
    fn on_start(&self, _core: &StepCore, _inputs: &serde_json::Value) {
        self.starts.set(self.starts.get() + 1);
    }

    fn on_success(&self, core: &StepCore) -> Result<()> {
        self.successes.set(self.successes.get() + 1);
        lifecycle::validate_output(core)
    }

    fn on_error(&self, _core: &StepCore, _error: &StepError) {
        self.errors.set(self.errors.get() + 1);
    }
}

#[test]
fn suffix_step_populates_output() {
    let step = Suffix::new("hello");
    let output = step.run().unwrap();
    assert_eq!(output.get_as::<String>("b").unwrap(), "hello-suffix");
    assert_eq!(step.name(), "Suffix");
}

#[test]
fn start_and_finish_logged_once_for_any_delegation_count() {
    for delegations in 0..4 {
        let step = Child::new("x", delegations);
        let (result, logs) = capture(|| step.run().map(|_| ()));
        result.unwrap();
        assert_eq!(count(&logs, "Start running step"), 1, "delegations={delegations}");
        assert_eq!(count(&logs, "Finished running step"), 1, "delegations={delegations}");
        assert_eq!(step.parent.executions.get(), delegations);
    }
}

#[test]
fn policy_hooks_fire_once_across_three_levels() {
    let step = GrandChild {
        child: Child::new("deep", 2),
    };
    let policy = CountingPolicy::default();
    step.run_with(&policy).unwrap();
    assert_eq!(policy.starts.get(), 1);
    assert_eq!(policy.successes.get(), 1);
    assert_eq!(policy.errors.get(), 0);
    assert_eq!(step.child.parent.executions.get(), 4);
    assert_eq!(step.output().get_as::<String>("b").unwrap(), "DEEP");
    assert_eq!(step.core().depth(), 0);
}

#[test]
fn repeated_external_runs_each_log_once() {
    let step = Suffix::new("again");
    let (_, logs) = capture(|| {
        step.run().unwrap();
        step.run().unwrap();
    });
    assert_eq!(count(&logs, "Start running step"), 2);
    assert_eq!(count(&logs, "Finished running step"), 2);
}

struct Incomplete {
    core: StepCore,
}

impl Step for Incomplete {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn eager_output_validation_fails_the_run() {
    let step = Incomplete {
        core: StepCore::of::<Incomplete>([b_field()]),
    };
    let (result, logs) = capture(|| step.run().map(|_| ()));
    let err = result.unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"output of Incomplete is invalid: invalid Incomplete.Output: field 'b' is required but missing"
    );
    assert_eq!(count(&logs, "Start running step"), 1);
    assert_eq!(count(&logs, "Finished running step"), 0);
    assert_eq!(count(&logs, "Error while running step"), 0);
}

#[test]
fn lazy_output_defers_validation_to_first_read() {
    let step = Incomplete {
        core: StepCore::of::<Incomplete>([b_field()]).lazy_output(true),
    };
    let output = step.run().unwrap();
    assert!(output.is_pending());
    let err = output.get("b").unwrap_err();
    assert!(matches!(err, StepError::Output { ref step, .. } if step == "Incomplete"));
}

#[test]
fn lazy_output_reads_once_complete() {
    let step = Suffix {
        core: StepCore::of::<Suffix>([b_field()]).lazy_output(true),
        a: "lazy".into(),
    };
    let output = step.run().unwrap();
    assert_eq!(output.get_as::<String>("b").unwrap(), "lazy-suffix");
    assert!(!output.is_pending());
}

#[test]
fn double_wrapping_logs_once() {
    let step = Wrapped::new(Wrapped::new(Suffix::new("w")));
    let (result, logs) = capture(|| step.run().map(|_| ()));
    result.unwrap();
    assert_eq!(count(&logs, "Start running step"), 1);
    assert_eq!(count(&logs, "Finished running step"), 1);
    assert_eq!(
        step.inner().inner().output().get_as::<String>("b").unwrap(),
        "w-suffix"
    );
}

#[test]
fn wrapped_policy_replaces_default_side_effects() {
    struct Silent;
    impl LifecyclePolicy for Silent {
        fn on_start(&self, _core: &StepCore, _inputs: &serde_json::Value) {}
    }

    let step = Wrapped::with_policy(Suffix::new("s"), Silent);
    let (result, logs) = capture(|| step.run().map(|_| ()));
    result.unwrap();
    assert_eq!(count(&logs, "Start running step"), 0);
    assert_eq!(count(&logs, "Finished running step"), 1);
}

struct Failing {
    core: StepCore,
}

impl Step for Failing {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        Err(StepError::MissingParameter {
            param: "threshold".into(),
        })
    }
}

struct DelegatesToFailing {
    inner: Failing,
}

impl Step for DelegatesToFailing {
    fn core(&self) -> &StepCore {
        self.inner.core()
    }

    fn execute(&self) -> Result<()> {
        self.inner.run()?;
        Ok(())
    }
}

#[test]
fn failure_is_logged_once_and_returned_unchanged() {
    let step = DelegatesToFailing {
        inner: Failing {
            core: StepCore::of::<DelegatesToFailing>([]),
        },
    };
    let (result, logs) = capture(|| step.run().map(|_| ()));
    let err = result.unwrap_err();
    assert!(matches!(err, StepError::MissingParameter { ref param } if param == "threshold"));
    assert_eq!(count(&logs, "Error while running step"), 1);
    assert_eq!(count(&logs, "Finished running step"), 0);
    assert!(logs.contains("parameter 'threshold' is required"));
    assert_eq!(step.core().depth(), 0);
}

#[test]
fn user_errors_keep_their_message() {
    struct Boom {
        core: StepCore,
    }
    impl Step for Boom {
        fn core(&self) -> &StepCore {
            &self.core
        }
        fn execute(&self) -> Result<()> {
            Err(anyhow::anyhow!("disk full").into())
        }
    }

    let step = Boom {
        core: StepCore::new("Boom", []),
    };
    let policy = CountingPolicy::default();
    let err = step.run_with(&policy).unwrap_err();
    assert!(matches!(err, StepError::Other(_)));
    assert_eq!(err.to_string(), "disk full");
    assert_eq!(policy.errors.get(), 1);
    assert_eq!(policy.successes.get(), 0);
}

#[test]
fn failed_check_skips_execute() {
    struct Guarded {
        core: StepCore,
        ran: Cell<bool>,
    }
    impl Step for Guarded {
        fn core(&self) -> &StepCore {
            &self.core
        }
        fn execute(&self) -> Result<()> {
            self.ran.set(true);
            Ok(())
        }
        fn check(&self) -> Result<()> {
            Err(StepError::ambiguous(self.name(), "no target configured"))
        }
    }

    let step = Guarded {
        core: StepCore::new("Guarded", []),
        ran: Cell::new(false),
    };
    let (result, logs) = capture(|| step.run().map(|_| ()));
    assert_eq!(result.unwrap_err().to_string(), "Guarded: no target configured");
    assert!(!step.ran.get());
    assert_eq!(count(&logs, "Error while running step"), 1);
}

#[test]
fn start_log_redacts_inputs() {
    let step = Suffix::new("private-value");
    let (_, logs) = capture(|| step.run().map(|_| ()));
    assert!(logs.contains("Step input"));
    assert!(logs.contains("[REDACTED]"));
    assert!(!logs.contains("private-value\""));
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectSettings {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    password: Masked<String>,
}

fn default_port() -> u16 {
    5432
}

impl ConfigModel for ConnectSettings {}

struct Connect {
    core: StepCore,
    settings: ConnectSettings,
}

impl Step for Connect {
    fn core(&self) -> &StepCore {
        &self.core
    }

    fn execute(&self) -> Result<()> {
        let url = format!("{}:{}", self.settings.host, self.settings.port);
        self.output().set("url", url);
        Ok(())
    }

    fn inputs(&self) -> serde_json::Value {
        self.settings.to_json_value().unwrap_or_default()
    }
}

#[test]
fn step_inputs_from_context() {
    let ctx = Context::from_toml("[db]\nhost = \"localhost\"\npassword = \"s3cret\"\n").unwrap();
    let step = Connect {
        core: StepCore::of::<Connect>([FieldSpec::new("url", FieldType::Str)]),
        settings: ConnectSettings::from_context_at(&ctx, "db").unwrap(),
    };
    assert_eq!(step.settings.password.expose(), "s3cret");
    assert_eq!(step.inputs()["password"], json!("[REDACTED]"));
    let url: String = step.run().unwrap().get_as("url").unwrap();
    assert_eq!(url, "localhost:5432");
}

#[test]
fn step_construction_fails_on_bad_input() {
    let ctx = Context::from_json(r#"{"db": {"host": 1, "password": "x"}}"#).unwrap();
    let err = ConnectSettings::from_context_at(&ctx, "db").unwrap_err();
    assert!(matches!(err, ConfigError::Deserialize { ref model, .. } if model == "ConnectSettings"));
}
