//! Scripted request sequences with expected outcomes.

use provision_engine::{Engine, EngineError, ErrorKind, Request};
use provision_store::UserId;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Expected outcome of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The request succeeds.
    Ok,
    /// The request fails with an error of this kind.
    Fail(ErrorKind),
}

/// One request of a scenario.
#[derive(Debug, Clone)]
pub struct Step {
    /// Human-readable summary, used in logs and errors.
    pub description: String,
    /// The request to send.
    pub request: Request,
    /// What the engine must answer.
    pub expect: Expect,
}

impl Step {
    fn new<T: Serialize>(
        description: impl Into<String>,
        user: UserId,
        space: &str,
        (kind, action, id): (&str, &str, &str),
        input: &T,
        expect: Expect,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            description: description.into(),
            request: Request::new(kind, user, space, action, id).with_input(input)?,
            expect,
        })
    }
}

/// A step whose outcome did not match its expectation.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Expected success, got an error.
    #[error("step '{step}' failed: {source}")]
    Failed {
        /// Step description.
        step: String,
        /// The engine error.
        #[source]
        source: EngineError,
    },
    /// Expected an error, got success.
    #[error("step '{step}' succeeded, expected a {expected:?} error")]
    Succeeded {
        /// Step description.
        step: String,
        /// The expected error kind.
        expected: ErrorKind,
    },
    /// Expected an error of another kind.
    #[error("step '{step}' failed with a {found:?} error, expected {expected:?}: {source}")]
    WrongKind {
        /// Step description.
        step: String,
        /// The expected error kind.
        expected: ErrorKind,
        /// The kind actually returned.
        found: ErrorKind,
        /// The engine error.
        #[source]
        source: EngineError,
    },
}

/// Runs `steps` in order, stopping at the first unexpected outcome.
///
/// Returns the number of steps run.
pub async fn run(
    engine: &Engine,
    cancel: &CancellationToken,
    steps: Vec<Step>,
) -> Result<usize, ScenarioError> {
    let total = steps.len();
    for (index, step) in steps.into_iter().enumerate() {
        let Step {
            description,
            request,
            expect,
        } = step;

        let result = engine.handle(cancel.clone(), request).await;
        match (expect, result) {
            (Expect::Ok, Ok(_)) => {
                tracing::info!(step = index + 1, "{description}: ok");
            }
            (Expect::Ok, Err(source)) => {
                return Err(ScenarioError::Failed {
                    step: description,
                    source,
                });
            }
            (Expect::Fail(expected), Ok(_)) => {
                return Err(ScenarioError::Succeeded {
                    step: description,
                    expected,
                });
            }
            (Expect::Fail(expected), Err(source)) if source.kind() == expected => {
                tracing::info!(step = index + 1, error = %source, "{description}: rejected as expected");
            }
            (Expect::Fail(expected), Err(source)) => {
                return Err(ScenarioError::WrongKind {
                    step: description,
                    expected,
                    found: source.kind(),
                    source,
                });
            }
        }
    }
    Ok(total)
}

/// The VM and disk walkthrough: attach a disk, contend for it, then tear
/// it down again. Leaves `vm0` and `vm1` behind.
pub fn walkthrough(user: UserId, space: &str) -> Result<Vec<Step>, EngineError> {
    use Expect::{Fail, Ok as Pass};

    let step = |description: &str, target: (&str, &str, &str), input: Value, expect: Expect| {
        Step::new(description, user, space, target, &input, expect)
    };

    Ok(vec![
        step(
            "attach disk to a missing VM",
            ("VM", "add-disk", "vm0"),
            json!("disk0"),
            Fail(ErrorKind::NotFound),
        )?,
        step("create vm0", ("VM", "create", "vm0"), Value::Null, Pass)?,
        step(
            "attach a missing disk",
            ("VM", "add-disk", "vm0"),
            json!("disk0"),
            Fail(ErrorKind::NotFound),
        )?,
        step("create disk0", ("Disk", "create", "disk0"), json!(500), Pass)?,
        step(
            "attach disk0 to vm0",
            ("VM", "add-disk", "vm0"),
            json!("disk0"),
            Pass,
        )?,
        step("create vm1", ("VM", "create", "vm1"), Value::Null, Pass)?,
        step(
            "attach disk0 to vm1",
            ("VM", "add-disk", "vm1"),
            json!("disk0"),
            Fail(ErrorKind::Conflict),
        )?,
        step(
            "delete an attached disk",
            ("Disk", "delete", "disk0"),
            Value::Null,
            Fail(ErrorKind::Conflict),
        )?,
        step(
            "detach disk0 from vm0",
            ("VM", "del-disk", "vm0"),
            json!("disk0"),
            Pass,
        )?,
        step("delete disk0", ("Disk", "delete", "disk0"), Value::Null, Pass)?,
        step(
            "create net0",
            ("Network", "create", "net0"),
            json!("10.0.0.0/24"),
            Pass,
        )?,
        step("connect vm0", ("VM", "connect", "vm0"), json!("net0"), Pass)?,
        step("connect vm1", ("VM", "connect", "vm1"), json!("net0"), Pass)?,
        step(
            "delete a joined network",
            ("Network", "delete", "net0"),
            Value::Null,
            Fail(ErrorKind::Conflict),
        )?,
        step("disconnect vm0", ("VM", "disconnect", "vm0"), json!("net0"), Pass)?,
        step("disconnect vm1", ("VM", "disconnect", "vm1"), json!("net0"), Pass)?,
        step("delete net0", ("Network", "delete", "net0"), Value::Null, Pass)?,
    ])
}
