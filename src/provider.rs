//! Local simulated provider
//!
//! Materializes nodes without talking to a cloud. Physical names and ARNs
//! are derived from the stack name and node id, so repeated applies hand out
//! the same identifiers. A revision hash of the resolved properties changes
//! whenever a node is updated.

use anyhow::{Result, bail};
use declarative::{MaterializeRequest, Materializer, Outputs, Properties, ResourceKind, Value};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::ProviderSettings;

/// What the provider was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Destroy,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub operation: Operation,
    pub id: String,
    pub kind: ResourceKind,
}

/// Simulated provider backing `apply` and `destroy`
#[derive(Debug)]
pub struct LocalProvider {
    settings: ProviderSettings,
    fail: HashSet<String>,
    invocations: Mutex<Vec<Invocation>>,
}

impl LocalProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self {
            settings,
            fail: HashSet::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Make materialization of these node ids fail
    pub fn with_failures<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Calls made so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        match self.invocations.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, operation: Operation, id: &str, kind: ResourceKind) {
        let call = Invocation {
            operation,
            id: id.to_string(),
            kind,
        };
        match self.invocations.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }

    /// Physical name: `<stack>-<id>-<8 hex>`
    pub fn physical_name(stack: &str, id: &str) -> String {
        let hex = blake3::hash(format!("{stack}/{id}").as_bytes()).to_hex();
        format!("{stack}-{id}-{}", hex[..8].to_uppercase())
    }

    fn arn(&self, kind: ResourceKind, name: &str, properties: &Properties) -> Result<String> {
        let ProviderSettings { region, account } = &self.settings;
        Ok(match kind {
            ResourceKind::Role => format!("arn:aws:iam::{account}:role/{name}"),
            ResourceKind::Topic => format!("arn:aws:sns:{region}:{account}:{name}"),
            ResourceKind::Function => format!("arn:aws:lambda:{region}:{account}:function:{name}"),
            ResourceKind::EventSubscription => {
                let topic = required_str(properties, "topic")?;
                let hex = blake3::hash(name.as_bytes()).to_hex();
                format!("{topic}:{}", &hex[..12])
            }
        })
    }

    fn check(request: &MaterializeRequest<'_>) -> Result<()> {
        match request.kind {
            ResourceKind::Function => {
                let role = required_str(request.properties, "role")?;
                if !role.starts_with("arn:") {
                    bail!("function {} has an invalid role '{}'", request.id, role);
                }
                required_str(request.properties, "handler")?;
                required_str(request.properties, "runtime")?;
            }
            ResourceKind::EventSubscription => {
                required_str(request.properties, "topic")?;
                required_str(request.properties, "function")?;
            }
            ResourceKind::Role | ResourceKind::Topic => {}
        }
        Ok(())
    }
}

fn required_str<'a>(properties: &'a Properties, key: &str) -> Result<&'a str> {
    match properties.get(key).and_then(Value::as_str) {
        Some(value) => Ok(value),
        None => bail!("missing string property '{key}'"),
    }
}

/// Short hash of the resolved property bag
fn revision(properties: &Properties) -> String {
    let encoded = serde_json::to_vec(properties).unwrap_or_default();
    blake3::hash(&encoded).to_hex()[..12].to_string()
}

impl Materializer for LocalProvider {
    fn materialize(&self, request: &MaterializeRequest<'_>) -> Result<Outputs> {
        let operation = if request.is_update() {
            Operation::Update
        } else {
            Operation::Create
        };
        self.record(operation, request.id, request.kind);

        if self.fail.contains(request.id) {
            bail!("simulated failure for {}", request.id);
        }
        Self::check(request)?;

        let name = Self::physical_name(request.stack, request.id);
        let arn = self.arn(request.kind, &name, request.properties)?;
        log::debug!("{:?} {} {} -> {}", operation, request.kind, request.id, arn);

        Ok(Outputs::from([
            ("arn".to_string(), Value::from(arn)),
            ("name".to_string(), Value::from(name)),
            ("revision".to_string(), Value::from(revision(request.properties))),
        ]))
    }

    fn destroy(&self, id: &str, kind: ResourceKind, outputs: &Outputs) -> Result<()> {
        self.record(Operation::Destroy, id, kind);
        if self.fail.contains(id) {
            bail!("simulated failure destroying {id}");
        }
        log::debug!(
            "Destroyed {} {} ({})",
            kind,
            id,
            outputs.get("arn").and_then(Value::as_str).unwrap_or("unknown arn")
        );
        Ok(())
    }
}
