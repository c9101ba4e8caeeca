//! The notification stack
//!
//! One execution role shared by two notification functions, each consuming
//! from its own topic. Declaration is pure; `build` freezes the result.

use anyhow::{Context, Result};
use declarative::{NodeHandle, ResourceNode, Stack, StackBuilder, Value};

use crate::config::StackContext;

pub const ROLE_ID: &str = "PersonalizeLambdaExecutionRole";
pub const DONE_TOPIC_ID: &str = "DoneTopic";
pub const FAIL_TOPIC_ID: &str = "FailTopic";
pub const DONE_FUNCTION_ID: &str = "NotifyDoneFunction";
pub const FAIL_FUNCTION_ID: &str = "NotifyFailFunction";

const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";

const MANAGED_POLICIES: [&str; 4] = [
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
    "arn:aws:iam::aws:policy/service-role/AmazonPersonalizeFullAccess",
    "arn:aws:iam::aws:policy/AmazonS3FullAccess",
    "arn:aws:iam::aws:policy/AmazonSESFullAccess",
];

const RUNTIME: &str = "python3.7";
const HANDLER: &str = "notify.handler";
const CODE_ASSET: &str = "functions/common";
const TIMEOUT_SECS: u64 = 5;

/// Handles other stacks wire against
#[derive(Debug, Clone)]
pub struct NotificationHandles {
    pub execution_role: NodeHandle,
    pub done_topic: NodeHandle,
    pub fail_topic: NodeHandle,
}

/// A frozen notification stack with its exported handles
#[derive(Debug)]
pub struct NotificationStack {
    pub stack: Stack,
    pub handles: NotificationHandles,
}

/// Declare the notification stack into a builder
pub fn declare(builder: &mut StackBuilder, context: &StackContext) -> NotificationHandles {
    let execution_role = builder.add(
        ResourceNode::role(ROLE_ID)
            .with_property("assumed_by", LAMBDA_PRINCIPAL)
            .with_property("managed_policies", MANAGED_POLICIES.to_vec()),
    );

    let done_topic = builder.add(ResourceNode::topic(DONE_TOPIC_ID));
    let fail_topic = builder.add(ResourceNode::topic(FAIL_TOPIC_ID));

    for (function_id, status, topic) in [
        (DONE_FUNCTION_ID, "DONE", &done_topic),
        (FAIL_FUNCTION_ID, "FAILED", &fail_topic),
    ] {
        let function = builder.add(notify_function(function_id, status, &execution_role, context));
        builder.add(
            ResourceNode::event_subscription(format!("{function_id}Subscription"))
                .with_property("topic", topic.arn())
                .with_property("function", function.arn()),
        );
    }

    NotificationHandles {
        execution_role,
        done_topic,
        fail_topic,
    }
}

fn notify_function(
    id: &str,
    status: &str,
    role: &NodeHandle,
    context: &StackContext,
) -> ResourceNode {
    ResourceNode::function(id)
        .with_property("runtime", RUNTIME)
        .with_property("handler", HANDLER)
        .with_property("code", CODE_ASSET)
        .with_property("timeout", Value::seconds(TIMEOUT_SECS))
        .with_property("role", role.arn())
        .with_property(
            "environment",
            Value::string_map([
                ("STATUS", status),
                ("SENDER", context.notify_sender.as_str()),
                ("TO_ADDR", context.notify_email.as_str()),
                ("SLACK_WEBHOOK_URL", context.notify_slack.as_str()),
            ]),
        )
}

/// Declare and freeze the notification stack
pub fn build(name: &str, context: &StackContext) -> Result<NotificationStack> {
    let mut builder = StackBuilder::new(name);
    let handles = declare(&mut builder, context);
    let stack = builder
        .freeze()
        .with_context(|| format!("Failed to assemble stack '{name}'"))?;
    Ok(NotificationStack { stack, handles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{
        AppliedMap, ExecuteOptions, MaterializeRequest, Materializer, Outputs, Properties,
        ResourceKind, execute_simple,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn context() -> StackContext {
        StackContext {
            notify_sender: "bot@example.com".into(),
            notify_email: "ops@example.com".into(),
            notify_slack: "https://hooks.slack.com/services/x".into(),
        }
    }

    #[test]
    fn test_stack_shape() {
        let built = build("CommonLambdaStack", &StackContext::default()).unwrap();
        let stack = &built.stack;
        assert_eq!(stack.len(), 7);

        let kinds = |k: ResourceKind| stack.nodes().filter(|n| n.kind() == k).count();
        assert_eq!(kinds(ResourceKind::Role), 1);
        assert_eq!(kinds(ResourceKind::Topic), 2);
        assert_eq!(kinds(ResourceKind::Function), 2);
        assert_eq!(kinds(ResourceKind::EventSubscription), 2);

        assert_eq!(built.handles.execution_role.id(), ROLE_ID);
        assert_eq!(built.handles.done_topic.id(), DONE_TOPIC_ID);
        assert_eq!(built.handles.fail_topic.id(), FAIL_TOPIC_ID);
    }

    #[test]
    fn test_apply_order_and_layers() {
        let built = build("CommonLambdaStack", &StackContext::default()).unwrap();
        assert_eq!(
            built.stack.apply_order(),
            [
                ROLE_ID,
                DONE_TOPIC_ID,
                FAIL_TOPIC_ID,
                DONE_FUNCTION_ID,
                "NotifyDoneFunctionSubscription",
                FAIL_FUNCTION_ID,
                "NotifyFailFunctionSubscription",
            ]
        );
        assert_eq!(
            built.stack.layers(),
            [
                vec![ROLE_ID, DONE_TOPIC_ID, FAIL_TOPIC_ID],
                vec![DONE_FUNCTION_ID, FAIL_FUNCTION_ID],
                vec![
                    "NotifyDoneFunctionSubscription",
                    "NotifyFailFunctionSubscription"
                ],
            ]
        );
    }

    #[test]
    fn test_function_properties() {
        let built = build("CommonLambdaStack", &context()).unwrap();
        let done = built.stack.node(DONE_FUNCTION_ID).unwrap();

        assert_eq!(done.property("runtime"), Some(&Value::from("python3.7")));
        assert_eq!(done.property("handler"), Some(&Value::from("notify.handler")));
        assert_eq!(done.property("timeout"), Some(&Value::seconds(5)));
        assert_eq!(done.property("role"), Some(&Value::reference(ROLE_ID, "arn")));

        let env = done.property("environment").and_then(Value::as_map).unwrap();
        assert_eq!(env["STATUS"], Value::from("DONE"));
        assert_eq!(env["SENDER"], Value::from("bot@example.com"));
        assert_eq!(env["TO_ADDR"], Value::from("ops@example.com"));
        assert_eq!(
            env["SLACK_WEBHOOK_URL"],
            Value::from("https://hooks.slack.com/services/x")
        );

        let fail = built.stack.node(FAIL_FUNCTION_ID).unwrap();
        let env = fail.property("environment").and_then(Value::as_map).unwrap();
        assert_eq!(env["STATUS"], Value::from("FAILED"));
    }

    #[test]
    fn test_empty_context_still_assembles() {
        let built = build("CommonLambdaStack", &StackContext::default()).unwrap();
        let done = built.stack.node(DONE_FUNCTION_ID).unwrap();
        let env = done.property("environment").and_then(Value::as_map).unwrap();
        assert_eq!(env["SENDER"], Value::from(""));
        assert_eq!(env["TO_ADDR"], Value::from(""));
    }

    #[test]
    fn test_subscriptions_reference_topic_and_function() {
        let built = build("CommonLambdaStack", &StackContext::default()).unwrap();
        let sub = built.stack.node("NotifyFailFunctionSubscription").unwrap();
        assert!(sub.depends_on().contains(FAIL_TOPIC_ID));
        assert!(sub.depends_on().contains(FAIL_FUNCTION_ID));
        assert_eq!(sub.depends_on().len(), 2);
    }

    #[test]
    fn test_apply_resolves_same_role_arn_for_both_functions() {
        #[derive(Default)]
        struct Capture(Mutex<HashMap<String, Properties>>);

        impl Materializer for Capture {
            fn materialize(&self, request: &MaterializeRequest<'_>) -> anyhow::Result<Outputs> {
                self.0
                    .lock()
                    .unwrap()
                    .insert(request.id.to_string(), request.properties.clone());
                Ok(Outputs::from([(
                    "arn".to_string(),
                    Value::from(format!("arn:test:{}", request.id)),
                )]))
            }

            fn destroy(&self, _: &str, _: ResourceKind, _: &Outputs) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let built = build("CommonLambdaStack", &context()).unwrap();
        let backend = Capture::default();
        let report = execute_simple(
            &built.stack,
            &AppliedMap::new(),
            &ExecuteOptions::default(),
            &backend,
        )
        .unwrap();
        assert!(report.is_complete());

        let seen = backend.0.lock().unwrap();
        let role_arn = Value::from(format!("arn:test:{ROLE_ID}"));
        assert_eq!(seen[DONE_FUNCTION_ID]["role"], role_arn);
        assert_eq!(seen[FAIL_FUNCTION_ID]["role"], role_arn);
    }
}
