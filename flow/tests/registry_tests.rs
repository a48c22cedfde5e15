// tests/registry_tests.rs
mod common;

use common::*;
use serial_test::serial;
use storefront_flow::{ContextData, Pipeline, PipelineResult, Registry};

#[derive(Debug, Default)]
struct UnregisteredContext;

#[tokio::test]
#[serial]
async fn test_registry_dispatches_by_context_type() {
  setup_tracing();
  let registry = Registry::<TestError>::new();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);
  pipeline.on_root("only", create_simple_handler("only", "ran"));
  registry.register_pipeline(pipeline);

  assert!(registry.is_registered::<TestContext>());
  assert!(!registry.is_registered::<UnregisteredContext>());

  let ctx = ContextData::new(TestContext::default());
  let result = registry.run(ctx.clone()).await;

  assert_eq!(result, Ok(PipelineResult::Completed));
  assert_eq!(ctx.read().message, "ran");
}

#[tokio::test]
#[serial]
async fn test_registry_rejects_unregistered_context() {
  setup_tracing();
  let registry = Registry::<TestError>::default();

  match registry.run(ContextData::new(UnregisteredContext)).await {
    Err(TestError::Flow(message)) => assert!(message.contains("NotRegistered")),
    other => panic!("expected NotRegistered, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_reregistering_replaces_pipeline() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut first = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);
  first.on_root("only", create_simple_handler("only", "first"));
  registry.register_pipeline(first);

  let mut second = Pipeline::<TestContext, TestError>::new(&[("only", false, None)]);
  second.on_root("only", create_simple_handler("only", "second"));
  registry.register_pipeline(second);

  let ctx = ContextData::new(TestContext::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().message, "second");
}
