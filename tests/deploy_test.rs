//! Deploy stage: artifact download, tool invocation and the live pointer

mod common;

use backend_pipeline::config::RuntimeSettings;
use backend_pipeline::error::ErrorKind;
use backend_pipeline::publish::{build_stage, deploy_stage};
use backend_pipeline::storage::{ChecksumPointerStore, PointerKind};
use backend_pipeline::Checksum;
use common::TestContextBuilder;
use std::time::Duration;

#[tokio::test]
async fn test_build_then_deploy_records_live() {
    let ctx = TestContextBuilder::new()
        .unwrap()
        .with_scenario_files()
        .build()
        .unwrap();
    let built = build_stage(&ctx.source(), "dev", ctx.blob(), ctx.notifier_arc())
        .await
        .unwrap();

    ctx.runner
        .expect_command("serverless")
        .with_args(|args| args == ["deploy", "--stage", "dev"])
        .returns_stdout("endpoints:\n  GET - https://example.invalid/echo\n")
        .finish();

    let dist = ctx.temp_dir.path().join("dist");
    let report = deploy_stage(
        &ctx.service,
        "dev",
        &built.checksum,
        Some(dist.as_path()),
        ctx.blob(),
        ctx.runner_arc(),
        &RuntimeSettings::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.checksum, built.checksum);
    assert_eq!(std::fs::read(dist.join(".bin/app")).unwrap(), b"A");

    let live = ChecksumPointerStore::new(ctx.blob(), &ctx.service, PointerKind::Live);
    assert_eq!(live.get().await.unwrap(), Some(built.checksum));
}

#[tokio::test]
async fn test_failed_deploy_keeps_previous_live() {
    let ctx = TestContextBuilder::new()
        .unwrap()
        .with_scenario_files()
        .build()
        .unwrap();
    let built = build_stage(&ctx.source(), "dev", ctx.blob(), ctx.notifier_arc())
        .await
        .unwrap();

    let previous = "1".repeat(40);
    ctx.store
        .insert("backend/echo/live-checksum", previous.as_str())
        .await;
    ctx.runner
        .expect_command("serverless")
        .returns_exit_code(1)
        .returns_stderr("Stack is in UPDATE_ROLLBACK_FAILED state")
        .finish();

    let err = deploy_stage(
        &ctx.service,
        "dev",
        &built.checksum,
        None,
        ctx.blob(),
        ctx.runner_arc(),
        &RuntimeSettings::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Deploy);
    assert_eq!(
        ctx.store.object("backend/echo/live-checksum").await,
        Some(previous.into_bytes())
    );
}

#[tokio::test]
async fn test_timeout_and_custom_tool_are_applied() {
    let ctx = TestContextBuilder::new()
        .unwrap()
        .with_scenario_files()
        .build()
        .unwrap();
    let built = build_stage(&ctx.source(), "dev", ctx.blob(), ctx.notifier_arc())
        .await
        .unwrap();
    ctx.runner.expect_command("sls").finish();

    let runtime = RuntimeSettings {
        deploy_timeout: Some(Duration::from_secs(900)),
        deploy_tool: "sls".to_string(),
        ..RuntimeSettings::default()
    };
    deploy_stage(
        &ctx.service,
        "prod",
        &built.checksum,
        None,
        ctx.blob(),
        ctx.runner_arc(),
        &runtime,
    )
    .await
    .unwrap();

    let calls = ctx.runner.get_call_history();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "sls");
    assert_eq!(calls[0].timeout, Some(Duration::from_secs(900)));
}

#[tokio::test]
async fn test_unknown_checksum_is_not_found() {
    let ctx = TestContextBuilder::new().unwrap().build().unwrap();
    let checksum = Checksum::parse(&"a".repeat(40)).unwrap();

    let err = deploy_stage(
        &ctx.service,
        "dev",
        &checksum,
        None,
        ctx.blob(),
        ctx.runner_arc(),
        &RuntimeSettings::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ctx.runner.get_call_history().is_empty());
    assert!(ctx.store.put_history().await.is_empty());
}

#[tokio::test]
async fn test_hostile_artifact_is_rejected() {
    use std::io::Write;
    use zip::write::FileOptions;

    let ctx = TestContextBuilder::new().unwrap().build().unwrap();
    let checksum = Checksum::parse(&"b".repeat(40)).unwrap();

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("../../escape.sh", FileOptions::<()>::default())
        .unwrap();
    zip.write_all(b"#!/bin/sh").unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    ctx.store
        .insert(&format!("backend/echo/{}/dist.zip", checksum), bytes)
        .await;

    let dist = ctx.temp_dir.path().join("a").join("dist");
    let err = deploy_stage(
        &ctx.service,
        "dev",
        &checksum,
        Some(dist.as_path()),
        ctx.blob(),
        ctx.runner_arc(),
        &RuntimeSettings::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!ctx.temp_dir.path().join("escape.sh").exists());
    assert!(ctx.runner.get_call_history().is_empty());
}
