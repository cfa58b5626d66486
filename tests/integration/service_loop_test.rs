// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use ddcrawl::domain::models::job::JobKind;
use ddcrawl::domain::repositories::message_bus::OutputCategory;
use ddcrawl::infrastructure::workspace::HINTS_FILE;
use ddcrawl::utils::codec::decode_model_data;
use serde_json::{json, Value};

use super::helpers::{
    create_test_app, sample_items, start_message, stop_message, FakeWorkerRuntime,
};

const WAIT: Duration = Duration::from_secs(5);

fn has_progress(messages: &[Value], needle: &str) -> bool {
    messages
        .iter()
        .any(|m| m["progress"].as_str().is_some_and(|p| p.contains(needle)))
}

#[tokio::test]
async fn test_trainer_job_lifecycle() {
    let runtime = FakeWorkerRuntime {
        items: sample_items(),
        checkpoint: Some(b"link model bytes".to_vec()),
        ..Default::default()
    };
    let app = create_test_app(vec![JobKind::Training], runtime);

    app.send(JobKind::Training, start_message("trainer-job", JobKind::Training))
        .await;

    let progress = app
        .collect_until(JobKind::Training, OutputCategory::Progress, WAIT, |m| {
            has_progress(m, "average score")
        })
        .await;
    assert!(has_progress(&progress, "4 pages processed from 3 domains (2 relevant)"));
    assert!(progress.iter().all(|m| m["id"] == "trainer-job"));

    let pages = app
        .collect_until(JobKind::Training, OutputCategory::Pages, WAIT, |m| !m.is_empty())
        .await;
    let sample = pages[0]["page_sample"].as_array().unwrap();
    assert_eq!(sample.len(), 3);
    for entry in sample {
        let score = entry["score"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&score));
        assert!(entry["url"].as_str().unwrap().starts_with("http"));
    }

    let models = app
        .collect_until(JobKind::Training, OutputCategory::Model, WAIT, |m| !m.is_empty())
        .await;
    assert_eq!(models.len(), 1);
    assert_eq!(
        decode_model_data(models[0]["link_model"].as_str()).unwrap(),
        Some(b"link model bytes".to_vec())
    );

    // Later sweeps keep reporting progress but never republish the model.
    app.collect_until(JobKind::Training, OutputCategory::Progress, WAIT, |m| m.len() >= 2)
        .await;
    let more_models = app
        .collect_until(JobKind::Training, OutputCategory::Model, Duration::from_millis(100), |_| false)
        .await;
    assert!(more_models.is_empty());

    app.send(JobKind::Training, stop_message("trainer-job")).await;
    let runtime = app.shutdown().await;
    assert_eq!(runtime.launch_count(), 1);
    assert_eq!(runtime.terminate_count(), 1);
}

#[tokio::test]
async fn test_crawler_job_with_hints() {
    let app = create_test_app(
        vec![JobKind::Crawling],
        FakeWorkerRuntime::with_items(sample_items()),
    );

    let mut start = start_message("crawler-job", JobKind::Crawling);
    start["broadness"] = json!("N10");
    start["hints"] = json!(["http://pinned.example.com"]);
    app.send(JobKind::Crawling, start).await;

    let progress = app
        .collect_until(JobKind::Crawling, OutputCategory::Progress, WAIT, |m| {
            has_progress(m, "pages processed")
        })
        .await;
    assert!(has_progress(&progress, "pages processed"));

    app.send_hint(json!({
        "workspace_id": "workspace-1",
        "url": "http://runtime-hint.example.com",
        "pinned": true,
    }))
    .await;

    let workspace = app.runtime.workspace_of("crawler-job").unwrap();
    let hints_path = workspace.join(HINTS_FILE);
    let deadline = tokio::time::Instant::now() + WAIT;
    let hints = loop {
        let hints = tokio::fs::read_to_string(&hints_path).await.unwrap();
        if hints.lines().count() >= 2 || tokio::time::Instant::now() >= deadline {
            break hints;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    let urls: Vec<String> = hints
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, vec!["http://pinned.example.com", "http://runtime-hint.example.com"]);

    {
        let launches = app.runtime.launches.lock().unwrap();
        let args = launches[0].arguments(std::path::Path::new("/job"));
        assert!(args.contains(&"broadness=N10".to_string()));
        assert!(args.contains(&"deepdeep".to_string()));
    }

    let models = app
        .collect_until(JobKind::Crawling, OutputCategory::Model, Duration::from_millis(100), |_| false)
        .await;
    assert!(models.is_empty());

    app.shutdown().await;
}

#[tokio::test]
async fn test_stop_messages_are_idempotent() {
    let app = create_test_app(vec![JobKind::Training], FakeWorkerRuntime::default());

    app.send(JobKind::Training, stop_message("never-started")).await;
    app.send(JobKind::Training, start_message("job", JobKind::Training))
        .await;
    app.send(JobKind::Training, stop_message("job")).await;
    app.send(JobKind::Training, stop_message("job")).await;

    // Wait until the loop has drained the input topic.
    let input = app.topics(JobKind::Training).input();
    let deadline = tokio::time::Instant::now() + WAIT;
    while app.bus.pending(&input).await > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let progress = app
        .collect_until(JobKind::Training, OutputCategory::Progress, Duration::from_millis(100), |_| false)
        .await;
    assert!(progress.iter().all(|m| m["id"] != "never-started"));

    let runtime = app.shutdown().await;
    assert_eq!(runtime.launch_count(), 1);
    assert_eq!(runtime.terminate_count(), 1);
}

#[tokio::test]
async fn test_duplicate_start_keeps_one_worker() {
    let app = create_test_app(vec![JobKind::Training], FakeWorkerRuntime::default());

    app.send(JobKind::Training, start_message("job", JobKind::Training))
        .await;
    app.send(JobKind::Training, start_message("job", JobKind::Training))
        .await;

    app.collect_until(JobKind::Training, OutputCategory::Progress, WAIT, |m| {
        has_progress(m, "Craw is not running yet")
    })
    .await;

    let runtime = app.shutdown().await;
    assert_eq!(runtime.launch_count(), 1);
    // Shutdown stops the single running worker.
    assert_eq!(runtime.terminate_count(), 1);
}

#[tokio::test]
async fn test_malformed_messages_do_not_stop_the_loop() {
    let app = create_test_app(vec![JobKind::Training], FakeWorkerRuntime::default());

    app.send_raw(JobKind::Training, b"{not json").await;
    app.send_raw(JobKind::Training, b"\"a string\"").await;
    app.send(JobKind::Training, json!({"unexpected": "shape"})).await;
    app.send(JobKind::Training, json!({"id": "no-model", "workspace_id": "w", "seeds": []}))
        .await;
    app.send(JobKind::Training, start_message("good-job", JobKind::Training))
        .await;

    let progress = app
        .collect_until(JobKind::Training, OutputCategory::Progress, WAIT, |m| {
            m.iter().any(|p| p["id"] == "good-job")
        })
        .await;
    assert!(progress.iter().any(|p| p["id"] == "good-job"));
    assert!(progress.iter().all(|p| p["id"] != "no-model"));

    let runtime = app.shutdown().await;
    assert_eq!(runtime.launch_count(), 1);
}

#[tokio::test]
async fn test_start_failure_is_reported() {
    let runtime = FakeWorkerRuntime {
        fail_launch: true,
        ..Default::default()
    };
    let app = create_test_app(vec![JobKind::Crawling], runtime);

    app.send(JobKind::Crawling, start_message("doomed", JobKind::Crawling))
        .await;

    let progress = app
        .collect_until(JobKind::Crawling, OutputCategory::Progress, WAIT, |m| !m.is_empty())
        .await;
    assert_eq!(progress[0]["id"], "doomed");
    assert!(progress[0]["progress"]
        .as_str()
        .unwrap()
        .starts_with("Crawl failed to start:"));

    let runtime = app.shutdown().await;
    assert_eq!(runtime.terminate_count(), 0);
}

#[tokio::test]
async fn test_shutdown_message_stops_running_jobs() {
    let app = create_test_app(
        vec![JobKind::Training, JobKind::Crawling],
        FakeWorkerRuntime::default(),
    );

    app.send(JobKind::Training, start_message("t", JobKind::Training))
        .await;
    app.send(JobKind::Crawling, start_message("c", JobKind::Crawling))
        .await;
    app.collect_until(JobKind::Crawling, OutputCategory::Progress, WAIT, |m| !m.is_empty())
        .await;
    app.collect_until(JobKind::Training, OutputCategory::Progress, WAIT, |m| !m.is_empty())
        .await;

    app.send(JobKind::Training, json!({"from-tests": "stop"})).await;
    app.send(JobKind::Crawling, json!({"from-tests": "stop"})).await;

    let runtime = app.shutdown().await;
    assert_eq!(runtime.launch_count(), 2);
    assert_eq!(runtime.terminate_count(), 2);
}
