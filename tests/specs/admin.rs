// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative request specs, driven with JSON as a client would send it.

use crate::prelude::*;

async fn send(server: &Server, request: serde_json::Value) -> serde_json::Value {
    let request: Request = serde_json::from_value(request).unwrap();
    serde_json::to_value(server.handle(request).await).unwrap()
}

#[tokio::test(start_paused = true)]
async fn status_pause_and_resume() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    instantiate(&server, "counter", "counter-1").await;

    assert_eq!(send(&server, json!({"type": "Pause"})).await, json!({"type": "Ok"}));
    let status = send(&server, json!({"type": "Status"})).await;
    assert_eq!(status["type"], "Status");
    assert_eq!(status["status"]["state"], "paused");
    assert_eq!(status["status"]["pending"], 1);

    send(&server, json!({"type": "Resume"})).await;
    sleep_ms(60).await;
    let status = send(&server, json!({"type": "Status"})).await;
    assert_eq!(status["status"]["state"], "running");
    assert_eq!(status["status"]["completed"], 1);
}

#[tokio::test(start_paused = true)]
async fn timer_control_over_the_wire() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    instantiate(&server, "counter", "counter-1").await;
    let target = json!({"user": USER, "instance": "counter-1", "timer": "timer-1"});
    let with_type = |kind: &str| {
        let mut request = target.clone();
        request["type"] = json!(kind);
        request
    };

    sleep_ms(120).await;
    send(&server, with_type("DisableTimer")).await;
    sleep_ms(200).await;

    let response = send(&server, with_type("TimerStatus")).await;
    assert_eq!(response["status"]["hits"], 2);
    assert_eq!(response["status"]["enabled"], false);
}

#[tokio::test(start_paused = true)]
async fn run_script_reports_failures_as_runs() {
    let project = Project::new();
    project.scripts.fails("explode", "boom");
    let definition = counter_definition(USER, 1_000).script("explode", "explode");
    let server = project.started(vec![definition]).await;
    instantiate(&server, "counter", "counter-1").await;

    let response = send(
        &server,
        json!({"type": "RunScript", "user": USER, "instance": "counter-1", "script": "explode"}),
    )
    .await;

    assert_eq!(response["type"], "ScriptRun");
    assert_eq!(response["run"]["status"], "failed");
    assert_eq!(response["run"]["error"], "boom");
    let counter = server.runtime().instance(USER, "counter-1").unwrap();
    assert_eq!(counter.exceptions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failures_come_back_as_error_responses() {
    let project = Project::new();
    let definitions = vec![counter_definition(USER, 50), follower_definition(USER, 0)];
    let server = project.started(definitions).await;
    instantiate(&server, "follower", "follower-1").await;

    let release = json!({"type": "ReleaseInstance", "user": USER, "instance": "counter-1"});
    let response = send(&server, release).await;
    assert_eq!(response["type"], "Error");
    assert!(response["message"].as_str().unwrap().contains("counter-1"));

    let status =
        json!({"type": "TimerStatus", "user": USER, "instance": "counter-1", "timer": "nope"});
    let response = send(&server, status).await;
    assert_eq!(response["type"], "Error");
}

#[tokio::test(start_paused = true)]
async fn list_instances_filters_by_user() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    server.runtime().create_user("bob").unwrap();
    server.runtime().register_definition(counter_definition("bob", 50)).unwrap();
    instantiate(&server, "counter", "counter-1").await;
    server.runtime().instantiate("bob", "counter", InstanceOptions::default()).await.unwrap();

    let all = send(&server, json!({"type": "ListInstances"})).await;
    assert_eq!(all["instances"].as_array().unwrap().len(), 2);

    let bobs = send(&server, json!({"type": "ListInstances", "user": "bob"})).await;
    let bobs = bobs["instances"].as_array().unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0]["name"], "counter-1");
    assert_eq!(bobs[0]["user"], "bob");
}
