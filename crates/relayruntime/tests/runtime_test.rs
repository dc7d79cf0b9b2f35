// crates/relayruntime/tests/runtime_test.rs

use relaycore::{
    EngineError, ExecutionEvent, ExecutionStatus, NodeContext, NodeOutput, NodeSpec, Workflow,
    WorkflowError, WorkflowStatus,
};
use relayruntime::{handler_fn, FlowRuntime, NodeRegistry, RuntimeConfig, WorkflowUpdate};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    registry.register(handler_fn("webhook-trigger", |ctx: NodeContext| async move {
        Ok(NodeOutput::success(json!({ "payload": ctx.input })))
    }));
    registry.register(handler_fn("pause", |ctx: NodeContext| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(NodeOutput::success(ctx.input))
    }));
    Arc::new(registry)
}

fn workflow(status: WorkflowStatus) -> Workflow {
    let mut wf = Workflow::new("runtime").with_status(status);
    wf.add_node(NodeSpec::new("hook", "webhook-trigger"));
    wf.add_node(NodeSpec::new("wait", "pause"));
    wf.connect("hook", "wait");
    wf
}

#[tokio::test]
async fn only_active_workflows_run_by_id() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let id = runtime
        .register_workflow(workflow(WorkflowStatus::Draft))
        .await
        .unwrap();

    let err = runtime.execute_workflow(id, json!({})).await.unwrap_err();
    assert!(matches!(err, EngineError::Workflow(WorkflowError::NotActive(_))));

    runtime
        .update_workflow(
            id,
            WorkflowUpdate {
                status: Some(WorkflowStatus::Active),
                ..WorkflowUpdate::default()
            },
        )
        .await
        .unwrap();

    let report = runtime.execute_workflow(id, json!({ "x": 1 })).await.unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Success);
    assert_eq!(report.execution.workflow_id, id);
}

#[tokio::test]
async fn unknown_workflow_id_is_not_found() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let err = runtime
        .execute_workflow(uuid::Uuid::new_v4(), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Workflow(WorkflowError::NotFound(_))));
}

#[tokio::test]
async fn update_bumps_version_and_revalidates() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let id = runtime
        .register_workflow(workflow(WorkflowStatus::Active))
        .await
        .unwrap();

    let updated = runtime
        .update_workflow(
            id,
            WorkflowUpdate {
                name: Some("renamed".to_string()),
                ..WorkflowUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.name, "renamed");

    let duplicate = vec![
        NodeSpec::new("x", "webhook-trigger"),
        NodeSpec::new("x", "pause"),
    ];
    let err = runtime
        .update_workflow(
            id,
            WorkflowUpdate {
                nodes: Some(duplicate),
                connections: Some(Vec::new()),
                ..WorkflowUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Workflow(WorkflowError::DuplicateNodeId(_))));

    // Rejected update leaves the stored version untouched
    assert_eq!(runtime.get_workflow(id).await.unwrap().version, 2);
}

#[tokio::test]
async fn history_is_queryable_after_runs() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let id = runtime
        .register_workflow(workflow(WorkflowStatus::Active))
        .await
        .unwrap();

    let first = runtime.execute_workflow(id, json!({})).await.unwrap();
    let second = runtime.execute_workflow(id, json!({})).await.unwrap();

    let executions = runtime.list_executions(id).await.unwrap();
    assert_eq!(executions.len(), 2);
    let ids: HashSet<_> = executions.iter().map(|e| e.id).collect();
    assert!(ids.contains(&first.execution.id) && ids.contains(&second.execution.id));

    let logs = runtime.execution_logs(first.execution.id).await.unwrap();
    let nodes: Vec<&str> = logs.iter().map(|l| l.node_id.as_str()).collect();
    assert_eq!(nodes, vec!["hook", "hook", "wait", "wait"]);

    let fetched = runtime.get_execution(second.execution.id).await.unwrap();
    assert_eq!(fetched.status, ExecutionStatus::Success);
}

#[tokio::test]
async fn pool_runs_submissions_and_forwards_events() {
    let config = RuntimeConfig {
        workers: 3,
        ..RuntimeConfig::default()
    };
    let runtime = FlowRuntime::with_registry(registry(), config);
    let mut events = runtime.subscribe_events();
    let id = runtime
        .register_workflow(workflow(WorkflowStatus::Active))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for run in 0..5 {
        handles.push(runtime.submit(id, json!({ "run": run })).await.unwrap());
    }

    let mut execution_ids = HashSet::new();
    for handle in handles {
        let report = handle.wait().await.unwrap();
        assert_eq!(report.execution.status, ExecutionStatus::Success);
        execution_ids.insert(report.execution.id);
    }
    assert_eq!(execution_ids.len(), 5);

    // Every execution published its node logs through the shared bus
    let mut node_logs = 0;
    while let Ok(event) = events.try_recv() {
        if let ExecutionEvent::NodeLog { execution_id, .. } = event {
            assert!(execution_ids.contains(&execution_id));
            node_logs += 1;
        }
    }
    assert_eq!(node_logs, 5 * 4);

    runtime.shutdown().await;
}

#[tokio::test]
async fn pool_reports_failed_executions() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let mut wf = Workflow::new("no trigger").with_status(WorkflowStatus::Active);
    wf.add_node(NodeSpec::new("wait", "pause"));
    let id = runtime.register_workflow(wf).await.unwrap();

    let handle = runtime.submit(id, json!({})).await.unwrap();
    let err = handle.wait().await.unwrap_err();

    assert!(matches!(err.root(), EngineError::NoStartNode));
    assert_eq!(err.execution().unwrap().status, ExecutionStatus::Error);
}

#[tokio::test]
async fn inline_execute_skips_catalog() {
    let runtime = FlowRuntime::with_registry(registry(), RuntimeConfig::default());
    let report = runtime
        .execute(workflow(WorkflowStatus::Draft), json!({ "adhoc": true }))
        .await
        .unwrap();
    assert_eq!(
        report.results["wait"].output,
        json!({ "payload": { "adhoc": true } })
    );
    assert!(runtime.list_workflows().await.is_empty());
}

#[tokio::test]
async fn pool_stops_idle_workers_on_shutdown_now() {
    let store = Arc::new(relaycore::MemoryStore::new());
    let orchestrator = Arc::new(relayruntime::Orchestrator::new(
        registry(),
        store,
        Arc::new(relaycore::NoopSink),
    ));
    let pool = relayruntime::ExecutionPool::spawn(orchestrator.clone(), 2, 4);
    assert_eq!(pool.worker_count(), 2);

    let graph = Arc::new(orchestrator.graph(workflow(WorkflowStatus::Active)).unwrap());
    let report = pool
        .submit(graph, json!({}))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(report.execution.status, ExecutionStatus::Success);

    pool.shutdown_now().await;
}
