//! Tests for puppeteer-graph: action graph, agent graph, path log replay

use puppeteer_core::{Action, AgentId, Error, NodeId, StepStatus};
use puppeteer_graph::*;
use serde_json::json;

fn reasoning() -> Action {
    Action::reasoning("reasoning", "think step by step")
}

fn terminate() -> Action {
    Action::termination("terminate", "give the final answer")
}

/// Chain of `n` steps recorded the way the path executor records them.
fn chain(n: u64) -> ActionGraph {
    let mut g = ActionGraph::new();
    for i in 0..n {
        let status = if i % 2 == 0 { StepStatus::Success } else { StepStatus::Failure };
        let agent = AgentId::new(format!("agent-{}", i % 3));
        g.add_node(NodeId(i), reasoning(), agent, status, json!({"step": i}))
            .unwrap();
        if i > 0 {
            g.add_edge(NodeId(i - 1), NodeId(i)).unwrap();
        }
    }
    g
}

// ===========================================================================
// ActionGraph
// ===========================================================================

#[test]
fn action_graph_add_and_lookup() {
    let mut g = ActionGraph::new();
    let node = g
        .add_node(NodeId(0), reasoning(), "Planner".into(), StepStatus::Success, json!("ok"))
        .unwrap();
    assert_eq!(node.agent.as_str(), "Planner");
    assert_eq!(g.node_by_id(NodeId(0)).unwrap().payload, json!("ok"));
    assert!(g.node_by_id(NodeId(7)).is_none());
}

#[test]
fn action_graph_duplicate_node_rejected() {
    let mut g = ActionGraph::new();
    g.add_node(NodeId(1), reasoning(), "A".into(), StepStatus::Success, json!(null)).unwrap();
    let err = g
        .add_node(NodeId(1), terminate(), "B".into(), StepStatus::Success, json!(null))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateNode(_)));
    assert_eq!(g.step_count(), 1);
    assert_eq!(g.node_by_id(NodeId(1)).unwrap().agent.as_str(), "A");
}

#[test]
fn action_graph_edge_requires_both_endpoints() {
    let mut g = ActionGraph::new();
    g.add_node(NodeId(0), reasoning(), "A".into(), StepStatus::Success, json!(null)).unwrap();
    let err = g.add_edge(NodeId(0), NodeId(1)).unwrap_err();
    assert!(matches!(err, Error::UnknownNode(_)));
    let err = g.add_edge(NodeId(9), NodeId(0)).unwrap_err();
    assert!(matches!(err, Error::UnknownNode(_)));
    assert!(g.edges().is_empty());
}

#[test]
fn action_graph_rejects_back_edges() {
    let mut g = chain(3);
    let err = g.add_edge(NodeId(2), NodeId(0)).unwrap_err();
    assert!(matches!(err, Error::BackEdge { .. }));
    let err = g.add_edge(NodeId(1), NodeId(1)).unwrap_err();
    assert!(matches!(err, Error::BackEdge { .. }));
    assert!(err.is_graph_error());
}

#[test]
fn action_graph_dependencies_in_sequence_order() {
    let mut g = ActionGraph::new();
    for i in 0..4 {
        g.add_node(NodeId(i), reasoning(), "A".into(), StepStatus::Success, json!(i)).unwrap();
    }
    assert_eq!(g.add_edge(NodeId(0), NodeId(3)).unwrap(), 0);
    assert_eq!(g.add_edge(NodeId(0), NodeId(1)).unwrap(), 1);
    assert_eq!(g.add_edge(NodeId(1), NodeId(2)).unwrap(), 2);
    assert_eq!(g.dependencies_of(NodeId(0)).unwrap(), vec![NodeId(3), NodeId(1)]);
    assert!(g.dependencies_of(NodeId(3)).unwrap().is_empty());
    assert!(g.dependencies_of(NodeId(42)).is_err());
}

#[test]
fn action_graph_step_counter_tracks_nodes() {
    let g = chain(5);
    assert_eq!(g.step_count(), 5);
    assert_eq!(g.nodes().len(), 5);
    assert_eq!(g.edges().len(), 4);
    for edge in g.edges() {
        assert!(g.node_by_id(edge.from).is_some());
        assert!(g.node_by_id(edge.to).is_some());
        assert!(edge.from < edge.to);
    }
}

#[test]
fn action_graph_last_success_skips_failures() {
    let g = chain(4);
    assert_eq!(g.last_node().unwrap().id, NodeId(3));
    assert_eq!(g.last_success().unwrap().id, NodeId(2));
    assert!(g.has_succeeded("reasoning"));
    assert!(!g.has_succeeded("terminate"));
}

#[test]
fn action_graph_dot_colours_status() {
    let dot = chain(2).to_dot();
    assert!(dot.starts_with("digraph actions {"));
    assert!(dot.contains("color=green"));
    assert!(dot.contains("color=red"));
    assert!(dot.contains("n0 -> n1;"));
}

// ===========================================================================
// AgentGraph
// ===========================================================================

#[test]
fn agent_graph_records_handoffs() {
    let mut g = AgentGraph::new();
    let planner = AgentId::new("Planner");
    let critic = AgentId::new("Critic");
    assert_eq!(g.record_step(&planner).unwrap(), None);
    assert_eq!(g.record_step(&critic).unwrap(), Some(0));
    assert_eq!(g.record_step(&planner).unwrap(), Some(1));
    assert_eq!(g.agents().len(), 2);
    assert_eq!(g.last_agent(), Some(&planner));
    assert_eq!(g.handoffs_from(&planner), vec![critic.clone()]);
    assert_eq!(g.sequence(), vec![planner.clone(), critic, planner]);
}

#[test]
fn agent_graph_duplicate_and_unknown() {
    let mut g = AgentGraph::new();
    g.add_node("A".into()).unwrap();
    assert!(matches!(g.add_node("A".into()), Err(Error::DuplicateNode(_))));
    assert!(matches!(g.add_edge("A".into(), "B".into()), Err(Error::UnknownNode(_))));
}

#[test]
fn agent_graph_allows_self_loops() {
    let mut g = AgentGraph::new();
    let a = AgentId::new("A");
    g.record_step(&a).unwrap();
    assert_eq!(g.record_step(&a).unwrap(), Some(0));
    assert_eq!(g.sequence().len(), 2);
}

// ===========================================================================
// PathLog
// ===========================================================================

#[test]
fn path_log_replay_reproduces_graph() {
    let live = chain(6);
    let log = PathLog::from_graph(&live);
    let replayed = log.replay().unwrap();
    assert_eq!(replayed, live);
    assert_eq!(replayed.step_count(), live.step_count());
}

#[test]
fn path_log_jsonl_is_byte_stable() {
    let live = chain(4);
    let text = PathLog::from_graph(&live).to_jsonl().unwrap();
    let parsed = PathLog::from_jsonl(&text).unwrap();
    let rebuilt = parsed.replay().unwrap();
    assert_eq!(PathLog::from_graph(&rebuilt).to_jsonl().unwrap(), text);
    assert_eq!(text.lines().count(), 4);
}

#[test]
fn path_log_entry_fields() {
    let text = PathLog::from_graph(&chain(1)).to_jsonl().unwrap();
    let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(v["step_index"], 0);
    assert_eq!(v["agent"], "agent-0");
    assert_eq!(v["action"]["kind"], "reasoning");
    assert_eq!(v["result_status"], "Success");
    assert_eq!(v["payload"]["step"], 0);
}

#[test]
fn path_log_rejects_gaps() {
    let mut log = PathLog::new();
    let entry = PathLogEntry {
        step_index: 1,
        agent: "A".into(),
        action: reasoning(),
        result_status: StepStatus::Success,
        payload: json!(null),
    };
    assert!(matches!(log.append(entry), Err(Error::InvalidLog(_))));
    assert!(PathLog::from_jsonl("not json\n").is_err());
}

#[test]
fn path_log_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("path_0.jsonl");
    let live = chain(3);
    PathLog::from_graph(&live).write_to(&path).unwrap();
    let replayed = PathLog::read_from(&path).unwrap().replay().unwrap();
    assert_eq!(replayed, live);
}
