mod common;

use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::graph::{ConnectionGraph, EventPort};
use fbnet_runtime::interface::{EventId, FbId};
use fbnet_runtime::value::Value;

use common::{manual_executor, network};

#[test]
fn event_connections_are_counted_per_edge() {
    let mut net = network(&[("E_SPLIT", "S"), ("E_CTU", "A"), ("E_CTU", "B")]);
    net.connect_event("S.EO1", "A.CU").unwrap();
    net.connect_event("S.EO1", "B.CU").unwrap();
    net.connect_event("S.EO2", "A.R").unwrap();
    assert_eq!(net.graph().event_edge_count(), 3);
}

#[test]
fn duplicate_event_connection_is_rejected() {
    let mut net = network(&[("E_SPLIT", "S"), ("E_CTU", "A")]);
    net.connect_event("S.EO1", "A.CU").unwrap();
    assert_eq!(
        net.connect_event("S.EO1", "A.CU"),
        Err(RuntimeError::DuplicateConnection("S.EO1 -> A.CU".into()))
    );
    assert_eq!(net.graph().event_edge_count(), 1);
}

#[test]
fn data_input_has_a_single_writer() {
    let mut net = network(&[("E_CTU", "A"), ("E_CTU", "B"), ("E_CTU", "C")]);
    net.connect_data("A.CV", "C.PV").unwrap();
    assert_eq!(
        net.connect_data("B.CV", "C.PV"),
        Err(RuntimeError::DataInputTaken("C.PV".into()))
    );
    assert_eq!(
        net.connect_data("A.CV", "C.PV"),
        Err(RuntimeError::DuplicateConnection("A.CV -> C.PV".into()))
    );
    // fan-out from one output is fine
    net.connect_data("A.CV", "B.PV").unwrap();
    assert_eq!(net.graph().data_edge_count(), 2);
}

#[test]
fn data_connection_requires_implicit_cast() {
    let mut net = network(&[("F_TIME_IN_S_TO_ULINT", "F"), ("E_CTU", "C")]);
    assert_eq!(
        net.connect_data("F.OUT", "C.PV"),
        Err(RuntimeError::TypeError {
            from: fbnet_types::ElementaryType::ULInt,
            to: fbnet_types::ElementaryType::UInt,
        })
    );
    assert_eq!(net.graph().data_edge_count(), 0);
}

#[test]
fn ports_resolve_by_direction() {
    let mut net = network(&[("E_SPLIT", "S"), ("E_CTU", "A")]);
    assert_eq!(
        net.connect_event("A.CU", "S.EI"),
        Err(RuntimeError::UnknownPort("A.CU".into()))
    );
    assert_eq!(
        net.connect_event("S.EO1", "A.NOPE"),
        Err(RuntimeError::UnknownPort("A.NOPE".into()))
    );
    assert_eq!(
        net.connect_event("X.EO", "A.CU"),
        Err(RuntimeError::UnknownInstance("X".into()))
    );
    assert_eq!(
        net.connect_data("A.PV", "A.PV"),
        Err(RuntimeError::UnknownPort("A.PV".into()))
    );
    assert_eq!(
        net.connect_event("S", "A.CU"),
        Err(RuntimeError::UnknownPort("S".into()))
    );
}

#[test]
fn disconnect_removes_exactly_one_edge() {
    let mut net = network(&[("E_SPLIT", "S"), ("E_CTU", "A"), ("E_CTU", "B")]);
    net.connect_event("S.EO1", "A.CU").unwrap();
    net.connect_event("S.EO1", "B.CU").unwrap();
    net.disconnect_event("S.EO1", "A.CU").unwrap();
    assert_eq!(net.graph().event_edge_count(), 1);
    assert_eq!(
        net.disconnect_event("S.EO1", "A.CU"),
        Err(RuntimeError::NotConnected("S.EO1 -> A.CU".into()))
    );

    net.connect_data("A.CV", "B.PV").unwrap();
    assert_eq!(
        net.disconnect_data("B.CV", "B.PV"),
        Err(RuntimeError::NotConnected("B.CV -> B.PV".into()))
    );
    net.disconnect_data("A.CV", "B.PV").unwrap();
    net.connect_data("A.CV", "B.PV").unwrap();
}

#[test]
fn locked_graph_rejects_mutation() {
    let mut graph = ConnectionGraph::new();
    let src = EventPort::fb(FbId(0), EventId(0));
    let dst = EventPort::fb(FbId(1), EventId(0));
    graph.bind_event(src, dst).unwrap();
    graph.lock();
    assert_eq!(
        graph.bind_event(src, EventPort::fb(FbId(2), EventId(0))),
        Err(RuntimeError::NetworkRunning)
    );
    assert_eq!(graph.unbind_event(src, dst), Err(RuntimeError::NetworkRunning));
    assert_eq!(graph.event_destinations(src), &[dst]);
    graph.unlock();
    graph.unbind_event(src, dst).unwrap();
    assert!(graph.event_destinations(src).is_empty());
}

#[test]
fn executor_hands_back_an_editable_network() {
    let mut net = network(&[("E_SPLIT", "S"), ("E_CTU", "A")]);
    net.connect_event("S.EO1", "A.CU").unwrap();
    let (executor, _clock) = manual_executor(net);
    executor.inject("S.EI").unwrap();
    executor.run_until_idle();

    let mut net = executor.into_network().unwrap();
    assert!(!net.graph().is_locked());
    assert_eq!(net.instance("A").unwrap().output("CV"), Some(&Value::UInt(1)));
    net.connect_event("S.EO2", "A.CU").unwrap();

    let (executor, _clock) = manual_executor(net);
    executor.inject("S.EI").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("A.CV").unwrap(), Value::UInt(3));
}

#[test]
fn data_flows_only_with_events() {
    let mut net = network(&[("E_CTU", "A"), ("E_CTU", "B")]);
    net.connect_data("A.CV", "B.PV").unwrap();
    let (executor, _clock) = manual_executor(net);

    executor.inject("A.CU").unwrap();
    executor.inject("A.CU").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("A.CV").unwrap(), Value::UInt(2));
    assert_eq!(executor.input("B.PV").unwrap(), Value::UInt(0));

    executor.inject("B.CU").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.input("B.PV").unwrap(), Value::UInt(2));
    assert_eq!(executor.output("B.Q").unwrap(), Value::Bool(false));

    executor.inject("B.CU").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("B.Q").unwrap(), Value::Bool(true));
}
