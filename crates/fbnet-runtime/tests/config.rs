mod common;

use std::sync::Arc;

use fbnet_runtime::config::{ConnectionConfig, NetworkConfig, RuntimeConfig};
use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::scheduler::ManualClock;
use fbnet_runtime::value::{Duration, Value};
use fbnet_runtime::RealTimeConstraints;

use common::library;

#[test]
fn runtime_defaults() {
    let config = RuntimeConfig::parse("").unwrap();
    assert_eq!(config.name, "fbnet");
    assert_eq!(config.log_level, "info");
    assert_eq!(config.scheduler.status_capacity, 256);
    assert_eq!(config.timer.tick, Duration::from_millis(10));
    assert!(config.controllers.is_empty());
}

#[test]
fn runtime_sections() {
    let config = RuntimeConfig::parse(
        r#"
[runtime]
name = "press-line"
log_level = "debug"

[scheduler]
queue_capacity = 64
status_capacity = 8

[timer]
tick_ms = 2
priority = 5

[[io.controller]]
kind = "loopback"
update_interval_ms = 20
params = { inputs = ["DI0"], outputs = ["DO0"] }
"#,
    )
    .unwrap();
    assert_eq!(config.name, "press-line");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.scheduler.queue_capacity, 64);
    assert_eq!(config.scheduler.status_capacity, 8);
    assert_eq!(config.timer.tick, Duration::from_millis(2));
    assert_eq!(config.timer.priority, 5);

    let [controller] = config.controllers.as_slice() else {
        panic!("expected one controller");
    };
    assert_eq!(controller.kind, "loopback");
    assert_eq!(controller.update_interval, std::time::Duration::from_millis(20));
    assert_eq!(controller.param_list("inputs").unwrap(), ["DI0"]);
    assert_eq!(controller.param_list("outputs").unwrap(), ["DO0"]);
}

#[test]
fn runtime_rejects_bad_values() {
    for text in [
        "[scheduler]\nqueue_capacity = 0",
        "[scheduler]\nstatus_capacity = 0",
        "[timer]\ntick_ms = 0",
        "[[io.controller]]\nkind = \" \"",
        "[[io.controller]]\nkind = \"loopback\"\nupdate_interval_ms = 0",
        "[tracing]\nlevel = \"info\"",
        "[timer]\ntick_ms = \"fast\"",
    ] {
        assert!(
            matches!(RuntimeConfig::parse(text), Err(RuntimeError::InvalidConfig(_))),
            "accepted {text:?}"
        );
    }
}

const COUNTER_NETWORK: &str = r#"
[[context]]
name = "fast"

[[context]]
name = "slow"

[[fb]]
name = "SPLIT"
type = "E_SPLIT"
context = "fast"

[[fb]]
name = "COUNT"
type = "E_CTU"
context = "slow"
inputs = { PV = 2 }
realtime = { deadline_us = 500, wcet_us = 100 }

[[fb]]
name = "TICK"
type = "E_CYCLE"
context = "fast"
inputs = { DT = "T#25ms" }

[[connection.event]]
from = "SPLIT.EO1"
to = "COUNT.CU"

[[connection.event]]
from = "SPLIT.EO2"
to = "COUNT.CU"
"#;

#[test]
fn network_file_declares_instances_and_connections() {
    let config = NetworkConfig::parse(COUNTER_NETWORK).unwrap();
    assert_eq!(config.contexts, ["fast", "slow"]);
    assert_eq!(config.instances.len(), 3);
    assert_eq!(
        config.event_connections[0],
        ConnectionConfig {
            from: "SPLIT.EO1".into(),
            to: "COUNT.CU".into(),
        }
    );
    assert!(config.data_connections.is_empty());

    let network = config.build(&library()).unwrap();
    assert_eq!(network.context_names(), ["fast", "slow"]);
    assert_eq!(network.graph().event_edge_count(), 2);
    assert_eq!(
        network.instance("COUNT").unwrap().realtime(),
        Some(RealTimeConstraints {
            deadline: Some(Duration::from_micros(500)),
            min_interarrival: None,
            wcet: Some(Duration::from_micros(100)),
        })
    );

    let executor = network.into_executor(
        &fbnet_runtime::scheduler::SchedulerConfig::default(),
        Arc::new(ManualClock::new()),
    );
    assert_eq!(executor.input("COUNT.PV").unwrap(), Value::UInt(2));
    assert_eq!(
        executor.input("TICK.DT").unwrap(),
        Value::Time(Duration::from_millis(25))
    );
    executor.inject("SPLIT.EI").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("COUNT.CV").unwrap(), Value::UInt(2));
    assert_eq!(executor.output("COUNT.Q").unwrap(), Value::Bool(true));
}

#[test]
fn instances_default_to_the_main_context() {
    let config = NetworkConfig::parse(
        r#"
[[fb]]
name = "IN1"
type = "IX"
inputs = { QI = true, PARAMS = "DI0" }
"#,
    )
    .unwrap();
    let network = config.build(&library()).unwrap();
    assert_eq!(network.context_names(), ["main"]);
    let executor = network.into_executor(
        &fbnet_runtime::scheduler::SchedulerConfig::default(),
        Arc::new(ManualClock::new()),
    );
    assert_eq!(executor.owner("IN1").map(|name| name.as_str()), Some("main"));
    assert_eq!(executor.input("IN1.QI").unwrap(), Value::Bool(true));
    assert_eq!(executor.input("IN1.PARAMS").unwrap(), Value::from("DI0"));
}

#[test]
fn build_errors_reject_the_network() {
    let build = |text: &str| NetworkConfig::parse(text).unwrap().build(&library());
    assert_eq!(
        build("[[fb]]\nname = \"X\"\ntype = \"E_NOPE\"").unwrap_err(),
        RuntimeError::UnknownFbType("E_NOPE".into())
    );
    assert_eq!(
        build("[[fb]]\nname = \"C\"\ntype = \"E_CTU\"\ninputs = { NOPE = 1 }").unwrap_err(),
        RuntimeError::UnknownPort("C.NOPE".into())
    );
    assert!(build("[[fb]]\nname = \"C\"\ntype = \"E_CTU\"\ninputs = { PV = -1 }").is_err());
    assert_eq!(
        build(
            "[[fb]]\nname = \"C\"\ntype = \"E_CTU\"\n\
             [[connection.event]]\nfrom = \"C.CUO\"\nto = \"MISSING.CU\""
        )
        .unwrap_err(),
        RuntimeError::UnknownInstance("MISSING".into())
    );
    assert_eq!(
        build("[[fb]]\nname = \"C\"\ntype = \"E_CTU\"\ncontext = \"other\"").unwrap_err(),
        RuntimeError::UnknownContext("other".into())
    );
}

#[test]
fn network_file_rejects_unknown_tables() {
    assert!(matches!(
        NetworkConfig::parse("[[instance]]\nname = \"X\""),
        Err(RuntimeError::InvalidConfig(_))
    ));
    assert!(matches!(
        NetworkConfig::parse("[[fb]]\nname = \"X\""),
        Err(RuntimeError::InvalidConfig(_))
    ));
}
