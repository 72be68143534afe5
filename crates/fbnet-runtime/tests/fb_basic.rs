mod common;

use std::sync::Arc;

use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::fb::{Ecc, ExecEnv, Services};
use fbnet_runtime::interface::{EventId, FbId};
use fbnet_runtime::value::Value;
use fbnet_runtime::{FbInterface, FunctionBlock, StatusEvent, Trigger};

use common::{library, manual_executor};

fn run(fb: &mut FunctionBlock, event: &str) -> Result<Vec<EventId>, RuntimeError> {
    let services = Services::default();
    let env = ExecEnv::new(FbId(0), &services);
    let event = fb.interface().event_input(event).unwrap();
    fb.execute(Trigger::Event(event), &env)
}

fn names(fb: &FunctionBlock, fired: &[EventId]) -> Vec<String> {
    fired
        .iter()
        .map(|event| fb.interface().event_outputs[usize::from(event.0)].name.to_string())
        .collect()
}

fn picker() -> FunctionBlock {
    let interface = FbInterface::builder("PICK")
        .event_input("REQ", &["X"])
        .event_input("OTHER", &[])
        .event_output("HIGH", &[])
        .event_output("ANY", &[])
        .data_input("X", Value::Int(0))
        .build_shared()
        .unwrap();
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("HI", &[(None, Some("HIGH"))])
        .state_with("LO", &[(None, Some("ANY"))])
        .guarded("START", "HI", Some("REQ"), |ctx| {
            ctx.input("X").ok().and_then(Value::as_i128).unwrap_or(0) > 5
        })
        .transition("START", "LO", Some("REQ"))
        .transition("HI", "START", None)
        .transition("LO", "START", None)
        .build()
        .unwrap();
    FunctionBlock::basic("P", interface, Arc::new(ecc))
}

#[test]
fn first_matching_transition_wins() {
    let mut fb = picker();
    let fired = run(&mut fb, "REQ").unwrap();
    assert_eq!(names(&fb, &fired), ["ANY"]);

    fb.set_input("X", &Value::Int(9)).unwrap();
    let fired = run(&mut fb, "REQ").unwrap();
    assert_eq!(names(&fb, &fired), ["HIGH"]);
    assert_eq!(fb.state_name(), Some("START"));
}

#[test]
fn unmatched_event_leaves_state() {
    let mut fb = picker();
    assert!(run(&mut fb, "OTHER").unwrap().is_empty());
    assert_eq!(fb.state_name(), Some("START"));
}

#[test]
fn event_is_consumed_by_the_first_transition() {
    let interface = FbInterface::builder("TWICE")
        .event_input("EI", &[])
        .event_output("EO", &[])
        .build_shared()
        .unwrap();
    let ecc = Ecc::builder(&interface)
        .state("A")
        .state_with("B", &[(None, Some("EO"))])
        .state_with("C", &[(None, Some("EO"))])
        .transition("A", "B", Some("EI"))
        .transition("B", "C", Some("EI"))
        .build()
        .unwrap();
    let mut fb = FunctionBlock::basic("T", interface, Arc::new(ecc));
    assert_eq!(run(&mut fb, "EI").unwrap().len(), 1);
    assert_eq!(fb.state_name(), Some("B"));
    assert_eq!(run(&mut fb, "EI").unwrap().len(), 1);
    assert_eq!(fb.state_name(), Some("C"));
}

#[test]
fn algorithms_update_outputs_and_vars() {
    let interface = FbInterface::builder("ACC")
        .event_input("ADD", &["IN"])
        .event_output("CNF", &["SUM"])
        .data_input("IN", Value::DInt(0))
        .data_output("SUM", Value::DInt(0))
        .build_shared()
        .unwrap();
    let ecc = Ecc::builder(&interface)
        .var("CALLS", Value::UDInt(0))
        .state("START")
        .state_with("ADD", &[(Some("ADD"), Some("CNF"))])
        .algorithm("ADD", |ctx| {
            let sum = ctx.output("SUM")?.as_i128().unwrap_or(0)
                + ctx.input("IN")?.as_i128().unwrap_or(0);
            let calls = ctx.var("CALLS")?.as_i128().unwrap_or(0) + 1;
            ctx.set_output("SUM", &Value::DInt(i32::try_from(sum).unwrap_or(i32::MAX)))?;
            ctx.set_var("CALLS", &Value::UDInt(u32::try_from(calls).unwrap_or(u32::MAX)))
        })
        .transition("START", "ADD", Some("ADD"))
        .transition("ADD", "START", None)
        .build()
        .unwrap();
    let mut fb = FunctionBlock::basic("ACC1", interface, Arc::new(ecc));
    fb.set_input("IN", &Value::Int(4)).unwrap();
    run(&mut fb, "ADD").unwrap();
    run(&mut fb, "ADD").unwrap();
    assert_eq!(fb.output("SUM"), Some(&Value::DInt(8)));
    assert_eq!(fb.var("CALLS"), Some(&Value::UDInt(2)));
}

#[test]
fn event_less_cycle_hits_the_step_limit() {
    let interface = FbInterface::builder("SPIN")
        .event_input("EI", &[])
        .build_shared()
        .unwrap();
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state("A")
        .state("B")
        .transition("START", "A", Some("EI"))
        .transition("A", "B", None)
        .transition("B", "A", None)
        .step_limit(8)
        .build()
        .unwrap();
    let mut fb = FunctionBlock::basic("S", interface, Arc::new(ecc));
    assert_eq!(run(&mut fb, "EI"), Err(RuntimeError::EccLoop { limit: 8 }));
}

#[test]
fn chart_references_are_checked_at_build() {
    let interface = FbInterface::builder("BAD")
        .event_input("EI", &[])
        .build_shared()
        .unwrap();
    assert!(matches!(
        Ecc::builder(&interface)
            .state("START")
            .transition("START", "MISSING", Some("EI"))
            .build(),
        Err(RuntimeError::UnknownPort(_))
    ));
    assert!(matches!(
        Ecc::builder(&interface)
            .state_with("START", &[(None, Some("EO"))])
            .build(),
        Err(RuntimeError::UnknownPort(_))
    ));
    assert!(matches!(
        Ecc::builder(&interface).build(),
        Err(RuntimeError::InvalidConfig(_))
    ));
}

fn failing() -> FunctionBlock {
    let interface = FbInterface::builder("FAILING")
        .event_input("REQ", &[])
        .event_output("CNF", &[])
        .event_output("ERR", &[])
        .error_event("ERR")
        .build_shared()
        .unwrap();
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("REQ", &[(Some("FAIL"), Some("CNF"))])
        .algorithm("FAIL", |_| Err(RuntimeError::Fault("sensor offline".into())))
        .transition("START", "REQ", Some("REQ"))
        .transition("REQ", "START", None)
        .build()
        .unwrap();
    FunctionBlock::basic("F", interface, Arc::new(ecc))
}

#[test]
fn algorithm_failure_fires_the_error_event() {
    let library = library();
    let mut network = fbnet_runtime::Network::new();
    network.add_context("main").unwrap();
    network.add_instance("main", failing()).unwrap();
    network.create_instance(&library, "E_CTU", "ERRORS", "main").unwrap();
    network.create_instance(&library, "E_CTU", "DONE", "main").unwrap();
    network.connect_event("F.ERR", "ERRORS.CU").unwrap();
    network.connect_event("F.CNF", "DONE.CU").unwrap();
    let (executor, _clock) = manual_executor(network);

    executor.inject("F.REQ").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("ERRORS.CV").unwrap(), Value::UInt(1));
    assert_eq!(executor.output("DONE.CV").unwrap(), Value::UInt(0));
    executor
        .with_instance("F", |fb| {
            assert_eq!(fb.state_name(), Some("START"));
            assert_eq!(fb.fault(), Some(&RuntimeError::Fault("sensor offline".into())));
        })
        .unwrap();
    assert_eq!(
        executor.drain_status(),
        [StatusEvent::ExecutionFault {
            instance: "F".into(),
            error: RuntimeError::Fault("sensor offline".into()),
        }]
    );
}

#[test]
fn conversion_fault_without_error_event() {
    let mut network = common::network(&[("F_TIME_IN_S_TO_ULINT", "CONV"), ("E_CTU", "C")]);
    network.connect_event("CONV.CNF", "C.CU").unwrap();
    let (executor, _clock) = manual_executor(network);

    executor
        .set_input("CONV.IN", &Value::Time(fbnet_runtime::Duration::from_secs(90)))
        .unwrap();
    executor.inject("CONV.REQ").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("CONV.OUT").unwrap(), Value::ULInt(90));
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(1));

    executor
        .set_input("CONV.IN", &Value::Time(fbnet_runtime::Duration::from_secs(-1)))
        .unwrap();
    executor.inject("CONV.REQ").unwrap();
    executor.run_until_idle();
    let expected = RuntimeError::ConversionError {
        from: fbnet_types::ElementaryType::Time,
        to: fbnet_types::ElementaryType::ULInt,
    };
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(1));
    executor
        .with_instance("CONV", |fb| assert_eq!(fb.fault(), Some(&expected)))
        .unwrap();
    assert!(matches!(
        executor.drain_status().as_slice(),
        [StatusEvent::ExecutionFault { instance, .. }] if instance == "CONV"
    ));

    // the next successful execution clears the fault
    executor
        .set_input("CONV.IN", &Value::Time(fbnet_runtime::Duration::from_secs(2)))
        .unwrap();
    executor.inject("CONV.REQ").unwrap();
    executor.run_until_idle();
    executor
        .with_instance("CONV", |fb| assert!(fb.fault().is_none()))
        .unwrap();
}
