mod common;

use std::sync::Arc;

use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::interface::FbId;
use fbnet_runtime::io::{
    ControllerConfig, ControllerRegistry, DeviceController, HandleDescriptor, IndicationObserver,
    IoDirection, IoMapper, LoopbackController,
};
use fbnet_runtime::value::Value;
use fbnet_runtime::Network;
use fbnet_types::ElementaryType;

use common::{manual_executor, network};

fn ids(ids: &[&str]) -> toml::Value {
    toml::Value::Array(ids.iter().map(|id| toml::Value::String((*id).to_owned())).collect())
}

fn loopback(network: &Network, inputs: &[&str], outputs: &[&str]) -> LoopbackController {
    let mut controller = LoopbackController::default();
    controller
        .set_config(
            &ControllerConfig::new("loopback")
                .with_param("inputs", ids(inputs))
                .with_param("outputs", ids(outputs)),
        )
        .unwrap();
    controller.init(network.io()).unwrap();
    controller
}

fn bind(network: &mut Network, instance: &str, handle: &str) {
    network
        .set_input(&format!("{instance}.QI"), &Value::Bool(true))
        .unwrap();
    network
        .set_input(&format!("{instance}.PARAMS"), &Value::from(handle))
        .unwrap();
}

#[test]
fn output_write_loops_back_as_indication() {
    let mut net = network(&[("IX", "IN1"), ("QX", "OUT1"), ("E_CTU", "CHANGES")]);
    bind(&mut net, "IN1", "DI0");
    bind(&mut net, "OUT1", "DO0");
    net.connect_event("IN1.IND", "CHANGES.CU").unwrap();
    let mut controller = loopback(&net, &["DI0"], &["DO0"]);
    let (executor, _clock) = manual_executor(net);

    executor.inject("IN1.INIT").unwrap();
    executor.inject("OUT1.INIT").unwrap();
    executor.run_until_idle();
    for instance in ["IN1", "OUT1"] {
        assert_eq!(executor.output(&format!("{instance}.QO")).unwrap(), Value::Bool(true));
        assert_eq!(
            executor.output(&format!("{instance}.STATUS")).unwrap(),
            Value::from("OK")
        );
    }

    executor.set_input("OUT1.OUT", &Value::Bool(true)).unwrap();
    executor.inject("OUT1.REQ").unwrap();
    executor.run_until_idle();
    let output = executor.io().handle("DO0").unwrap();
    assert_eq!(output.read(), Value::Bool(true));
    assert_eq!(executor.output("CHANGES.CV").unwrap(), Value::UInt(0));

    controller.run_loop().unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("IN1.IN").unwrap(), Value::Bool(true));
    assert_eq!(executor.output("CHANGES.CV").unwrap(), Value::UInt(1));

    // no change, no indication
    controller.run_loop().unwrap();
    assert_eq!(executor.run_until_idle(), 0);
}

#[test]
fn request_samples_the_handle() {
    let mut net = network(&[("IX", "IN1")]);
    bind(&mut net, "IN1", "DI0");
    let _controller = loopback(&net, &["DI0"], &[]);
    let (executor, _clock) = manual_executor(net);
    executor.inject("IN1.INIT").unwrap();
    executor.run_until_idle();

    executor.io().handle("DI0").unwrap().write(&Value::Bool(true)).unwrap();
    executor.inject("IN1.REQ").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("IN1.IN").unwrap(), Value::Bool(true));
}

#[test]
fn init_failures_are_reported_on_status() {
    let mut net = network(&[("IX", "OFF"), ("IX", "MISSING"), ("QX", "WRONG"), ("QX", "IDLE")]);
    net.set_input("OFF.PARAMS", &Value::from("DI0")).unwrap();
    bind(&mut net, "MISSING", "NOPE");
    bind(&mut net, "WRONG", "DI0");
    let _controller = loopback(&net, &["DI0"], &[]);
    let (executor, _clock) = manual_executor(net);
    for instance in ["OFF", "MISSING", "WRONG"] {
        executor.inject(&format!("{instance}.INIT")).unwrap();
    }
    executor.inject("IDLE.REQ").unwrap();
    executor.run_until_idle();

    let status = |instance: &str| executor.output(&format!("{instance}.STATUS")).unwrap();
    assert_eq!(status("OFF"), Value::from("I/O controller error: QI is FALSE"));
    assert_eq!(status("MISSING"), Value::from("unknown I/O handle 'NOPE'"));
    assert_eq!(
        status("WRONG"),
        Value::from("I/O controller error: handle 'DI0' has direction Input")
    );
    assert_eq!(status("IDLE"), Value::from("I/O controller error: not initialized"));
    for instance in ["OFF", "MISSING", "WRONG", "IDLE"] {
        assert_eq!(
            executor.output(&format!("{instance}.QO")).unwrap(),
            Value::Bool(false)
        );
    }
}

#[test]
fn one_observer_per_handle() {
    let mut net = network(&[("IX", "FIRST"), ("IX", "SECOND")]);
    bind(&mut net, "FIRST", "DI0");
    bind(&mut net, "SECOND", "DI0");
    let _controller = loopback(&net, &["DI0"], &[]);
    let (executor, _clock) = manual_executor(net);
    executor.inject("FIRST.INIT").unwrap();
    executor.inject("SECOND.INIT").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("FIRST.QO").unwrap(), Value::Bool(true));
    assert_eq!(executor.output("SECOND.QO").unwrap(), Value::Bool(false));
    assert_eq!(
        executor.output("SECOND.STATUS").unwrap(),
        Value::from("I/O handle 'DI0' already has an observer")
    );
}

#[test]
fn mapper_registry() {
    let mapper = IoMapper::new();
    let handle = mapper
        .register_handle(HandleDescriptor::new("AI0", IoDirection::Input, ElementaryType::Int))
        .unwrap();
    assert_eq!(handle.read(), Value::Int(0));
    assert_eq!(
        mapper
            .register_handle(HandleDescriptor::new("AI0", IoDirection::Input, ElementaryType::Int))
            .unwrap_err(),
        RuntimeError::HandleExists("AI0".into())
    );

    handle.write(&Value::SInt(-4)).unwrap();
    assert_eq!(handle.read(), Value::Int(-4));
    assert!(handle.write(&Value::DInt(1)).is_err());

    // without a running network a change is stored but not routed
    handle
        .on_observer(Box::new(IndicationObserver::new(FbId(0))))
        .unwrap();
    assert_eq!(handle.on_change(&Value::Int(7)), Ok(false));
    assert_eq!(handle.read(), Value::Int(7));

    let removed = mapper.deregister_handle("AI0").unwrap();
    assert!(!removed.has_observer());
    assert!(mapper.is_empty());
    assert_eq!(
        mapper.deregister_handle("AI0").unwrap_err(),
        RuntimeError::UnknownHandle("AI0".into())
    );
}

#[test]
fn controller_thread_registers_and_releases_handles() {
    let mapper = Arc::new(IoMapper::new());
    let registry = ControllerRegistry::standard();
    let runner = registry
        .build(
            ControllerConfig::new("sim")
                .with_param("inputs", ids(&["DI0", "DI1"]))
                .with_param("outputs", ids(&["DO0", "DO1"]))
                .with_update_interval(std::time::Duration::from_millis(1)),
        )
        .unwrap();
    let handle = runner.spawn(Arc::clone(&mapper)).unwrap();
    assert_eq!(mapper.len(), 4);

    mapper.handle("DO1").unwrap().write(&Value::Bool(true)).unwrap();
    let input = mapper.handle("DI1").unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while input.read() != Value::Bool(true) && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(input.read(), Value::Bool(true));

    handle.stop();
    assert!(mapper.is_empty());
}

#[test]
fn controller_configuration_errors() {
    let registry = ControllerRegistry::standard();
    assert!(matches!(
        registry.build(ControllerConfig::new("modbus")),
        Err(RuntimeError::InvalidConfig(_))
    ));
    assert!(matches!(
        registry.build(ControllerConfig::new("loopback").with_param("inputs", "DI0")),
        Err(RuntimeError::InvalidConfig(_))
    ));
    assert!(matches!(
        registry.build(ControllerConfig::new("loopback").with_param("type", "ARRAY")),
        Err(RuntimeError::InvalidConfig(_))
    ));
}
