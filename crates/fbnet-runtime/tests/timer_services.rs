mod common;

use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::value::{Duration, Value};
use fbnet_runtime::StatusEvent;

use common::{manual_executor, network};

fn timed(ty: &str, dt: Duration) -> (fbnet_runtime::Executor, fbnet_runtime::scheduler::ManualClock) {
    let mut net = network(&[(ty, "T"), ("E_CTU", "C")]);
    net.set_input("T.DT", &Value::Time(dt)).unwrap();
    net.connect_event("T.EO", "C.CU").unwrap();
    manual_executor(net)
}

#[test]
fn cycle_fires_every_period_until_stopped() {
    let (executor, clock) = timed("E_CYCLE", Duration::from_millis(10));
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.timer().len(), 1);

    clock.advance(Duration::from_millis(9));
    assert_eq!(executor.tick_timers(), 0);
    for expected in 1..=3u16 {
        clock.advance(Duration::from_millis(10));
        assert_eq!(executor.tick_timers(), 1);
        executor.run_until_idle();
        assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(expected));
    }

    executor.inject("T.STOP").unwrap();
    executor.run_until_idle();
    assert!(executor.timer().is_empty());
    clock.advance(Duration::from_millis(50));
    assert_eq!(executor.tick_timers(), 0);
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(3));
}

#[test]
fn stale_indication_after_stop_is_ignored() {
    let (executor, clock) = timed("E_CYCLE", Duration::from_millis(10));
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    clock.advance(Duration::from_millis(10));
    executor.tick_timers();
    // STOP is queued behind the timer stimulus
    executor.inject("T.STOP").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(1));

    executor.indicate("T").unwrap();
    executor.run_until_idle();
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(1));
}

#[test]
fn cycle_rejects_zero_period() {
    let (executor, _clock) = timed("E_CYCLE", Duration::ZERO);
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    assert!(executor.timer().is_empty());
    assert!(matches!(
        executor.drain_status().as_slice(),
        [StatusEvent::ExecutionFault {
            error: RuntimeError::Fault(_),
            ..
        }]
    ));
}

#[test]
fn delay_fires_once() {
    let (executor, clock) = timed("E_DELAY", Duration::from_millis(5));
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    clock.advance(Duration::from_millis(3));
    // a second START while pending keeps the original expiry
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    clock.advance(Duration::from_millis(2));
    assert_eq!(executor.tick_timers(), 1);
    executor.run_until_idle();
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(1));

    clock.advance(Duration::from_millis(10));
    assert_eq!(executor.tick_timers(), 0);

    // rearm after expiry
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    clock.advance(Duration::from_millis(5));
    executor.tick_timers();
    executor.run_until_idle();
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(2));
}

#[test]
fn delay_stop_cancels() {
    let (executor, clock) = timed("E_DELAY", Duration::from_millis(5));
    executor.inject("T.START").unwrap();
    executor.inject("T.STOP").unwrap();
    executor.run_until_idle();
    clock.advance(Duration::from_millis(5));
    assert_eq!(executor.tick_timers(), 0);
    assert_eq!(executor.output("C.CV").unwrap(), Value::UInt(0));
}

#[test]
fn returning_the_network_clears_timers() {
    let (executor, _clock) = timed("E_CYCLE", Duration::from_millis(10));
    executor.inject("T.START").unwrap();
    executor.run_until_idle();
    let timer = std::sync::Arc::clone(executor.timer());
    assert_eq!(timer.len(), 1);
    let _network = executor.into_network().unwrap();
    assert!(timer.is_empty());
}
