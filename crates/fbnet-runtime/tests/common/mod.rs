#![allow(dead_code)]

use std::sync::Arc;

use fbnet_runtime::library::FbTypeRegistry;
use fbnet_runtime::scheduler::{Executor, ManualClock, SchedulerConfig};
use fbnet_runtime::Network;

pub fn library() -> FbTypeRegistry {
    FbTypeRegistry::standard().unwrap()
}

/// Single-context network with `(type, name)` instances.
pub fn network(instances: &[(&str, &str)]) -> Network {
    let library = library();
    let mut network = Network::new();
    network.add_context("main").unwrap();
    for (ty, name) in instances {
        network.create_instance(&library, ty, name, "main").unwrap();
    }
    network
}

pub fn manual_executor(network: Network) -> (Executor, ManualClock) {
    manual_executor_with(network, SchedulerConfig::default())
}

pub fn manual_executor_with(network: Network, config: SchedulerConfig) -> (Executor, ManualClock) {
    let clock = ManualClock::new();
    let executor = network.into_executor(&config, Arc::new(clock.clone()));
    (executor, clock)
}
