//! Event function blocks and conversions implemented as charts.

use fbnet_types::ElementaryType;

use super::FbTypeRegistry;
use crate::error::RuntimeError;
use crate::fb::Ecc;
use crate::interface::FbInterface;
use crate::value::{Duration, Value};

pub(super) fn register(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    e_split(registry)?;
    e_merge(registry)?;
    e_switch(registry)?;
    e_permit(registry)?;
    e_sr(registry)?;
    e_ctu(registry)?;
    f_time_in_s_to_ulint(registry)
}

fn e_split(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_SPLIT")
        .event_input("EI", &[])
        .event_output("EO1", &[])
        .event_output("EO2", &[])
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("STATE", &[(None, Some("EO1")), (None, Some("EO2"))])
        .transition("START", "STATE", Some("EI"))
        .transition("STATE", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}

fn e_merge(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_MERGE")
        .event_input("EI1", &[])
        .event_input("EI2", &[])
        .event_output("EO", &[])
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("EO", &[(None, Some("EO"))])
        .transition("START", "EO", Some("EI1"))
        .transition("START", "EO", Some("EI2"))
        .transition("EO", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}

fn e_switch(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_SWITCH")
        .event_input("EI", &["G"])
        .event_output("EO0", &[])
        .event_output("EO1", &[])
        .data_input("G", Value::Bool(false))
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("G0", &[(None, Some("EO0"))])
        .state_with("G1", &[(None, Some("EO1"))])
        .guarded("START", "G0", Some("EI"), |ctx| !ctx.flag("G"))
        .guarded("START", "G1", Some("EI"), |ctx| ctx.flag("G"))
        .transition("G0", "START", None)
        .transition("G1", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}

fn e_permit(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_PERMIT")
        .event_input("EI", &["PERMIT"])
        .event_output("EO", &[])
        .data_input("PERMIT", Value::Bool(false))
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("EO", &[(None, Some("EO"))])
        .guarded("START", "EO", Some("EI"), |ctx| ctx.flag("PERMIT"))
        .transition("EO", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}

fn e_sr(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_SR")
        .event_input("S", &[])
        .event_input("R", &[])
        .event_output("EO", &["Q"])
        .data_output("Q", Value::Bool(false))
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("Q0")
        .state_with("SET", &[(Some("SET"), Some("EO"))])
        .state_with("RESET", &[(Some("RESET"), Some("EO"))])
        .algorithm("SET", |ctx| ctx.set_output("Q", &Value::Bool(true)))
        .algorithm("RESET", |ctx| ctx.set_output("Q", &Value::Bool(false)))
        .transition("Q0", "SET", Some("S"))
        .transition("SET", "RESET", Some("R"))
        .transition("RESET", "SET", Some("S"))
        .build()?;
    registry.register_basic(interface, ecc)
}

fn e_ctu(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("E_CTU")
        .event_input("CU", &["PV"])
        .event_input("R", &[])
        .event_output("CUO", &["Q", "CV"])
        .event_output("RO", &["Q", "CV"])
        .data_input("PV", Value::UInt(0))
        .data_output("Q", Value::Bool(false))
        .data_output("CV", Value::UInt(0))
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("CU", &[(Some("CU"), Some("CUO"))])
        .state_with("R", &[(Some("R"), Some("RO"))])
        .algorithm("CU", |ctx| {
            let cv = ctx.output("CV")?.as_i128().unwrap_or(0) + 1;
            let pv = ctx.input("PV")?.as_i128().unwrap_or(0);
            let next = u16::try_from(cv).map_err(|_| RuntimeError::ConversionError {
                from: ElementaryType::UInt,
                to: ElementaryType::UInt,
            })?;
            ctx.set_output("CV", &Value::UInt(next))?;
            ctx.set_output("Q", &Value::Bool(cv >= pv))
        })
        .algorithm("R", |ctx| {
            ctx.set_output("CV", &Value::UInt(0))?;
            ctx.set_output("Q", &Value::Bool(false))
        })
        .guarded("START", "CU", Some("CU"), |ctx| {
            ctx.output("CV")
                .ok()
                .and_then(Value::as_i128)
                .is_some_and(|cv| cv < i128::from(u16::MAX))
        })
        .transition("START", "R", Some("R"))
        .transition("CU", "START", None)
        .transition("R", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}

fn f_time_in_s_to_ulint(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let interface = FbInterface::builder("F_TIME_IN_S_TO_ULINT")
        .event_input("REQ", &["IN"])
        .event_output("CNF", &["OUT"])
        .data_input("IN", Value::Time(Duration::ZERO))
        .data_output("OUT", Value::ULInt(0))
        .build_shared()?;
    let ecc = Ecc::builder(&interface)
        .state("START")
        .state_with("REQ", &[(Some("REQ"), Some("CNF"))])
        .algorithm("REQ", |ctx| {
            let time = ctx.input("IN")?.as_duration().unwrap_or(Duration::ZERO);
            if time.is_negative() {
                return Err(RuntimeError::ConversionError {
                    from: ElementaryType::Time,
                    to: ElementaryType::ULInt,
                });
            }
            let secs = u64::try_from(time.as_secs()).unwrap_or(0);
            ctx.set_output("OUT", &Value::ULInt(secs))
        })
        .transition("START", "REQ", Some("REQ"))
        .transition("REQ", "START", None)
        .build()?;
    registry.register_basic(interface, ecc)
}
