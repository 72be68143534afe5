//! Loopback controller for development: outputs echo into inputs.

use std::sync::Arc;

use fbnet_types::ElementaryType;
use smol_str::SmolStr;

use super::{ControllerConfig, DeviceController, HandleDescriptor, IoDirection, IoHandle, IoMapper};
use crate::error::RuntimeError;

/// Copies output handle `i` into input handle `i` on every cycle.
///
/// Parameters: `inputs` and `outputs` (lists of handle ids) and `type`
/// (elementary type name, `BOOL` when absent).
#[derive(Debug)]
pub struct LoopbackController {
    input_ids: Vec<SmolStr>,
    output_ids: Vec<SmolStr>,
    ty: ElementaryType,
    inputs: Vec<Arc<IoHandle>>,
    outputs: Vec<Arc<IoHandle>>,
}

impl Default for LoopbackController {
    fn default() -> Self {
        Self {
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            ty: ElementaryType::Bool,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl DeviceController for LoopbackController {
    fn kind(&self) -> &str {
        "loopback"
    }

    fn set_config(&mut self, config: &ControllerConfig) -> Result<(), RuntimeError> {
        self.input_ids = config.param_list("inputs")?;
        self.output_ids = config.param_list("outputs")?;
        if let Some(name) = config.param_str("type")? {
            self.ty = ElementaryType::from_name(name)
                .filter(|ty| ty.is_scalar())
                .ok_or_else(|| {
                    RuntimeError::InvalidConfig(format!("loopback: invalid type '{name}'").into())
                })?;
        }
        Ok(())
    }

    fn init(&mut self, mapper: &IoMapper) -> Result<(), RuntimeError> {
        let ty = self.ty;
        for id in self.input_ids.clone() {
            let handle = self.init_handle(mapper, HandleDescriptor::new(id, IoDirection::Input, ty))?;
            self.inputs.push(handle);
        }
        for id in self.output_ids.clone() {
            let handle = self.init_handle(mapper, HandleDescriptor::new(id, IoDirection::Output, ty))?;
            self.outputs.push(handle);
        }
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), RuntimeError> {
        for (output, input) in self.outputs.iter().zip(&self.inputs) {
            let value = output.read();
            if input.read() != value {
                input.on_change(&value)?;
            }
        }
        Ok(())
    }

    fn de_init(&mut self, mapper: &IoMapper) {
        for handle in self.inputs.drain(..).chain(self.outputs.drain(..)) {
            let _ = mapper.deregister_handle(handle.id());
        }
    }
}
