// Licensed under the Apache-2.0 license

//! nRF52 TWI driver module.
//!
//! This module provides an interrupt-driven TWI (I2C) master driver for the
//! nRF52832, designed for bare-metal and `no_std` environments. The driver
//! core only talks to a [`TwiRegisters`] implementation, so it runs against
//! the PAC on target and against a simulated peripheral in host tests.

pub mod common;
pub mod hardware_instantiation;
pub mod hardware_interface;
pub mod i2c_controller;
pub mod nrf52_twi;
pub mod signal;
pub mod system_setup;
pub mod traits;

#[cfg(test)]
pub(crate) mod sim;

pub use common::{
    AddressOrder, Correction, Direction, Dma, ErrorSource, Frequency, InitOutcome, Interrupts,
    Mode, Shorts, TwiConfig, TwiConfigBuilder,
};
pub use hardware_instantiation::{CycleDelay, TwiDriver, TwiId, TwiIrqHandler, TwiPeripheral};
pub use hardware_interface::TwiRegisters;
pub use i2c_controller::I2cController;
pub use nrf52_twi::{Error, InterruptHandler, Twi};
pub use signal::{TransferSignal, TransferState};
pub use system_setup::{InterruptLine, NvicLine};
pub use traits::{I2cHardwareCore, I2cMaster, I2cMemory};
