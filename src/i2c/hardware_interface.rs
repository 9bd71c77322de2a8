// Licensed under the Apache-2.0 license

//! Register-level interface of the TWI peripheral.
//!
//! The driver never touches memory-mapped registers directly. Everything goes
//! through [`TwiRegisters`], which the nRF52 bindings implement on top of the
//! PAC register block and the tests implement with a simulated peripheral.
//!
//! All methods take `&self`: the register block is shared between the driver
//! and the interrupt handler, exactly like the hardware it describes.

use crate::i2c::common::{ErrorSource, Frequency, Interrupts, Shorts};

/// Write-1-to-trigger task registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    StartRx,
    StartTx,
    Stop,
    Suspend,
    Resume,
}

/// Event registers, cleared by writing zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Stopped,
    RxdReady,
    TxdSent,
    Error,
    ByteBoundary,
    Suspended,
}

pub trait TwiRegisters {
    /// `ENABLE != 0`.
    fn is_enabled(&self) -> bool;

    /// Write `ENABLE` (5 to enable TWI, 0 to disable).
    fn write_enable(&self, value: u32);

    fn write_address(&self, address: u8);

    fn read_address(&self) -> u8;

    fn write_frequency(&self, frequency: Frequency);

    /// Program `PSELSCL` and `PSELSDA`.
    fn write_pins(&self, scl: u8, sda: u8);

    /// Write `INTENSET`.
    fn enable_interrupts(&self, mask: Interrupts);

    fn write_shorts(&self, shorts: Shorts);

    fn trigger(&self, task: Task);

    fn event_pending(&self, event: Event) -> bool;

    fn clear_event(&self, event: Event);

    fn write_txd(&self, byte: u8);

    fn read_rxd(&self) -> u8;

    /// Read `ERRORSRC` and clear the reported bits.
    fn take_error_source(&self) -> ErrorSource;
}

impl<T: TwiRegisters + ?Sized> TwiRegisters for &T {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn write_enable(&self, value: u32) {
        (**self).write_enable(value);
    }

    fn write_address(&self, address: u8) {
        (**self).write_address(address);
    }

    fn read_address(&self) -> u8 {
        (**self).read_address()
    }

    fn write_frequency(&self, frequency: Frequency) {
        (**self).write_frequency(frequency);
    }

    fn write_pins(&self, scl: u8, sda: u8) {
        (**self).write_pins(scl, sda);
    }

    fn enable_interrupts(&self, mask: Interrupts) {
        (**self).enable_interrupts(mask);
    }

    fn write_shorts(&self, shorts: Shorts) {
        (**self).write_shorts(shorts);
    }

    fn trigger(&self, task: Task) {
        (**self).trigger(task);
    }

    fn event_pending(&self, event: Event) -> bool {
        (**self).event_pending(event)
    }

    fn clear_event(&self, event: Event) {
        (**self).clear_event(event);
    }

    fn write_txd(&self, byte: u8) {
        (**self).write_txd(byte);
    }

    fn read_rxd(&self) -> u8 {
        (**self).read_rxd()
    }

    fn take_error_source(&self) -> ErrorSource {
        (**self).take_error_source()
    }
}
