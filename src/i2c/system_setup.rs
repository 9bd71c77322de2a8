// Licensed under the Apache-2.0 license

//! TWI System Setup Helper
//!
//! This module keeps the interrupt controller out of the driver. The driver
//! only sees an [`InterruptLine`]; on target that is the NVIC entry of the
//! TWI instance, in tests it is a recording mock.

use nrf52832_pac::Interrupt;

/// One interrupt line of the interrupt controller.
pub trait InterruptLine {
    /// Let the line reach the CPU.
    fn unmask(&mut self);

    /// Stop the line from reaching the CPU.
    fn mask(&mut self);

    /// Drop a request that is already pending.
    fn unpend(&mut self);
}

/// NVIC entry of a TWI instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NvicLine {
    irq: Interrupt,
}

impl NvicLine {
    #[must_use]
    pub const fn new(irq: Interrupt) -> Self {
        Self { irq }
    }

    #[must_use]
    pub const fn irq(&self) -> Interrupt {
        self.irq
    }
}

impl InterruptLine for NvicLine {
    fn unmask(&mut self) {
        // SAFETY: the TWI handler only touches the driver's own signal and
        // registers, so unmasking cannot break a mask-based critical section.
        unsafe { cortex_m::peripheral::NVIC::unmask(self.irq) };
    }

    fn mask(&mut self) {
        cortex_m::peripheral::NVIC::mask(self.irq);
    }

    fn unpend(&mut self) {
        cortex_m::peripheral::NVIC::unpend(self.irq);
    }
}

/// Helper for interrupt-line handling around driver bring-up
pub struct TwiSystemSetup;

impl TwiSystemSetup {
    /// Discard stale requests, then unmask.
    pub fn arm_interrupt<I: InterruptLine>(line: &mut I) {
        line.unpend();
        line.unmask();
    }

    /// Mask the line and discard whatever is still pending.
    pub fn disarm_interrupt<I: InterruptLine>(line: &mut I) {
        line.mask();
        line.unpend();
    }
}
