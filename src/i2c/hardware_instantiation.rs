// Licensed under the Apache-2.0 license

//! # TWI Hardware Instantiation for nRF52832
//!
//! Binds the driver to the two TWI instances of the nRF52832.
//!
//! ## One Type For Every Instance
//!
//! The PAC exposes `TWI0` and `TWI1` as distinct singleton types. Using them
//! as the driver's register parameter would make `Twi<TWI0, ..>` and
//! `Twi<TWI1, ..>` different types that cannot share an array or a static.
//! [`TwiPeripheral`] instead carries the instance as a value and resolves the
//! register block on every access, so both drivers have the same type:
//!
//! ```rust,ignore
//! use nrf52_ddk::i2c::hardware_instantiation::{TwiDriver, TwiId};
//!
//! let (twi0, irq0) = Twi::with_instance(Some(TwiId::Twi0), config, delay0, NoOpLogger).unwrap();
//! let (twi1, irq1) = Twi::with_instance(Some(TwiId::Twi1), config, delay1, NoOpLogger).unwrap();
//! let buses: [TwiDriver<CycleDelay>; 2] = [twi0, twi1];
//! ```
//!
//! ## Instance Ownership
//!
//! Each instance has one static [`TransferSignal`]. Binding an instance
//! splits its signal, so a second binding of the same instance fails. The
//! handle is `Send`; the interrupt half is meant to live in a
//! `critical_section::Mutex` next to the vector that drives it.

use embedded_hal::delay::DelayNs;
use fugit::HertzU32;
use nrf52832_pac::{twi0::RegisterBlock, Interrupt, TWI0, TWI1};

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{Correction, ErrorSource, Frequency, Interrupts, Shorts, TwiConfig};
use crate::i2c::hardware_interface::{Event, Task, TwiRegisters};
use crate::i2c::nrf52_twi::{InterruptHandler, Twi};
use crate::i2c::signal::TransferSignal;
use crate::i2c::system_setup::NvicLine;

pub static TWI0_SIGNAL: TransferSignal = TransferSignal::new();
pub static TWI1_SIGNAL: TransferSignal = TransferSignal::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiId {
    Twi0,
    Twi1,
}

impl TwiId {
    /// Pick the instance to bind. An absent selector falls back to TWI0 and
    /// reports the substitution.
    #[must_use]
    pub const fn resolve(id: Option<TwiId>) -> (TwiId, Option<Correction>) {
        match id {
            Some(id) => (id, None),
            None => (TwiId::Twi0, Some(Correction::DefaultInstance)),
        }
    }

    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            TwiId::Twi0 => Interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0,
            TwiId::Twi1 => Interrupt::SPIM1_SPIS1_TWIM1_TWIS1_SPI1_TWI1,
        }
    }

    #[must_use]
    pub const fn line(self) -> NvicLine {
        NvicLine::new(self.interrupt())
    }

    #[must_use]
    pub fn signal(self) -> &'static TransferSignal {
        match self {
            TwiId::Twi0 => &TWI0_SIGNAL,
            TwiId::Twi1 => &TWI1_SIGNAL,
        }
    }
}

/// Register access for one TWI instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwiPeripheral {
    id: TwiId,
}

impl TwiPeripheral {
    #[must_use]
    pub const fn new(id: TwiId) -> Self {
        Self { id }
    }

    fn block(&self) -> &'static RegisterBlock {
        let ptr = match self.id {
            TwiId::Twi0 => TWI0::ptr(),
            TwiId::Twi1 => TWI1::ptr(),
        };
        // SAFETY: fixed MMIO address of the instance, mapped for the whole
        // program. Register access goes through volatile cells.
        unsafe { &*ptr }
    }
}

impl TwiRegisters for TwiPeripheral {
    fn is_enabled(&self) -> bool {
        self.block().enable.read().bits() != 0
    }

    fn write_enable(&self, value: u32) {
        self.block().enable.write(|w| unsafe { w.bits(value) });
    }

    fn write_address(&self, address: u8) {
        self.block()
            .address
            .write(|w| unsafe { w.bits(u32::from(address)) });
    }

    fn read_address(&self) -> u8 {
        (self.block().address.read().bits() & 0xff) as u8
    }

    fn write_frequency(&self, frequency: Frequency) {
        self.block()
            .frequency
            .write(|w| unsafe { w.bits(frequency.register_value()) });
    }

    fn write_pins(&self, scl: u8, sda: u8) {
        let regs = self.block();
        regs.pselscl.write(|w| unsafe { w.bits(u32::from(scl)) });
        regs.pselsda.write(|w| unsafe { w.bits(u32::from(sda)) });
    }

    fn enable_interrupts(&self, mask: Interrupts) {
        self.block()
            .intenset
            .write(|w| unsafe { w.bits(mask.bits()) });
    }

    fn write_shorts(&self, shorts: Shorts) {
        self.block()
            .shorts
            .write(|w| unsafe { w.bits(shorts.bits()) });
    }

    fn trigger(&self, task: Task) {
        let regs = self.block();
        match task {
            Task::StartRx => regs.tasks_startrx.write(|w| unsafe { w.bits(1) }),
            Task::StartTx => regs.tasks_starttx.write(|w| unsafe { w.bits(1) }),
            Task::Stop => regs.tasks_stop.write(|w| unsafe { w.bits(1) }),
            Task::Suspend => regs.tasks_suspend.write(|w| unsafe { w.bits(1) }),
            Task::Resume => regs.tasks_resume.write(|w| unsafe { w.bits(1) }),
        }
    }

    fn event_pending(&self, event: Event) -> bool {
        let regs = self.block();
        let bits = match event {
            Event::Stopped => regs.events_stopped.read().bits(),
            Event::RxdReady => regs.events_rxdready.read().bits(),
            Event::TxdSent => regs.events_txdsent.read().bits(),
            Event::Error => regs.events_error.read().bits(),
            Event::ByteBoundary => regs.events_bb.read().bits(),
            Event::Suspended => regs.events_suspended.read().bits(),
        };
        bits != 0
    }

    fn clear_event(&self, event: Event) {
        let regs = self.block();
        match event {
            Event::Stopped => regs.events_stopped.write(|w| unsafe { w.bits(0) }),
            Event::RxdReady => regs.events_rxdready.write(|w| unsafe { w.bits(0) }),
            Event::TxdSent => regs.events_txdsent.write(|w| unsafe { w.bits(0) }),
            Event::Error => regs.events_error.write(|w| unsafe { w.bits(0) }),
            Event::ByteBoundary => regs.events_bb.write(|w| unsafe { w.bits(0) }),
            Event::Suspended => regs.events_suspended.write(|w| unsafe { w.bits(0) }),
        }
    }

    fn write_txd(&self, byte: u8) {
        self.block()
            .txd
            .write(|w| unsafe { w.bits(u32::from(byte)) });
    }

    fn read_rxd(&self) -> u8 {
        (self.block().rxd.read().bits() & 0xff) as u8
    }

    fn take_error_source(&self) -> ErrorSource {
        let regs = self.block();
        let bits = regs.errorsrc.read().bits();
        // Write-one-to-clear.
        regs.errorsrc.write(|w| unsafe { w.bits(bits) });
        ErrorSource::from_bits(bits)
    }
}

pub type TwiDriver<D, L = NoOpLogger> = Twi<'static, TwiPeripheral, D, L>;
pub type TwiIrqHandler<L = NoOpLogger> = InterruptHandler<'static, TwiPeripheral, L>;

impl<D: DelayNs, L: Logger + Clone> Twi<'static, TwiPeripheral, D, L> {
    /// Bind a driver and its interrupt half to a hardware instance.
    ///
    /// `None` selects TWI0; the substitution is reported by the next `init`.
    /// Returns `None` when the instance is already bound.
    pub fn with_instance(
        id: Option<TwiId>,
        config: TwiConfig,
        delay: D,
        mut logger: L,
    ) -> Option<(Self, TwiIrqHandler<L>)> {
        let (id, correction) = TwiId::resolve(id);
        let (producer, consumer) = id.signal().split()?;
        if correction.is_some() {
            logger.warn("TWI: no instance selected, using TWI0");
        }
        let regs = TwiPeripheral::new(id);
        let handler = InterruptHandler::new(regs, producer, logger.clone());
        let mut twi = Twi::new(regs, consumer, config, delay, logger);
        if let Some(correction) = correction {
            twi.note_correction(correction);
        }
        Some((twi, handler))
    }
}

/// Busy-wait delay based on the core clock.
pub struct CycleDelay {
    cycles_per_us: u32,
}

impl CycleDelay {
    #[must_use]
    pub fn new(sysclk: HertzU32) -> Self {
        Self {
            cycles_per_us: sysclk.to_MHz().max(1),
        }
    }

    fn cycles(&self, ns: u32) -> u32 {
        let cycles = u64::from(ns) * u64::from(self.cycles_per_us) / 1000;
        u32::try_from(cycles).unwrap_or(u32::MAX).max(1)
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        cortex_m::asm::delay(self.cycles(ns));
    }
}
