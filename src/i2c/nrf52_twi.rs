// Licensed under the Apache-2.0 license

//! nRF52 TWI master driver.
//!
//! The driver is split in two values that share the register block and a
//! [`TransferSignal`](crate::i2c::signal::TransferSignal):
//!
//! - [`Twi`] runs in the caller's context. It issues tasks, feeds `TXD`,
//!   drains `RXD` and blocks until the interrupt handler reports progress.
//! - [`InterruptHandler`] runs in the TWI interrupt. It acknowledges events
//!   and publishes the resulting state transitions.
//!
//! Every wait is bounded by [`TwiConfig::timeout`]. A bus error event wakes
//! the waiter with [`Error::Bus`], and any failed transaction releases the
//! bus with a stop condition before returning.
//!
//! # Peripheral quirk
//!
//! Starting a transfer is always followed by an immediate `SUSPEND`, a wait
//! for the `SUSPENDED` event and a `RESUME`. This lets the address byte go
//! out before the byte-boundary shortcuts can stop or pause the bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};

use crate::common::{log_fmt, Level, Logger, NoOpLogger};
use crate::i2c::common::{
    Correction, Corrections, Direction, Dma, ErrorSource, InitOutcome, Mode, Shorts, TwiConfig,
    ADDRESS_READ_BIT, ENABLE_TWI,
};
use crate::i2c::hardware_interface::{Event, Task, TwiRegisters};
use crate::i2c::signal::{Consumer, Poll, Producer, TransferState};
use crate::i2c::system_setup::{InterruptLine, TwiSystemSetup};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster, I2cMemory};

/// Granularity of the bounded waits.
const POLL_INTERVAL_US: u32 = 1;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// EasyDMA was requested; this driver only runs without it.
    DmaUnsupported,
    /// The instance is already enabled by another owner.
    ResourceConflict,
    /// The expected bus event did not arrive in time.
    Timeout,
    /// The peripheral raised its error event.
    Bus(ErrorSource),
    /// A receive was requested into an empty buffer.
    ZeroLength,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::Bus(source) if source.is_address_nack() => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Error::Bus(source) if source.is_data_nack() => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            Error::Bus(source) if source.is_overrun() => ErrorKind::Overrun,
            Error::Bus(_) => ErrorKind::Bus,
            Error::DmaUnsupported
            | Error::ResourceConflict
            | Error::Timeout
            | Error::ZeroLength => ErrorKind::Other,
        }
    }
}

/// Blocking TWI master handle, one per peripheral instance.
pub struct Twi<'a, R: TwiRegisters, D: DelayNs, L: Logger = NoOpLogger> {
    regs: R,
    signal: Consumer<'a>,
    config: TwiConfig,
    delay: D,
    logger: L,
    corrections: Corrections,
    bus_open: bool,
}

impl<'a, R: TwiRegisters, D: DelayNs, L: Logger> Twi<'a, R, D, L> {
    pub fn new(regs: R, signal: Consumer<'a>, config: TwiConfig, delay: D, logger: L) -> Self {
        Self {
            regs,
            signal,
            config,
            delay,
            logger,
            corrections: Corrections::new(),
            bus_open: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TwiConfig {
        &self.config
    }

    /// Replace the configuration. Frequency, pins and interrupts are
    /// programmed by the next `init`; timeout and sub-address order apply to
    /// the next transfer.
    pub fn set_config(&mut self, config: TwiConfig) {
        self.config = config;
    }

    /// Bus errors reported by the interrupt handler so far.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.signal.error_count()
    }

    /// Substitutions recorded so far, reported and cleared by the next `init`.
    #[must_use]
    pub fn pending_corrections(&self) -> &[Correction] {
        &self.corrections
    }

    pub(crate) fn note_correction(&mut self, correction: Correction) {
        if !self.corrections.contains(&correction) {
            // Capacity covers every Correction variant.
            let _ = self.corrections.push(correction);
        }
    }

    /// Validate the configuration and program the peripheral.
    ///
    /// On success the state is `Disabled`; call [`Twi::enable`] next.
    ///
    /// # Errors
    ///
    /// [`Error::DmaUnsupported`] or [`Error::ResourceConflict`]. Neither
    /// touches the registers or the transfer state.
    pub fn init(&mut self) -> Result<InitOutcome, Error> {
        if self.config.dma == Dma::On {
            self.logger.error("TWI init: EasyDMA is not available in this driver");
            return Err(Error::DmaUnsupported);
        }
        if self.config.mode == Mode::Slave {
            self.logger.warn("TWI init: slave mode requires EasyDMA, switched to master");
            self.config.mode = Mode::Master;
            self.note_correction(Correction::SlaveDowngraded);
        }
        if self.regs.is_enabled() {
            self.logger.error("TWI init: resource conflict, instance already enabled");
            return Err(Error::ResourceConflict);
        }

        self.regs.write_frequency(self.config.frequency);
        self.regs.write_pins(self.config.scl_pin, self.config.sda_pin);
        self.regs.enable_interrupts(self.config.interrupts);
        self.signal.set(TransferState::Disabled);

        let corrections = core::mem::take(&mut self.corrections);
        if corrections.is_empty() {
            Ok(InitOutcome::Ready)
        } else {
            Ok(InitOutcome::Corrected(corrections))
        }
    }

    /// Load the default configuration (master, 400 kHz, SCL 13, SDA 12,
    /// every interrupt), initialise, and unmask the interrupt line.
    ///
    /// # Errors
    ///
    /// Whatever [`Twi::init`] reports; the line stays masked in that case.
    ///
    /// The completion callback lives on [`InterruptHandler`] and is left as is.
    pub fn init_default<I: InterruptLine>(&mut self, line: &mut I) -> Result<InitOutcome, Error> {
        self.disable();
        self.config = TwiConfig::default();
        let outcome = self.init()?;
        TwiSystemSetup::arm_interrupt(line);
        Ok(outcome)
    }

    /// Switch the peripheral on. Only acts on an initialised, disabled handle.
    pub fn enable(&mut self) {
        if !self.regs.is_enabled() && self.signal.state() == TransferState::Disabled {
            self.regs.write_enable(ENABLE_TWI);
            self.signal.set(TransferState::Stopped);
        }
    }

    /// Switch the peripheral off. Only acts while the bus is stopped or suspended.
    pub fn disable(&mut self) {
        let idle = matches!(
            self.signal.state(),
            TransferState::Stopped | TransferState::Suspended
        );
        if self.regs.is_enabled() && idle {
            self.regs.write_enable(0);
            self.signal.set(TransferState::Disabled);
        }
    }

    /// Switch the peripheral off whatever the bus is doing.
    pub fn deinit(&mut self) {
        self.bus_open = false;
        self.regs.write_enable(0);
        self.signal.set(TransferState::Disabled);
    }

    #[must_use]
    pub fn state(&self) -> TransferState {
        self.signal.state()
    }

    /// Address the slave and get the peripheral ready to move `len` bytes.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroLength`] for an empty receive, otherwise whatever the
    /// suspend handshake reports.
    pub fn start_transfer(
        &mut self,
        address: SevenBitAddress,
        len: usize,
        direction: Direction,
    ) -> Result<(), Error> {
        if direction == Direction::Rx && len == 0 {
            return Err(Error::ZeroLength);
        }
        self.signal.begin();
        self.bus_open = true;
        self.regs.write_address(address);
        match direction {
            Direction::Tx => {
                self.regs.write_shorts(Shorts::NONE);
                self.regs.trigger(Task::StartTx);
                self.regs.trigger(Task::Suspend);
                self.wait_for(TransferState::Suspended)?;
                self.regs.trigger(Task::Resume);
            }
            Direction::Rx => {
                self.regs.write_address(self.regs.read_address() | ADDRESS_READ_BIT);
                self.regs.write_shorts(Shorts::for_receive(len));
                self.regs.trigger(Task::Suspend);
                self.wait_for(TransferState::Suspended)?;
                self.regs.trigger(Task::Resume);
                self.regs.trigger(Task::StartRx);
            }
        }
        Ok(())
    }

    /// Clear the shortcuts, issue a stop condition and wait for it.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] or [`Error::Bus`].
    pub fn stop_transfer(&mut self) -> Result<(), Error> {
        self.regs.write_shorts(Shorts::NONE);
        self.regs.trigger(Task::Stop);
        self.bus_open = false;
        self.wait_for(TransferState::Stopped)?;
        self.signal.settle(TransferState::Stopped);
        Ok(())
    }

    /// Send `bytes` one at a time, waiting for `TXDSENT` after each.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] or [`Error::Bus`].
    pub fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            self.signal.request(TransferState::Tx);
            self.regs.write_txd(byte);
            self.wait_for(TransferState::TxSent)?;
        }
        Ok(())
    }

    /// Fill `buffer` one byte at a time, waiting for `RXDREADY` before each read.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] or [`Error::Bus`].
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        for slot in buffer.iter_mut() {
            self.signal.request(TransferState::Rx);
            self.wait_for(TransferState::RxReady)?;
            *slot = self.regs.read_rxd();
        }
        Ok(())
    }

    /// Start a write and send `bytes`. The bus is left open for a follow-up
    /// stage (restart or [`Twi::stop_transfer`]).
    ///
    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.guarded(|twi| twi.write_open(address, bytes))
    }

    /// Start a read and fill `buffer`. The bus is left open.
    ///
    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn read(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.guarded(|twi| twi.read_open(address, buffer))
    }

    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn write_memory_byte(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        value: u8,
    ) -> Result<(), Error> {
        self.write_memory(address, register, &[value])
    }

    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn read_memory_byte(
        &mut self,
        address: SevenBitAddress,
        register: u8,
    ) -> Result<u8, Error> {
        let mut value = [0u8; 1];
        self.read_memory(address, register, &mut value)?;
        let [byte] = value;
        Ok(byte)
    }

    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn write_memory(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.guarded(|twi| {
            twi.write_open(address, &[register])?;
            twi.transmit(bytes)?;
            twi.stop_transfer()
        })
    }

    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn read_memory(
        &mut self,
        address: SevenBitAddress,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.guarded(|twi| {
            twi.write_open(address, &[register])?;
            twi.read_open(address, buffer)?;
            twi.stop_transfer()
        })
    }

    /// Like [`Twi::write_memory`] with a two-byte sub-address laid out per
    /// [`TwiConfig::address_order`] (native order by default).
    ///
    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn write_memory16(
        &mut self,
        address: SevenBitAddress,
        register: u16,
        bytes: &[u8],
    ) -> Result<(), Error> {
        let sub_address = self.config.address_order.encode(register);
        self.guarded(|twi| {
            twi.write_open(address, &sub_address)?;
            twi.transmit(bytes)?;
            twi.stop_transfer()
        })
    }

    /// Like [`Twi::read_memory`] with a two-byte sub-address.
    ///
    /// # Errors
    ///
    /// Any transfer error; the bus is stopped before returning it.
    pub fn read_memory16(
        &mut self,
        address: SevenBitAddress,
        register: u16,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        let sub_address = self.config.address_order.encode(register);
        self.guarded(|twi| {
            twi.write_open(address, &sub_address)?;
            twi.read_open(address, buffer)?;
            twi.stop_transfer()
        })
    }

    fn write_open(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.start_transfer(address, bytes.len(), Direction::Tx)?;
        self.transmit(bytes)
    }

    fn read_open(&mut self, address: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.start_transfer(address, buffer.len(), Direction::Rx)?;
        self.receive(buffer)
    }

    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let result = op(self);
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn abort(&mut self) {
        if self.bus_open && self.stop_transfer().is_err() {
            self.logger.warn("TWI: bus did not confirm stop after a failed transfer");
        }
    }

    fn wait_for(&mut self, target: TransferState) -> Result<(), Error> {
        let budget_us = self.config.timeout.ticks().saturating_mul(1000);
        let mut waited_us: u32 = 0;
        loop {
            match self.signal.poll(target) {
                Poll::Reached => return Ok(()),
                Poll::Failed(source) => return Err(Error::Bus(source)),
                Poll::Pending if waited_us >= budget_us => {
                    let state = self.signal.state();
                    log_fmt(
                        &mut self.logger,
                        Level::Warn,
                        format_args!("TWI timeout waiting for {target:?}, state {state:?}"),
                    );
                    return Err(Error::Timeout);
                }
                Poll::Pending => {
                    self.delay.delay_us(POLL_INTERVAL_US);
                    waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
                }
            }
        }
    }
}

fn direction_of(op: &Operation<'_>) -> Direction {
    match op {
        Operation::Read(_) => Direction::Rx,
        Operation::Write(_) => Direction::Tx,
    }
}

fn operation_len(op: &Operation<'_>) -> usize {
    match op {
        Operation::Read(buffer) => buffer.len(),
        Operation::Write(bytes) => bytes.len(),
    }
}

impl<R: TwiRegisters, D: DelayNs, L: Logger> I2cHardwareCore for Twi<'_, R, D, L> {
    type Error = Error;

    fn init(&mut self) -> Result<InitOutcome, Error> {
        Twi::init(self)
    }

    fn enable(&mut self) {
        Twi::enable(self);
    }

    fn disable(&mut self) {
        Twi::disable(self);
    }

    fn state(&self) -> TransferState {
        Twi::state(self)
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        self.stop_transfer()
    }
}

impl<R: TwiRegisters, D: DelayNs, L: Logger> I2cMaster for Twi<'_, R, D, L> {
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.guarded(|twi| {
            twi.write_open(addr, bytes)?;
            twi.stop_transfer()
        })
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.guarded(|twi| {
            twi.read_open(addr, buffer)?;
            twi.stop_transfer()
        })
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.guarded(|twi| {
            twi.write_open(addr, bytes)?;
            twi.read_open(addr, buffer)?;
            twi.stop_transfer()
        })
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        if ops_slice.is_empty() {
            return Ok(());
        }
        self.guarded(|twi| {
            for group in ops_slice.chunk_by_mut(|a, b| direction_of(a) == direction_of(b)) {
                let Some(direction) = group.first().map(direction_of) else {
                    continue;
                };
                let total = group.iter().map(operation_len).sum();
                twi.start_transfer(addr, total, direction)?;
                for op in group.iter_mut() {
                    match op {
                        Operation::Write(bytes) => twi.transmit(bytes)?,
                        Operation::Read(buffer) => twi.receive(buffer)?,
                    }
                }
            }
            twi.stop_transfer()
        })
    }
}

impl<R: TwiRegisters, D: DelayNs, L: Logger> I2cMemory for Twi<'_, R, D, L> {
    fn write_memory_byte(&mut self, addr: u8, register: u8, value: u8) -> Result<(), Error> {
        Twi::write_memory_byte(self, addr, register, value)
    }

    fn read_memory_byte(&mut self, addr: u8, register: u8) -> Result<u8, Error> {
        Twi::read_memory_byte(self, addr, register)
    }

    fn write_memory(&mut self, addr: u8, register: u8, bytes: &[u8]) -> Result<(), Error> {
        Twi::write_memory(self, addr, register, bytes)
    }

    fn read_memory(&mut self, addr: u8, register: u8, buffer: &mut [u8]) -> Result<(), Error> {
        Twi::read_memory(self, addr, register, buffer)
    }

    fn write_memory16(&mut self, addr: u8, register: u16, bytes: &[u8]) -> Result<(), Error> {
        Twi::write_memory16(self, addr, register, bytes)
    }

    fn read_memory16(
        &mut self,
        addr: u8,
        register: u16,
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        Twi::read_memory16(self, addr, register, buffer)
    }
}

/// Interrupt-side half of the driver.
///
/// Call [`InterruptHandler::on_interrupt`] from the TWI interrupt vector.
pub struct InterruptHandler<'a, R: TwiRegisters, L: Logger = NoOpLogger> {
    regs: R,
    signal: Producer<'a>,
    logger: L,
    callback: Option<fn()>,
}

impl<'a, R: TwiRegisters, L: Logger> InterruptHandler<'a, R, L> {
    pub fn new(regs: R, signal: Producer<'a>, logger: L) -> Self {
        Self {
            regs,
            signal,
            logger,
            callback: None,
        }
    }

    /// Run `callback` at the end of every dispatch, whatever event fired.
    pub fn set_callback(&mut self, callback: Option<fn()>) {
        self.callback = callback;
    }

    #[must_use]
    pub fn state(&self) -> TransferState {
        self.signal.state()
    }

    /// Acknowledge every pending event and publish the resulting state.
    pub fn on_interrupt(&mut self) {
        if self.regs.event_pending(Event::Error) {
            let source = self.regs.take_error_source();
            self.regs.clear_event(Event::Error);
            log_fmt(
                &mut self.logger,
                Level::Error,
                format_args!("TWI bus error: errorsrc=0x{:02x}", source.bits()),
            );
            self.signal.publish_error(source);
        }
        if self.regs.event_pending(Event::Stopped) {
            self.regs.clear_event(Event::Stopped);
            self.signal.publish(TransferState::Stopped);
        }
        if self.regs.event_pending(Event::RxdReady) {
            self.regs.clear_event(Event::RxdReady);
            self.signal.publish(TransferState::RxReady);
            self.regs.trigger(Task::Resume);
        }
        if self.regs.event_pending(Event::TxdSent) {
            self.regs.clear_event(Event::TxdSent);
            self.signal.publish(TransferState::TxSent);
        }
        if self.regs.event_pending(Event::ByteBoundary) {
            self.regs.clear_event(Event::ByteBoundary);
        }
        if self.regs.event_pending(Event::Suspended) {
            self.regs.clear_event(Event::Suspended);
            self.signal.publish(TransferState::Suspended);
        }
        if let Some(callback) = self.callback {
            callback();
        }
    }
}
