// Licensed under the Apache-2.0 license

//! Host-side model of the TWI peripheral and an EEPROM-like slave.
//!
//! [`SimTwi`] implements [`TwiRegisters`] and raises events the way the
//! peripheral does, honouring the byte-boundary shortcuts. [`SimIrq`] stands
//! in for the delay provider and the NVIC: every time the driver sleeps it
//! dispatches the interrupt handler if an enabled event is pending.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::common::{Level, Logger};
use crate::i2c::common::{ErrorSource, Frequency, Interrupts, Shorts, TwiConfig};
use crate::i2c::hardware_interface::{Event, Task, TwiRegisters};
use crate::i2c::nrf52_twi::{InterruptHandler, Twi};
use crate::i2c::signal::{TransferSignal, TransferState};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Trace {
    Task(Task),
    Txd(u8),
    Rxd(u8),
    Irq(TransferState),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Tx,
    Rx,
}

/// Slave with an auto-incrementing sub-address pointer, sent most
/// significant byte first.
pub(crate) struct SimSlave {
    address: u8,
    pointer_width: usize,
    pointer: usize,
    pointer_bytes: usize,
    memory: Vec<u8>,
}

impl SimSlave {
    pub(crate) fn eeprom(address: u8, pointer_width: usize) -> Self {
        Self {
            address,
            pointer_width,
            pointer: 0,
            pointer_bytes: 0,
            memory: vec![0; 1 << (8 * pointer_width)],
        }
    }

    fn start_write(&mut self) {
        self.pointer_bytes = 0;
    }

    fn write(&mut self, byte: u8) {
        if self.pointer_bytes < self.pointer_width {
            self.pointer = if self.pointer_bytes == 0 {
                usize::from(byte)
            } else {
                (self.pointer << 8) | usize::from(byte)
            };
            self.pointer_bytes += 1;
            return;
        }
        let slot = self.pointer % self.memory.len();
        self.memory[slot] = byte;
        self.pointer = self.pointer.wrapping_add(1);
    }

    fn read(&mut self) -> u8 {
        let byte = self.memory[self.pointer % self.memory.len()];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

fn event_bit(event: Event) -> u8 {
    match event {
        Event::Stopped => 1 << 0,
        Event::RxdReady => 1 << 1,
        Event::TxdSent => 1 << 2,
        Event::Error => 1 << 3,
        Event::ByteBoundary => 1 << 4,
        Event::Suspended => 1 << 5,
    }
}

fn interrupt_for(event: Event) -> Interrupts {
    match event {
        Event::Stopped => Interrupts::STOPPED,
        Event::RxdReady => Interrupts::RXDREADY,
        Event::TxdSent => Interrupts::TXDSENT,
        Event::Error => Interrupts::ERROR,
        Event::ByteBoundary => Interrupts::BB,
        Event::Suspended => Interrupts::SUSPENDED,
    }
}

const EVENTS: [Event; 6] = [
    Event::Stopped,
    Event::RxdReady,
    Event::TxdSent,
    Event::Error,
    Event::ByteBoundary,
    Event::Suspended,
];

pub(crate) struct SimTwi {
    enable: Cell<u32>,
    address: Cell<u8>,
    frequency: Cell<u32>,
    pins: Cell<(u8, u8)>,
    inten: Cell<u32>,
    shorts: Cell<Shorts>,
    events: Cell<u8>,
    errorsrc: Cell<u32>,
    rxd: Cell<u8>,
    rxd_unread: Cell<bool>,
    resume_pending: Cell<bool>,
    suspended: Cell<bool>,
    held_txd: Cell<Option<u8>>,
    phase: Cell<Phase>,
    nacked: Cell<bool>,
    stall_tx: Cell<bool>,
    writes: Cell<usize>,
    trace: RefCell<Vec<Trace>>,
    rx_starts: RefCell<Vec<(u8, Shorts)>>,
    slave: RefCell<SimSlave>,
}

impl SimTwi {
    pub(crate) fn new(slave: SimSlave) -> Self {
        Self {
            enable: Cell::new(0),
            address: Cell::new(0),
            frequency: Cell::new(0),
            pins: Cell::new((0xff, 0xff)),
            inten: Cell::new(0),
            shorts: Cell::new(Shorts::NONE),
            events: Cell::new(0),
            errorsrc: Cell::new(0),
            rxd: Cell::new(0),
            rxd_unread: Cell::new(false),
            resume_pending: Cell::new(false),
            suspended: Cell::new(false),
            held_txd: Cell::new(None),
            phase: Cell::new(Phase::Idle),
            nacked: Cell::new(false),
            stall_tx: Cell::new(false),
            writes: Cell::new(0),
            trace: RefCell::new(Vec::new()),
            rx_starts: RefCell::new(Vec::new()),
            slave: RefCell::new(slave),
        }
    }

    /// Pretend another owner already enabled the instance.
    pub(crate) fn preset_enable(&self, value: u32) {
        self.enable.set(value);
    }

    /// The slave stops acknowledging data: `TXDSENT` never fires.
    pub(crate) fn stall_tx(&self, stall: bool) {
        self.stall_tx.set(stall);
    }

    pub(crate) fn enable_value(&self) -> u32 {
        self.enable.get()
    }

    pub(crate) fn frequency(&self) -> u32 {
        self.frequency.get()
    }

    pub(crate) fn pins(&self) -> (u8, u8) {
        self.pins.get()
    }

    pub(crate) fn inten(&self) -> u32 {
        self.inten.get()
    }

    pub(crate) fn address(&self) -> u8 {
        self.address.get()
    }

    pub(crate) fn shorts(&self) -> Shorts {
        self.shorts.get()
    }

    /// Number of register writes issued by the driver and the handler.
    pub(crate) fn writes(&self) -> usize {
        self.writes.get()
    }

    pub(crate) fn take_trace(&self) -> Vec<Trace> {
        self.trace.take()
    }

    /// `(ADDRESS, SHORTS)` at every `STARTRX`.
    pub(crate) fn rx_starts(&self) -> Vec<(u8, Shorts)> {
        self.rx_starts.borrow().clone()
    }

    pub(crate) fn load(&self, offset: usize, bytes: &[u8]) {
        let mut slave = self.slave.borrow_mut();
        slave.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn memory(&self, offset: usize, len: usize) -> Vec<u8> {
        self.slave.borrow().memory[offset..offset + len].to_vec()
    }

    /// An enabled event is waiting for the interrupt handler.
    pub(crate) fn irq_pending(&self) -> bool {
        let inten = Interrupts::from_bits(self.inten.get());
        EVENTS.iter().any(|&event| {
            self.events.get() & event_bit(event) != 0 && inten.contains(interrupt_for(event))
        })
    }

    fn count_write(&self) {
        self.writes.set(self.writes.get() + 1);
    }

    pub(crate) fn raise(&self, event: Event) {
        self.events.set(self.events.get() | event_bit(event));
    }

    fn address_matches(&self) -> bool {
        self.address.get() & 0x7f == self.slave.borrow().address
    }

    fn nack_address(&self) {
        self.nacked.set(true);
        self.errorsrc.set(self.errorsrc.get() | u32::from(ErrorSource::ADDRESS_NACK.bits()));
        self.raise(Event::Error);
    }

    fn deliver_txd(&self, byte: u8) {
        if self.stall_tx.get() {
            return;
        }
        self.slave.borrow_mut().write(byte);
        self.raise(Event::TxdSent);
        self.raise(Event::ByteBoundary);
    }

    fn receive_byte(&self) {
        if self.nacked.get() {
            return;
        }
        let byte = self.slave.borrow_mut().read();
        self.rxd.set(byte);
        self.rxd_unread.set(true);
        self.trace.borrow_mut().push(Trace::Rxd(byte));
        self.raise(Event::RxdReady);
        self.raise(Event::ByteBoundary);
        let shorts = self.shorts.get();
        if shorts.contains(Shorts::BB_STOP) {
            self.phase.set(Phase::Idle);
            self.raise(Event::Stopped);
        } else if shorts.contains(Shorts::BB_SUSPEND) {
            self.suspended.set(true);
            self.raise(Event::Suspended);
        }
    }
}

impl TwiRegisters for SimTwi {
    fn is_enabled(&self) -> bool {
        self.enable.get() != 0
    }

    fn write_enable(&self, value: u32) {
        self.count_write();
        self.enable.set(value);
    }

    fn write_address(&self, address: u8) {
        self.count_write();
        self.address.set(address);
    }

    fn read_address(&self) -> u8 {
        self.address.get()
    }

    fn write_frequency(&self, frequency: Frequency) {
        self.count_write();
        self.frequency.set(frequency.register_value());
    }

    fn write_pins(&self, scl: u8, sda: u8) {
        self.count_write();
        self.pins.set((scl, sda));
    }

    fn enable_interrupts(&self, mask: Interrupts) {
        self.count_write();
        self.inten.set(self.inten.get() | mask.bits());
    }

    fn write_shorts(&self, shorts: Shorts) {
        self.count_write();
        self.shorts.set(shorts);
    }

    fn trigger(&self, task: Task) {
        self.count_write();
        self.trace.borrow_mut().push(Trace::Task(task));
        match task {
            Task::StartTx => {
                self.phase.set(Phase::Tx);
                self.nacked.set(false);
                if self.address_matches() {
                    self.slave.borrow_mut().start_write();
                } else {
                    self.nack_address();
                }
            }
            Task::StartRx => {
                self.phase.set(Phase::Rx);
                self.nacked.set(false);
                self.rxd_unread.set(false);
                self.resume_pending.set(false);
                self.rx_starts
                    .borrow_mut()
                    .push((self.address.get(), self.shorts.get()));
                if !self.address_matches() {
                    self.nack_address();
                } else if !self.suspended.get() {
                    self.receive_byte();
                }
            }
            Task::Suspend => {
                if self.enable.get() != 0 {
                    self.suspended.set(true);
                    self.raise(Event::Suspended);
                }
            }
            Task::Resume => {
                self.suspended.set(false);
                match self.phase.get() {
                    Phase::Rx if self.rxd_unread.get() => self.resume_pending.set(true),
                    Phase::Rx => self.receive_byte(),
                    Phase::Tx => {
                        if let Some(byte) = self.held_txd.take() {
                            self.deliver_txd(byte);
                        }
                    }
                    Phase::Idle => {}
                }
            }
            Task::Stop => {
                if self.phase.get() != Phase::Idle {
                    self.phase.set(Phase::Idle);
                    self.suspended.set(false);
                    self.resume_pending.set(false);
                    self.raise(Event::Stopped);
                }
            }
        }
    }

    fn event_pending(&self, event: Event) -> bool {
        self.events.get() & event_bit(event) != 0
    }

    fn clear_event(&self, event: Event) {
        self.count_write();
        self.events.set(self.events.get() & !event_bit(event));
    }

    fn write_txd(&self, byte: u8) {
        self.count_write();
        self.trace.borrow_mut().push(Trace::Txd(byte));
        if self.phase.get() != Phase::Tx || self.nacked.get() {
            return;
        }
        if self.suspended.get() {
            self.held_txd.set(Some(byte));
        } else {
            self.deliver_txd(byte);
        }
    }

    fn read_rxd(&self) -> u8 {
        let byte = self.rxd.get();
        self.rxd_unread.set(false);
        if self.resume_pending.get() && !self.suspended.get() && self.phase.get() == Phase::Rx {
            self.resume_pending.set(false);
            self.receive_byte();
        }
        byte
    }

    fn take_error_source(&self) -> ErrorSource {
        self.count_write();
        ErrorSource::from_bits(self.errorsrc.replace(0))
    }
}

/// Delay provider that doubles as the interrupt controller.
pub(crate) struct SimIrq<'a> {
    hw: &'a SimTwi,
    handler: InterruptHandler<'a, &'a SimTwi, TestLog>,
    pub(crate) dispatches: usize,
}

impl<'a> SimIrq<'a> {
    pub(crate) fn new(hw: &'a SimTwi, handler: InterruptHandler<'a, &'a SimTwi, TestLog>) -> Self {
        Self {
            hw,
            handler,
            dispatches: 0,
        }
    }
}

impl DelayNs for SimIrq<'_> {
    fn delay_ns(&mut self, _ns: u32) {
        if self.hw.irq_pending() {
            self.handler.on_interrupt();
            self.dispatches += 1;
            self.hw
                .trace
                .borrow_mut()
                .push(Trace::Irq(self.handler.state()));
        }
    }
}

/// Logger that keeps every line for inspection.
#[derive(Clone, Default)]
pub(crate) struct TestLog {
    lines: Rc<RefCell<Vec<(Level, String)>>>,
}

impl TestLog {
    pub(crate) fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines
            .borrow()
            .iter()
            .any(|(l, line)| *l == level && line.contains(needle))
    }

    pub(crate) fn count(&self, level: Level) -> usize {
        self.lines.borrow().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Logger for TestLog {
    fn debug(&mut self, msg: &str) {
        self.lines.borrow_mut().push((Level::Debug, msg.into()));
    }

    fn warn(&mut self, msg: &str) {
        self.lines.borrow_mut().push((Level::Warn, msg.into()));
    }

    fn error(&mut self, msg: &str) {
        self.lines.borrow_mut().push((Level::Error, msg.into()));
    }
}

pub(crate) type SimDriver<'a> = Twi<'a, &'a SimTwi, SimIrq<'a>, TestLog>;

/// Driver wired to `hw`, not yet initialised.
pub(crate) fn driver<'a>(
    hw: &'a SimTwi,
    signal: &'a TransferSignal,
    config: TwiConfig,
    log: &TestLog,
    callback: Option<fn()>,
) -> SimDriver<'a> {
    let (producer, consumer) = signal.split().expect("fresh signal");
    let mut handler = InterruptHandler::new(hw, producer, log.clone());
    handler.set_callback(callback);
    Twi::new(hw, consumer, config, SimIrq::new(hw, handler), log.clone())
}

/// Driver wired to `hw`, initialised and enabled.
pub(crate) fn ready<'a>(
    hw: &'a SimTwi,
    signal: &'a TransferSignal,
    config: TwiConfig,
    log: &TestLog,
) -> SimDriver<'a> {
    let mut twi = driver(hw, signal, config, log, None);
    twi.init().expect("init");
    twi.enable();
    twi
}
