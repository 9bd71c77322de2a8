// Licensed under the Apache-2.0 license

#![no_std]
#![no_main]

use core::cell::RefCell;

use cortex_m_rt::entry;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use fugit::HertzU32;
use nrf52832_pac::interrupt;
use panic_halt as _;

use nrf52_ddk::common::NoOpLogger;
use nrf52_ddk::i2c::{
    AddressOrder, CycleDelay, I2cController, Twi, TwiConfig, TwiConfigBuilder, TwiDriver, TwiId,
    TwiIrqHandler,
};

const SYSCLK: HertzU32 = HertzU32::MHz(64);
/// 24C256-style EEPROM with a 16-bit big-endian word address.
const EEPROM_ADDR: u8 = 0x50;
const EEPROM_WRITE_CYCLE_MS: u32 = 5;

static TWI0_IRQ: Mutex<RefCell<Option<TwiIrqHandler>>> = Mutex::new(RefCell::new(None));

#[interrupt]
fn SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0() {
    critical_section::with(|cs| {
        if let Some(handler) = TWI0_IRQ.borrow_ref_mut(cs).as_mut() {
            handler.on_interrupt();
        }
    });
}

fn eeprom_round_trip(twi: &mut TwiDriver<CycleDelay>, delay: &mut CycleDelay) -> bool {
    let pattern = [0xde, 0xad, 0xbe, 0xef];
    let mut readback = [0u8; 4];

    if twi.write_memory16(EEPROM_ADDR, 0x0100, &pattern).is_err() {
        return false;
    }
    delay.delay_ms(EEPROM_WRITE_CYCLE_MS);
    if twi.read_memory16(EEPROM_ADDR, 0x0100, &mut readback).is_err() {
        return false;
    }
    readback == pattern
}

/// Count the devices answering a one-byte read.
fn probe_bus(twi: TwiDriver<CycleDelay>) -> (TwiDriver<CycleDelay>, usize) {
    let mut controller = I2cController::new(twi, NoOpLogger);
    let mut found = 0;
    for addr in 0x08..0x78u8 {
        let mut byte = [0u8; 1];
        if embedded_hal::i2c::I2c::read(&mut controller, addr, &mut byte).is_ok() {
            found += 1;
        }
    }
    (controller.into_inner(), found)
}

#[entry]
fn main() -> ! {
    let mut delay = CycleDelay::new(SYSCLK);

    let Some((mut twi, handler)) = Twi::with_instance(
        Some(TwiId::Twi0),
        TwiConfig::default(),
        CycleDelay::new(SYSCLK),
        NoOpLogger,
    ) else {
        panic!("TWI0 already bound");
    };
    critical_section::with(|cs| {
        TWI0_IRQ.borrow_ref_mut(cs).replace(handler);
    });

    let mut line = TwiId::Twi0.line();
    if twi.init_default(&mut line).is_err() {
        panic!("TWI0 init failed");
    }
    twi.set_config(
        TwiConfigBuilder::new()
            .address_order(AddressOrder::BigEndian)
            .build(),
    );
    twi.enable();

    let (mut twi, found) = probe_bus(twi);
    let passed = found > 0 && eeprom_round_trip(&mut twi, &mut delay);

    twi.disable();
    if !passed {
        panic!("EEPROM round trip failed");
    }

    loop {
        cortex_m::asm::wfi();
    }
}
