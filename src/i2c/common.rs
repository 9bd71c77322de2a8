// Licensed under the Apache-2.0 license

//! Common types and constants for the nRF52 TWI driver modules.
//!
//! This module provides the configuration model, its builder, and the
//! register-level encodings (frequencies, interrupt mask, shortcuts, error
//! sources) shared by the driver, the register seam and the bindings.

use fugit::MillisDurationU32;

/// Value written to `ENABLE` to switch the peripheral to TWI master.
pub const ENABLE_TWI: u32 = 5;
/// Read bit OR-ed into `ADDRESS` for receive transfers.
pub const ADDRESS_READ_BIT: u8 = 0x80;

/// Bus frequency, encoded as the `FREQUENCY` register value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Frequency {
    K100 = 0x0198_0000,
    K250 = 0x0400_0000,
    K400 = 0x0668_0000,
}

impl Frequency {
    #[must_use]
    pub const fn register_value(self) -> u32 {
        self as u32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Master,
    Slave,
}

/// EasyDMA control. Only `Off` is supported by this driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dma {
    Off,
    On,
}

/// Direction of a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Rx,
    Tx,
}

/// Byte order used to put a 16-bit sub-address on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressOrder {
    /// Native integer layout of the CPU (little-endian on nRF52).
    Native,
    BigEndian,
    LittleEndian,
}

impl AddressOrder {
    #[must_use]
    pub fn encode(self, address: u16) -> [u8; 2] {
        match self {
            AddressOrder::Native => address.to_ne_bytes(),
            AddressOrder::BigEndian => address.to_be_bytes(),
            AddressOrder::LittleEndian => address.to_le_bytes(),
        }
    }
}

/// `INTENSET` mask.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Interrupts(u32);

impl Interrupts {
    pub const STOPPED: Self = Self(1 << 1);
    pub const RXDREADY: Self = Self(1 << 2);
    pub const TXDSENT: Self = Self(1 << 7);
    pub const ERROR: Self = Self(1 << 9);
    pub const BB: Self = Self(1 << 14);
    pub const SUSPENDED: Self = Self(1 << 18);

    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(
        Self::STOPPED.0
            | Self::RXDREADY.0
            | Self::TXDSENT.0
            | Self::ERROR.0
            | Self::BB.0
            | Self::SUSPENDED.0,
    );

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for Interrupts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// `SHORTS` value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Shorts(u32);

impl Shorts {
    pub const NONE: Self = Self(0);
    /// BB event triggers the SUSPEND task.
    pub const BB_SUSPEND: Self = Self(1 << 0);
    /// BB event triggers the STOP task.
    pub const BB_STOP: Self = Self(1 << 1);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Shortcut setup for a receive of `len` bytes: a single byte stops the
    /// bus on its own, longer reads pause after every byte.
    #[must_use]
    pub const fn for_receive(len: usize) -> Self {
        if len == 1 {
            Self::BB_STOP
        } else {
            Self::BB_SUSPEND
        }
    }
}

/// `ERRORSRC` contents captured when the error event fired.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorSource(u8);

impl ErrorSource {
    pub const OVERRUN: Self = Self(1 << 0);
    pub const ADDRESS_NACK: Self = Self(1 << 1);
    pub const DATA_NACK: Self = Self(1 << 2);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self((bits & 0x7) as u8)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_address_nack(self) -> bool {
        self.0 & Self::ADDRESS_NACK.0 != 0
    }

    #[must_use]
    pub const fn is_data_nack(self) -> bool {
        self.0 & Self::DATA_NACK.0 != 0
    }

    #[must_use]
    pub const fn is_overrun(self) -> bool {
        self.0 & Self::OVERRUN.0 != 0
    }
}

/// Configuration substituted during `init` instead of failing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Correction {
    /// Slave mode needs EasyDMA; the handle was switched to master.
    SlaveDowngraded,
    /// No instance was given; TWI0 is used.
    DefaultInstance,
}

pub type Corrections = heapless::Vec<Correction, 2>;

/// Successful outcome of `init`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Ready,
    Corrected(Corrections),
}

impl InitOutcome {
    #[must_use]
    pub fn corrections(&self) -> &[Correction] {
        match self {
            InitOutcome::Ready => &[],
            InitOutcome::Corrected(list) => list,
        }
    }
}

/// Default SCL pin used by `init_default`.
pub const DEFAULT_SCL_PIN: u8 = 13;
/// Default SDA pin used by `init_default`.
pub const DEFAULT_SDA_PIN: u8 = 12;
/// Default bound on every wait for a bus event.
pub const DEFAULT_TIMEOUT_MS: u32 = 100;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwiConfig {
    pub mode: Mode,
    pub dma: Dma,
    pub frequency: Frequency,
    pub scl_pin: u8,
    pub sda_pin: u8,
    pub interrupts: Interrupts,
    pub timeout: MillisDurationU32,
    pub address_order: AddressOrder,
}

impl Default for TwiConfig {
    /// Master, 400 kHz, SCL 13 / SDA 12, every interrupt enabled.
    fn default() -> Self {
        TwiConfigBuilder::new().build()
    }
}

pub struct TwiConfigBuilder {
    mode: Mode,
    dma: Dma,
    frequency: Frequency,
    scl_pin: u8,
    sda_pin: u8,
    interrupts: Interrupts,
    timeout: MillisDurationU32,
    address_order: AddressOrder,
}

impl Default for TwiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TwiConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Master,
            dma: Dma::Off,
            frequency: Frequency::K400,
            scl_pin: DEFAULT_SCL_PIN,
            sda_pin: DEFAULT_SDA_PIN,
            interrupts: Interrupts::ALL,
            timeout: MillisDurationU32::millis(DEFAULT_TIMEOUT_MS),
            address_order: AddressOrder::Native,
        }
    }
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
    #[must_use]
    pub fn dma(mut self, dma: Dma) -> Self {
        self.dma = dma;
        self
    }
    #[must_use]
    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
    #[must_use]
    pub fn pins(mut self, scl: u8, sda: u8) -> Self {
        self.scl_pin = scl;
        self.sda_pin = sda;
        self
    }
    #[must_use]
    pub fn interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = interrupts;
        self
    }
    #[must_use]
    pub fn timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = timeout;
        self
    }
    #[must_use]
    pub fn address_order(mut self, order: AddressOrder) -> Self {
        self.address_order = order;
        self
    }
    #[must_use]
    pub fn build(self) -> TwiConfig {
        TwiConfig {
            mode: self.mode,
            dma: self.dma,
            frequency: self.frequency,
            scl_pin: self.scl_pin,
            sda_pin: self.sda_pin,
            interrupts: self.interrupts,
            timeout: self.timeout,
            address_order: self.address_order,
        }
    }
}
