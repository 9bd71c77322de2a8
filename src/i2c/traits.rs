// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! Composable traits separating peripheral lifecycle, master transfers and
//! register-addressed ("memory") access.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! I2cHardwareCore (lifecycle, state)
//!     └── I2cMaster (write / read / write_read / transaction)
//!         └── I2cMemory (8-bit and 16-bit sub-addressed access)
//! ```

use crate::i2c::common::InitOutcome;
use crate::i2c::signal::TransferState;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core I2C hardware interface providing lifecycle operations
///
/// # Examples
///
/// ```rust,ignore
/// use nrf52_ddk::i2c::I2cHardwareCore;
///
/// fn bring_up<T: I2cHardwareCore>(twi: &mut T) -> Result<(), T::Error> {
///     twi.init()?;
///     twi.enable();
///     Ok(())
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Validate the configuration and program the peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot be honoured (DMA
    /// requested) or the peripheral is already owned by someone else. Both
    /// leave the registers untouched.
    fn init(&mut self) -> Result<InitOutcome, Self::Error>;

    /// Switch the peripheral on. A no-op unless it is initialised and disabled.
    fn enable(&mut self);

    /// Switch the peripheral off. A no-op unless the bus is idle.
    fn disable(&mut self);

    /// Last state published for the current transfer.
    fn state(&self) -> TransferState;

    /// Release the bus after a failed transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the peripheral never confirms the stop condition.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C Master mode operations
///
/// Every method here ends the transaction with a stop condition.
///
/// # Examples
///
/// ```rust,ignore
/// use nrf52_ddk::i2c::I2cMaster;
///
/// fn read_sensor<T: I2cMaster>(i2c: &mut T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.write_read(0x48u8, &[0x00], &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write data to a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge or the bus does not
    /// complete within the configured timeout.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge or the bus does not
    /// complete within the configured timeout.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Combined write-then-read operation with restart condition
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of I2C operations as a single transaction
    ///
    /// Adjacent operations of the same direction share one start condition.
    ///
    /// # Errors
    ///
    /// Returns an error if any operation in the sequence fails; the bus is
    /// released before returning.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// Register-addressed access to EEPROMs, sensors and similar devices
///
/// The sub-address is written first, then data is written or read back
/// after a repeated start, and the bus is stopped.
pub trait I2cMemory<A: AddressMode = SevenBitAddress>: I2cMaster<A> {
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn write_memory_byte(&mut self, addr: A, register: u8, value: u8) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn read_memory_byte(&mut self, addr: A, register: u8) -> Result<u8, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn write_memory(&mut self, addr: A, register: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn read_memory(&mut self, addr: A, register: u8, buffer: &mut [u8])
        -> Result<(), Self::Error>;

    /// Same as [`I2cMemory::write_memory`] with a two-byte sub-address.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn write_memory16(&mut self, addr: A, register: u16, bytes: &[u8])
        -> Result<(), Self::Error>;

    /// Same as [`I2cMemory::read_memory`] with a two-byte sub-address.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails.
    fn read_memory16(
        &mut self,
        addr: A,
        register: u16,
        buffer: &mut [u8],
    ) -> Result<(), Self::Error>;
}
