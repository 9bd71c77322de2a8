// Licensed under the Apache-2.0 license

//! High-level I2C controller abstraction.
//!
//! Wraps any [`I2cMaster`] and exposes it through the embedded-hal 1.0
//! [`I2c`](embedded_hal::i2c::I2c) trait so off-the-shelf device drivers can
//! run on top of the TWI driver. Failed operations are reported to the
//! controller's logger before the error is handed back.

use crate::common::{log_fmt, Level, Logger, NoOpLogger};
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }

    pub fn into_inner(self) -> H {
        self.hardware
    }

    fn report<T>(
        &mut self,
        op: &str,
        addr: SevenBitAddress,
        result: Result<T, H::Error>,
    ) -> Result<T, H::Error> {
        if let Err(err) = &result {
            log_fmt(
                &mut self.logger,
                Level::Debug,
                format_args!("i2c {op} at 0x{addr:02x} failed: {err:?}"),
            );
        }
        result
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let result = self.hardware.read(addr, buffer);
        self.report("read", addr, result)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let result = self.hardware.write(addr, bytes);
        self.report("write", addr, result)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.write_read(addr, bytes, buffer);
        self.report("write_read", addr, result)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.transaction_slice(addr, operations);
        self.report("transaction", addr, result)
    }
}
