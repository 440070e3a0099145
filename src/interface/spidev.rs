// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::{io, path::Path};

/// Blocking full-duplex transfer
pub trait Transfer {
    /// Error type
    type Error;

    /// Sends `words` to the slave and overwrites them with the words
    /// received
    fn transfer(&mut self, words: &mut [u8]) -> Result<(), Self::Error>;
}

/// Blocking write
pub trait Write {
    /// Error type
    type Error;

    /// Sends `words` to the slave, ignoring all the incoming words
    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error>;
}

pub const SPI_MAX_SPEED_HZ: u32 = 25_000;

pub struct SpiDevice {
    spi: Spidev,
}

impl SpiDevice {
    /// Open `path` in SPI mode 3, 8 bits per word
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<SpiDevice> {
        let mut spi = Spidev::open(path)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(SPI_MAX_SPEED_HZ)
            .mode(SpiModeFlags::SPI_MODE_3)
            .lsb_first(false)
            .build();
        spi.configure(&options)?;

        Ok(SpiDevice { spi })
    }
}

impl Transfer for SpiDevice {
    type Error = io::Error;

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut rx_buf = vec![0_u8; words.len()];
        {
            let mut transfer = SpidevTransfer::read_write(words, &mut rx_buf);
            self.spi.transfer(&mut transfer)?;
        }
        words.copy_from_slice(&rx_buf);
        Ok(())
    }
}

impl Write for SpiDevice {
    type Error = io::Error;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut transfer = SpidevTransfer::write(words);
        self.spi.transfer(&mut transfer)
    }
}
