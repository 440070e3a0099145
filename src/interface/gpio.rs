// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use gpiod::{Chip, Input, Lines, Options, Output};
use std::{convert::Infallible, io};

const CONSUMER: &str = "bno08x-shtp";

pub trait OutputPin {
    /// Error type
    type Error;

    /// Drives the pin low
    ///
    /// *NOTE* the actual electrical state of the pin may not actually be low,
    /// e.g. due to external electrical sources
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Drives the pin high
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

pub trait InputPin {
    /// Error type
    type Error;

    /// Is the input pin high?
    fn is_high(&self) -> Result<bool, Self::Error>;

    /// Is the input pin low?
    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Reset line, requested low
pub struct GpiodOut {
    output: Lines<Output>,
}

impl GpiodOut {
    pub fn new(chip: &Chip, pin: u32) -> io::Result<GpiodOut> {
        let opts = Options::output([pin]).values([false]).consumer(CONSUMER);
        Ok(GpiodOut {
            output: chip.request_lines(opts)?,
        })
    }
}

impl OutputPin for GpiodOut {
    type Error = io::Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([false])
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([true])
    }
}

/// Interrupt line
pub struct GpiodIn {
    input: Lines<Input>,
}

impl GpiodIn {
    pub fn new(chip: &Chip, pin: u32) -> io::Result<GpiodIn> {
        let opts = Options::input([pin]).consumer(CONSUMER);
        Ok(GpiodIn {
            input: chip.request_lines(opts)?,
        })
    }
}

impl InputPin for GpiodIn {
    type Error = io::Error;

    fn is_high(&self) -> Result<bool, Self::Error> {
        let values = self.input.get_values([false])?;
        Ok(values[0])
    }
}

/// Placeholder for a transport wired without an interrupt line.
///
/// Always reads low, so an active-low ready line looks asserted and every
/// poll goes to the bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl InputPin for NoPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
