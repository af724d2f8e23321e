// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces for digital GPIO pins.

/// Enum for which state the pin is in. `Function` means the pin has been
/// configured to a special function. Determining which function is outside
/// the scope of the HIL, and should instead use a chip-specific API.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Configuration {
    Input,
    Output,
    Function, // Chip-specific, requires chip-specific API for more detail
    Analog,
}

pub trait Configure {
    fn configuration(&self) -> Configuration;
    fn make_output(&self) -> Configuration;
    fn make_input(&self) -> Configuration;

    fn is_output(&self) -> bool {
        self.configuration() == Configuration::Output
    }
}

pub trait Output {
    /// Set the GPIO pin high. If the pin is not an output, the level is
    /// latched and appears once the pin becomes one.
    fn set(&self);

    /// Set the GPIO pin low. If the pin is not an output, the level is latched
    /// and appears once the pin becomes one.
    fn clear(&self);

    /// Toggle the GPIO pin and return the new value of the pin.
    fn toggle(&self) -> bool;
}

pub trait Input {
    /// Get the current state of the pin.
    fn read(&self) -> bool;
}
