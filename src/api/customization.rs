// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This file contains all customizable constants.
//!
//! If you adapt them, make sure to run the tests before flashing the applet.
//! The invariants are checked by `is_valid`.

use crate::tag::file::AccessCode;

pub trait Customization {
    // ###########################################################################
    // Constants for adjusting the exposed feature set.
    // ###########################################################################

    /// Enables writing with UPDATE BINARY.
    ///
    /// When disabled, the tag is permanently read-only after installation: UPDATE BINARY is
    /// refused and the write access of the data file is forced to `None`. Use this together with
    /// the INITIAL_DATA installation parameter for tags pointing users to a fixed URL.
    fn writing_supported(&self) -> bool;

    /// Enables customization of the tag with installation parameters.
    ///
    /// If disabled, the applet data passed at installation is ignored and the defaults below
    /// apply.
    fn allows_install_parameters(&self) -> bool;

    /// Enables the proprietary access codes.
    ///
    /// # Invariant
    ///
    /// - If disabled, the default access codes must be `Open` or `None`.
    ///
    /// ContactOnly grants access only over the contact interface, WriteOnce grants write access
    /// only while the data file is empty. Both are hidden from readers of the capability
    /// container, which see `Open` or `None` depending on the current state.
    /// Without this feature only `Open` grants access.
    fn advanced_access_control(&self) -> bool;

    // ###########################################################################
    // Constants for adapting to different hardware.
    // ###########################################################################

    /// Maximum number of bytes returned by one READ BINARY (MLe).
    ///
    /// # Invariant
    ///
    /// - Must be at least 15, the size of the capability container.
    /// - Must be at most 256, the largest short response APDU.
    fn max_read_chunk(&self) -> u16;

    /// Maximum number of bytes accepted by one UPDATE BINARY (MLc).
    ///
    /// # Invariant
    ///
    /// - Must be at least 2, so that the length prefix can be written at once.
    /// - Must be at most 255, the largest short command APDU.
    fn max_write_chunk(&self) -> u16;

    /// Size of the data file when no installation parameter decides otherwise.
    ///
    /// # Invariant
    ///
    /// - Must be at least 3, to hold the length prefix and one byte.
    /// - Must be at most 32767, so that all offsets fit into READ BINARY parameters.
    ///
    /// Two bytes are used for the length prefix, the rest is available for the NDEF message.
    fn default_data_size(&self) -> u16;

    /// Read access of the data file when no installation parameter decides otherwise.
    fn default_read_access(&self) -> AccessCode;

    /// Write access of the data file when no installation parameter decides otherwise.
    fn default_write_access(&self) -> AccessCode;
}

#[derive(Clone)]
pub struct CustomizationImpl {
    pub writing_supported: bool,
    pub allows_install_parameters: bool,
    pub advanced_access_control: bool,
    pub max_read_chunk: u16,
    pub max_write_chunk: u16,
    pub default_data_size: u16,
    pub default_read_access: AccessCode,
    pub default_write_access: AccessCode,
}

pub const DEFAULT_CUSTOMIZATION: CustomizationImpl = CustomizationImpl {
    writing_supported: true,
    allows_install_parameters: true,
    advanced_access_control: true,
    max_read_chunk: 128,
    max_write_chunk: 128,
    default_data_size: 256,
    default_read_access: AccessCode::Open,
    default_write_access: AccessCode::Open,
};

impl Customization for CustomizationImpl {
    fn writing_supported(&self) -> bool {
        self.writing_supported
    }

    fn allows_install_parameters(&self) -> bool {
        self.allows_install_parameters
    }

    fn advanced_access_control(&self) -> bool {
        self.advanced_access_control
    }

    fn max_read_chunk(&self) -> u16 {
        self.max_read_chunk
    }

    fn max_write_chunk(&self) -> u16 {
        self.max_write_chunk
    }

    fn default_data_size(&self) -> u16 {
        self.default_data_size
    }

    fn default_read_access(&self) -> AccessCode {
        self.default_read_access
    }

    fn default_write_access(&self) -> AccessCode {
        self.default_write_access
    }
}

pub fn is_valid(customization: &impl Customization) -> bool {
    // Max read chunk must be between 15 and 256.
    if customization.max_read_chunk() < 0x0F || customization.max_read_chunk() > 0x100 {
        return false;
    }

    // Max write chunk must be between 2 and 255.
    if customization.max_write_chunk() < 2 || customization.max_write_chunk() > 0xFF {
        return false;
    }

    // Default data size must be between 3 and 32767.
    if customization.default_data_size() < 3 || customization.default_data_size() > 0x7FFF {
        return false;
    }

    // Proprietary default access codes need advanced access control.
    if !customization.advanced_access_control()
        && (customization.default_read_access().is_proprietary()
            || customization.default_write_access().is_proprietary())
    {
        return false;
    }

    true
}
