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

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;
#[macro_use]
extern crate arrayref;

use crate::api::connection::Interface;
use crate::env::Env;
use crate::tag::install::ConfigurationError;
use crate::tag::NdefTagState;
use alloc::vec::Vec;

// This macro should eventually be split into trace, debug, info, warn, and error macros when
// adding either the defmt or log feature on the card side.
#[cfg(feature = "debug_tag")]
macro_rules! debug_tag {
    ($env: expr, $($rest:tt)*) => {{
        use core::fmt::Write;
        writeln!($env.write(), $($rest)*).unwrap();
    }};
}
#[cfg(not(feature = "debug_tag"))]
macro_rules! debug_tag {
    ($env: expr, $($rest:tt)*) => {
        // To avoid unused variable warnings.
        let _ = $env;
    };
}

pub mod api;
pub mod client;
pub mod env;
pub mod tag;
#[cfg(feature = "std")]
pub mod test_helpers;

/// NFC Forum Type 4 Tag applet parameterized by its environment.
pub struct NdefTag<E: Env> {
    env: E,
    state: NdefTagState,
}

impl<E: Env> NdefTag<E> {
    /// Installs a tag with default settings and the standard NDEF application identifier.
    pub fn new(env: E) -> Self {
        let state = NdefTagState::new(&env);
        NdefTag { env, state }
    }

    /// Installs a tag from a GlobalPlatform install buffer.
    ///
    /// The buffer holds the requested AID, control information and the applet data with the
    /// installation parameters. The requested AID is always honored.
    pub fn install(env: E, install_data: &[u8]) -> Result<Self, ConfigurationError> {
        let state = NdefTagState::install(&env, install_data)?;
        Ok(NdefTag { env, state })
    }

    pub fn state(&mut self) -> &mut NdefTagState {
        &mut self.state
    }

    pub fn env(&mut self) -> &mut E {
        &mut self.env
    }

    /// Processes one command APDU received over `interface` and returns the response APDU.
    ///
    /// The response is the response data followed by the two status word bytes.
    pub fn process_apdu(&mut self, command: &[u8], interface: Interface) -> Vec<u8> {
        self.state.process_apdu(&mut self.env, command, interface)
    }

    /// Forgets the applet selection, as happens when the card is reset or leaves the field.
    pub fn reset(&mut self) {
        self.state.deselect();
    }
}
