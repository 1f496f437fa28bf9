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

//! In-memory channel between the client and a tag, for end-to-end tests.

use crate::api::connection::{CardChannel, Interface, TransportError, TransportResult};
use crate::env::Env;
use crate::NdefTag;
use alloc::boxed::Box;
use alloc::vec::Vec;

type Observer<E> = Box<dyn FnMut(&mut NdefTag<E>, &[u8])>;

/// A `CardChannel` that hands every command directly to a tag.
pub struct LoopbackChannel<E: Env> {
    tag: NdefTag<E>,
    interface: Interface,
    exclusive: bool,
    commands: Vec<Vec<u8>>,
    observer: Option<Observer<E>>,
}

impl<E: Env> LoopbackChannel<E> {
    /// Connects to the tag over the contactless interface.
    pub fn new(tag: NdefTag<E>) -> Self {
        LoopbackChannel::with_interface(tag, Interface::Contactless)
    }

    pub fn with_interface(tag: NdefTag<E>, interface: Interface) -> Self {
        LoopbackChannel {
            tag,
            interface,
            exclusive: false,
            commands: Vec::new(),
            observer: None,
        }
    }

    pub fn tag(&mut self) -> &mut NdefTag<E> {
        &mut self.tag
    }

    pub fn set_interface(&mut self, interface: Interface) {
        self.interface = interface;
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// All commands transmitted so far.
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Registers a callback that sees the tag right before each command is processed.
    pub fn set_observer(&mut self, observer: impl FnMut(&mut NdefTag<E>, &[u8]) + 'static) {
        self.observer = Some(Box::new(observer));
    }
}

impl<E: Env> CardChannel for LoopbackChannel<E> {
    fn begin_exclusive(&mut self) -> TransportResult<()> {
        if self.exclusive {
            return Err(TransportError);
        }
        self.exclusive = true;
        Ok(())
    }

    fn end_exclusive(&mut self) -> TransportResult<()> {
        if !self.exclusive {
            return Err(TransportError);
        }
        self.exclusive = false;
        Ok(())
    }

    fn transmit(&mut self, command: &[u8]) -> TransportResult<Vec<u8>> {
        if let Some(observer) = &mut self.observer {
            observer(&mut self.tag, command);
        }
        self.commands.push(command.to_vec());
        Ok(self.tag.process_apdu(command, self.interface))
    }
}
