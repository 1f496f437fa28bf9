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

use alloc::vec::Vec;
#[cfg(feature = "fuzz")]
use arbitrary::Arbitrary;
#[cfg(test)]
use enum_iterator::IntoEnumIterator;

/// Medium over which a command APDU reached the card.
///
/// The same tag may answer over both interfaces, so the medium is attached to every command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(IntoEnumIterator))]
#[cfg_attr(feature = "fuzz", derive(Arbitrary))]
pub enum Interface {
    /// ISO 7816-3 contact interface.
    Contact,
    /// ISO 14443 contactless interface, i.e. NFC.
    Contactless,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportError;

pub type TransportResult<T> = Result<T, TransportError>;

/// Host side channel to a card, as offered by a PC/SC reader.
pub trait CardChannel {
    /// Claims the card for this channel until `end_exclusive` is called.
    ///
    /// No other channel may interleave commands while the claim is held.
    fn begin_exclusive(&mut self) -> TransportResult<()>;

    /// Releases the claim taken by `begin_exclusive`.
    fn end_exclusive(&mut self) -> TransportResult<()>;

    /// Sends a command APDU and returns the full response APDU, including the status word.
    fn transmit(&mut self, command: &[u8]) -> TransportResult<Vec<u8>>;
}
