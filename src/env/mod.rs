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

use crate::api::customization::Customization;

#[cfg(any(test, feature = "std"))]
pub mod test;

/// Describes what the tag applet needs to function.
pub trait Env {
    type Write: core::fmt::Write;
    type Customization: Customization;

    /// Creates a write instance for debugging.
    ///
    /// This API doesn't return a reference such that drop may flush. Host environments may either
    /// use this API or forward to the log crate.
    fn write(&mut self) -> Self::Write;

    fn customization(&self) -> &Self::Customization;
}
