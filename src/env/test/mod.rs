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

use crate::api::customization::{CustomizationImpl, DEFAULT_CUSTOMIZATION};
use crate::env::Env;

pub type TestCustomization = CustomizationImpl;

pub struct TestEnv {
    customization: TestCustomization,
}

pub struct TestWrite;

impl core::fmt::Write for TestWrite {
    fn write_str(&mut self, _: &str) -> core::fmt::Result {
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        TestEnv {
            customization: DEFAULT_CUSTOMIZATION,
        }
    }
}

impl TestEnv {
    pub fn customization_mut(&mut self) -> &mut TestCustomization {
        &mut self.customization
    }
}

impl Env for TestEnv {
    type Write = TestWrite;
    type Customization = TestCustomization;

    fn write(&mut self) -> Self::Write {
        TestWrite
    }

    fn customization(&self) -> &Self::Customization {
        &self.customization
    }
}

#[cfg(test)]
#[allow(clippy::module_inception)]
mod test {
    use super::*;
    use crate::api::customization::{is_valid, Customization};

    #[test]
    fn test_customization_mut() {
        let mut env = TestEnv::default();
        assert!(is_valid(env.customization()));
        env.customization_mut().writing_supported = false;
        assert!(!env.customization().writing_supported());
    }
}
