#![no_main]

use fuzz_helper::{process_input, InputType};
use libfuzzer_sys::fuzz_target;

// Fuzz inputs as install buffers.
fuzz_target!(|data: &[u8]| {
    process_input(data, InputType::InstallData);
});
