#![no_main]

use fuzz_helper::process_structured;
use libfuzzer_sys::fuzz_target;

// Fuzz inputs as a tag configuration followed by a sequence of command APDUs.
fuzz_target!(|data: &[u8]| {
    process_structured(data);
});
