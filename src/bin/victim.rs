// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standalone companion process for the integration tests in
//! `tests/victim.rs`. Holds a `sum`/`step` pair of `i32`s at a fixed
//! offset in a heap-allocated block and repeatedly does `sum += step`,
//! giving the test suite a live, changing target to scan and patch.
//!
//! Ported from `original_source/jni/test/victim_int.cpp`.

use std::env;
use std::io::Write;
use std::thread;
use std::time::Duration;

/// Boxed so the fields live at a stable heap address for the
/// duration of the process, the way the C++ original's stack-local
/// struct does for as long as `main` runs.
#[repr(C)]
struct Counters {
    sum: i32,
    step: i32,
}

fn main() {
    let mut args = env::args().skip(1);
    let step: i32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(123_456_789);
    let sleep_micros: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(5_000);

    let mut counters = Box::new(Counters { sum: 0, step });
    println!("victim pid={} addr={:p}", std::process::id(), counters.as_ref());
    let _ = std::io::stdout().flush();

    loop {
        counters.sum = counters.sum.wrapping_add(counters.step);
        println!("step={}, sum={}", counters.step, counters.sum);
        let _ = std::io::stdout().flush();
        thread::sleep(Duration::from_micros(sleep_micros));
    }
}
