//! Process-wide system metrics read by the system rules.
//! Collectors run on their own threads and refresh a cached value at a fixed interval,
//! readers only ever see the cached value.

use crate::{logging, utils};
use lazy_static::lazy_static;
use std::sync::{Mutex, Once};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

lazy_static! {
    static ref SYSTEM: Mutex<System> = Mutex::new(System::new_all());
    static ref CURRENT_CPU: Mutex<f64> = Mutex::new(0.0);
    static ref CURRENT_LOAD: Mutex<f64> = Mutex::new(0.0);
}

static LOAD_ONCE: Once = Once::new();
static CPU_ONCE: Once = Once::new();

/// Starts the load1 collector. An interval of 0 disables it.
pub fn init_load_collector(load_interval_ms: u32) {
    if load_interval_ms == 0 {
        return;
    }
    LOAD_ONCE.call_once(move || {
        std::thread::spawn(move || loop {
            *CURRENT_LOAD.lock().unwrap() = get_system_load();
            utils::sleep_for_ms(load_interval_ms as u64);
        });
    });
}

/// Starts the process cpu usage collector. An interval of 0 disables it.
pub fn init_cpu_collector(cpu_interval_ms: u32) {
    if cpu_interval_ms == 0 {
        return;
    }
    CPU_ONCE.call_once(move || {
        std::thread::spawn(move || loop {
            *CURRENT_CPU.lock().unwrap() = get_process_cpu_usage();
            utils::sleep_for_ms(cpu_interval_ms as u64);
        });
    });
}

#[inline]
fn get_system_load() -> f64 {
    let system = SYSTEM.lock().unwrap();
    system.load_average().one
}

/// The cpu usage of this process as a ratio of the whole machine, in `[0.0, 1.0]`.
fn get_process_cpu_usage() -> f64 {
    let mut system = SYSTEM.lock().unwrap();
    let pid = match get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            logging::FREQUENT_ERROR_ONCE.call_once(|| {
                logging::error!(
                    "[SystemMetric] Failed to get the current pid, cpu usage is not collected. {}",
                    err
                );
            });
            return 0.0;
        }
    };
    if !system.refresh_process(pid) {
        return 0.0;
    }
    let cores = system.processors().len().max(1) as f64;
    match system.process(pid) {
        // sysinfo reports the percentage of one core
        Some(process) => (process.cpu_usage() as f64 / 100.0 / cores).min(1.0),
        None => 0.0,
    }
}

#[inline]
pub fn current_load() -> f64 {
    *CURRENT_LOAD.lock().unwrap()
}

#[inline]
pub fn current_cpu_usage() -> f64 {
    *CURRENT_CPU.lock().unwrap()
}

#[cfg(test)]
#[inline]
pub(crate) fn set_system_load(load: f64) {
    *CURRENT_LOAD.lock().unwrap() = load;
}

#[cfg(test)]
#[inline]
pub(crate) fn set_cpu_usage(usage: f64) {
    *CURRENT_CPU.lock().unwrap() = usage;
}
