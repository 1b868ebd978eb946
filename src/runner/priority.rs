// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, info, warn};

/// Priority of the driver thread when PCMDRV_THREAD_PRIORITY is unset.
const DEFAULT_DRIVER_THREAD_PRIORITY: u8 = 70;

/// Reads PCMDRV_THREAD_PRIORITY (0-99), falling back to the default.
fn driver_thread_priority() -> u8 {
    std::env::var("PCMDRV_THREAD_PRIORITY")
        .ok()
        .and_then(|v| parse_priority(&v))
        .unwrap_or(DEFAULT_DRIVER_THREAD_PRIORITY)
}

fn parse_priority(value: &str) -> Option<u8> {
    let n = value.trim().parse::<u8>().ok()?;
    (n < 100).then_some(n)
}

fn flag_enabled(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// SCHED_FIFO is opt-in with PCMDRV_RT_SCHEDULING=1.
fn rt_scheduling_enabled() -> bool {
    std::env::var("PCMDRV_RT_SCHEDULING")
        .map(|v| flag_enabled(&v))
        .unwrap_or(false)
}

/// Raises the priority of the calling thread. Failures are logged and ignored.
pub(crate) fn configure_driver_thread() {
    let priority = match ThreadPriorityValue::try_from(driver_thread_priority()) {
        Ok(priority) => priority,
        Err(e) => {
            warn!(err = %e, "Invalid driver thread priority");
            return;
        }
    };
    let tp = ThreadPriority::Crossplatform(priority);
    match set_current_thread_priority(tp) {
        Ok(()) => debug!(priority = ?priority, "Set driver thread priority"),
        Err(e) => debug!(err = ?e, "Unable to set driver thread priority"),
    }

    #[cfg(unix)]
    if rt_scheduling_enabled() {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for driver thread"),
            Err(e) => warn!(err = ?e, "Failed to set RT SCHED_FIFO for driver thread"),
        }
    }
}
