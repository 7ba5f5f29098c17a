//! Real-Time Thread Priority
//!
//! Platform-specific promotion of the calling thread into a time-constraint
//! scheduling class, plus introspection of the class a thread is running in.
//!
//! # Platform Support
//!
//! - **macOS**: Mach time-constraint policy with explicit period, computation
//!   and constraint budgets, after raising the QoS class to USER_INTERACTIVE
//! - **Windows**: MMCSS (Multimedia Class Scheduler Service) "Pro Audio" class
//! - **Linux**: SCHED_FIFO with elevated priority (requires CAP_SYS_NICE or root)
//!
//! # Usage
//!
//! Call `promote_current_thread()` once, at the start of the thread that should
//! become real-time. Budgets are ignored where the platform has no equivalent.

use serde::{Deserialize, Serialize};

/// Scheduling contract for a time-constraint thread
///
/// All values are in nanoseconds and converted to the scheduler's time base
/// with [`nanos_to_absolute_time`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConstraintPolicy {
    /// Activation period. 0 means the computation has no inherent periodicity,
    /// so the scheduler may take as long as it likes to wake the thread, but
    /// once running only other real-time threads can preempt it.
    pub period_ns: u32,
    /// Nominal computation time needed per activation
    pub computation_ns: u32,
    /// Maximum time from start to end of an activation
    pub constraint_ns: u32,
    /// Allow preemption during the computation window
    pub preemptible: bool,
}

/// Nominal real-time worker computation per activation
pub const DEFAULT_NOMINAL_COMPUTATION_NS: u32 = 200_000;
/// Maximum real-time worker computation per activation
pub const DEFAULT_MAXIMUM_COMPUTATION_NS: u32 = 500_000;

impl Default for TimeConstraintPolicy {
    fn default() -> Self {
        Self {
            period_ns: 0,
            computation_ns: DEFAULT_NOMINAL_COMPUTATION_NS,
            constraint_ns: DEFAULT_MAXIMUM_COMPUTATION_NS,
            preemptible: true,
        }
    }
}

/// Result of priority elevation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityResult {
    /// Successfully elevated to real-time priority
    Success,
    /// Failed to set priority (non-fatal, will use default)
    Failed,
    /// Platform not supported
    Unsupported,
}

impl PriorityResult {
    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Scheduling class a thread is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingClass {
    /// Latency-critical class (time-constraint / FIFO / RR / time-critical)
    TimeConstraint,
    /// Ordinary time-shared class
    TimeShare,
    /// Could not be determined on this platform
    Unknown,
}

/// Promote the calling thread into the time-constraint class.
pub fn promote_current_thread(policy: &TimeConstraintPolicy) -> PriorityResult {
    let result = platform_set_priority(policy);

    match result {
        PriorityResult::Success => {
            log::info!(
                "Thread elevated to real-time priority (computation={}ns constraint={}ns period={}ns)",
                policy.computation_ns,
                policy.constraint_ns,
                policy.period_ns
            );
        }
        PriorityResult::Failed => {
            log::warn!("Failed to set real-time thread priority (non-fatal)");
        }
        PriorityResult::Unsupported => {
            log::debug!("Real-time priority not supported on this platform");
        }
    }

    result
}

/// Scheduling class of the calling thread.
pub fn current_thread_class() -> SchedulingClass {
    platform_thread_class()
}

// ═══════════════════════════════════════════════════════════════════════════════
// macOS Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "macos")]
mod mach {
    #[repr(C)]
    pub struct ThreadTimeConstraintPolicy {
        pub period: u32,
        pub computation: u32,
        pub constraint: u32,
        pub preemptible: i32,
    }

    #[repr(C)]
    pub struct MachTimebaseInfo {
        pub numer: u32,
        pub denom: u32,
    }

    pub const THREAD_TIME_CONSTRAINT_POLICY: u32 = 2;
    pub const THREAD_TIME_CONSTRAINT_POLICY_COUNT: u32 = 4;

    // QOS_CLASS_USER_INTERACTIVE - highest non-realtime QoS
    pub const QOS_CLASS_USER_INTERACTIVE: u32 = 0x21;

    unsafe extern "C" {
        pub fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
        pub fn pthread_mach_thread_np(thread: libc::pthread_t) -> u32;
        pub fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
        pub fn thread_policy_set(
            thread: u32,
            flavor: u32,
            policy_info: *const ThreadTimeConstraintPolicy,
            count: u32,
        ) -> i32;
        pub fn thread_policy_get(
            thread: u32,
            flavor: u32,
            policy_info: *mut ThreadTimeConstraintPolicy,
            count: *mut u32,
            get_default: *mut u32,
        ) -> i32;
    }
}

/// Convert a duration in nanoseconds to the scheduler's absolute time units.
///
/// On macOS these are Mach absolute time ticks; elsewhere the scheduler works
/// in nanoseconds and the value is returned unchanged.
#[cfg(target_os = "macos")]
pub fn nanos_to_absolute_time(nanos: u32) -> u32 {
    use std::mem::MaybeUninit;

    let mut timebase = MaybeUninit::<mach::MachTimebaseInfo>::uninit();
    let timebase = unsafe {
        mach::mach_timebase_info(timebase.as_mut_ptr());
        timebase.assume_init()
    };

    if timebase.numer == 0 {
        return nanos;
    }

    let ticks_per_ns = timebase.denom as f64 / timebase.numer as f64;
    (nanos as f64 * ticks_per_ns) as u32
}

#[cfg(not(target_os = "macos"))]
pub fn nanos_to_absolute_time(nanos: u32) -> u32 {
    nanos
}

#[cfg(target_os = "macos")]
fn platform_set_priority(policy: &TimeConstraintPolicy) -> PriorityResult {
    // First, set QoS class for general high priority
    let qos_result =
        unsafe { mach::pthread_set_qos_class_self_np(mach::QOS_CLASS_USER_INTERACTIVE, 0) };

    if qos_result != 0 {
        log::debug!("pthread_set_qos_class_self_np failed: {}", qos_result);
        // Continue anyway - try real-time policy
    }

    let mach_policy = mach::ThreadTimeConstraintPolicy {
        period: nanos_to_absolute_time(policy.period_ns),
        computation: nanos_to_absolute_time(policy.computation_ns),
        constraint: nanos_to_absolute_time(policy.constraint_ns),
        preemptible: policy.preemptible as i32,
    };

    let result = unsafe {
        let thread = mach::pthread_mach_thread_np(libc::pthread_self());
        mach::thread_policy_set(
            thread,
            mach::THREAD_TIME_CONSTRAINT_POLICY,
            &mach_policy,
            mach::THREAD_TIME_CONSTRAINT_POLICY_COUNT,
        )
    };

    if result == 0 {
        PriorityResult::Success
    } else {
        log::debug!("thread_policy_set failed: {}", result);
        PriorityResult::Failed
    }
}

#[cfg(target_os = "macos")]
fn platform_thread_class() -> SchedulingClass {
    let mut policy = mach::ThreadTimeConstraintPolicy {
        period: 0,
        computation: 0,
        constraint: 0,
        preemptible: 0,
    };
    let mut count = mach::THREAD_TIME_CONSTRAINT_POLICY_COUNT;
    let mut get_default: u32 = 0;

    let result = unsafe {
        let thread = mach::pthread_mach_thread_np(libc::pthread_self());
        mach::thread_policy_get(
            thread,
            mach::THREAD_TIME_CONSTRAINT_POLICY,
            &mut policy,
            &mut count,
            &mut get_default,
        )
    };

    if result != 0 {
        SchedulingClass::Unknown
    } else if get_default != 0 {
        // The kernel fills in the default policy when none was set
        SchedulingClass::TimeShare
    } else {
        SchedulingClass::TimeConstraint
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Windows Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "windows")]
fn platform_set_priority(_policy: &TimeConstraintPolicy) -> PriorityResult {
    use windows::Win32::System::Threading::{
        AvSetMmThreadCharacteristicsW, GetCurrentThread, SetThreadPriority,
        THREAD_PRIORITY_TIME_CRITICAL,
    };
    use windows::core::PCWSTR;

    // MMCSS has no notion of per-activation budgets; the "Pro Audio" task
    // class is the closest equivalent.
    let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
    let mut task_index: u32 = 0;

    match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
        Ok(handle) if !handle.is_invalid() => {
            log::debug!(
                "MMCSS Pro Audio class registered (task index: {})",
                task_index
            );
            return PriorityResult::Success;
        }
        _ => {}
    }

    log::debug!("MMCSS registration failed, falling back to thread priority");

    let result = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) };

    if result.is_ok() {
        PriorityResult::Success
    } else {
        PriorityResult::Failed
    }
}

#[cfg(target_os = "windows")]
fn platform_thread_class() -> SchedulingClass {
    use windows::Win32::System::Threading::{
        GetCurrentThread, GetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
    };

    let priority = unsafe { GetThreadPriority(GetCurrentThread()) };
    if priority >= THREAD_PRIORITY_TIME_CRITICAL.0 {
        SchedulingClass::TimeConstraint
    } else {
        SchedulingClass::TimeShare
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Linux Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "linux")]
fn platform_set_priority(policy: &TimeConstraintPolicy) -> PriorityResult {
    use libc::{
        SCHED_FIFO, SCHED_RR, pthread_self, pthread_setschedparam, sched_param, sched_setscheduler,
    };

    // The fixed-priority classes carry no budgets; the constraint only
    // influences how high we ask to go.
    let mut param = sched_param {
        sched_priority: if policy.preemptible { 80 } else { 90 },
    };

    // pid 0 addresses the calling thread
    let result = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };

    if result == 0 {
        return PriorityResult::Success;
    }

    log::debug!("SCHED_FIFO failed (need CAP_SYS_NICE), trying SCHED_RR");

    param.sched_priority = 70;
    let result = unsafe { sched_setscheduler(0, SCHED_RR, &param) };

    if result == 0 {
        return PriorityResult::Success;
    }

    log::debug!("SCHED_RR failed, trying pthread_setschedparam");

    // Last resort: pthread_setschedparam (might work without root in some configs)
    param.sched_priority = 50;
    let thread = unsafe { pthread_self() };
    let result = unsafe { pthread_setschedparam(thread, SCHED_FIFO, &param) };

    if result == 0 {
        PriorityResult::Success
    } else {
        log::debug!("All Linux RT scheduling methods failed (errno: {})", result);
        PriorityResult::Failed
    }
}

#[cfg(target_os = "linux")]
fn platform_thread_class() -> SchedulingClass {
    let mut policy: libc::c_int = 0;
    let mut param = libc::sched_param { sched_priority: 0 };

    let result = unsafe { libc::pthread_getschedparam(libc::pthread_self(), &mut policy, &mut param) };

    if result != 0 {
        return SchedulingClass::Unknown;
    }

    match policy {
        libc::SCHED_FIFO | libc::SCHED_RR => SchedulingClass::TimeConstraint,
        _ => SchedulingClass::TimeShare,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unsupported Platforms
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_set_priority(_policy: &TimeConstraintPolicy) -> PriorityResult {
    PriorityResult::Unsupported
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_thread_class() -> SchedulingClass {
    SchedulingClass::Unknown
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
