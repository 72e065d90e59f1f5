// the dual monitor clock: an absolute-deadline monotonic clock for
// blanking intervals and a cycle-counter spin clock for single-pixel
// waits. Sleep alone cannot hold sub-microsecond deadlines on a
// stock kernel, and spinning across whole blanks burns the core, so
// the scan generator leans on both.

use crate::cga::monitor_timing;
use crate::error::Error;

#[cfg(test)]
#[path = "./timing_test.rs"]
mod timing_test;

pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// PREEMPT_RT runs kernel tasklets and interrupt handlers at 50
pub const RT_PRIORITY: i32 = 49;

/// stack bytes guaranteed touchable without faulting once locked
const MAX_SAFE_STACK: usize = 8 * 1024;

/// absolute-deadline sleeper on the monotonic clock
#[cfg(target_os = "linux")]
pub struct RtClock {
    t: libc::timespec,
}

#[cfg(target_os = "linux")]
impl RtClock {
    pub fn new() -> Self {
        RtClock {
            t: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
        }
    }

    pub fn mark(&mut self) {
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut self.t);
        }
    }

    pub fn accumulate(&mut self, ns: i64) {
        let mut nsec = self.t.tv_nsec as i64 + ns;
        while nsec >= NSEC_PER_SEC {
            nsec -= NSEC_PER_SEC;
            self.t.tv_sec += 1;
        }
        self.t.tv_nsec = nsec as libc::c_long;
    }

    pub fn wait(&mut self) {
        unsafe {
            libc::clock_nanosleep(
                libc::CLOCK_MONOTONIC,
                libc::TIMER_ABSTIME,
                &self.t,
                std::ptr::null_mut(),
            );
        }
    }

    pub fn wait_ns(&mut self, ns: i64) {
        self.accumulate(ns);
        self.wait();
    }
}

/// absolute-deadline sleeper, portable fallback
#[cfg(not(target_os = "linux"))]
pub struct RtClock {
    deadline: std::time::Instant,
}

#[cfg(not(target_os = "linux"))]
impl RtClock {
    pub fn new() -> Self {
        RtClock {
            deadline: std::time::Instant::now(),
        }
    }

    pub fn mark(&mut self) {
        self.deadline = std::time::Instant::now();
    }

    pub fn accumulate(&mut self, ns: i64) {
        self.deadline += std::time::Duration::from_nanos(ns as u64);
    }

    pub fn wait(&mut self) {
        let now = std::time::Instant::now();
        if self.deadline > now {
            std::thread::sleep(self.deadline - now);
        }
    }

    pub fn wait_ns(&mut self, ns: i64) {
        self.accumulate(ns);
        self.wait();
    }
}

impl Default for RtClock {
    fn default() -> Self {
        RtClock::new()
    }
}

/// wrapping cycle counter read. The target device exposes the ARM
/// performance counter (user access enabled by a kernel module);
/// everywhere else monotonic nanoseconds stand in at 1 GHz.
pub fn read_cycle_counter() -> u32 {
    #[cfg(target_arch = "arm")]
    unsafe {
        let v: u32;
        core::arch::asm!("mrc p15, 0, {}, c9, c13, 0", out(reg) v);
        v
    }

    #[cfg(not(target_arch = "arm"))]
    {
        monotonic_ns() as u32
    }
}

#[cfg(not(target_arch = "arm"))]
fn monotonic_ns() -> u64 {
    lazy_static! {
        static ref START: std::time::Instant = std::time::Instant::now();
    }

    START.elapsed().as_nanos() as u64
}

/// spin-wait on the cycle counter; all arithmetic wraps so the
/// counter may roll over mid-interval
pub struct BusyWaitCycles {
    start_cycle: u32,
    cycles_accumulated: u32,
}

impl BusyWaitCycles {
    pub fn new() -> Self {
        BusyWaitCycles {
            start_cycle: 0,
            cycles_accumulated: 0,
        }
    }

    pub fn mark(&mut self) {
        self.start_cycle = read_cycle_counter();
        self.cycles_accumulated = 0;
    }

    pub fn accumulate(&mut self, cycles: u32) {
        self.cycles_accumulated = self.cycles_accumulated.wrapping_add(cycles);
    }

    pub fn wait_cycles(&mut self, cycles: u32) {
        self.accumulate(cycles);
        self.wait();
    }

    pub fn wait(&mut self) {
        while read_cycle_counter().wrapping_sub(self.start_cycle) < self.cycles_accumulated {}

        self.start_cycle = self.start_cycle.wrapping_add(self.cycles_accumulated);
        self.cycles_accumulated = 0;
    }
}

impl Default for BusyWaitCycles {
    fn default() -> Self {
        BusyWaitCycles::new()
    }
}

#[cfg(target_arch = "arm")]
pub const DEFAULT_CYCLES_PER_SEC: i64 = 700_000_000;
#[cfg(not(target_arch = "arm"))]
pub const DEFAULT_CYCLES_PER_SEC: i64 = NSEC_PER_SEC;

/// composition of the two clocks. Coarse waits sleep on the wall
/// clock and re-anchor the spin clock; fine waits spin and advance
/// the wall deadline so the row total stays exact.
pub struct CombinedClock {
    pub cycles_per_sec: i64,
    bwc: BusyWaitCycles,
    rtc: RtClock,
}

impl CombinedClock {
    pub fn new() -> Self {
        Self::with_cycle_rate(DEFAULT_CYCLES_PER_SEC)
    }

    pub fn with_cycle_rate(cycles_per_sec: i64) -> Self {
        CombinedClock {
            cycles_per_sec,
            bwc: BusyWaitCycles::new(),
            rtc: RtClock::new(),
        }
    }

    pub fn ns_to_cycles(&self, ns: i64) -> u32 {
        (ns * self.cycles_per_sec / NSEC_PER_SEC) as u32
    }

    pub fn mark(&mut self) {
        self.rtc.mark();
        self.bwc.mark();
    }

    pub fn accumulate(&mut self, ns: i64) {
        self.rtc.accumulate(ns);
        let cycles = self.ns_to_cycles(ns);
        self.bwc.accumulate(cycles);
    }

    pub fn wait(&mut self) {
        self.rtc.wait();
        self.bwc.mark();
    }

    pub fn busy_wait(&mut self) {
        self.bwc.wait();
    }

    pub fn wait_ns(&mut self, ns: i64) {
        self.rtc.wait_ns(ns);
        self.bwc.mark();
    }

    pub fn busy_wait_ns(&mut self, ns: i64) {
        self.rtc.accumulate(ns);
        let cycles = self.ns_to_cycles(ns);
        self.bwc.wait_cycles(cycles);
    }
}

impl Default for CombinedClock {
    fn default() -> Self {
        CombinedClock::new()
    }
}

/// the waiting surface the scan generator runs against
pub trait MonitorClock {
    fn start(&mut self);
    fn accumulate(&mut self, ns: i64);
    fn wait(&mut self);
    fn busy_wait(&mut self);

    fn accumulate_pixels(&mut self, pixels: i64) {
        self.accumulate(monitor_timing::pixel_interval_ns(pixels, 1));
    }
}

impl MonitorClock for CombinedClock {
    fn start(&mut self) {
        self.mark();
    }

    fn accumulate(&mut self, ns: i64) {
        CombinedClock::accumulate(self, ns);
    }

    fn wait(&mut self) {
        CombinedClock::wait(self);
    }

    fn busy_wait(&mut self) {
        CombinedClock::busy_wait(self);
    }
}

/// switch the calling thread to SCHED_FIFO at the given priority
#[cfg(target_os = "linux")]
pub fn init_rt(sched_priority: Option<i32>) -> Result<(), Error> {
    if let Some(priority) = sched_priority {
        let param = libc::sched_param {
            sched_priority: priority,
        };

        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } == -1 {
            return Err(Error::RealtimeConfig(format!(
                "sched_setscheduler: {}",
                std::io::Error::last_os_error()
            )));
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn init_rt(sched_priority: Option<i32>) -> Result<(), Error> {
    match sched_priority {
        None => Ok(()),
        Some(_) => Err(Error::RealtimeConfig(
            "realtime scheduling unsupported on this platform".to_string(),
        )),
    }
}

/// pin current and future pages; page faults inside a scan row tear
/// the picture
#[cfg(target_os = "linux")]
pub fn lock_memory() -> Result<(), Error> {
    if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } == -1 {
        return Err(Error::RealtimeConfig(format!(
            "mlockall: {}",
            std::io::Error::last_os_error()
        )));
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn lock_memory() -> Result<(), Error> {
    Err(Error::RealtimeConfig(
        "memory locking unsupported on this platform".to_string(),
    ))
}

/// touch the working stack once so it is resident before the loop
pub fn stack_prefault() {
    let mut dummy = [0u8; MAX_SAFE_STACK];

    for b in dummy.iter_mut() {
        unsafe { std::ptr::write_volatile(b, 0) };
    }
}
