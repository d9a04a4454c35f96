//! Call-rate governor for Helios
//!
//! Every scheduled job is wrapped by a [`CallGovernor`] that decides, from
//! its own counters and wall-clock time, whether an upstream call may
//! proceed. Throttling is a return value, never an error: the governor is a
//! pure decision function over its own state and never fails.

use crate::logging::{LogContext, get_logger_with_context};
use chrono::{DateTime, Duration, Local, Timelike};

/// Why a call was throttled
///
/// When several policies are violated at once, the surfaced reason is the
/// highest-priority one, in the order of the variants below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    /// The lifetime call cap was reached
    TotalCap,
    /// The call came too soon after the previous one
    MinInterval,
    /// The daily call budget is exhausted
    DailyCap,
    /// The current hour falls inside the blackout window
    BlackoutHours,
}

impl ThrottleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalCap => "over max calls",
            Self::MinInterval => "too soon after last call",
            Self::DailyCap => "over max calls today",
            Self::BlackoutHours => "within blackout hours",
        }
    }
}

impl std::fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape hatch consulted when a policy fires; returning true lets the call
/// proceed as if no policy had been violated.
pub type OverrideHook = Box<dyn Fn(ThrottleReason) -> bool + Send + Sync>;

/// Stateful call-rate limiter
///
/// One instance per named job, created at orchestrator setup and kept for
/// the process lifetime. Configuration is mutable at any time; changes take
/// effect on the next [`execute`](Self::execute).
pub struct CallGovernor {
    total_call_count: u64,
    throttled_call_count: u64,
    calls_today: u64,
    last_call: Option<DateTime<Local>>,

    max_total_calls: Option<u64>,
    max_calls_per_day: Option<u64>,
    min_interval: Option<Duration>,
    blackout_hours: Option<(u32, u32)>,
    override_hook: Option<OverrideHook>,

    logger: crate::logging::StructuredLogger,
}

impl CallGovernor {
    /// Create an unrestricted governor for the named job
    pub fn new(name: &str) -> Self {
        let logger = get_logger_with_context(LogContext::new("governor").with_job(name));
        Self {
            total_call_count: 0,
            throttled_call_count: 0,
            calls_today: 0,
            last_call: None,
            max_total_calls: None,
            max_calls_per_day: None,
            min_interval: None,
            blackout_hours: None,
            override_hook: None,
            logger,
        }
    }

    /// Total calls that passed the policy checks (or were forced)
    pub fn total_call_count(&self) -> u64 {
        self.total_call_count
    }

    /// Total calls rejected by a policy
    pub fn throttled_call_count(&self) -> u64 {
        self.throttled_call_count
    }

    /// Successful calls on the current local calendar day
    pub fn calls_today(&self) -> u64 {
        self.calls_today
    }

    /// Instant of the most recent successful call
    pub fn last_call(&self) -> Option<DateTime<Local>> {
        self.last_call
    }

    /// Cap the lifetime number of calls; `None` disables the policy
    pub fn set_max_total_calls(&mut self, limit: Option<u64>) {
        self.max_total_calls = limit;
    }

    /// Cap calls per local calendar day; `None` disables the policy
    pub fn set_max_calls_per_day(&mut self, limit: Option<u64>) {
        self.max_calls_per_day = limit;
    }

    /// Require a minimum spacing between calls; `None` disables the policy
    pub fn set_min_interval(&mut self, interval: Option<Duration>) {
        self.min_interval = interval;
    }

    /// Block calls between `start` and `end` hours, inclusive. A window with
    /// `start > end` wraps past midnight.
    pub fn set_blackout_hours(&mut self, start: u32, end: u32) {
        self.blackout_hours = Some((start, end));
    }

    /// Install the override hook
    pub fn set_override_hook(&mut self, hook: OverrideHook) {
        self.override_hook = Some(hook);
    }

    /// Return the governor to its just-constructed state: all counters
    /// zeroed, all policies and the override hook cleared.
    pub fn reset(&mut self) {
        self.total_call_count = 0;
        self.throttled_call_count = 0;
        self.calls_today = 0;
        self.last_call = None;
        self.max_total_calls = None;
        self.max_calls_per_day = None;
        self.min_interval = None;
        self.blackout_hours = None;
        self.override_hook = None;
    }

    /// Run `action` if no policy objects, discarding the throttle reason
    pub fn execute<A: FnOnce()>(&mut self, action: A) -> bool {
        self.execute_with(action, |_| {})
    }

    /// Run `action` if no policy objects; on throttle, `on_throttled` is
    /// invoked with the reason and the call is counted as throttled.
    ///
    /// The action is invoked synchronously. Callers driving asynchronous
    /// work either make the action fire-and-forget or treat the returned
    /// permit as the signal to start the work.
    pub fn execute_with<A, T>(&mut self, action: A, on_throttled: T) -> bool
    where
        A: FnOnce(),
        T: FnOnce(ThrottleReason),
    {
        self.execute_at(Local::now(), action, on_throttled)
    }

    /// Bypass all policy checks but update counters and the last-call stamp
    /// exactly like a successful [`execute`](Self::execute). Used to prime
    /// consumers at startup.
    pub fn force_execute<A: FnOnce()>(&mut self, action: A) -> bool {
        self.record_call(Local::now());
        action();
        true
    }

    /// Log the configured limitations
    pub fn log_policies(&self) {
        let mut limitations: Vec<String> = Vec::new();

        if let Some(max) = self.max_total_calls {
            limitations.push(format!("a maximum of {} calls in total", max));
        }

        if let Some(max) = self.max_calls_per_day {
            limitations.push(format!("a maximum of {} calls per day", max));
        }

        if let Some(interval) = self.min_interval {
            limitations.push(format!(
                "at least {}s between calls",
                interval.num_milliseconds() as f64 / 1000.0
            ));
        }

        if let Some((start, end)) = self.blackout_hours {
            limitations.push(format!("no calls between {}:00 and {}:00", start, end));
        }

        if limitations.is_empty() {
            self.logger.info("No call limitations");
        } else {
            self.logger
                .info(&format!("Call limitations: {}", limitations.join("; ")));
        }
    }

    fn execute_at<A, T>(&mut self, now: DateTime<Local>, action: A, on_throttled: T) -> bool
    where
        A: FnOnce(),
        T: FnOnce(ThrottleReason),
    {
        self.roll_day(now);

        if let Some(reason) = self.violation_at(now) {
            let overridden = self
                .override_hook
                .as_ref()
                .map(|hook| hook(reason))
                .unwrap_or(false);

            if !overridden {
                self.throttled_call_count += 1;
                on_throttled(reason);
                return false;
            }
        }

        self.record_call(now);
        action();
        true
    }

    /// First violated policy in priority order, if any
    fn violation_at(&self, now: DateTime<Local>) -> Option<ThrottleReason> {
        if let Some(max) = self.max_total_calls
            && self.total_call_count >= max
        {
            return Some(ThrottleReason::TotalCap);
        }

        if let Some(min_interval) = self.min_interval
            && let Some(last) = self.last_call
            && now - last < min_interval
        {
            return Some(ThrottleReason::MinInterval);
        }

        if let Some(max) = self.max_calls_per_day
            && self.calls_today >= max
        {
            return Some(ThrottleReason::DailyCap);
        }

        if let Some((start, end)) = self.blackout_hours {
            let hour = now.hour();
            let inside = if start <= end {
                hour >= start && hour <= end
            } else {
                // Window wraps past midnight
                hour >= start || hour <= end
            };
            if inside {
                return Some(ThrottleReason::BlackoutHours);
            }
        }

        None
    }

    /// Reset the daily counter when the local calendar day has changed
    fn roll_day(&mut self, now: DateTime<Local>) {
        if let Some(last) = self.last_call
            && last.date_naive() != now.date_naive()
        {
            self.calls_today = 0;
        }
    }

    fn record_call(&mut self, now: DateTime<Local>) {
        self.total_call_count += 1;
        self.calls_today += 1;
        self.last_call = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn unrestricted_governor_always_executes() {
        let mut gov = CallGovernor::new("test");
        let mut ran = 0;
        for _ in 0..10 {
            assert!(gov.execute(|| ran += 1));
        }
        assert_eq!(ran, 10);
        assert_eq!(gov.total_call_count(), 10);
        assert_eq!(gov.throttled_call_count(), 0);
    }

    #[test]
    fn min_interval_throttles_back_to_back_calls() {
        let mut gov = CallGovernor::new("test");
        gov.set_min_interval(Some(Duration::milliseconds(60_000)));

        let t0 = at(10);
        assert!(gov.execute_at(t0, || {}, |_| {}));

        let mut reason = None;
        assert!(!gov.execute_at(t0 + Duration::seconds(30), || {}, |r| reason = Some(r)));
        assert_eq!(reason, Some(ThrottleReason::MinInterval));

        // Spaced exactly the interval apart, the call goes through
        assert!(gov.execute_at(t0 + Duration::seconds(60), || {}, |_| {}));
        assert_eq!(gov.total_call_count(), 2);
        assert_eq!(gov.throttled_call_count(), 1);
    }

    #[test]
    fn daily_cap_resets_across_midnight() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_calls_per_day(Some(2));

        let day1 = Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert!(gov.execute_at(day1, || {}, |_| {}));
        assert!(gov.execute_at(day1 + Duration::minutes(1), || {}, |_| {}));

        let mut reason = None;
        assert!(!gov.execute_at(day1 + Duration::minutes(2), || {}, |r| reason = Some(r)));
        assert_eq!(reason, Some(ThrottleReason::DailyCap));
        assert_eq!(gov.calls_today(), 2);

        // Crossing midnight zeroes the counter
        let day2 = Local.with_ymd_and_hms(2026, 3, 11, 0, 10, 0).unwrap();
        assert!(gov.execute_at(day2, || {}, |_| {}));
        assert_eq!(gov.calls_today(), 1);
    }

    #[test]
    fn blackout_window_wraps_past_midnight() {
        let mut gov = CallGovernor::new("test");
        gov.set_blackout_hours(22, 6);

        let mut reason = None;
        assert!(!gov.execute_at(at(23), || {}, |r| reason = Some(r)));
        assert_eq!(reason, Some(ThrottleReason::BlackoutHours));

        assert!(!gov.execute_at(at(2), || {}, |_| {}));
        assert!(gov.execute_at(at(10), || {}, |_| {}));

        assert_eq!(gov.total_call_count(), 1);
        assert_eq!(gov.throttled_call_count(), 2);
    }

    #[test]
    fn non_wrapping_blackout_window() {
        let mut gov = CallGovernor::new("test");
        gov.set_blackout_hours(9, 17);

        assert!(!gov.execute_at(at(9), || {}, |_| {}));
        assert!(!gov.execute_at(at(17), || {}, |_| {}));
        assert!(gov.execute_at(at(8), || {}, |_| {}));
        assert!(gov.execute_at(at(18), || {}, |_| {}));
    }

    #[test]
    fn first_violated_policy_determines_the_reason() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_total_calls(Some(1));
        gov.set_blackout_hours(0, 23);

        // Total cap not yet hit: the blackout violation surfaces
        let mut reason = None;
        assert!(!gov.execute_at(at(12), || {}, |r| reason = Some(r)));
        assert_eq!(reason, Some(ThrottleReason::BlackoutHours));

        gov.reset();
        gov.set_max_total_calls(Some(0));
        gov.set_blackout_hours(0, 23);
        let mut reason = None;
        assert!(!gov.execute_at(at(12), || {}, |r| reason = Some(r)));
        assert_eq!(reason, Some(ThrottleReason::TotalCap));
    }

    #[test]
    fn override_hook_converts_throttle_into_success() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_total_calls(Some(0));
        gov.set_override_hook(Box::new(|reason| reason == ThrottleReason::TotalCap));

        let mut ran = false;
        assert!(gov.execute_at(at(12), || ran = true, |_| {}));
        assert!(ran);

        // Counters reflect a successful call, not a throttled one
        assert_eq!(gov.total_call_count(), 1);
        assert_eq!(gov.calls_today(), 1);
        assert_eq!(gov.throttled_call_count(), 0);
    }

    #[test]
    fn declining_override_hook_keeps_the_throttle() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_total_calls(Some(0));
        gov.set_override_hook(Box::new(|_| false));

        let mut ran = false;
        assert!(!gov.execute_at(at(12), || ran = true, |_| {}));
        assert!(!ran);
        assert_eq!(gov.throttled_call_count(), 1);
    }

    #[test]
    fn force_execute_bypasses_policies_but_counts() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_total_calls(Some(0));

        let mut ran = false;
        assert!(gov.force_execute(|| ran = true));
        assert!(ran);
        assert_eq!(gov.total_call_count(), 1);
        assert_eq!(gov.calls_today(), 1);
        assert!(gov.last_call().is_some());
    }

    #[test]
    fn reset_returns_to_pristine_state() {
        let mut gov = CallGovernor::new("test");
        gov.set_max_total_calls(Some(1));
        gov.set_min_interval(Some(Duration::seconds(60)));
        gov.set_blackout_hours(22, 8);
        gov.set_override_hook(Box::new(|_| true));
        gov.execute_at(at(12), || {}, |_| {});

        gov.reset();
        assert_eq!(gov.total_call_count(), 0);
        assert_eq!(gov.throttled_call_count(), 0);
        assert_eq!(gov.calls_today(), 0);
        assert!(gov.last_call().is_none());

        // All policies gone: back-to-back calls at any hour succeed
        assert!(gov.execute_at(at(23), || {}, |_| {}));
        assert!(gov.execute_at(at(23), || {}, |_| {}));
    }
}
