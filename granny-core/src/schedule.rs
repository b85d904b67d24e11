//! Daily reminder scheduling.
//!
//! [`next_fire_delay`] is the pure timing policy. [`NotificationScheduler`]
//! keeps at most one armed timer per notification identity and re-arms it for
//! the following day after every delivery.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

/// Never fire sooner than this after (re)scheduling.
pub const MIN_FIRE_DELAY: Duration = Duration::from_secs(60);

/// Identity of the one daily weather reminder.
pub const DAILY_IDENTITY: &str = "granny_daily_weather";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid notification time {hour:02}:{minute:02}")]
pub struct InvalidTime {
    pub hour: u32,
    pub minute: u32,
}

/// Wall-clock time of day a reminder fires, at second zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTime(NaiveTime);

impl NotificationTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, InvalidTime> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or(InvalidTime { hour, minute })
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for NotificationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Map a local wall-clock time to an instant. Ambiguous times (DST fall-back)
/// take the earlier instant; times in a DST gap slide forward an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
}

/// The first `time` on or after `now`, in `now`'s timezone.
pub fn next_fire_at<Tz: TimeZone>(time: NotificationTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let at = |date: NaiveDate| resolve_local(&tz, date.and_time(time.as_naive()));

    match at(today) {
        Some(candidate) if candidate >= *now => candidate,
        _ => today
            .succ_opt()
            .and_then(at)
            .unwrap_or_else(|| now.clone() + TimeDelta::days(1)),
    }
}

/// Delay until the next `time`, never shorter than [`MIN_FIRE_DELAY`].
pub fn next_fire_delay<Tz: TimeZone>(time: NotificationTime, now: &DateTime<Tz>) -> Duration {
    let next = next_fire_at(time, now);
    let raw = next.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
    raw.max(MIN_FIRE_DELAY)
}

/// Delay until the occurrence following the one just delivered. The wall
/// clock may still read slightly before `delivered` when the timer wakes, so
/// the search starts strictly after it.
fn delay_after_delivery(
    time: NotificationTime,
    delivered: DateTime<Local>,
    now: &DateTime<Local>,
) -> Duration {
    let from = after(&delivered, Duration::from_secs(1)).max(*now);
    let next = next_fire_at(time, &from);
    let raw = next.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
    raw.max(MIN_FIRE_DELAY)
}

fn after(now: &DateTime<Local>, delay: Duration) -> DateTime<Local> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(*now)
}

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub identity: String,
    pub message: String,
    pub fired_at: DateTime<Local>,
}

/// Hands fired notifications to whatever displays them.
pub trait NotificationSink: Send + Sync + Debug {
    fn deliver(&self, notification: &Notification);
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn deliver(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            debug!(identity = %notification.identity, "notification receiver dropped");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleState {
    Unscheduled,
    Scheduled {
        time: NotificationTime,
        message: String,
        next_fire_at: DateTime<Local>,
    },
}

struct Entry {
    generation: u64,
    time: NotificationTime,
    message: String,
    next_fire_at: DateTime<Local>,
    task: JoinHandle<()>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    entries: Mutex<HashMap<String, Entry>>,
    generations: AtomicU64,
}

impl Inner {
    /// Deliver if `generation` still owns `identity`, then record the next
    /// fire time. Returns the delay to sleep, or `None` once superseded.
    fn fire(&self, identity: &str, generation: u64) -> Option<Duration> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(identity).filter(|e| e.generation == generation)?;

        let now = self.clock.now();
        let notification = Notification {
            identity: identity.to_string(),
            message: entry.message.clone(),
            fired_at: now,
        };
        self.sink.deliver(&notification);

        let delay = delay_after_delivery(entry.time, entry.next_fire_at, &now);
        entry.next_fire_at = after(&now, delay);
        info!(identity, next_fire_at = %entry.next_fire_at, "notification delivered, re-armed");
        Some(delay)
    }
}

/// Per-identity daily timers. Dropping the scheduler cancels every timer.
pub struct NotificationScheduler {
    inner: Arc<Inner>,
}

impl Debug for NotificationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("active", &self.active_count())
            .finish()
    }
}

impl NotificationScheduler {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    pub fn with_clock(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                sink,
                entries: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Arm (or re-arm) the daily timer for `identity`, replacing any timer
    /// already armed for it. Returns the delay until the first delivery.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &self,
        identity: &str,
        time: NotificationTime,
        message: impl Into<String>,
    ) -> Duration {
        let message = message.into();
        let now = self.inner.clock.now();
        let delay = next_fire_delay(time, &now);
        let next_fire_at = after(&now, delay);
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.inner.entries.lock();
        if let Some(previous) = entries.remove(identity) {
            previous.task.abort();
            debug!(identity, "replaced previously scheduled notification");
        }

        let task = tokio::spawn(run_timer(
            Arc::clone(&self.inner),
            identity.to_string(),
            generation,
            delay,
        ));
        entries.insert(
            identity.to_string(),
            Entry { generation, time, message, next_fire_at, task },
        );

        info!(identity, %time, %next_fire_at, delay_secs = delay.as_secs(), "notification scheduled");
        delay
    }

    /// Disarm `identity`. Returns whether a timer was armed.
    pub fn cancel(&self, identity: &str) -> bool {
        match self.inner.entries.lock().remove(identity) {
            Some(entry) => {
                entry.task.abort();
                info!(identity, "notification cancelled");
                true
            }
            None => false,
        }
    }

    pub fn state(&self, identity: &str) -> ScheduleState {
        match self.inner.entries.lock().get(identity) {
            Some(entry) => ScheduleState::Scheduled {
                time: entry.time,
                message: entry.message.clone(),
                next_fire_at: entry.next_fire_at,
            },
            None => ScheduleState::Unscheduled,
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.entries.lock().len()
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        for (_, entry) in self.inner.entries.lock().drain() {
            entry.task.abort();
        }
    }
}

async fn run_timer(inner: Arc<Inner>, identity: String, generation: u64, first_delay: Duration) {
    let mut delay = first_delay;
    loop {
        tokio::time::sleep(delay).await;
        match inner.fire(&identity, generation) {
            Some(next) => delay = next,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid utc time")
    }

    fn seven_thirty() -> NotificationTime {
        NotificationTime::new(7, 30).expect("valid time")
    }

    #[test]
    fn rejects_out_of_range_times() {
        assert!(NotificationTime::new(23, 59).is_ok());
        assert_eq!(NotificationTime::new(24, 0).unwrap_err(), InvalidTime { hour: 24, minute: 0 });
        assert!(NotificationTime::new(7, 60).is_err());
    }

    #[test]
    fn before_target_lands_today() {
        let now = utc(2024, 6, 12, 6, 15, 42);
        let delay = next_fire_delay(seven_thirty(), &now);
        let landing = now + TimeDelta::from_std(delay).expect("in range");

        assert_eq!(landing, utc(2024, 6, 12, 7, 30, 0));
        assert_eq!(landing.nanosecond(), 0);
    }

    #[test]
    fn after_target_lands_tomorrow() {
        let now = utc(2024, 6, 12, 8, 0, 0);
        let delay = next_fire_delay(seven_thirty(), &now);
        let landing = now + TimeDelta::from_std(delay).expect("in range");

        assert_eq!(landing, utc(2024, 6, 13, 7, 30, 0));
    }

    #[test]
    fn end_of_month_and_year_roll_over() {
        let now = utc(2024, 12, 31, 23, 0, 0);
        assert_eq!(next_fire_at(seven_thirty(), &now), utc(2025, 1, 1, 7, 30, 0));
    }

    #[test]
    fn exact_target_is_floored_not_skipped() {
        let now = utc(2024, 6, 12, 7, 30, 0);
        assert_eq!(next_fire_at(seven_thirty(), &now), now);
        assert_eq!(next_fire_delay(seven_thirty(), &now), MIN_FIRE_DELAY);
    }

    #[test]
    fn within_the_floor_is_floored() {
        let now = utc(2024, 6, 12, 7, 29, 30);
        assert_eq!(next_fire_delay(seven_thirty(), &now), MIN_FIRE_DELAY);
    }

    #[test]
    fn respects_the_clock_timezone() {
        let istanbul = chrono::FixedOffset::east_opt(3 * 3600).expect("offset");
        // 05:00 UTC is 08:00 in Istanbul, already past 07:30 there
        let now = utc(2024, 6, 12, 5, 0, 0).with_timezone(&istanbul);
        let next = next_fire_at(seven_thirty(), &now);

        assert_eq!(next.with_timezone(&Utc), utc(2024, 6, 13, 4, 30, 0));
    }

    #[derive(Debug)]
    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    #[derive(Debug)]
    struct SettableClock(Mutex<DateTime<Local>>);

    impl SettableClock {
        fn set(&self, now: DateTime<Local>) {
            *self.0.lock() = now;
        }
    }

    impl Clock for SettableClock {
        fn now(&self) -> DateTime<Local> {
            *self.0.lock()
        }
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("unambiguous local time")
    }

    fn six_am() -> DateTime<Local> {
        local(2024, 6, 12, 6, 0, 0)
    }

    fn scheduler() -> (NotificationScheduler, mpsc::UnboundedReceiver<Notification>) {
        let (sink, rx) = ChannelSink::new();
        let scheduler =
            NotificationScheduler::with_clock(Arc::new(sink), Arc::new(FixedClock(six_am())));
        (scheduler, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn unscheduled_until_scheduled() {
        let (scheduler, _rx) = scheduler();
        assert_eq!(scheduler.state(DAILY_IDENTITY), ScheduleState::Unscheduled);

        let delay = scheduler.schedule(DAILY_IDENTITY, seven_thirty(), "Take an umbrella");
        assert_eq!(delay, Duration::from_secs(90 * 60));

        match scheduler.state(DAILY_IDENTITY) {
            ScheduleState::Scheduled { time, message, next_fire_at } => {
                assert_eq!(time, seven_thirty());
                assert_eq!(message, "Take an umbrella");
                assert_eq!(next_fire_at, six_am() + TimeDelta::minutes(90));
            }
            other => panic!("expected scheduled, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_and_rearms() {
        let (scheduler, mut rx) = scheduler();
        let delay = scheduler.schedule(DAILY_IDENTITY, seven_thirty(), "Wrap up warm");

        tokio::time::sleep(delay + Duration::from_secs(1)).await;

        let fired = rx.try_recv().expect("one notification delivered");
        assert_eq!(fired.identity, DAILY_IDENTITY);
        assert_eq!(fired.message, "Wrap up warm");
        assert!(rx.try_recv().is_err());

        match scheduler.state(DAILY_IDENTITY) {
            ScheduleState::Scheduled { next_fire_at, .. } => {
                assert_eq!(next_fire_at, local(2024, 6, 13, 7, 30, 0));
            }
            other => panic!("expected scheduled, got {other:?}"),
        }
        assert_eq!(scheduler.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_wall_clock_still_rearms_for_tomorrow() {
        let clock = Arc::new(SettableClock(Mutex::new(six_am())));
        let (sink, mut rx) = ChannelSink::new();
        let scheduler = NotificationScheduler::with_clock(Arc::new(sink), clock.clone());

        let delay = scheduler.schedule(DAILY_IDENTITY, seven_thirty(), "Take an umbrella");
        // the monotonic timer wakes while the wall clock still reads 07:29:59
        clock.set(local(2024, 6, 12, 7, 29, 59));

        tokio::time::sleep(delay + MIN_FIRE_DELAY + Duration::from_secs(1)).await;

        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, 1);

        match scheduler.state(DAILY_IDENTITY) {
            ScheduleState::Scheduled { next_fire_at, .. } => {
                assert_eq!(next_fire_at, local(2024, 6, 13, 7, 30, 0));
            }
            other => panic!("expected scheduled, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_instead_of_duplicating() {
        let (scheduler, mut rx) = scheduler();
        scheduler.schedule(DAILY_IDENTITY, seven_thirty(), "old message");
        let time = NotificationTime::new(6, 30).expect("valid time");
        scheduler.schedule(DAILY_IDENTITY, time, "new message");

        assert_eq!(scheduler.active_count(), 1);

        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;

        let mut delivered = Vec::new();
        while let Ok(n) = rx.try_recv() {
            delivered.push(n.message);
        }
        assert_eq!(delivered, vec!["new message".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_fire_delivers_nothing() {
        let (scheduler, mut rx) = scheduler();
        scheduler.schedule(DAILY_IDENTITY, seven_thirty(), "never sent");

        assert!(scheduler.cancel(DAILY_IDENTITY));
        assert!(!scheduler.cancel(DAILY_IDENTITY));
        assert_eq!(scheduler.state(DAILY_IDENTITY), ScheduleState::Unscheduled);

        tokio::time::sleep(Duration::from_secs(48 * 3600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn identities_are_independent() {
        let (scheduler, _rx) = scheduler();
        scheduler.schedule("morning", seven_thirty(), "a");
        scheduler.schedule("evening", NotificationTime::new(19, 0).expect("valid"), "b");

        assert_eq!(scheduler.active_count(), 2);
        scheduler.cancel("morning");
        assert_eq!(scheduler.state("morning"), ScheduleState::Unscheduled);
        assert!(matches!(scheduler.state("evening"), ScheduleState::Scheduled { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reschedules_leave_one_timer() {
        let (scheduler, _rx) = scheduler();
        let scheduler = Arc::new(scheduler);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler.schedule(DAILY_IDENTITY, seven_thirty(), format!("message {i}"));
                })
            })
            .collect();
        for t in tasks {
            t.await.expect("task");
        }

        assert_eq!(scheduler.active_count(), 1);
    }
}
