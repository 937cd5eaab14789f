//! Scheduled execution of pipeline runs.
//!
//! The scheduler holds an optional daily and an optional weekly schedule
//! (times in UTC) and runs the pipeline when one comes due. Exactly one run
//! is ever in flight: a trigger that comes due while a run is still executing
//! is not queued and not run in parallel, it is simply skipped, and the next
//! occurrence is computed after the run finishes. Run failures never stop the
//! scheduler; the next occurrence is always armed.

use super::*;

/// A daily trigger at a fixed UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
  /// Hour of day, 0..=23
  hour:   u32,
  /// Minute, 0..=59
  minute: u32,
}

impl DailySchedule {
  /// Creates a daily schedule, rejecting out-of-range times.
  pub fn new(hour: u32, minute: u32) -> Result<Self> {
    if hour > 23 || minute > 59 {
      return Err(ScoutError::Config(format!("invalid daily time {hour:02}:{minute:02}")));
    }
    Ok(Self { hour, minute })
  }

  /// The first occurrence strictly after `now`.
  pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = at_time(now.date_naive(), self.hour, self.minute);
    if candidate > now {
      candidate
    } else {
      candidate + chrono::Duration::days(1)
    }
  }
}

/// A weekly trigger at a fixed UTC weekday and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
  /// Day of week
  weekday: Weekday,
  /// Hour of day, 0..=23
  hour:    u32,
  /// Minute, 0..=59
  minute:  u32,
}

impl WeeklySchedule {
  /// Creates a weekly schedule, rejecting out-of-range times.
  pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Result<Self> {
    if hour > 23 || minute > 59 {
      return Err(ScoutError::Config(format!("invalid weekly time {hour:02}:{minute:02}")));
    }
    Ok(Self { weekday, hour, minute })
  }

  /// The first occurrence strictly after `now`.
  pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = (self.weekday.num_days_from_monday() + 7
      - now.weekday().num_days_from_monday())
      % 7;
    let date = now.date_naive() + chrono::Duration::days(i64::from(days_ahead));
    let candidate = at_time(date, self.hour, self.minute);
    if candidate > now {
      candidate
    } else {
      candidate + chrono::Duration::days(7)
    }
  }
}

/// Midnight of `date` plus the given time of day, in UTC.
fn at_time(date: chrono::NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
  date.and_time(chrono::NaiveTime::default()).and_utc()
    + chrono::Duration::hours(i64::from(hour))
    + chrono::Duration::minutes(i64::from(minute))
}

/// Lifecycle of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  /// Waiting for the next trigger
  Idle,
  /// A run is executing
  Running,
  /// The loop has exited
  Stopped,
}

/// Drives pipeline runs from the configured schedules.
pub struct Scheduler {
  /// The pipeline executed on each trigger
  pipeline:        Pipeline,
  /// Daily trigger, if enabled
  daily:           Option<DailySchedule>,
  /// Weekly trigger, if enabled
  weekly:          Option<WeeklySchedule>,
  /// Current lifecycle state
  state:           SchedulerState,
  /// Set for the duration of exactly one run
  run_in_progress: bool,
}

impl Scheduler {
  /// Creates a scheduler over explicit schedules.
  pub fn new(
    pipeline: Pipeline,
    daily: Option<DailySchedule>,
    weekly: Option<WeeklySchedule>,
  ) -> Self {
    Self { pipeline, daily, weekly, state: SchedulerState::Idle, run_in_progress: false }
  }

  /// Creates a scheduler from the schedule section of the configuration.
  pub fn from_config(config: &Config, pipeline: Pipeline) -> Result<Self> {
    let daily = if config.schedule.daily_enabled {
      let (hour, minute) = crate::config::parse_time(&config.schedule.daily_time)?;
      Some(DailySchedule::new(hour, minute)?)
    } else {
      None
    };
    let weekly = if config.schedule.weekly_enabled {
      let weekday = crate::config::parse_weekday(&config.schedule.weekly_day)?;
      let (hour, minute) = crate::config::parse_time(&config.schedule.weekly_time)?;
      Some(WeeklySchedule::new(weekday, hour, minute)?)
    } else {
      None
    };
    Ok(Self::new(pipeline, daily, weekly))
  }

  /// Current lifecycle state.
  pub fn state(&self) -> SchedulerState { self.state }

  /// The next trigger strictly after `now`, or `None` when no schedule is
  /// enabled. When daily and weekly land on the same instant, daily wins.
  pub fn next_due(&self, now: DateTime<Utc>) -> Option<(DigestKind, DateTime<Utc>)> {
    let daily = self.daily.map(|s| (DigestKind::Daily, s.next_after(now)));
    let weekly = self.weekly.map(|s| (DigestKind::Weekly, s.next_after(now)));
    match (daily, weekly) {
      (Some(d), Some(w)) if w.1 < d.1 => Some(w),
      (Some(d), _) => Some(d),
      (None, w) => w,
    }
  }

  /// Marks a run as started unless one is already in flight.
  pub fn try_begin(&mut self) -> bool {
    if self.run_in_progress {
      return false;
    }
    self.run_in_progress = true;
    true
  }

  /// Executes one run immediately, then stops.
  pub async fn run_once(&mut self, kind: DigestKind) -> RunResult {
    self.run_in_progress = true;
    self.state = SchedulerState::Running;
    let result = self.pipeline.execute(kind).await;
    self.run_in_progress = false;
    self.state = SchedulerState::Stopped;
    result
  }

  /// Runs scheduled triggers until no schedule remains enabled.
  ///
  /// Each iteration recomputes the next occurrence from the current time, so
  /// a trigger that came due while the previous run was executing is skipped
  /// rather than fired late or in parallel.
  pub async fn run_forever(&mut self) {
    loop {
      let Some((kind, due)) = self.next_due(Utc::now()) else {
        info!("no schedules enabled, stopping");
        self.state = SchedulerState::Stopped;
        return;
      };

      self.state = SchedulerState::Idle;
      info!("next {kind} run due at {due}");
      let wait = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
      tokio::time::sleep(wait).await;

      if !self.try_begin() {
        continue;
      }
      self.state = SchedulerState::Running;
      self.pipeline.execute(kind).await;
      self.run_in_progress = false;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
  }

  #[test]
  fn daily_next_occurrence_is_today_or_tomorrow() {
    let schedule = DailySchedule::new(9, 0).unwrap();
    // Before today's trigger: fires today.
    assert_eq!(schedule.next_after(at(2024, 6, 3, 7, 0)), at(2024, 6, 3, 9, 0));
    // At or after today's trigger: fires tomorrow.
    assert_eq!(schedule.next_after(at(2024, 6, 3, 9, 0)), at(2024, 6, 4, 9, 0));
    assert_eq!(schedule.next_after(at(2024, 6, 3, 23, 59)), at(2024, 6, 4, 9, 0));
  }

  #[test]
  fn weekly_next_occurrence_lands_on_the_weekday() {
    // 2024-06-03 is a Monday.
    let schedule = WeeklySchedule::new(Weekday::Mon, 8, 0).unwrap();
    assert_eq!(schedule.next_after(at(2024, 6, 3, 7, 0)), at(2024, 6, 3, 8, 0));
    assert_eq!(schedule.next_after(at(2024, 6, 3, 8, 0)), at(2024, 6, 10, 8, 0));
    assert_eq!(schedule.next_after(at(2024, 6, 5, 12, 0)), at(2024, 6, 10, 8, 0));
  }

  #[test]
  fn out_of_range_times_are_rejected() {
    assert!(DailySchedule::new(24, 0).is_err());
    assert!(WeeklySchedule::new(Weekday::Mon, 8, 60).is_err());
  }

  #[test]
  fn missed_trigger_is_skipped_not_queued() {
    // A run that started before 09:00 and overran to 09:30 never sees the
    // 09:00 trigger again; the next occurrence is tomorrow.
    let schedule = DailySchedule::new(9, 0).unwrap();
    let after_overrun = at(2024, 6, 3, 9, 30);
    assert_eq!(schedule.next_after(after_overrun), at(2024, 6, 4, 9, 0));
  }

  fn idle_scheduler(daily: Option<DailySchedule>, weekly: Option<WeeklySchedule>) -> Scheduler {
    struct NoSource;

    #[async_trait]
    impl PaperSource for NoSource {
      async fn fetch(&self, _: &BTreeSet<String>, _: TimeWindow) -> Result<Vec<Paper>> {
        Ok(Vec::new())
      }
    }

    struct NoModel;

    #[async_trait]
    impl crate::analyzer::LanguageModel for NoModel {
      async fn complete(&self, _: &str) -> Result<String> {
        Ok("{}".to_string())
      }
    }

    let pipeline = Pipeline::new(
      Box::new(NoSource),
      RelevanceFilter::new(["cs.AI".to_string()], [], [], [], true, 0.0),
      Analyzer::new(Arc::new(NoModel), AnalyzerSettings::default()),
      vec![],
      PipelineSettings {
        min_significance: 0.4,
        enabled_formats:  vec![OutputFormat::Json],
        run_timeout:      Duration::from_secs(60),
        dry_run:          true,
        lookback_days:    1,
      },
      None,
    );
    Scheduler::new(pipeline, daily, weekly)
  }

  #[test]
  fn next_due_picks_the_earlier_schedule_and_ties_go_daily() {
    let daily = DailySchedule::new(9, 0).unwrap();
    let weekly = WeeklySchedule::new(Weekday::Mon, 8, 0).unwrap();
    let scheduler = idle_scheduler(Some(daily), Some(weekly));

    // Monday morning: weekly 08:00 beats daily 09:00.
    let (kind, due) = scheduler.next_due(at(2024, 6, 3, 6, 0)).unwrap();
    assert_eq!(kind, DigestKind::Weekly);
    assert_eq!(due, at(2024, 6, 3, 8, 0));

    // Same instant for both: daily wins.
    let tie = idle_scheduler(Some(daily), Some(WeeklySchedule::new(Weekday::Mon, 9, 0).unwrap()));
    let (kind, _) = tie.next_due(at(2024, 6, 3, 6, 0)).unwrap();
    assert_eq!(kind, DigestKind::Daily);
  }

  #[test]
  fn no_schedules_means_nothing_due() {
    let scheduler = idle_scheduler(None, None);
    assert!(scheduler.next_due(Utc::now()).is_none());
  }

  #[test]
  fn try_begin_rejects_a_second_run() {
    let mut scheduler = idle_scheduler(Some(DailySchedule::new(9, 0).unwrap()), None);
    assert!(scheduler.try_begin());
    assert!(!scheduler.try_begin());
  }

  #[tokio::test]
  async fn run_once_executes_and_stops() {
    let mut scheduler = idle_scheduler(None, None);
    let result = scheduler.run_once(DigestKind::Manual).await;
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
  }
}
