use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::adapter::DisplayAdapter;
use crate::config::{Config, SchedulerConfig};
use crate::error::SchedulerError;
use crate::mode::{build_mode, elapsed, Mode, ModeKind};
use crate::panel::PanelSelector;

const SLEEP_STEP: Duration = Duration::from_millis(100);

/// Quiet hours: panels are powered off from `off_at` until `on_at`.
///
/// The window may wrap past midnight (23:00 to 07:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSchedule {
    off_at: NaiveTime,
    on_at: NaiveTime,
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    if value == "24:00" {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::parse_from_str(value, "%H:%M").with_context(|| format!("Invalid time '{}', expected HH:MM", value))
}

impl PowerSchedule {
    pub fn parse(off_at: &str, on_at: &str) -> Result<Self> {
        Ok(PowerSchedule {
            off_at: parse_time(off_at).context("Invalid power off time")?,
            on_at: parse_time(on_at).context("Invalid power on time")?,
        })
    }

    pub fn is_quiet(&self, time: NaiveTime) -> bool {
        if self.off_at == self.on_at {
            false
        } else if self.off_at < self.on_at {
            self.off_at <= time && time < self.on_at
        } else {
            time >= self.off_at || time < self.on_at
        }
    }
}

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Uploaded(ModeKind),
    /// Nothing new to show
    Unchanged(ModeKind),
    /// The mode had no data; the cycle moved on
    Skipped(ModeKind),
    Failed(ModeKind),
    Quiet,
}

/// Picks the mode to show each tick and pushes its output to the display
pub struct Scheduler {
    adapter: Box<dyn DisplayAdapter>,
    modes: Vec<Box<dyn Mode>>,
    current: Option<usize>,
    cycle_index: usize,
    last_switch: Option<Instant>,
    cycle_duration: Duration,
    tick_interval: Duration,
    power: Option<PowerSchedule>,
    quiet: bool,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    /// `modes` is the display cycle, in order
    pub fn new(
        adapter: Box<dyn DisplayAdapter>,
        modes: Vec<Box<dyn Mode>>,
        config: &SchedulerConfig,
        power: Option<PowerSchedule>,
    ) -> Result<Self, SchedulerError> {
        if modes.is_empty() {
            return Err(SchedulerError::EmptyCycle);
        }
        for (i, mode) in modes.iter().enumerate() {
            if modes[..i].iter().any(|m| m.kind() == mode.kind()) {
                return Err(SchedulerError::DuplicateMode(mode.kind()));
            }
        }

        Ok(Scheduler {
            adapter,
            modes,
            current: None,
            cycle_index: 0,
            last_switch: None,
            cycle_duration: config.cycle_duration(),
            tick_interval: config.tick_interval(),
            power,
            quiet: false,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Scheduler over the configured cycle, with modes reading their JSON snapshots
    pub fn from_config(config: &Config, adapter: Box<dyn DisplayAdapter>) -> Result<Self> {
        let modes = config
            .scheduler
            .cycle_modes
            .iter()
            .map(|&kind| build_mode(kind, &config.modes))
            .collect();
        let power = config.power.as_ref().map(|p| p.schedule()).transpose()?;
        Ok(Scheduler::new(adapter, modes, &config.scheduler, power)?)
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn current_mode(&self) -> Option<ModeKind> {
        self.current.map(|i| self.modes[i].kind())
    }

    pub fn adapter(&self) -> &dyn DisplayAdapter {
        self.adapter.as_ref()
    }

    fn advance_cycle(&mut self, now: Instant) {
        self.cycle_index = (self.cycle_index + 1) % self.modes.len();
        self.last_switch = Some(now);
        info!("Cycling to: {}", self.modes[self.cycle_index].kind());
    }

    /// Index of the mode that should be on screen at `now`.
    ///
    /// Modes that can claim priority are polled first, so live data is seen
    /// while another mode is showing.
    pub fn select_target(&mut self, now: Instant) -> usize {
        for mode in self.modes.iter_mut().filter(|m| m.watches_priority()) {
            mode.poll(now);
        }
        if let Some(index) = self.modes.iter().position(|m| m.has_priority()) {
            if self.current != Some(index) {
                info!("{} has priority", self.modes[index].kind());
            }
            return index;
        }

        let since = *self.last_switch.get_or_insert(now);
        if elapsed(Some(since), now, self.cycle_duration) {
            self.advance_cycle(now);
        }
        self.cycle_index
    }

    fn check_power(&mut self, wall: NaiveTime) -> bool {
        let quiet = self.power.as_ref().is_some_and(|p| p.is_quiet(wall));
        if quiet != self.quiet {
            let result = if quiet {
                info!("Quiet hours started, powering panels off");
                self.adapter.power_off()
            } else {
                info!("Quiet hours over, powering panels on");
                self.adapter.power_on()
            };
            if let Err(e) = result {
                error!("Power switch failed: {}", e);
            }
            self.quiet = quiet;
            // Whatever shows next starts from a cleared screen
            self.current = None;
        }
        quiet
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.tick_at(now, Local::now().time())
    }

    /// One scheduling step at monotonic time `now` and wall clock `wall`
    pub fn tick_at(&mut self, now: Instant, wall: NaiveTime) -> TickOutcome {
        if self.check_power(wall) {
            return TickOutcome::Quiet;
        }

        let target = self.select_target(now);
        if self.current != Some(target) {
            info!(
                "Switching mode: {} -> {}",
                self.current_mode().map_or("none", |k| k.name()),
                self.modes[target].kind()
            );
            if let Err(e) = self.adapter.clear_screen() {
                warn!("Clear before mode switch failed: {}", e);
            }
            self.modes[target].reset_state();
            self.current = Some(target);
        }

        let (width, height) = (self.adapter.display_width(), self.adapter.display_height());
        let mode = &mut self.modes[target];
        let kind = mode.kind();
        let result = mode.update(width, height, now);

        if result.should_skip {
            info!("No {} data to display, skipping to next mode", kind);
            self.advance_cycle(now);
            self.current = None;
            return TickOutcome::Skipped(kind);
        }
        let Some(image) = result.image else {
            return TickOutcome::Unchanged(kind);
        };

        debug!(mode = %kind, changed = result.state_changed, "Uploading {}x{} image", image.width(), image.height());
        match self.adapter.upload_image(&image, false, &PanelSelector::All) {
            Ok(()) => TickOutcome::Uploaded(kind),
            Err(e) => {
                error!("Upload for {} failed: {}", kind, e);
                if e.is_deadline() {
                    self.advance_cycle(now);
                } else {
                    // The panel may show nothing; render again on the next tick
                    self.modes[target].reset_state();
                }
                TickOutcome::Failed(kind)
            }
        }
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Relaxed) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            thread::sleep(left.min(SLEEP_STEP));
        }
    }

    /// Tick until the running flag is cleared
    pub fn run(&mut self) -> Result<()> {
        if !self.adapter.is_connected() {
            self.adapter.connect().context("Failed to connect to display")?;
        }
        info!(
            "Scheduler running: {} mode(s), {:?} cycle, {:?} tick",
            self.modes.len(),
            self.cycle_duration,
            self.tick_interval
        );

        let mut skipped = 0;
        while self.running.load(Ordering::Relaxed) {
            if let TickOutcome::Skipped(_) = self.tick(Instant::now()) {
                // Move straight on to the next mode, unless every mode is empty
                skipped += 1;
                if skipped < self.modes.len() {
                    continue;
                }
            }
            skipped = 0;
            self.sleep(self.tick_interval);
        }
        Ok(())
    }

    /// Gracefully shutdown - blank the panels and close the links
    pub fn shutdown(&mut self) {
        info!("Shutting down display");
        if self.adapter.is_connected() {
            if let Err(e) = self.adapter.clear_screen() {
                warn!("Clear on shutdown failed: {}", e);
            }
        }
        self.adapter.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterInfo;
    use crate::error::{ConnectionError, TransportError, UploadError};
    use crate::mode::Timing;
    use image::RgbImage;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear,
        Upload(u32, u32),
        PowerOn,
        PowerOff,
        Disconnect,
    }

    struct MockAdapter {
        calls: Rc<RefCell<Vec<Call>>>,
        deadline: Rc<Cell<bool>>,
        fail_once: Rc<Cell<bool>>,
        connected: bool,
    }

    impl DisplayAdapter for MockAdapter {
        fn connect(&mut self) -> Result<(), ConnectionError> {
            self.connected = true;
            Ok(())
        }
        fn disconnect(&mut self) {
            self.connected = false;
            self.calls.borrow_mut().push(Call::Disconnect);
        }
        fn upload_image(
            &mut self,
            image: &RgbImage,
            clear_first: bool,
            panels: &PanelSelector,
        ) -> Result<(), UploadError> {
            assert!(!clear_first);
            assert_eq!(*panels, PanelSelector::All);
            if self.fail_once.replace(false) {
                return Err(TransportError::Closed { panel: 0 }.into());
            }
            if self.deadline.get() {
                return Err(TransportError::DeadlineExceeded { panel: 0, timeout: Duration::from_secs(5) }.into());
            }
            self.calls.borrow_mut().push(Call::Upload(image.width(), image.height()));
            Ok(())
        }
        fn upload_gif(&mut self, _: &[u8], _: bool, _: Option<u32>, _: &PanelSelector) -> Result<(), UploadError> {
            unreachable!("scheduler uploads still images")
        }
        fn clear_screen(&mut self) -> Result<(), UploadError> {
            self.calls.borrow_mut().push(Call::Clear);
            Ok(())
        }
        fn power_on(&mut self) -> Result<(), UploadError> {
            self.calls.borrow_mut().push(Call::PowerOn);
            Ok(())
        }
        fn power_off(&mut self) -> Result<(), UploadError> {
            self.calls.borrow_mut().push(Call::PowerOff);
            Ok(())
        }
        fn display_width(&self) -> u32 {
            64
        }
        fn display_height(&self) -> u32 {
            40
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn get_info(&self) -> AdapterInfo {
            unreachable!("not used by the scheduler")
        }
    }

    struct StubMode {
        kind: ModeKind,
        priority: Rc<Cell<bool>>,
        data: Rc<Cell<bool>>,
        fetches: Rc<Cell<u32>>,
        fetch_fails: Rc<Cell<bool>>,
        timing: Timing,
    }

    impl Mode for StubMode {
        fn kind(&self) -> ModeKind {
            self.kind
        }
        fn timing(&self) -> &Timing {
            &self.timing
        }
        fn timing_mut(&mut self) -> &mut Timing {
            &mut self.timing
        }
        fn fetch_interval(&self) -> Duration {
            Duration::from_secs(60)
        }
        fn refresh_interval(&self) -> Duration {
            Duration::from_secs(2)
        }
        fn fetch_data(&mut self) -> bool {
            self.fetches.set(self.fetches.get() + 1);
            !self.fetch_fails.get()
        }
        fn has_data(&self) -> bool {
            self.data.get()
        }
        fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
            Some(RgbImage::new(width, height))
        }
        fn has_priority(&self) -> bool {
            self.priority.get()
        }
        fn watches_priority(&self) -> bool {
            self.kind == ModeKind::Sports
        }
    }

    struct Harness {
        calls: Rc<RefCell<Vec<Call>>>,
        deadline: Rc<Cell<bool>>,
        fail_once: Rc<Cell<bool>>,
        priority: Rc<Cell<bool>>,
        fetch_fails: Rc<Cell<bool>>,
        data: Vec<Rc<Cell<bool>>>,
        fetches: Vec<Rc<Cell<u32>>>,
    }

    impl Harness {
        fn take_calls(&self) -> Vec<Call> {
            self.calls.borrow_mut().drain(..).collect()
        }
    }

    fn scheduler(kinds: &[ModeKind], power: Option<PowerSchedule>) -> (Scheduler, Harness) {
        let harness = Harness {
            calls: Rc::new(RefCell::new(Vec::new())),
            deadline: Rc::new(Cell::new(false)),
            fail_once: Rc::new(Cell::new(false)),
            priority: Rc::new(Cell::new(false)),
            fetch_fails: Rc::new(Cell::new(false)),
            data: kinds.iter().map(|_| Rc::new(Cell::new(true))).collect(),
            fetches: kinds.iter().map(|_| Rc::new(Cell::new(0))).collect(),
        };
        let modes: Vec<Box<dyn Mode>> = kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| {
                let priority = if kind == ModeKind::Sports { Rc::clone(&harness.priority) } else { Rc::new(Cell::new(false)) };
                Box::new(StubMode {
                    kind,
                    priority,
                    data: Rc::clone(&harness.data[i]),
                    fetches: Rc::clone(&harness.fetches[i]),
                    fetch_fails: Rc::clone(&harness.fetch_fails),
                    timing: Timing::default(),
                }) as Box<dyn Mode>
            })
            .collect();
        let adapter = MockAdapter {
            calls: Rc::clone(&harness.calls),
            deadline: Rc::clone(&harness.deadline),
            fail_once: Rc::clone(&harness.fail_once),
            connected: true,
        };
        let config = SchedulerConfig { cycle_modes: kinds.to_vec(), cycle_seconds: 300, tick_seconds: 2 };
        let scheduler = Scheduler::new(Box::new(adapter), modes, &config, power).unwrap();
        (scheduler, harness)
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_duplicate_cycles() {
        let (_, harness) = scheduler(&[ModeKind::Clock], None);
        let adapter = || -> Box<dyn DisplayAdapter> {
            Box::new(MockAdapter {
                calls: Rc::clone(&harness.calls),
                deadline: Rc::new(Cell::new(false)),
                fail_once: Rc::new(Cell::new(false)),
                connected: false,
            })
        };
        let config = SchedulerConfig::default();
        assert_eq!(Scheduler::new(adapter(), Vec::new(), &config, None).err(), Some(SchedulerError::EmptyCycle));

        let stub = |kind| -> Box<dyn Mode> {
            Box::new(StubMode {
                kind,
                priority: Rc::new(Cell::new(false)),
                data: Rc::new(Cell::new(true)),
                fetches: Rc::new(Cell::new(0)),
                fetch_fails: Rc::new(Cell::new(false)),
                timing: Timing::default(),
            })
        };
        let modes = vec![stub(ModeKind::Clock), stub(ModeKind::Weather), stub(ModeKind::Clock)];
        assert_eq!(
            Scheduler::new(adapter(), modes, &config, None).err(),
            Some(SchedulerError::DuplicateMode(ModeKind::Clock))
        );
    }

    #[test]
    fn test_first_tick_clears_then_uploads() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Weather], None);
        let t0 = Instant::now();

        assert_eq!(scheduler.tick_at(t0, noon()), TickOutcome::Uploaded(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::Clear, Call::Upload(64, 40)]);

        // Same mode, refresh interval not reached
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(1), noon()), TickOutcome::Unchanged(ModeKind::Clock));
        assert!(harness.take_calls().is_empty());
    }

    #[test]
    fn test_cycle_advances_by_exactly_one() {
        let kinds = [ModeKind::Clock, ModeKind::Weather, ModeKind::Stocks];
        let (mut scheduler, _harness) = scheduler(&kinds, None);
        let t0 = Instant::now();
        let secs = |s| t0 + Duration::from_secs(s);

        scheduler.tick_at(t0, noon());
        assert_eq!(scheduler.current_mode(), Some(ModeKind::Clock));
        scheduler.tick_at(secs(299), noon());
        assert_eq!(scheduler.current_mode(), Some(ModeKind::Clock));

        for (elapsed, expected) in [(300, ModeKind::Weather), (600, ModeKind::Stocks), (900, ModeKind::Clock)] {
            scheduler.tick_at(secs(elapsed), noon());
            assert_eq!(scheduler.current_mode(), Some(expected));
            // A second tick in the same instant never advances again
            scheduler.tick_at(secs(elapsed), noon());
            assert_eq!(scheduler.current_mode(), Some(expected));
        }
    }

    #[test]
    fn test_priority_mode_wins() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Sports], None);
        harness.priority.set(true);

        assert_eq!(scheduler.tick_at(Instant::now(), noon()), TickOutcome::Uploaded(ModeKind::Sports));
        assert_eq!(scheduler.current_mode(), Some(ModeKind::Sports));
    }

    #[test]
    fn test_priority_holds_after_cycle_elapsed() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Sports], None);
        let t0 = Instant::now();
        let secs = |s| t0 + Duration::from_secs(s);

        scheduler.tick_at(t0, noon());
        harness.priority.set(true);
        assert_eq!(scheduler.tick_at(secs(10), noon()), TickOutcome::Uploaded(ModeKind::Sports));

        // The cycle timer runs out while sports still has priority
        assert_eq!(scheduler.tick_at(secs(301), noon()), TickOutcome::Uploaded(ModeKind::Sports));
        assert_eq!(scheduler.tick_at(secs(700), noon()), TickOutcome::Uploaded(ModeKind::Sports));
        assert_eq!(scheduler.current_mode(), Some(ModeKind::Sports));
    }

    #[test]
    fn test_quiet_hours_override_priority() {
        let power = PowerSchedule::parse("23:00", "07:00").unwrap();
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Sports], Some(power));
        harness.priority.set(true);
        let t0 = Instant::now();

        assert_eq!(scheduler.tick_at(t0, at(23, 30)), TickOutcome::Quiet);
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(2), at(23, 31)), TickOutcome::Quiet);
        assert_eq!(harness.take_calls(), vec![Call::PowerOff]);
        assert_eq!(scheduler.current_mode(), None);

        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(4), at(7, 0)), TickOutcome::Uploaded(ModeKind::Sports));
        assert_eq!(harness.take_calls(), vec![Call::PowerOn, Call::Clear, Call::Upload(64, 40)]);
    }

    #[test]
    fn test_failing_watcher_fetched_once_per_tick() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Sports, ModeKind::Clock], None);
        harness.fetch_fails.set(true);
        let t0 = Instant::now();

        // Sports is the cycle mode and the priority watcher at the same time
        scheduler.tick_at(t0, noon());
        assert_eq!(harness.fetches[0].get(), 1);
        scheduler.tick_at(t0 + Duration::from_secs(2), noon());
        assert_eq!(harness.fetches[0].get(), 2);
    }

    #[test]
    fn test_priority_watcher_polled_in_background() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Sports], None);
        let t0 = Instant::now();

        scheduler.tick_at(t0, noon());
        assert_eq!(scheduler.current_mode(), Some(ModeKind::Clock));
        assert_eq!(harness.fetches[1].get(), 1);

        scheduler.tick_at(t0 + Duration::from_secs(60), noon());
        assert_eq!(harness.fetches[1].get(), 2);
        assert_eq!(harness.fetches[0].get(), 2);
    }

    #[test]
    fn test_priority_loss_returns_to_cycle() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Sports], None);
        let t0 = Instant::now();

        scheduler.tick_at(t0, noon());
        harness.take_calls();

        harness.priority.set(true);
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(10), noon()), TickOutcome::Uploaded(ModeKind::Sports));
        assert_eq!(harness.take_calls(), vec![Call::Clear, Call::Upload(64, 40)]);

        harness.priority.set(false);
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(20), noon()), TickOutcome::Uploaded(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::Clear, Call::Upload(64, 40)]);
    }

    #[test]
    fn test_skip_advances_cycle() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Stocks, ModeKind::Clock], None);
        harness.data[0].set(false);
        let t0 = Instant::now();

        assert_eq!(scheduler.tick_at(t0, noon()), TickOutcome::Skipped(ModeKind::Stocks));
        assert_eq!(scheduler.current_mode(), None);
        assert_eq!(scheduler.tick_at(t0, noon()), TickOutcome::Uploaded(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::Clear, Call::Clear, Call::Upload(64, 40)]);
    }

    #[test]
    fn test_deadline_moves_on() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Weather], None);
        harness.deadline.set(true);
        let t0 = Instant::now();

        assert_eq!(scheduler.tick_at(t0, noon()), TickOutcome::Failed(ModeKind::Clock));
        harness.deadline.set(false);
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(1), noon()), TickOutcome::Uploaded(ModeKind::Weather));
    }

    #[test]
    fn test_failed_upload_retried_next_tick() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock, ModeKind::Weather], None);
        harness.fail_once.set(true);
        let t0 = Instant::now();

        assert_eq!(scheduler.tick_at(t0, noon()), TickOutcome::Failed(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::Clear]);

        // Refresh interval not reached, but the panel never got the image
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(1), noon()), TickOutcome::Uploaded(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::Upload(64, 40)]);
    }

    #[test]
    fn test_quiet_hours_power_cycle() {
        let power = PowerSchedule::parse("23:00", "07:00").unwrap();
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock], Some(power));
        let t0 = Instant::now();

        scheduler.tick_at(t0, at(22, 59));
        harness.take_calls();

        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(60), at(23, 0)), TickOutcome::Quiet);
        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(120), at(3, 0)), TickOutcome::Quiet);
        assert_eq!(harness.take_calls(), vec![Call::PowerOff]);

        assert_eq!(scheduler.tick_at(t0 + Duration::from_secs(180), at(7, 0)), TickOutcome::Uploaded(ModeKind::Clock));
        assert_eq!(harness.take_calls(), vec![Call::PowerOn, Call::Clear, Call::Upload(64, 40)]);
    }

    #[test]
    fn test_shutdown_clears_and_disconnects() {
        let (mut scheduler, harness) = scheduler(&[ModeKind::Clock], None);
        scheduler.shutdown();
        assert_eq!(harness.take_calls(), vec![Call::Clear, Call::Disconnect]);
        assert!(!scheduler.adapter().is_connected());

        // Already disconnected: nothing to clear
        scheduler.shutdown();
        assert_eq!(harness.take_calls(), vec![Call::Disconnect]);
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let (mut scheduler, _harness) = scheduler(&[ModeKind::Clock], None);
        scheduler.get_running_flag().store(false, Ordering::Relaxed);
        scheduler.run().unwrap();
    }

    #[test]
    fn test_power_schedule_parse() {
        assert!(PowerSchedule::parse("25:99", "07:00").is_err());
        assert!(PowerSchedule::parse("23:00", "seven").is_err());

        let midnight = PowerSchedule::parse("24:00", "06:30").unwrap();
        assert!(midnight.is_quiet(at(0, 0)));
        assert!(midnight.is_quiet(at(6, 29)));
        assert!(!midnight.is_quiet(at(6, 30)));
        assert!(!midnight.is_quiet(at(23, 59)));
    }

    #[test]
    fn test_power_schedule_windows() {
        let day = PowerSchedule::parse("09:00", "17:00").unwrap();
        assert!(!day.is_quiet(at(8, 59)));
        assert!(day.is_quiet(at(9, 0)));
        assert!(!day.is_quiet(at(17, 0)));

        let night = PowerSchedule::parse("22:30", "07:00").unwrap();
        assert!(night.is_quiet(at(22, 30)));
        assert!(night.is_quiet(at(2, 0)));
        assert!(!night.is_quiet(at(12, 0)));

        let never = PowerSchedule::parse("08:00", "08:00").unwrap();
        assert!(!never.is_quiet(at(8, 0)));
    }
}
