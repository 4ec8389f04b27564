/// Daemon lifecycle: Initializing → Running → ShuttingDown → Terminated.
///
/// Initializing: bring the LED driver up (fatal on failure), connect the
///   vehicle link (fatal on failure: arms flash red, driver released), clear
///   the arms and subscribe the reactor.
/// Running: install termination-signal handlers and sleep until a stop is
///   requested. Signal handlers only flip the run flag.
/// ShuttingDown: unsubscribe and join the reactor, close the link, optionally
///   clear + render, release the driver.
/// Terminated: hand the exit status back to `main`.

use crate::config::Config;
use crate::driver::{ChannelConfig, LedDriver};
use crate::error::Error;
use crate::flight_mode::FlightMode;
use crate::lights::{self, Lights};
use crate::link::{LinkError, LinkStreams};
use crate::palette::ColorTable;
use crate::reactor::Reactor;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Initializing => f.write_str("initializing"),
            Phase::Running => f.write_str("running"),
            Phase::ShuttingDown => f.write_str("shutting down"),
            Phase::Terminated => f.write_str("terminated"),
        }
    }
}

/// Shared run flag. Goes from running to stop-requested once, never back.
#[derive(Clone)]
pub struct RunState {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Returns true only for the request that flipped the flag.
    pub fn request_stop(&self) -> bool {
        self.tx.send_if_modified(|stop| {
            if *stop {
                false
            } else {
                *stop = true;
                true
            }
        })
    }

    /// Sleep until a stop has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|&stop| stop).await;
    }
}

/// Route SIGINT/SIGTERM to [`RunState::request_stop`]. Repeated signals are no-ops.
pub fn install_signal_handlers(run_state: &RunState) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;
        let state = run_state.clone();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    r = term.recv() => r,
                    r = int.recv() => r,
                };
                if received.is_none() {
                    break;
                }
                state.request_stop();
            }
        });
    }
    #[cfg(not(unix))]
    {
        let state = run_state.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                state.request_stop();
            }
        });
    }
    Ok(())
}

/// Everything the daemon needs besides the driver and the link.
pub struct Daemon {
    channels: Vec<ChannelConfig>,
    palette: Arc<ColorTable>,
    clear_on_exit: bool,
    run_state: RunState,
    handle_signals: bool,
}

impl Daemon {
    pub fn new(config: &Config, run_state: RunState) -> Self {
        let palette = config.color_table();
        for mode in FlightMode::ALL {
            log::debug!("Palette: {mode} → {}", palette.color_for(mode));
        }
        Self {
            channels: config.channels(),
            palette: Arc::new(palette),
            clear_on_exit: config.clear_on_exit,
            run_state,
            handle_signals: false,
        }
    }

    /// Whether `run` installs process signal handlers.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Run the daemon to completion. Returns the exit status on a clean
    /// shutdown: 0, or the code of the last failed render.
    pub async fn run<F>(self, driver: Box<dyn LedDriver>, connect: F) -> Result<i32, Error>
    where
        F: Future<Output = Result<LinkStreams, LinkError>>,
    {
        log::info!("Phase: {}", Phase::Initializing);
        let mut lights = Lights::init(driver, &self.channels).map_err(Error::DriverInit)?;
        log::info!("LED driver ready ({} arm(s))", self.channels.len());

        let link = match connect.await {
            Ok(link) => link,
            Err(e) => {
                lights.show_fault();
                return Err(Error::Link(e));
            }
        };

        log::info!("Vehicle link up (autopilot system {})", link.autopilot.system_id);

        // Fresh buffer is all off.
        lights.flush();

        let (flight_modes, led_commands, link) = link.split();
        let shared = lights::share(lights);
        let reactor = Reactor::start(Arc::clone(&shared), Arc::clone(&self.palette), flight_modes, led_commands);

        log::info!("Phase: {}", Phase::Running);
        if self.handle_signals {
            if let Err(e) = install_signal_handlers(&self.run_state) {
                reactor.stop().await;
                link.close().await;
                drop(shared);
                return Err(Error::Signal(e));
            }
        }
        self.run_state.wait().await;
        log::info!("Shutdown requested");

        log::info!("Phase: {}", Phase::ShuttingDown);
        reactor.stop().await;
        link.close().await;
        let lights = lights::reclaim(shared).map_err(|_| Error::RenderStateShared)?;
        let status = lights.finish(self.clear_on_exit);

        log::info!("Phase: {} (status {status})", Phase::Terminated);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::command::{ALL, FILL_MODE_ALL, LedStripSet};
    use crate::driver::DriverError;
    use crate::lights::testing::{Record, RecordingDriver};
    use crate::link::Autopilot;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const AUTOPILOT: Autopilot = Autopilot { system_id: 1, component_id: 1 };

    async fn wait_for_frames(record: &Arc<Mutex<Record>>, n: usize) {
        for _ in 0..200 {
            if record.lock().unwrap().frames.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {n} frame(s)");
    }

    #[test]
    fn stop_is_requested_once() {
        let state = RunState::new();
        assert!(state.request_stop());
        assert!(!state.request_stop());
        assert!(!state.clone().request_stop());
    }

    #[tokio::test]
    async fn wait_returns_after_stop() {
        let state = RunState::new();
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        state.request_stop();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        // Already stopped: returns immediately.
        state.wait().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn repeated_sigterm_stops_once() {
        let state = RunState::new();
        install_signal_handlers(&state).unwrap();
        let pid = std::process::id().to_string();
        for _ in 0..2 {
            let status = std::process::Command::new("kill")
                .args(["-TERM", &pid])
                .status()
                .unwrap();
            assert!(status.success());
        }
        tokio::time::timeout(Duration::from_secs(2), state.wait()).await.unwrap();
        // Both deliveries landed on the one transition.
        assert!(!state.request_stop());
    }

    #[tokio::test]
    async fn clean_run_shows_modes_and_clears_on_exit() {
        let mut config = Config::default();
        config.clear_on_exit = true;
        let state = RunState::new();
        let (driver, record) = RecordingDriver::new();
        let (mode_tx, mode_rx) = mpsc::channel(4);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let daemon = Daemon::new(&config, state.clone());
        let run = tokio::spawn(daemon.run(Box::new(driver), async move {
            Ok(LinkStreams::from_channels(AUTOPILOT, mode_rx, cmd_rx))
        }));

        // Startup frame is all off.
        wait_for_frames(&record, 1).await;
        mode_tx.send(FlightMode::Hold).await.unwrap();
        wait_for_frames(&record, 2).await;
        cmd_tx
            .send(LedStripSet {
                target_component: 134,
                fill_mode: FILL_MODE_ALL,
                strip_index: ALL,
                colors: Some(vec![0x0000_FF00]),
                ..Default::default()
            })
            .await
            .unwrap();
        wait_for_frames(&record, 3).await;

        // Two signals back to back: one shutdown.
        assert!(state.request_stop());
        assert!(!state.request_stop());
        let status = run.await.unwrap().unwrap();
        assert_eq!(status, 0);

        let rec = record.lock().unwrap();
        assert_eq!(rec.inits, 1);
        assert_eq!(rec.teardowns, 1);
        assert!(rec.frames[0].iter().flatten().all(|&c| c == Color::OFF));
        assert!(rec.frames[1].iter().flatten().all(|&c| c == Color::PINK));
        assert!(rec.frames[2].iter().flatten().all(|&c| c == Color::GREEN));
        assert!(rec.frames.last().unwrap().iter().flatten().all(|&c| c == Color::OFF));
        assert_eq!(rec.frames.len(), 4);
    }

    #[tokio::test]
    async fn driver_init_failure_skips_link() {
        let (driver, record) = RecordingDriver::new();
        record.lock().unwrap().fail_init = Some(DriverError::MailboxDevice);
        let connected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&connected);
        let daemon = Daemon::new(&Config::default(), RunState::new());
        let err = daemon
            .run(Box::new(driver), async move {
                flag.store(true, Ordering::SeqCst);
                Err(LinkError::ClosedDuringDiscovery)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DriverInit(DriverError::MailboxDevice)));
        assert_eq!(err.exit_code(), -9);
        assert!(!connected.load(Ordering::SeqCst));
        assert_eq!(record.lock().unwrap().teardowns, 0);
    }

    #[tokio::test]
    async fn link_failure_flashes_red_and_releases_driver() {
        let (driver, record) = RecordingDriver::new();
        let daemon = Daemon::new(&Config::default(), RunState::new());
        let err = daemon
            .run(Box::new(driver), async { Err(LinkError::NoAutopilot(Duration::from_secs(3))) })
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), -1);
        let rec = record.lock().unwrap();
        assert_eq!(rec.frames.len(), 1);
        assert!(rec.frames[0].iter().flatten().all(|&c| c == Color::RED));
        assert_eq!(rec.teardowns, 1);
    }

    #[tokio::test]
    async fn exit_status_reports_last_render_failure() {
        let mut config = Config::default();
        config.clear_on_exit = true;
        let state = RunState::new();
        let (driver, record) = RecordingDriver::new();
        let (_mode_tx, mode_rx) = mpsc::channel::<FlightMode>(1);
        let (_cmd_tx, cmd_rx) = mpsc::channel::<LedStripSet>(1);
        let run = tokio::spawn(Daemon::new(&config, state.clone()).run(Box::new(driver), async move {
            Ok(LinkStreams::from_channels(AUTOPILOT, mode_rx, cmd_rx))
        }));

        wait_for_frames(&record, 1).await;
        // The clear-on-exit render fails.
        record.lock().unwrap().fail_renders = Some((1, DriverError::SpiTransfer));
        state.request_stop();
        assert_eq!(run.await.unwrap().unwrap(), -14);
        assert_eq!(record.lock().unwrap().teardowns, 1);
    }

    #[tokio::test]
    async fn no_events_after_shutdown() {
        let state = RunState::new();
        let (driver, record) = RecordingDriver::new();
        let (mode_tx, mode_rx) = mpsc::channel(4);
        let (_cmd_tx, cmd_rx) = mpsc::channel::<LedStripSet>(4);
        let run = tokio::spawn(Daemon::new(&Config::default(), state.clone()).run(Box::new(driver), async move {
            Ok(LinkStreams::from_channels(AUTOPILOT, mode_rx, cmd_rx))
        }));

        wait_for_frames(&record, 1).await;
        state.request_stop();
        assert_eq!(run.await.unwrap().unwrap(), 0);
        // Subscription is gone: the receiver was dropped with the reactor.
        assert!(mode_tx.send(FlightMode::Manual).await.is_err());
        let rec = record.lock().unwrap();
        assert_eq!(rec.frames.len(), 1);
        assert_eq!(rec.teardowns, 1);
    }
}
