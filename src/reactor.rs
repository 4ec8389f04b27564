/// Event reactor: turns flight-mode changes and remote LED commands into frames.
///
/// Each event source runs as its own task, consuming its stream in order:
///   flight modes  → palette color on every arm, render
///   LED commands  → decode, validate against the arm layout, fill, render
///
/// Both tasks write through the same [`SharedLights`] lock and hold it across
/// the whole mutate + render sequence, so a frame always shows one complete
/// update. Nothing orders the two sources against each other; the later
/// event wins.
///
/// [`Reactor::stop`] unsubscribes both sources and waits for the tasks to
/// exit. Once it returns no handler is running or will start.

use crate::color::Color;
use crate::command::{DecodeError, FillAction, LedStripSet, RemoteLedCommand, StripTarget};
use crate::flight_mode::FlightMode;
use crate::leds::ArmIndex;
use crate::lights::{self, Lights, SharedLights};
use crate::palette::ColorTable;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Why a remote command was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("malformed payload: {0}")]
    Decode(#[from] DecodeError),
    #[error("arm {index} does not exist ({count} configured)")]
    NoSuchArm { index: usize, count: usize },
    #[error("range {start}+{length:?} does not fit arm {arm} ({arm_len} LEDs)")]
    OutOfRange {
        arm: usize,
        start: usize,
        length: Option<usize>,
        arm_len: usize,
    },
}

pub struct Reactor {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Reactor {
    /// Subscribe to both streams. Must be called inside a tokio runtime.
    pub fn start(
        lights: SharedLights,
        palette: Arc<ColorTable>,
        flight_modes: mpsc::Receiver<FlightMode>,
        commands: mpsc::Receiver<LedStripSet>,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let modes_task = tokio::spawn(run_flight_modes(
            Arc::clone(&lights),
            Arc::clone(&palette),
            flight_modes,
            stop_rx.clone(),
        ));
        let commands_task = tokio::spawn(run_commands(lights, palette, commands, stop_rx));
        Self {
            stop,
            tasks: vec![modes_task, commands_task],
        }
    }

    /// Unsubscribe both sources and wait until their tasks are gone.
    /// A handler already holding the lock finishes its render first.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                log::error!("Reactor task ended abnormally: {e}");
            }
        }
    }
}

async fn run_flight_modes(
    lights: SharedLights,
    palette: Arc<ColorTable>,
    mut modes: mpsc::Receiver<FlightMode>,
    mut stop: watch::Receiver<bool>,
) {
    log::debug!("Flight mode subscription active");
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            mode = modes.recv() => match mode {
                Some(mode) => on_flight_mode(&mut lights::lock(&lights), &palette, mode),
                None => {
                    log::warn!("Flight mode stream closed");
                    break;
                }
            },
        }
    }
    log::debug!("Flight mode subscription ended");
}

async fn run_commands(
    lights: SharedLights,
    palette: Arc<ColorTable>,
    mut commands: mpsc::Receiver<LedStripSet>,
    mut stop: watch::Receiver<bool>,
) {
    log::debug!("LED command subscription active");
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            msg = commands.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = on_led_command(&mut lights::lock(&lights), &palette, &msg) {
                        log::warn!("Dropped LED command: {e}");
                    }
                }
                None => {
                    log::warn!("LED command stream closed");
                    break;
                }
            },
        }
    }
    log::debug!("LED command subscription ended");
}

/// Paint every arm in the mode's color and render. Render failures are logged.
pub fn on_flight_mode(lights: &mut Lights, palette: &ColorTable, mode: FlightMode) {
    let color = palette.color_for(mode);
    log::debug!("Flight mode: {mode} ({color})");
    lights.set_flight_mode(mode);
    lights.leds_mut().fill_all(color);
    lights.flush();
}

/// Decode and apply one remote command, then render.
///
/// Rejected commands leave the buffer untouched and render nothing.
pub fn on_led_command(lights: &mut Lights, palette: &ColorTable, msg: &LedStripSet) -> Result<(), Rejected> {
    let cmd = RemoteLedCommand::try_from(msg)?;
    log::debug!("LED command: {cmd:?}");
    apply(lights, palette, &cmd)?;
    lights.flush();
    Ok(())
}

fn apply(lights: &mut Lights, palette: &ColorTable, cmd: &RemoteLedCommand) -> Result<(), Rejected> {
    let arms = target_arms(lights, cmd.target)?;
    match &cmd.action {
        FillAction::All(color) => fill(lights, cmd.target, &arms, *color),
        FillAction::FollowFlightMode => {
            let color = lights
                .flight_mode()
                .map_or(Color::OFF, |mode| palette.color_for(mode));
            fill(lights, cmd.target, &arms, color);
        }
        FillAction::Range { start, length, colors } => {
            // Check every arm before writing any of them.
            let leds = lights.leds();
            let spans = arms
                .iter()
                .map(|&arm| {
                    let arm_len = leds.arm_len(arm);
                    let len = match length {
                        Some(len) => *len,
                        None => arm_len.saturating_sub(*start),
                    };
                    let fits = *start + len <= arm_len && (length.is_some() || *start < arm_len);
                    if fits {
                        Ok((arm, len))
                    } else {
                        Err(Rejected::OutOfRange {
                            arm: arm.get(),
                            start: *start,
                            length: *length,
                            arm_len,
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            let leds = lights.leds_mut();
            for (arm, len) in spans {
                let written = leds.fill_range(arm, *start, len, colors);
                debug_assert!(written, "range was checked against arm {}", arm.get());
            }
        }
    }
    Ok(())
}

fn target_arms(lights: &Lights, target: StripTarget) -> Result<Vec<ArmIndex>, Rejected> {
    let leds = lights.leds();
    match target {
        StripTarget::All => Ok(leds.arm_indices().collect()),
        StripTarget::Arm(index) => leds
            .arm_index(index)
            .map(|arm| vec![arm])
            .ok_or(Rejected::NoSuchArm {
                index,
                count: leds.arm_count(),
            }),
    }
}

fn fill(lights: &mut Lights, target: StripTarget, arms: &[ArmIndex], color: Color) {
    let leds = lights.leds_mut();
    match target {
        StripTarget::All => leds.fill_all(color),
        StripTarget::Arm(_) => {
            for &arm in arms {
                leds.fill_arm(arm, color);
            }
        }
    }
}
