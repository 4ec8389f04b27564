/// Render state: the LED buffer plus the driver that displays it.
///
/// A `Lights` only exists after the driver initialized successfully, and the
/// driver is torn down exactly once when it is dropped (or consumed through
/// [`Lights::finish`]), so rendering outside init..teardown cannot be written.
///
/// Shared between the reactor tasks and the lifecycle as [`SharedLights`];
/// every "mutate then render" sequence runs under that one lock.

use crate::color::Color;
use crate::driver::{ChannelConfig, DriverError, LedDriver};
use crate::flight_mode::FlightMode;
use crate::leds::LedArray;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Lights {
    leds: LedArray,
    driver: Box<dyn LedDriver>,
    /// Last flight mode shown, for "follow flight mode" commands.
    flight_mode: Option<FlightMode>,
    /// Code of the last render (0 = success).
    last_status: i32,
}

impl Lights {
    /// Initialize the driver and allocate an all-off buffer for `channels`.
    pub fn init(mut driver: Box<dyn LedDriver>, channels: &[ChannelConfig]) -> Result<Self, DriverError> {
        driver.init(channels)?;
        let lengths: Vec<usize> = channels.iter().map(|ch| ch.length).collect();
        Ok(Self {
            leds: LedArray::new(&lengths),
            driver,
            flight_mode: None,
            last_status: 0,
        })
    }

    pub fn leds(&self) -> &LedArray {
        &self.leds
    }

    pub fn leds_mut(&mut self) -> &mut LedArray {
        &mut self.leds
    }

    pub fn flight_mode(&self) -> Option<FlightMode> {
        self.flight_mode
    }

    pub fn set_flight_mode(&mut self, mode: FlightMode) {
        self.flight_mode = Some(mode);
    }

    /// Push the current buffer to the driver and remember the outcome.
    pub fn render(&mut self) -> Result<(), DriverError> {
        let result = self.driver.render(self.leds.arms());
        match result {
            Ok(()) => {
                self.leds.mark_rendered();
                self.last_status = 0;
            }
            Err(e) => self.last_status = e.code(),
        }
        result
    }

    /// Render, logging instead of propagating a failure.
    pub fn render_or_log(&mut self) {
        if let Err(e) = self.render() {
            log::warn!("LED render failed ({}): {e}", e.code());
        }
    }

    /// Render only if the buffer changed since the last successful render.
    pub fn flush(&mut self) {
        if self.leds.is_dirty() {
            self.render_or_log();
        }
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    /// Show solid red once before giving up on startup.
    pub fn show_fault(mut self) {
        self.leds.fill_all(Color::RED);
        self.render_or_log();
    }

    /// Optionally clear the arms, then tear the driver down.
    /// Returns the code of the last render.
    pub fn finish(mut self, clear: bool) -> i32 {
        if clear {
            self.leds.clear();
            self.flush();
        }
        self.last_status()
    }
}

impl Drop for Lights {
    fn drop(&mut self) {
        self.driver.teardown();
    }
}

/// Render state shared between the reactor tasks and the lifecycle.
pub type SharedLights = Arc<Mutex<Lights>>;

pub fn share(lights: Lights) -> SharedLights {
    Arc::new(Mutex::new(lights))
}

/// Take the lock, recovering from a poisoned mutex.
pub fn lock(shared: &SharedLights) -> MutexGuard<'_, Lights> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Get sole ownership back once every other holder is gone.
pub fn reclaim(shared: SharedLights) -> Result<Lights, SharedLights> {
    Arc::try_unwrap(shared).map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::driver::StripType;

    /// What a [`RecordingDriver`] saw, inspectable after the driver is moved.
    #[derive(Debug, Default)]
    pub struct Record {
        pub inits: usize,
        pub frames: Vec<Vec<Vec<Color>>>,
        pub teardowns: usize,
        /// Fail the next N renders with this error.
        pub fail_renders: Option<(usize, DriverError)>,
        pub fail_init: Option<DriverError>,
    }

    /// In-memory driver that records every call.
    pub struct RecordingDriver {
        pub record: Arc<Mutex<Record>>,
    }

    impl RecordingDriver {
        pub fn new() -> (Self, Arc<Mutex<Record>>) {
            let record = Arc::new(Mutex::new(Record::default()));
            (Self { record: Arc::clone(&record) }, record)
        }
    }

    impl LedDriver for RecordingDriver {
        fn init(&mut self, _channels: &[ChannelConfig]) -> Result<(), DriverError> {
            let mut rec = self.record.lock().unwrap();
            rec.inits += 1;
            match rec.fail_init {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn render(&mut self, arms: &[Vec<Color>]) -> Result<(), DriverError> {
            let mut rec = self.record.lock().unwrap();
            assert_eq!(rec.inits, 1, "render before init");
            assert_eq!(rec.teardowns, 0, "render after teardown");
            if let Some((n, e)) = rec.fail_renders {
                if n > 0 {
                    rec.fail_renders = Some((n - 1, e));
                    return Err(e);
                }
            }
            rec.frames.push(arms.to_vec());
            Ok(())
        }

        fn teardown(&mut self) {
            self.record.lock().unwrap().teardowns += 1;
        }
    }

    pub fn channels(lengths: &[usize]) -> Vec<ChannelConfig> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, &length)| ChannelConfig {
                gpio: 12 + i as u8,
                dma: 10,
                length,
                strip_type: StripType::Grb,
                brightness: 255,
            })
            .collect()
    }

    pub fn lights(lengths: &[usize]) -> (Lights, Arc<Mutex<Record>>) {
        let (driver, record) = RecordingDriver::new();
        let lights = Lights::init(Box::new(driver), &channels(lengths)).unwrap();
        (lights, record)
    }
}
