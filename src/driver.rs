/// LED driver contract and the bundled console backend.
///
/// Hardware drivers sit behind [`LedDriver`]: `init` once, `render` any
/// number of times, `teardown` once. Return codes follow the ws281x family so
/// the process exit status means the same thing on every backend.
///
/// The console backend validates the channel setup the same way the PWM/PCM/SPI
/// hardware would, encodes each arm into wire byte order and logs the frame.

use crate::color::Color;
use crate::frame;
use serde::Deserialize;

/// Byte order of the LED parts on a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StripType {
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
    Rgbw,
    Grbw,
}

impl StripType {
    pub fn bytes_per_led(self) -> usize {
        match self {
            StripType::Rgbw | StripType::Grbw => 4,
            _ => 3,
        }
    }
}

impl std::fmt::Display for StripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StripType::Rgb => "rgb",
            StripType::Rbg => "rbg",
            StripType::Grb => "grb",
            StripType::Gbr => "gbr",
            StripType::Brg => "brg",
            StripType::Bgr => "bgr",
            StripType::Rgbw => "rgbw",
            StripType::Grbw => "grbw",
        };
        f.write_str(name)
    }
}

/// Hardware setup for one arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub gpio: u8,
    pub dma: u8,
    pub length: usize,
    pub strip_type: StripType,
    pub brightness: u8,
}

/// Driver failure, carrying the ws281x return code.
///
/// The full ws281x taxonomy; the console backend only returns a few of them.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("generic failure")]
    Generic,
    #[error("out of memory")]
    OutOfMemory,
    #[error("hardware revision is not supported")]
    HwNotSupported,
    #[error("memory lock failed")]
    MemLock,
    #[error("mmap failed")]
    Mmap,
    #[error("unable to map registers into userspace")]
    MapRegisters,
    #[error("unable to initialize GPIO")]
    GpioInit,
    #[error("unable to initialize PWM")]
    PwmSetup,
    #[error("failed to create mailbox device")]
    MailboxDevice,
    #[error("DMA error")]
    Dma,
    #[error("selected GPIO not possible")]
    IllegalGpio,
    #[error("unable to initialize PCM")]
    PcmSetup,
    #[error("unable to initialize SPI")]
    SpiSetup,
    #[error("SPI transfer error")]
    SpiTransfer,
}

impl DriverError {
    pub fn code(self) -> i32 {
        match self {
            DriverError::Generic => -1,
            DriverError::OutOfMemory => -2,
            DriverError::HwNotSupported => -3,
            DriverError::MemLock => -4,
            DriverError::Mmap => -5,
            DriverError::MapRegisters => -6,
            DriverError::GpioInit => -7,
            DriverError::PwmSetup => -8,
            DriverError::MailboxDevice => -9,
            DriverError::Dma => -10,
            DriverError::IllegalGpio => -11,
            DriverError::PcmSetup => -12,
            DriverError::SpiSetup => -13,
            DriverError::SpiTransfer => -14,
        }
    }
}

/// Render/init/teardown contract every LED backend implements.
///
/// `render` is only called between a successful `init` and `teardown`, and
/// `teardown` exactly once; [`crate::lights::Lights`] enforces both.
pub trait LedDriver: Send {
    fn init(&mut self, channels: &[ChannelConfig]) -> Result<(), DriverError>;
    fn render(&mut self, arms: &[Vec<Color>]) -> Result<(), DriverError>;
    fn teardown(&mut self);
}

/// Pins the PWM, PCM and SPI peripherals can drive.
const PWM0_GPIOS: [u8; 4] = [12, 18, 40, 52];
const PWM1_GPIOS: [u8; 4] = [13, 19, 41, 45];
const PCM_GPIOS: [u8; 2] = [21, 31];
const SPI_GPIOS: [u8; 1] = [10];

/// DMA channels at or above this are reserved.
pub const DMA_LIMIT: u8 = 14;

/// Backend that logs encoded frames instead of driving pins.
#[derive(Debug, Default)]
pub struct ConsoleDriver {
    channels: Vec<ChannelConfig>,
    frames: u64,
}

impl ConsoleDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedDriver for ConsoleDriver {
    fn init(&mut self, channels: &[ChannelConfig]) -> Result<(), DriverError> {
        if channels.is_empty() {
            return Err(DriverError::Generic);
        }
        for (i, ch) in channels.iter().enumerate() {
            if ch.dma >= DMA_LIMIT {
                return Err(DriverError::Dma);
            }
            let supported = PWM0_GPIOS.contains(&ch.gpio)
                || PWM1_GPIOS.contains(&ch.gpio)
                || PCM_GPIOS.contains(&ch.gpio)
                || SPI_GPIOS.contains(&ch.gpio);
            if !supported {
                log::error!("Channel {i}: GPIO {} has no PWM/PCM/SPI function", ch.gpio);
                return Err(DriverError::IllegalGpio);
            }
            // Two arms on the same PWM block fight over one peripheral
            if channels[..i].iter().any(|other| same_peripheral(other.gpio, ch.gpio)) {
                log::error!("Channel {i}: GPIO {} shares a peripheral with another arm", ch.gpio);
                return Err(DriverError::PwmSetup);
            }
        }
        for (i, ch) in channels.iter().enumerate() {
            log::info!(
                "Console LED channel {i}: GPIO {} DMA {} {} x{} brightness {}",
                ch.gpio, ch.dma, ch.strip_type, ch.length, ch.brightness
            );
        }
        self.channels = channels.to_vec();
        Ok(())
    }

    fn render(&mut self, arms: &[Vec<Color>]) -> Result<(), DriverError> {
        if self.channels.len() != arms.len() {
            return Err(DriverError::Generic);
        }
        self.frames += 1;
        for (i, (ch, leds)) in self.channels.iter().zip(arms).enumerate() {
            let bytes = frame::encode_arm(ch.strip_type, ch.brightness, leds);
            log::debug!(
                "Frame {} arm {i}: {}",
                self.frames,
                frame::hex(&bytes, ch.strip_type.bytes_per_led())
            );
        }
        Ok(())
    }

    fn teardown(&mut self) {
        log::info!("Console LED driver released after {} frame(s)", self.frames);
        self.channels.clear();
    }
}

fn peripheral(gpio: u8) -> u8 {
    if PWM0_GPIOS.contains(&gpio) {
        0
    } else if PWM1_GPIOS.contains(&gpio) {
        1
    } else if PCM_GPIOS.contains(&gpio) {
        2
    } else {
        3
    }
}

fn same_peripheral(a: u8, b: u8) -> bool {
    peripheral(a) == peripheral(b)
}
