mod color;
mod command;
mod config;
mod driver;
mod error;
mod flight_mode;
mod frame;
mod leds;
mod lifecycle;
mod lights;
mod link;
mod palette;
mod reactor;

use crate::config::DriverKind;
use crate::driver::{ConsoleDriver, LedDriver};
use crate::error::Error;
use crate::lifecycle::{Daemon, RunState};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("drone-lights v{} starting...", env!("CARGO_PKG_VERSION"));

    let cfg = config::Config::load();
    if let Err(e) = cfg.validate() {
        let e = Error::from(e);
        log::error!("{e}");
        std::process::exit(e.exit_code());
    }
    log::info!(
        "Endpoint: {} (component {}), {} arm(s), clear on exit: {}",
        cfg.endpoint,
        cfg.component_id,
        cfg.leds.arms.len(),
        cfg.clear_on_exit
    );

    let driver: Box<dyn LedDriver> = match cfg.driver {
        DriverKind::Console => Box::new(ConsoleDriver::new()),
    };

    let link_settings = cfg.link_settings();
    let daemon = Daemon::new(&cfg, RunState::new()).handle_signals(true);

    let code = match daemon.run(driver, link::connect(&link_settings)).await {
        Ok(code) => {
            log::info!("Shutdown complete");
            code
        }
        Err(e) => {
            log::error!("{e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}
