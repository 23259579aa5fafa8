use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use bitbang_adc::adc::AdcReader;
use bitbang_adc::gpio;
use bitbang_adc::poller::Poller;

// BCM numbering, SPI0 header pins
const CS_PIN: u64 = 8;
const CLOCK_PIN: u64 = 11;
const MISO_PIN: u64 = 9;

const POLL_PERIOD: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // A missing pin is fatal; there is nothing to sample without all three.
    let pins = gpio::open_adc_pins(CS_PIN, CLOCK_PIN, MISO_PIN).context("opening ADC pins")?;

    let adc = AdcReader::new(pins.cs, pins.clk, pins.miso);
    let (samples_tx, samples) = crossbeam_channel::bounded(1);
    let poller = Poller::spawn(adc, POLL_PERIOD, samples_tx).context("starting poller")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut printed = Ok(());
    for sample in samples.iter() {
        printed = writeln!(out, "{}", sample);
        if printed.is_err() {
            break;
        }
    }
    // Drop the receiver so a poller blocked on send sees the consumer leave.
    drop(samples);

    let adc = poller.stop().context("polling ADC")?;
    let (cs, clk, miso) = adc.release();
    if let Err(e) = (gpio::AdcPins { cs, clk, miso }).close() {
        warn!("releasing ADC pins failed: {}", e);
    }
    printed.context("writing samples")?;

    info!("done");
    Ok(())
}
