//! Rig firmware for an ESP32 on the original board: joins the WiFi network,
//! then answers host commands on `LISTEN_PORT` forever.
//!
//! Build with the esp-idf toolchain and `--features esp32`; the network
//! credentials come from `GASTRACK_WIFI_SSID` / `GASTRACK_WIFI_PASSWORD`
//! at build time.

use std::net::TcpListener;

use anyhow::{anyhow, Context};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyOutputPin, OutputPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::spi::{config::Config as SpiConfig, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use gastrack_firmware::channel::ChannelReader;
use gastrack_firmware::consts::LISTEN_PORT;
use gastrack_firmware::mux::{Multiplexer, SelectorBus};
use gastrack_firmware::rig::Rig;
use gastrack_firmware::scanner::ArrayScanner;
use gastrack_firmware::session;

const WIFI_SSID: &str = env!("GASTRACK_WIFI_SSID");
const WIFI_PASSWORD: &str = env!("GASTRACK_WIFI_PASSWORD");

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: WIFI_PASSWORD
            .try_into()
            .map_err(|_| anyhow!("WiFi password too long"))?,
        ..Default::default()
    }))?;
    wifi.start()?;
    // The access point may not be up yet when the rig powers on
    while let Err(e) = wifi.connect() {
        log::warn!("WiFi connect failed: {}, retrying", e);
        FreeRtos::delay_ms(1000);
    }
    wifi.wait_netif_up()?;
    log::info!("WiFi up: {:?}", wifi.wifi().sta_netif().get_ip_info()?);

    let out = |pin: AnyOutputPin| PinDriver::output(pin);
    let row_bus = SelectorBus::new([
        out(pins.gpio32.downgrade_output())?,
        out(pins.gpio33.downgrade_output())?,
        out(pins.gpio25.downgrade_output())?,
        out(pins.gpio26.downgrade_output())?,
    ]);
    let column_bus = SelectorBus::new([
        out(pins.gpio27.downgrade_output())?,
        out(pins.gpio14.downgrade_output())?,
        out(pins.gpio13.downgrade_output())?,
        out(pins.gpio15.downgrade_output())?,
    ]);

    // SPI mode 0 at 100 kHz; chip-select is driven by hand
    let spi_driver = SpiDriver::new(
        peripherals.spi2,
        pins.gpio22,
        pins.gpio4,
        Some(pins.gpio21),
        &SpiDriverConfig::new(),
    )?;
    let spi = SpiDeviceDriver::new(
        spi_driver,
        Option::<AnyOutputPin>::None,
        &SpiConfig::new().baudrate(100.kHz().into()),
    )?;
    let cs = out(pins.gpio19.downgrade_output())?;

    let reader = ChannelReader::new(spi, cs, Ets)?;
    let scanner = ArrayScanner::new(Multiplexer::new(row_bus, column_bus), reader);
    let heater = out(pins.gpio17.downgrade_output())?;
    let filter = out(pins.gpio16.downgrade_output())?;
    let mut rig = Rig::new(scanner, heater, filter)?;

    let listener = TcpListener::bind(("0.0.0.0", LISTEN_PORT))
        .with_context(|| format!("binding port {}", LISTEN_PORT))?;
    log::info!("listening on port {}", LISTEN_PORT);
    session::serve(&listener, &mut rig)?;
    Ok(())
}
