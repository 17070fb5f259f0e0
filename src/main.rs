// ULP Weather Station: Firmware Entry Point
//
// Boot sequence:
//   1. Start the ULP pulse counter so no anemometer or rain pulse is missed.
//   2. Bring up the I2C sensors (BME280, AS5600) and the HC-12 radio.
//   3. Wait BOOT_SETTLE_SECS so a console can break in before the first sleep.
//   4. Select the radio power tier, drop the pulses counted during boot,
//      then hand over to the gather loop.
//
// On the host the same binary runs the gather loop against a simulated
// clock, a modelled pulse engine and a mock radio.

#[cfg(not(target_os = "espidf"))]
mod sim;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::{AnyIOPin, PinDriver};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::uart::{self, UartDriver};

    use ulp_weather::config::*;
    use ulp_weather::device::{self, AdcBattery, EspClock, LightSleep, UartPort};
    use ulp_weather::drivers::as5600::As5600;
    use ulp_weather::drivers::bme280::Bme280;
    use ulp_weather::drivers::SharedBus;
    use ulp_weather::pulse::layout::{RAIN, WIND};
    use ulp_weather::pulse::IntervalChannel;
    use ulp_weather::radio::RadioLink;
    use ulp_weather::tasks::{Station, StationIo};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("ULP weather station starting");

    let config = StationConfig::default();
    let peripherals = Peripherals::take()?;

    // ---- Pulse engine -----------------------------------------------------
    let pulses = device::ulp::start_pulse_engine()?;
    let wind = IntervalChannel::new(pulses.clone(), WIND);
    let rain = IntervalChannel::new(pulses, RAIN);

    // ---- I2C bus (shared between BME280 and AS5600) -----------------------
    let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_HZ.Hz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &i2c_config,
    )?;
    let i2c_bus: SharedBus = Box::leak(Box::new(Mutex::new(i2c)));

    let environment = Bme280::new(i2c_bus)?;
    let vane = As5600::new(i2c_bus);
    if let Err(e) = vane.init() {
        log::error!("AS5600 init failed: {}", e);
    }

    // ---- Radio (HC-12 on UART2) -------------------------------------------
    let uart_config = uart::config::Config::new().baudrate(Hertz(RADIO_BAUDRATE));
    let uart = UartDriver::new(
        peripherals.uart2,
        peripherals.pins.gpio17, // TX
        peripherals.pins.gpio16, // RX
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?;
    let set_pin = PinDriver::output(peripherals.pins.gpio23)?;
    let mut radio = RadioLink::new(UartPort::new(uart), set_pin, FreeRtos, config.radio);

    // ---- Boot settle ------------------------------------------------------
    log::info!("Waiting {} s before entering the gather loop", BOOT_SETTLE_SECS);
    thread::sleep(Duration::from_secs(BOOT_SETTLE_SECS));

    if let Err(e) = radio.configure() {
        log::error!("Radio configuration failed: {}", e);
    }

    let io = StationIo {
        environment: Box::new(environment),
        heading: Box::new(vane),
        battery: Box::new(AdcBattery::new()?),
        radio: Box::new(radio),
        clock: Box::new(EspClock),
        sleeper: Box::new(LightSleep::new()?),
    };
    let mut station = Station::new(config, wind, rain, io);
    station.restart_window();
    station.run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let windows = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => sim::DEFAULT_WINDOWS,
    };
    sim::run(windows)
}
