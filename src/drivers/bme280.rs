// ULP Weather Station: BME280 Temperature / Humidity / Pressure Driver
//
// Forced mode, x1 oversampling on all three channels: the sensor takes one
// measurement per gather window and sleeps otherwise. Compensation uses the
// floating-point formulas from the Bosch datasheet.

#[cfg(target_os = "espidf")]
use crate::config::{I2C_ADDR_BME280, I2C_TIMEOUT_TICKS};
#[cfg(target_os = "espidf")]
use crate::record::EnvironmentReading;
#[cfg(target_os = "espidf")]
use crate::sensors::EnvironmentSensor;

#[cfg(target_os = "espidf")]
use super::SharedBus;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_CALIB_TP: u8 = 0x88;
pub const REG_CALIB_H: u8 = 0xE1;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_STATUS: u8 = 0xF3;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_DATA: u8 = 0xF7;

pub const CHIP_ID: u8 = 0x60;
/// osrs_h = x1
pub const CTRL_HUM_X1: u8 = 0x01;
/// osrs_t = x1, osrs_p = x1, mode = forced
pub const CTRL_MEAS_FORCED: u8 = 0b001_001_01;
/// STATUS bit 3: conversion running.
const STATUS_MEASURING: u8 = 0x08;
/// Typical forced-mode conversion at x1/x1/x1 is under 10 ms.
#[cfg(target_os = "espidf")]
const MEASURE_WAIT_MS: u32 = 10;
#[cfg(target_os = "espidf")]
const MEASURE_POLLS: u32 = 5;

/// Factory trimming values read once at init.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// `tp` is the 26-byte block at 0x88, `h` the 7-byte block at 0xE1.
    pub fn parse(tp: &[u8; 26], h: &[u8; 7]) -> Self {
        let u = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            h1: tp[25],
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            // H4 and H5 are 12-bit values sharing the nibbles of 0xE5.
            h4: (i16::from(h[3] as i8) << 4) | i16::from(h[4] & 0x0f),
            h5: (i16::from(h[5] as i8) << 4) | i16::from(h[4] >> 4),
            h6: h[6] as i8,
        }
    }
}

/// Uncompensated ADC values from one burst read of 0xF7..=0xFE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub pressure: i32,
    pub temperature: i32,
    pub humidity: i32,
}

impl RawSample {
    pub fn parse(data: &[u8; 8]) -> Self {
        let twenty = |i: usize| {
            (i32::from(data[i]) << 12) | (i32::from(data[i + 1]) << 4) | (i32::from(data[i + 2]) >> 4)
        };
        Self {
            pressure: twenty(0),
            temperature: twenty(3),
            humidity: (i32::from(data[6]) << 8) | i32::from(data[7]),
        }
    }
}

/// Compensated values: °C, Pa and %RH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensated {
    pub temperature: f64,
    pub pressure_pa: f64,
    pub humidity: f64,
}

pub fn compensate(cal: &Calibration, raw: &RawSample) -> Compensated {
    let t_fine = t_fine(cal, raw.temperature);
    Compensated {
        temperature: t_fine / 5120.0,
        pressure_pa: pressure(cal, raw.pressure, t_fine),
        humidity: humidity(cal, raw.humidity, t_fine),
    }
}

fn t_fine(cal: &Calibration, adc_t: i32) -> f64 {
    let adc_t = f64::from(adc_t);
    let t1 = f64::from(cal.t1);
    let var1 = (adc_t / 16384.0 - t1 / 1024.0) * f64::from(cal.t2);
    let d = adc_t / 131072.0 - t1 / 8192.0;
    let var2 = d * d * f64::from(cal.t3);
    var1 + var2
}

fn pressure(cal: &Calibration, adc_p: i32, t_fine: f64) -> f64 {
    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * f64::from(cal.p6) / 32768.0;
    var2 += var1 * f64::from(cal.p5) * 2.0;
    var2 = var2 / 4.0 + f64::from(cal.p4) * 65536.0;
    var1 = (f64::from(cal.p3) * var1 * var1 / 524288.0 + f64::from(cal.p2) * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * f64::from(cal.p1);
    if var1 == 0.0 {
        return 0.0;
    }

    let mut p = 1048576.0 - f64::from(adc_p);
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = f64::from(cal.p9) * p * p / 2147483648.0;
    let var2 = p * f64::from(cal.p8) / 32768.0;
    p + (var1 + var2 + f64::from(cal.p7)) / 16.0
}

fn humidity(cal: &Calibration, adc_h: i32, t_fine: f64) -> f64 {
    let h = t_fine - 76800.0;
    let h = (f64::from(adc_h) - (f64::from(cal.h4) * 64.0 + f64::from(cal.h5) / 16384.0 * h))
        * (f64::from(cal.h2) / 65536.0
            * (1.0
                + f64::from(cal.h6) / 67108864.0 * h * (1.0 + f64::from(cal.h3) / 67108864.0 * h)));
    let h = h * (1.0 - f64::from(cal.h1) * h / 524288.0);
    h.clamp(0.0, 100.0)
}

pub fn measuring(status: u8) -> bool {
    status & STATUS_MEASURING != 0
}

#[cfg(target_os = "espidf")]
pub struct Bme280 {
    bus: SharedBus,
    calibration: Calibration,
}

#[cfg(target_os = "espidf")]
impl Bme280 {
    /// Check the chip ID and load the calibration block.
    pub fn new(bus: SharedBus) -> anyhow::Result<Self> {
        let calibration = {
            let mut bus = super::lock(bus)?;
            let mut id = [0u8; 1];
            bus.write_read(I2C_ADDR_BME280, &[REG_CHIP_ID], &mut id, I2C_TIMEOUT_TICKS)?;
            if id[0] != CHIP_ID {
                anyhow::bail!("BME280 chip id {:#04x}, expected {:#04x}", id[0], CHIP_ID);
            }

            let mut tp = [0u8; 26];
            let mut h = [0u8; 7];
            bus.write_read(I2C_ADDR_BME280, &[REG_CALIB_TP], &mut tp, I2C_TIMEOUT_TICKS)?;
            bus.write_read(I2C_ADDR_BME280, &[REG_CALIB_H], &mut h, I2C_TIMEOUT_TICKS)?;
            Calibration::parse(&tp, &h)
        };

        log::info!("BME280 initialised (forced mode, x1 oversampling)");
        Ok(Self { bus, calibration })
    }
}

#[cfg(target_os = "espidf")]
impl EnvironmentSensor for Bme280 {
    fn read(&mut self) -> anyhow::Result<EnvironmentReading> {
        let mut bus = super::lock(self.bus)?;

        // ctrl_hum only takes effect after the next ctrl_meas write.
        bus.write(I2C_ADDR_BME280, &[REG_CTRL_HUM, CTRL_HUM_X1], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_BME280, &[REG_CTRL_MEAS, CTRL_MEAS_FORCED], I2C_TIMEOUT_TICKS)?;

        let mut status = [0u8; 1];
        for _ in 0..MEASURE_POLLS {
            esp_idf_hal::delay::FreeRtos::delay_ms(MEASURE_WAIT_MS);
            bus.write_read(I2C_ADDR_BME280, &[REG_STATUS], &mut status, I2C_TIMEOUT_TICKS)?;
            if !measuring(status[0]) {
                break;
            }
        }
        if measuring(status[0]) {
            anyhow::bail!("BME280 conversion did not finish");
        }

        let mut data = [0u8; 8];
        bus.write_read(I2C_ADDR_BME280, &[REG_DATA], &mut data, I2C_TIMEOUT_TICKS)?;
        let values = compensate(&self.calibration, &RawSample::parse(&data));

        Ok(EnvironmentReading {
            temperature: values.temperature as f32,
            humidity: values.humidity as f32,
            pressure: Some((values.pressure_pa / 100.0) as f32),
        })
    }
}
