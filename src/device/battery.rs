// ULP Weather Station: Battery Voltage via ADC1
//
// GPIO34 / ADC1 channel 6 behind a 1:2 resistor divider, 11 dB attenuation.
// Readings go through the line-fitting calibration scheme when eFuse data
// allows it, otherwise a linear approximation of the 0 to 3.3 V range.

use esp_idf_sys::{self as sys, esp};

use crate::config::BATTERY_DIVIDER_RATIO;
use crate::sensors::BatterySensor;

const CHANNEL: sys::adc_channel_t = sys::adc_channel_t_ADC_CHANNEL_6; // GPIO34
const ATTEN: sys::adc_atten_t = sys::adc_atten_t_ADC_ATTEN_DB_11;
const BITWIDTH: sys::adc_bitwidth_t = sys::adc_bitwidth_t_ADC_BITWIDTH_12;

pub struct AdcBattery {
    unit: sys::adc_oneshot_unit_handle_t,
    cali: Option<sys::adc_cali_handle_t>,
}

impl AdcBattery {
    pub fn new() -> anyhow::Result<Self> {
        let mut unit: sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        unsafe {
            let unit_cfg = sys::adc_oneshot_unit_init_cfg_t {
                unit_id: sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp!(sys::adc_oneshot_new_unit(&unit_cfg, &mut unit))?;

            let chan_cfg = sys::adc_oneshot_chan_cfg_t {
                atten: ATTEN,
                bitwidth: BITWIDTH,
            };
            esp!(sys::adc_oneshot_config_channel(unit, CHANNEL, &chan_cfg))?;
        }

        let cali = line_fitting_scheme();
        if cali.is_none() {
            log::warn!("ADC calibration unavailable, using linear conversion");
        }
        Ok(Self { unit, cali })
    }

    fn pin_millivolts(&self, raw: i32) -> f32 {
        if let Some(cali) = self.cali {
            let mut mv: i32 = 0;
            if esp!(unsafe { sys::adc_cali_raw_to_voltage(cali, raw, &mut mv) }).is_ok() {
                return mv as f32;
            }
        }
        raw as f32 / 4095.0 * 3300.0
    }
}

impl BatterySensor for AdcBattery {
    fn read_volts(&mut self) -> anyhow::Result<f32> {
        let mut raw: i32 = 0;
        esp!(unsafe { sys::adc_oneshot_read(self.unit, CHANNEL, &mut raw) })?;
        Ok(self.pin_millivolts(raw) / 1000.0 * BATTERY_DIVIDER_RATIO)
    }
}

fn line_fitting_scheme() -> Option<sys::adc_cali_handle_t> {
    let mut handle: sys::adc_cali_handle_t = core::ptr::null_mut();
    let created = esp!(unsafe {
        let cfg = sys::adc_cali_line_fitting_config_t {
            unit_id: sys::adc_unit_t_ADC_UNIT_1,
            atten: ATTEN,
            bitwidth: BITWIDTH,
            ..core::mem::zeroed()
        };
        sys::adc_cali_create_scheme_line_fitting(&cfg, &mut handle)
    });
    created.ok().map(|()| handle)
}
