// ULP Weather Station: Clock & Light Sleep

use esp_idf_sys::{self as sys, esp};

use crate::sensors::{Clock, Sleeper};

/// Milliseconds since boot from the high-resolution timer, which keeps
/// counting through light sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        let us = unsafe { sys::esp_timer_get_time() };
        u64::try_from(us).unwrap_or(0) / 1000
    }
}

/// Light sleep with timer wake-up. RTC peripherals stay powered so the ULP
/// keeps sampling its RTC GPIO inputs.
#[derive(Debug)]
pub struct LightSleep;

impl LightSleep {
    pub fn new() -> anyhow::Result<Self> {
        esp!(unsafe {
            sys::esp_sleep_pd_config(
                sys::esp_sleep_pd_domain_t_ESP_PD_DOMAIN_RTC_PERIPH,
                sys::esp_sleep_pd_option_t_ESP_PD_OPTION_ON,
            )
        })?;
        Ok(Self)
    }
}

impl Sleeper for LightSleep {
    fn sleep_secs(&mut self, secs: u32) {
        let result = unsafe {
            esp!(sys::esp_sleep_enable_timer_wakeup(u64::from(secs) * 1_000_000))
                .and_then(|()| esp!(sys::esp_light_sleep_start()))
        };
        if let Err(e) = result {
            // Fall back to a plain delay so the schedule still holds.
            log::warn!("Light sleep failed ({}), delaying instead", e);
            esp_idf_hal::delay::FreeRtos::delay_ms(secs.saturating_mul(1000));
        }
    }
}
