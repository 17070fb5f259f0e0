// ULP Weather Station: ULP Program Loader & RTC Slow Memory Access

use esp_idf_sys::{self as sys, esp};

use crate::config::{PIN_RAIN, PIN_WIND, ULP_WAKE_PERIOD_US};
use crate::pulse::layout::{ENTRY_WORD, RAIN, REGION_WORDS, ULP_DATA_MASK, ULP_MEM_BASE, WIND};
use crate::pulse::{HostSide, PulseWords, RAIN_CHANNEL, WIND_CHANNEL};

/// Assembled `ulp/pulse_counter.S` with its load header, built by build.rs.
static ULP_PROGRAM: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/pulse_counter.bin"));

/// The ULP data block in RTC slow memory, seen from the main CPU.
///
/// Words are accessed with volatile loads and stores. `read_and_replace`
/// is a plain read followed by a write: the ULP runs for a few dozen
/// instructions every wake period, so the gap between the two is far
/// shorter than one tick.
#[derive(Debug, Clone, Copy)]
pub struct RtcSlowMemory;

impl RtcSlowMemory {
    fn word_ptr(word: usize) -> *mut u32 {
        debug_assert!(word < REGION_WORDS);
        (ULP_MEM_BASE as *mut u32).wrapping_add(word)
    }
}

impl PulseWords for RtcSlowMemory {
    fn read(&self, word: usize) -> u16 {
        // SAFETY: RTC slow memory is always mapped and the ULP only stores
        // whole words.
        let raw = unsafe { core::ptr::read_volatile(Self::word_ptr(word)) };
        (raw & ULP_DATA_MASK) as u16
    }

    fn write(&self, word: usize, value: u16) {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile(Self::word_ptr(word), u32::from(value)) }
    }

    fn read_and_replace(&self, word: usize, next: impl Fn(u16) -> u16) -> u16 {
        let value = self.read(word);
        self.write(word, next(value));
        value
    }
}

/// Load the program, configure both channels and start the ULP timer.
pub fn start_pulse_engine() -> anyhow::Result<HostSide<RtcSlowMemory>> {
    esp!(unsafe {
        sys::ulp_load_binary(0, ULP_PROGRAM.as_ptr(), ULP_PROGRAM.len() / core::mem::size_of::<u32>())
    })?;

    let host = HostSide::new(RtcSlowMemory);
    host.configure(&WIND, &WIND_CHANNEL);
    host.configure(&RAIN, &RAIN_CHANNEL);

    init_rtc_input(PIN_WIND, true)?;
    // GPIO35 has no internal pull resistors; the bucket has its own.
    init_rtc_input(PIN_RAIN, false)?;

    esp!(unsafe { sys::ulp_set_wakeup_period(0, ULP_WAKE_PERIOD_US) })?;
    esp!(unsafe { sys::ulp_run(ENTRY_WORD) })?;

    log::info!(
        "ULP pulse counter running ({} bytes, tick {} us, wind GPIO{} rain GPIO{})",
        ULP_PROGRAM.len(),
        ULP_WAKE_PERIOD_US,
        PIN_WIND,
        PIN_RAIN
    );
    Ok(host)
}

fn init_rtc_input(pin: i32, pull_up: bool) -> anyhow::Result<()> {
    unsafe {
        esp!(sys::rtc_gpio_init(pin))?;
        esp!(sys::rtc_gpio_set_direction(pin, sys::rtc_gpio_mode_t_RTC_GPIO_MODE_INPUT_ONLY))?;
        esp!(sys::rtc_gpio_pulldown_dis(pin))?;
        if pull_up {
            esp!(sys::rtc_gpio_pullup_en(pin))?;
        } else {
            esp!(sys::rtc_gpio_pullup_dis(pin))?;
        }
        esp!(sys::rtc_gpio_hold_en(pin))?;
    }
    Ok(())
}
