// ULP Weather Station: Telemetry Record & Sensor Readings

// ---------------------------------------------------------------------------
// Environment reading (temperature / humidity / pressure sensor)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentReading {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// hPa, absent on sensors without a barometer.
    pub pressure: Option<f32>,
}

// ---------------------------------------------------------------------------
// Wind & rain for one window
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindReading {
    /// Degrees from north, [0, 360).
    pub heading: u16,
    /// m/s
    pub average: f32,
    /// m/s
    pub gust: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RainReading {
    pub window_pulses: u16,
    pub lifetime_pulses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("wind heading {0} is outside [0, 360)")]
    HeadingOutOfRange(u16),
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
}

// ---------------------------------------------------------------------------
// Telemetry record, one per gather window, encoded by `codec`
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    timemark: u32,
    battery: f32,
    environment: EnvironmentReading,
    wind: WindReading,
    rain_count: u16,
    rain_lifetime_count: u16,
}

impl TelemetryRecord {
    /// Build and validate a record. `timemark` is seconds since boot and
    /// only tells packets apart; it is not wall-clock time.
    pub fn new(
        timemark: u32,
        battery: f32,
        environment: EnvironmentReading,
        wind: WindReading,
        rain: RainReading,
    ) -> Result<Self, RecordError> {
        finite("temperature", environment.temperature)?;
        finite("humidity", environment.humidity)?;
        if let Some(pressure) = environment.pressure {
            finite("pressure", pressure)?;
        }
        non_negative("battery", battery)?;
        non_negative("avg_wind", wind.average)?;
        non_negative("gust_wind", wind.gust)?;
        if wind.heading >= 360 {
            return Err(RecordError::HeadingOutOfRange(wind.heading));
        }

        Ok(Self {
            timemark,
            battery,
            environment,
            wind,
            rain_count: rain.window_pulses,
            rain_lifetime_count: u16::try_from(rain.lifetime_pulses).unwrap_or(u16::MAX),
        })
    }

    pub fn timemark(&self) -> u32 {
        self.timemark
    }

    pub fn battery(&self) -> f32 {
        self.battery
    }

    pub fn environment(&self) -> &EnvironmentReading {
        &self.environment
    }

    pub fn wind(&self) -> &WindReading {
        &self.wind
    }

    pub fn rain_count(&self) -> u16 {
        self.rain_count
    }

    /// Lifetime rain pulses, saturated to the wire width.
    pub fn rain_lifetime_count(&self) -> u16 {
        self.rain_lifetime_count
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), RecordError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RecordError::NotFinite { field })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), RecordError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(RecordError::Negative { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvironmentReading {
        EnvironmentReading { temperature: 12.5, humidity: 81.0, pressure: Some(1008.2) }
    }

    #[test]
    fn lifetime_saturates_to_wire_width() {
        let record = TelemetryRecord::new(
            10,
            3.9,
            env(),
            WindReading::default(),
            RainReading { window_pulses: 3, lifetime_pulses: 70_000 },
        )
        .unwrap();
        assert_eq!(record.rain_lifetime_count(), u16::MAX);
        assert_eq!(record.rain_count(), 3);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let wind = WindReading { heading: 360, ..Default::default() };
        assert_eq!(
            TelemetryRecord::new(0, 3.9, env(), wind, RainReading::default()),
            Err(RecordError::HeadingOutOfRange(360))
        );

        let wind = WindReading { gust: -1.0, ..Default::default() };
        assert!(matches!(
            TelemetryRecord::new(0, 3.9, env(), wind, RainReading::default()),
            Err(RecordError::Negative { field: "gust_wind", .. })
        ));

        let bad = EnvironmentReading { temperature: f32::NAN, ..env() };
        assert_eq!(
            TelemetryRecord::new(0, 3.9, bad, WindReading::default(), RainReading::default()),
            Err(RecordError::NotFinite { field: "temperature" })
        );
    }

    #[test]
    fn flat_battery_is_a_valid_record() {
        let record = TelemetryRecord::new(
            0,
            0.0,
            EnvironmentReading { pressure: None, ..env() },
            WindReading::default(),
            RainReading::default(),
        );
        assert!(record.is_ok());
    }
}
