// ULP Weather Station: Telemetry Packet Codec
//
// Wire layout, all multi-byte values big-endian (MessagePack):
//
// bin( map{ temperature: f32, humidity: f32, pressure: f32 | nil,
//           battery: f32, wind_heading: u16, avg_wind: f32,
//           gust_wind: f32, rain_count: u16, rain_lifetime_count: u16,
//           timemark: u32 }
//      ++ i16 checksum_high ++ i16 checksum_low )
//
// The checksum is the byte sum of the inner map, split as `sum / 256` and
// `sum % 256`. It catches line noise, not tampering.

use std::io;

use rmp::decode::ValueReadError;
use rmp::encode::ValueWriteError;

use crate::record::TelemetryRecord;

const FIELD_COUNT: u32 = 10;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[from] ValueWriteError<io::Error>),
    #[error("encode failed: {0}")]
    Write(#[from] io::Error),
    #[error("checksum high half {0} does not fit in i16")]
    ChecksumOverflow(u64),
    #[error("malformed envelope: {0}")]
    Envelope(#[from] ValueReadError<io::Error>),
    #[error("envelope declares {declared} bytes, {actual} present")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum mismatch: packet carries {carried:?}, payload sums to {computed:?}")]
    ChecksumMismatch { carried: Checksum, computed: Checksum },
}

/// The two checksum halves appended after the serialized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    pub high: i16,
    pub low: i16,
}

impl Checksum {
    /// Sum every byte and split the total into quotient and remainder by 256.
    pub fn of(bytes: &[u8]) -> Result<Self, CodecError> {
        let sum: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
        let high = i16::try_from(sum / 256).map_err(|_| CodecError::ChecksumOverflow(sum))?;
        Ok(Self {
            high,
            low: (sum % 256) as i16,
        })
    }

    pub fn to_be_bytes(self) -> [u8; CHECKSUM_LEN] {
        let [h0, h1] = self.high.to_be_bytes();
        let [l0, l1] = self.low.to_be_bytes();
        [h0, h1, l0, l1]
    }

    fn from_be_bytes(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self {
            high: i16::from_be_bytes([bytes[0], bytes[1]]),
            low: i16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Serialize a record into the inner, self-describing map.
pub fn serialize_record(record: &TelemetryRecord) -> Result<Vec<u8>, CodecError> {
    use rmp::encode::{write_f32, write_map_len, write_nil, write_str, write_u16, write_u32};

    let env = record.environment();
    let wind = record.wind();
    let mut buf = Vec::with_capacity(160);

    write_map_len(&mut buf, FIELD_COUNT)?;

    write_str(&mut buf, "temperature")?;
    write_f32(&mut buf, env.temperature)?;
    write_str(&mut buf, "humidity")?;
    write_f32(&mut buf, env.humidity)?;
    write_str(&mut buf, "pressure")?;
    match env.pressure {
        Some(pressure) => write_f32(&mut buf, pressure)?,
        None => write_nil(&mut buf)?,
    }
    write_str(&mut buf, "battery")?;
    write_f32(&mut buf, record.battery())?;
    write_str(&mut buf, "wind_heading")?;
    write_u16(&mut buf, wind.heading)?;
    write_str(&mut buf, "avg_wind")?;
    write_f32(&mut buf, wind.average)?;
    write_str(&mut buf, "gust_wind")?;
    write_f32(&mut buf, wind.gust)?;
    write_str(&mut buf, "rain_count")?;
    write_u16(&mut buf, record.rain_count())?;
    write_str(&mut buf, "rain_lifetime_count")?;
    write_u16(&mut buf, record.rain_lifetime_count())?;
    write_str(&mut buf, "timemark")?;
    write_u32(&mut buf, record.timemark())?;

    Ok(buf)
}

/// Build the bytes handed to the radio: serialized record, checksum over
/// exactly those bytes, then one more envelope around both.
pub fn encode_packet(record: &TelemetryRecord) -> Result<Vec<u8>, CodecError> {
    let mut body = serialize_record(record)?;
    let checksum = Checksum::of(&body)?;
    body.extend_from_slice(&checksum.to_be_bytes());

    let mut packet = Vec::with_capacity(body.len() + 5);
    rmp::encode::write_bin(&mut packet, &body)?;
    Ok(packet)
}

/// Receiver side: unwrap the envelope, check the checksum and return the
/// serialized record.
pub fn verify_packet(packet: &[u8]) -> Result<&[u8], CodecError> {
    let mut rd = packet;
    let declared = rmp::decode::read_bin_len(&mut rd)? as usize;
    if declared != rd.len() || declared < CHECKSUM_LEN {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: rd.len(),
        });
    }

    let (inner, tail) = rd.split_at(declared - CHECKSUM_LEN);
    let carried = Checksum::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = Checksum::of(inner)?;
    if carried != computed {
        return Err(CodecError::ChecksumMismatch { carried, computed });
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EnvironmentReading, RainReading, WindReading};

    fn record(pressure: Option<f32>) -> TelemetryRecord {
        TelemetryRecord::new(
            3_600,
            3.82,
            EnvironmentReading { temperature: 18.25, humidity: 64.5, pressure },
            WindReading { heading: 270, average: 3.5, gust: 7.75 },
            RainReading { window_pulses: 2, lifetime_pulses: 41 },
        )
        .unwrap()
    }

    #[test]
    fn checksum_splits_sum_by_256() {
        let bytes = [0xffu8; 10]; // sum 2550
        let checksum = Checksum::of(&bytes).unwrap();
        assert_eq!(checksum, Checksum { high: 9, low: 246 });
        assert_eq!(checksum.to_be_bytes(), [0x00, 0x09, 0x00, 0xf6]);
        // Deterministic.
        assert_eq!(Checksum::of(&bytes).unwrap(), checksum);
    }

    #[test]
    fn checksum_of_empty_payload_is_zero() {
        assert_eq!(Checksum::of(&[]).unwrap(), Checksum { high: 0, low: 0 });
    }

    #[test]
    fn checksum_overflow_is_an_error() {
        // 0xff * 34_000 / 256 > i16::MAX
        let bytes = vec![0xffu8; 34_000];
        assert!(matches!(Checksum::of(&bytes), Err(CodecError::ChecksumOverflow(_))));
    }

    #[test]
    fn packet_is_bin_envelope_around_checksummed_map() {
        let record = record(Some(1013.0));
        let inner = serialize_record(&record).unwrap();
        let packet = encode_packet(&record).unwrap();

        assert_eq!(inner[0], 0x8a); // fixmap, 10 entries
        assert_eq!(packet[0], 0xc4); // bin 8
        assert_eq!(packet[1] as usize, inner.len() + CHECKSUM_LEN);
        assert_eq!(&packet[2..2 + inner.len()], inner.as_slice());

        let checksum = Checksum::of(&inner).unwrap();
        assert_eq!(&packet[2 + inner.len()..], &checksum.to_be_bytes());
    }

    #[test]
    fn fields_use_fixed_wire_types() {
        use rmp::decode::{read_f32, read_map_len, read_nil, read_str, read_u16, read_u32};

        let inner = serialize_record(&record(None)).unwrap();
        let mut rd = inner.as_slice();
        assert_eq!(read_map_len(&mut rd).unwrap(), FIELD_COUNT);

        let mut keys = Vec::new();
        for _ in 0..FIELD_COUNT {
            let mut key_buf = [0u8; 32];
            let key = read_str(&mut rd, &mut key_buf).unwrap().to_owned();
            match key.as_str() {
                "temperature" => assert_eq!(read_f32(&mut rd).unwrap(), 18.25),
                "humidity" => assert_eq!(read_f32(&mut rd).unwrap(), 64.5),
                "pressure" => read_nil(&mut rd).unwrap(),
                "battery" => assert_eq!(read_f32(&mut rd).unwrap(), 3.82),
                "wind_heading" => assert_eq!(read_u16(&mut rd).unwrap(), 270),
                "avg_wind" => assert_eq!(read_f32(&mut rd).unwrap(), 3.5),
                "gust_wind" => assert_eq!(read_f32(&mut rd).unwrap(), 7.75),
                "rain_count" => assert_eq!(read_u16(&mut rd).unwrap(), 2),
                "rain_lifetime_count" => assert_eq!(read_u16(&mut rd).unwrap(), 41),
                "timemark" => assert_eq!(read_u32(&mut rd).unwrap(), 3_600),
                other => panic!("unexpected key {}", other),
            }
            keys.push(key);
        }
        assert!(rd.is_empty());
        assert_eq!(
            keys,
            [
                "temperature",
                "humidity",
                "pressure",
                "battery",
                "wind_heading",
                "avg_wind",
                "gust_wind",
                "rain_count",
                "rain_lifetime_count",
                "timemark",
            ]
        );
    }

    #[test]
    fn verify_accepts_intact_and_rejects_mutated_packets() {
        let record = record(Some(998.5));
        let packet = encode_packet(&record).unwrap();
        let inner = serialize_record(&record).unwrap();
        assert_eq!(verify_packet(&packet).unwrap(), inner.as_slice());

        let mut corrupted = packet.clone();
        corrupted[10] ^= 0x01;
        assert!(matches!(
            verify_packet(&corrupted),
            Err(CodecError::ChecksumMismatch { .. })
        ));

        let truncated = &packet[..packet.len() - 1];
        assert!(matches!(
            verify_packet(truncated),
            Err(CodecError::LengthMismatch { .. })
        ));
    }
}
