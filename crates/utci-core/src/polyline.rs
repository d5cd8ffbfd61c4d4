//! Encoded polyline decoding.
//!
//! Directions providers return route geometry in Google's polyline
//! format: each coordinate is a signed latitude/longitude delta from the
//! previous point, scaled by 1e5, zig-zag encoded and split into 5-bit
//! groups offset into printable ASCII starting at `?` (63).

use thiserror::Error;

use crate::models::GeoPoint;

const PRECISION: f64 = 1e5;
const CHUNK_MASK: i64 = 0x1f;
const CONTINUATION: i64 = 0x20;
const ASCII_OFFSET: u8 = 63;
const ASCII_MAX: u8 = 126;
/// Seven 5-bit groups cover any delta a valid coordinate can produce.
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid byte 0x{byte:02x} at position {position}")]
    InvalidByte { position: usize, byte: u8 },
    #[error("polyline ends mid-codeword at position {position}")]
    Unterminated { position: usize },
    #[error("codeword starting before position {position} is too long")]
    Overflow { position: usize },
}

/// Decode an encoded polyline into coordinates in encounter order.
///
/// Consecutive duplicate points are kept. An empty string decodes to an
/// empty list.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat = 0i64;
    let mut lon = 0i64;
    let mut points = Vec::with_capacity(bytes.len() / 4);

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        if index >= bytes.len() {
            // Latitude without a matching longitude.
            return Err(DecodeError::Unterminated { position: index });
        }
        lon += next_delta(bytes, &mut index)?;
        points.push(GeoPoint::new(lat as f64 / PRECISION, lon as f64 / PRECISION));
    }

    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, DecodeError> {
    let mut result = 0i64;
    let mut shift = 0u32;
    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(DecodeError::Unterminated { position: *index });
        };
        if !(ASCII_OFFSET..=ASCII_MAX).contains(&byte) {
            return Err(DecodeError::InvalidByte {
                position: *index,
                byte,
            });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow { position: *index });
        }
        *index += 1;

        let chunk = i64::from(byte - ASCII_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        if chunk & CONTINUATION == 0 {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode coordinates as a polyline, rounding to 1e-5 degrees.
pub fn encode(points: &[GeoPoint]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;
    for point in points {
        let lat = (point.lat * PRECISION).round() as i64;
        let lon = (point.lon * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= CONTINUATION {
        out.push(char::from((CONTINUATION | (v & CHUNK_MASK)) as u8 + ASCII_OFFSET));
        v >>= 5;
    }
    out.push(char::from(v as u8 + ASCII_OFFSET));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    #[test]
    fn decodes_reference_polyline() {
        let points = decode(REFERENCE).unwrap();
        assert_eq!(
            points,
            vec![
                GeoPoint::new(38.5, -120.2),
                GeoPoint::new(40.7, -120.95),
                GeoPoint::new(43.252, -126.453),
            ]
        );
    }

    #[test]
    fn encodes_reference_polyline() {
        let points = vec![
            GeoPoint::new(38.5, -120.2),
            GeoPoint::new(40.7, -120.95),
            GeoPoint::new(43.252, -126.453),
        ];
        assert_eq!(encode(&points), REFERENCE);
    }

    #[test]
    fn empty_string_is_empty_route() {
        assert_eq!(decode(""), Ok(vec![]));
    }

    #[test]
    fn keeps_duplicate_points() {
        let points = vec![
            GeoPoint::new(30.28565, -97.73921),
            GeoPoint::new(30.28565, -97.73921),
            GeoPoint::new(30.2862, -97.7394),
        ];
        let decoded = decode(&encode(&points)).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0], decoded[1]);
    }

    #[test]
    fn rejects_unterminated_codeword() {
        // '_' is 0x5f - 63 = 0x20: continuation bit set, nothing follows.
        assert_eq!(
            decode("_p~iF~ps|U_"),
            Err(DecodeError::Unterminated { position: 11 })
        );
    }

    #[test]
    fn rejects_latitude_without_longitude() {
        assert_eq!(
            decode("_p~iF"),
            Err(DecodeError::Unterminated { position: 5 })
        );
    }

    #[test]
    fn rejects_bytes_outside_alphabet() {
        assert_eq!(
            decode("_p~iF ps|U"),
            Err(DecodeError::InvalidByte {
                position: 5,
                byte: b' '
            })
        );
        assert!(matches!(
            decode("_p~iF~ps|U\u{e9}"),
            Err(DecodeError::InvalidByte { position: 10, .. })
        ));
    }

    #[test]
    fn rejects_overlong_codeword() {
        let err = decode("~~~~~~~~~~").unwrap_err();
        assert!(matches!(err, DecodeError::Overflow { .. }));
    }

    #[test]
    fn round_trips_random_paths_at_five_decimals() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let len = rng.random_range(1..40);
            let points: Vec<GeoPoint> = (0..len)
                .map(|_| {
                    let lat = rng.random_range(-9_000_000i64..=9_000_000) as f64 / PRECISION;
                    let lon = rng.random_range(-18_000_000i64..=18_000_000) as f64 / PRECISION;
                    GeoPoint::new(lat, lon)
                })
                .collect();
            assert_eq!(decode(&encode(&points)).unwrap(), points);
        }
    }
}
