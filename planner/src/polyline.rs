//! Google encoded polyline format (precision 1e5).

use shared::Coordinate;

const PRECISION: f64 = 1e5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolylineError {
    #[error("invalid polyline character at byte {0}")]
    InvalidCharacter(usize),
    #[error("polyline ended in the middle of a value")]
    Truncated,
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut pos = 0;
    let mut lat = 0i64;
    let mut lon = 0i64;
    let mut path = Vec::new();

    while pos < bytes.len() {
        lat += next_value(bytes, &mut pos)?;
        lon += next_value(bytes, &mut pos)?;
        path.push(Coordinate {
            lat: lat as f64 / PRECISION,
            lon: lon as f64 / PRECISION,
        });
    }

    Ok(path)
}

fn next_value(bytes: &[u8], pos: &mut usize) -> Result<i64, PolylineError> {
    let mut result = 0i64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos).ok_or(PolylineError::Truncated)?;
        if !(63..127).contains(&byte) || shift > 60 {
            return Err(PolylineError::InvalidCharacter(*pos));
        }
        *pos += 1;
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

pub fn encode(path: &[Coordinate]) -> String {
    let mut out = String::with_capacity(path.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;
    for coord in path {
        let lat = (coord.lat * PRECISION).round() as i64;
        let lon = (coord.lon * PRECISION).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lon - prev_lon);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn push_value(out: &mut String, value: i64) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}
