//! Canonical key generation for (quota name, labels) pairs.

use std::fmt::Write;

use super::definition::{LabelValue, Labels};

/// Separator written before each label.
const LABEL_SEPARATOR: char = ';';

/// Produce a unique key representing the given quota name and labels.
///
/// Labels are written in sorted name order so the iteration order of the
/// label map never affects the result.
pub fn make_key(name: &str, labels: &Labels) -> String {
    let mut names: Vec<&str> = Vec::with_capacity(labels.len());
    names.extend(labels.keys().map(String::as_str));
    names.sort_unstable();

    let mut buf = String::with_capacity(name.len() + labels.len() * 16);
    buf.push_str(name);

    for label in names {
        buf.push(LABEL_SEPARATOR);
        buf.push_str(label);
        buf.push('=');
        write_value(&mut buf, &labels[label]);
    }

    buf
}

fn write_value(buf: &mut String, value: &LabelValue) {
    // Writing into a String cannot fail.
    match value {
        LabelValue::String(v) => buf.push_str(v),
        LabelValue::Int64(v) => {
            let _ = write!(buf, "{:x}", v);
        }
        LabelValue::Double(v) => {
            let _ = write!(buf, "{:x}", v.to_bits());
        }
        LabelValue::Bool(v) => buf.push_str(if *v { "true" } else { "false" }),
        LabelValue::Bytes(v) => write_bytes(buf, v),
        LabelValue::StringMap(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for k in keys {
                buf.push_str(k);
                buf.push_str(&map[k]);
            }
        }
    }
}

/// Append raw bytes, escaping invalid UTF-8 sequences as `\xNN`.
fn write_bytes(buf: &mut String, mut bytes: &[u8]) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                buf.push_str(s);
                return;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                buf.push_str(std::str::from_utf8(valid).unwrap_or_default());

                let invalid = e.error_len().unwrap_or(rest.len());
                for b in &rest[..invalid] {
                    let _ = write!(buf, "\\x{:02x}", b);
                }
                bytes = &rest[invalid..];
            }
        }
    }
}
