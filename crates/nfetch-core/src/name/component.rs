//! Single name component: opaque bytes with URI escaping and segment markers.

use std::fmt;

/// Marker byte that prefixes a segment number component.
pub const SEGMENT_MARKER: u8 = 0x00;

/// One opaque component of a [`ContentName`](super::ContentName).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Component(bytes.into())
    }

    /// Segment component: marker byte followed by the minimal big-endian number.
    /// Segment 0 encodes as `%00%00`, segment 1 as `%00%01`, 256 as `%00%01%00`.
    pub fn from_segment(segment: u64) -> Self {
        let mut bytes = vec![SEGMENT_MARKER];
        bytes.extend_from_slice(&minimal_be(segment));
        Component(bytes)
    }

    /// Segment number if this component carries the segment marker.
    pub fn to_segment(&self) -> Option<u64> {
        match self.0.split_first() {
            Some((&SEGMENT_MARKER, rest)) if !rest.is_empty() && rest.len() <= 8 => {
                Some(rest.iter().fold(0u64, |n, &b| (n << 8) | u64::from(b)))
            }
            _ => None,
        }
    }

    pub fn is_segment(&self) -> bool {
        self.to_segment().is_some()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Next component in canonical order: segments increment their number,
    /// anything else is incremented as a big-endian byte string with carry.
    pub fn successor(&self) -> Component {
        if let Some(seg) = self.to_segment() {
            if let Some(next) = seg.checked_add(1) {
                return Component::from_segment(next);
            }
        }
        let mut bytes = self.0.clone();
        for b in bytes.iter_mut().rev() {
            if *b == 0xFF {
                *b = 0x00;
            } else {
                *b += 1;
                return Component(bytes);
            }
        }
        // All bytes carried over (or empty): grow by one zero byte.
        bytes.push(0x00);
        Component(bytes)
    }

    /// Parse one escaped URI component. Returns `None` for components that
    /// carry no value (empty, `.` or `..`); three or more periods lose three.
    pub fn from_escaped(s: &str) -> Option<Component> {
        let bytes = unescape(s);
        if bytes.is_empty() {
            return None;
        }
        if bytes.iter().all(|&b| b == b'.') {
            if bytes.len() < 3 {
                return None;
            }
            return Some(Component(bytes[3..].to_vec()));
        }
        Some(Component(bytes))
    }

    /// Component as a filesystem-friendly string: printable UTF-8 is kept,
    /// everything else falls back to the escaped URI form.
    pub fn to_path_string(&self) -> String {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.chars().any(char::is_control) => s.to_string(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|&b| b == b'.') {
            // Period-only components are written with three extra periods.
            f.write_str("...")?;
        }
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

fn minimal_be(n: u64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    bytes[skip..].to_vec()
}

fn unescape(s: &str) -> Vec<u8> {
    let raw = s.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' && i + 2 < raw.len() {
            if let (Some(hi), Some(lo)) = (hex_val(raw[i + 1]), hex_val(raw[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_encoding() {
        assert_eq!(Component::from_segment(0).to_string(), "%00%00");
        assert_eq!(Component::from_segment(1).to_string(), "%00%01");
        assert_eq!(Component::from_segment(9).to_string(), "%00%09");
        assert_eq!(Component::from_segment(256).to_string(), "%00%01%00");
        assert_eq!(Component::from_segment(256).to_segment(), Some(256));
    }

    #[test]
    fn plain_component_is_not_segment() {
        assert_eq!(Component::new("file-name").to_segment(), None);
        assert_eq!(Component::new(vec![0x00]).to_segment(), None);
    }

    #[test]
    fn successor_of_segment_stays_a_segment() {
        let c = Component::from_segment(255).successor();
        assert_eq!(c.to_segment(), Some(256));
    }

    #[test]
    fn successor_of_bytes_carries() {
        assert_eq!(Component::new(vec![b'a']).successor(), Component::new(vec![b'b']));
        assert_eq!(
            Component::new(vec![0x01, 0xFF]).successor(),
            Component::new(vec![0x02, 0x00])
        );
        assert_eq!(
            Component::new(vec![0xFF]).successor(),
            Component::new(vec![0x00, 0x00])
        );
    }

    #[test]
    fn escaped_parsing() {
        assert_eq!(Component::from_escaped("%00%01").unwrap().to_segment(), Some(1));
        assert_eq!(Component::from_escaped("a%20b").unwrap().as_bytes(), b"a b");
        assert!(Component::from_escaped("").is_none());
        assert!(Component::from_escaped(".").is_none());
        assert!(Component::from_escaped("..").is_none());
        assert_eq!(Component::from_escaped("....").unwrap().as_bytes(), b".");
    }

    #[test]
    fn display_escapes_reserved_bytes() {
        assert_eq!(Component::new("a b/c").to_string(), "a%20b%2Fc");
        assert_eq!(Component::new(".").to_string(), "....");
    }
}
