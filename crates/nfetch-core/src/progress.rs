//! Progress snapshots for a fetch (segments done, bytes this run, rate).

/// Snapshot emitted after each stored segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchProgress {
    /// Segments on disk, including ones resumed from an earlier run.
    pub segments_done: u64,
    /// Total segments; `None` until the final segment is known.
    pub segment_count: Option<u64>,
    /// Bytes written by this run.
    pub bytes_received: u64,
    /// Seconds since this run started.
    pub elapsed_secs: f64,
}

impl FetchProgress {
    /// Rate for this run in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / self.elapsed_secs
    }

    /// Fraction of segments on disk, once the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.segment_count? {
            0 => Some(1.0),
            n => Some((self.segments_done as f64 / n as f64).min(1.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_and_rate() {
        let p = FetchProgress {
            segments_done: 5,
            segment_count: Some(10),
            bytes_received: 4096,
            elapsed_secs: 2.0,
        };
        assert_eq!(p.fraction(), Some(0.5));
        assert_eq!(p.bytes_per_sec(), 2048.0);
    }

    #[test]
    fn unknown_total_has_no_fraction() {
        let p = FetchProgress {
            segments_done: 3,
            segment_count: None,
            bytes_received: 0,
            elapsed_secs: 0.0,
        };
        assert_eq!(p.fraction(), None);
        assert_eq!(p.bytes_per_sec(), 0.0);
    }
}
