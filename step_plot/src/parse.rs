/// One measured point: time in seconds, voltage in volts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub t: f64,
    pub v: f64,
}

/// Parse a `<timestamp_ms>,<voltage>` line. Fields after the voltage are ignored, anything
/// else is noise.
pub fn parse_line(l: &str) -> Option<Point> {
    let mut fields = l.trim().split(',');
    let t: f64 = fields.next()?.trim().parse().ok()?;
    let v: f64 = fields.next()?.trim().parse().ok()?;
    if !t.is_finite() || !v.is_finite() {
        return None;
    }
    Some(Point { t: t / 1000.0, v })
}

pub fn is_end_marker(l: &str) -> bool {
    l.trim() == config::END_MARKER
}

/// Experimental points of one run, capped at a fixed count.
///
/// Points are only collected from the first zero timestamp on, so the tail of a run that was
/// already being written when the new one was requested is dropped.
#[derive(Clone, Debug, Default)]
pub struct PointSet {
    points: Vec<Point>,
    limit: usize,
    started: bool,
}

impl PointSet {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            points: Vec::with_capacity(limit),
            limit,
            started: false,
        }
    }

    /// Feed one received line. Returns whether a point was added.
    pub fn accept_line(&mut self, l: &str) -> bool {
        if self.is_complete() {
            return false;
        }
        match parse_line(l) {
            Some(p) if self.started || p.t == 0.0 => {
                self.started = true;
                self.points.push(p);
                true
            }
            Some(_) => {
                log::trace!("skipping stale line {:?}", l);
                false
            }
            None => {
                log::trace!("skipping line {:?}", l);
                false
            }
        }
    }

    /// Whether the first line of the run has been seen. End markers before that belong to an
    /// earlier run.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}

/// Write points back in the wire format.
pub fn write_capture(mut dst: impl std::io::Write, points: &[Point]) -> std::io::Result<()> {
    for p in points {
        writeln!(dst, "{},{:?}", (p.t * 1000.0).round() as i64, p.v)?;
    }
    writeln!(dst, "{}", config::END_MARKER)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(" "), None);
        assert_eq!(parse_line("End"), None);
        assert_eq!(parse_line("10"), None);
        assert_eq!(parse_line("10;3.3"), None);
        assert_eq!(parse_line("abc,3.3"), None);
        assert_eq!(parse_line("10,volts"), None);
        assert_eq!(parse_line("10,3.3,7"), Some(Point { t: 0.01, v: 3.3 }));
        assert_eq!(parse_line("10,3.3,"), Some(Point { t: 0.01, v: 3.3 }));
        assert_eq!(parse_line("10,NaN"), None);
        assert_eq!(parse_line("10,3.3"), Some(Point { t: 0.01, v: 3.3 }));
        assert_eq!(parse_line("  0,0.0\r"), Some(Point { t: 0.0, v: 0.0 }));
        assert_eq!(
            parse_line("1990, 1.5e0"),
            Some(Point { t: 1.99, v: 1.5 })
        );
    }

    #[test]
    fn test_noise_leaves_points_unchanged() {
        let mut set = PointSet::with_limit(10);
        assert!(set.accept_line("0,0.0"));
        let before = set.points().to_vec();

        for noise in ["", "Step response sampler v0.1", "10", "x,y", ">>> ", "10,", ",3.3"] {
            assert!(!set.accept_line(noise));
        }
        assert_eq!(set.points(), &before[..]);
    }

    #[test]
    fn test_point_limit() {
        let mut set = PointSet::with_limit(2);
        assert!(set.accept_line("0,0.0"));
        assert!(set.accept_line("10,0.5"));
        assert!(set.is_complete());
        assert!(!set.accept_line("20,0.7"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_stale_lines_before_run_start() {
        let mut set = PointSet::with_limit(10);
        assert!(!set.has_started());
        assert!(!set.accept_line("1980,3.2"));
        assert!(!set.accept_line("1990,3.2"));
        assert!(set.is_empty());

        assert!(set.accept_line("0,0.0"));
        assert!(set.has_started());
        assert!(set.accept_line("10,0.1"));
        assert_eq!(
            set.points(),
            &[Point { t: 0.0, v: 0.0 }, Point { t: 0.01, v: 0.1 }][..]
        );
    }

    #[test]
    fn test_write_capture() {
        let points = vec![Point { t: 0.0, v: 0.0 }, Point { t: 0.01, v: 1.25 }];
        let mut out = Vec::new();
        write_capture(&mut out, &points).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "0,0.0\n10,1.25\nEnd\n");

        let mut set = PointSet::with_limit(200);
        for l in text.lines().take_while(|l| !is_end_marker(l)) {
            set.accept_line(l);
        }
        assert_eq!(set.into_points(), points);
    }
}
