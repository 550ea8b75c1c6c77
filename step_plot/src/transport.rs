use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::parse::{self, Point, PointSet};
use crate::settings::SerialSettings;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port {port} is not available: {source}")]
    Unavailable {
        port: String,
        source: serialport::Error,
    },
    #[error("No data received from the sampler ({0} reads timed out)")]
    NoData(u32),
    #[error("Failed to open capture {path}: {source}")]
    Replay {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Points of one run as received.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capture {
    pub points: Vec<Point>,
    /// True only if the run delivered the full point count. A run cut short by the sampler's
    /// own timeout ends with the end marker but is still incomplete.
    pub complete: bool,
}

/// Where the points of a run come from.
#[derive(Clone, Debug)]
pub enum DataSource {
    Serial(SerialSettings),
    /// A previously saved capture, read instead of talking to hardware.
    Replay(PathBuf),
}

impl DataSource {
    pub fn describe(&self) -> String {
        match self {
            DataSource::Serial(s) => format!("{} @ {} baud", s.port, s.baud_rate),
            DataSource::Replay(p) => format!("replay of {}", p.display()),
        }
    }

    /// Run one acquisition. Blocks until the run is complete or the source gives up.
    pub fn acquire(
        &self,
        limit: usize,
        on_point: impl FnMut(usize),
    ) -> Result<Capture, TransportError> {
        match self {
            DataSource::Serial(settings) => acquire_serial(settings, limit, on_point),
            DataSource::Replay(path) => {
                let f = std::fs::File::open(path).map_err(|source| TransportError::Replay {
                    path: path.clone(),
                    source,
                })?;
                read_run(&mut BufReader::new(f), limit, 0, on_point)
            }
        }
    }
}

fn acquire_serial(
    settings: &SerialSettings,
    limit: usize,
    on_point: impl FnMut(usize),
) -> Result<Capture, TransportError> {
    let mut port = serialport::new(&settings.port, settings.baud_rate)
        .timeout(Duration::from_millis(settings.read_timeout_ms))
        .open()
        .map_err(|source| TransportError::Unavailable {
            port: settings.port.clone(),
            source,
        })?;
    log::info!("Opened {} at {} baud", settings.port, settings.baud_rate);

    if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
        log::debug!("Could not flush stale input: {}", e);
    }
    request_run(&mut port)?;

    let mut reader = BufReader::new(port);
    read_run(&mut reader, limit, settings.max_idle_reads, on_point)
}

/// Ask the sampler for a fresh run.
pub fn request_run(writer: &mut impl Write) -> std::io::Result<()> {
    writer.write_all(&[config::RESET_BYTE])?;
    writer.flush()
}

/// Collect points until the end marker, `limit` points, or the line goes quiet.
///
/// Lines that do not parse are skipped, as is everything before the first zero timestamp
/// (including the end marker of a run that was still being written). A line cut in half by a
/// read timeout is completed by the following reads. `on_point` gets the running point count.
pub fn read_run<R: BufRead>(
    reader: &mut R,
    limit: usize,
    max_idle_reads: u32,
    mut on_point: impl FnMut(usize),
) -> Result<Capture, TransportError> {
    let mut set = PointSet::with_limit(limit);
    let mut line = Vec::new();
    let mut idle_reads = 0;

    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                if !line.is_empty() && set.accept_line(&String::from_utf8_lossy(&line)) {
                    on_point(set.len());
                }
                log::warn!("Stream closed after {} points", set.len());
                return Ok(Capture {
                    complete: set.is_complete(),
                    points: set.into_points(),
                });
            }
            Ok(_) => {
                idle_reads = 0;
                let text = String::from_utf8_lossy(&line).into_owned();
                if parse::is_end_marker(&text) {
                    if set.has_started() {
                        if !set.is_complete() {
                            log::warn!("Sampler ended the run after {} points", set.len());
                        }
                        return Ok(Capture {
                            complete: set.is_complete(),
                            points: set.into_points(),
                        });
                    }
                    log::debug!("Skipping end marker of an earlier run");
                }
                if set.accept_line(&text) {
                    on_point(set.len());
                }
                line.clear();
                if set.is_complete() {
                    return Ok(Capture {
                        points: set.into_points(),
                        complete: true,
                    });
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                idle_reads += 1;
                if idle_reads > max_idle_reads {
                    if set.is_empty() {
                        return Err(TransportError::NoData(idle_reads));
                    }
                    log::warn!("Sampler went quiet after {} points", set.len());
                    return Ok(Capture {
                        points: set.into_points(),
                        complete: false,
                    });
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Read;

    /// Reader handing out pre-recorded chunks and timeouts, like a serial port would.
    struct Scripted {
        chunks: VecDeque<Result<&'static str, ErrorKind>>,
    }

    impl Scripted {
        fn new(chunks: impl IntoIterator<Item = Result<&'static str, ErrorKind>>) -> Self {
            Self {
                chunks: chunks.into_iter().collect(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Ok(s)) => {
                    buf[..s.len()].copy_from_slice(s.as_bytes());
                    Ok(s.len())
                }
                Some(Err(kind)) => Err(kind.into()),
            }
        }
    }

    fn run(chunks: Scripted, limit: usize, max_idle: u32) -> Result<Capture, TransportError> {
        read_run(&mut BufReader::new(chunks), limit, max_idle, |_| {})
    }

    #[test]
    fn test_request_run() {
        let mut out = Vec::new();
        request_run(&mut out).unwrap();
        assert_eq!(out, vec![0x04]);
    }

    #[test]
    fn test_stops_at_end_marker() {
        let c = run(
            Scripted::new([Ok("sampler ready\r\n0,0.0\r\n10,0.5\r\nEnd\r\n20,1.0\r\n")]),
            200,
            3,
        )
        .unwrap();
        assert!(!c.complete);
        assert_eq!(
            c.points,
            vec![Point { t: 0.0, v: 0.0 }, Point { t: 0.01, v: 0.5 }]
        );
    }

    #[test]
    fn test_full_run_from_sampler() {
        use acquisition::{emit_records, AdcScale};

        let raw = (0..200u16).map(|i| i * 20).collect::<Vec<_>>();
        let mut wire = String::new();
        emit_records(&mut wire, raw.iter().copied(), 10, &AdcScale::default()).unwrap();

        let c = read_run(&mut std::io::Cursor::new(wire.into_bytes()), 200, 3, |_| {}).unwrap();
        assert!(c.complete);
        assert_eq!(c.points.len(), 200);
        for (i, p) in c.points.iter().enumerate() {
            assert_eq!(p.t, (i as f64 * 10.0) / 1000.0);
            assert_eq!(p.v, raw[i] as f64 * 3.3 / 4095.0);
        }
    }

    #[test]
    fn test_skips_tail_of_earlier_run() {
        let c = run(
            Scripted::new([Ok("1980,3.2\r\n1990,3.2\r\nEnd\r\n0,0.0\r\n10,0.5\r\nEnd\r\n")]),
            200,
            3,
        )
        .unwrap();
        assert_eq!(
            c.points,
            vec![Point { t: 0.0, v: 0.0 }, Point { t: 0.01, v: 0.5 }]
        );
    }

    #[test]
    fn test_stops_at_limit() {
        let c = run(Scripted::new([Ok("0,0.0\n10,0.5\n20,1.0\n")]), 2, 3).unwrap();
        assert!(c.complete);
        assert_eq!(c.points.len(), 2);
    }

    #[test]
    fn test_line_split_by_timeout() {
        let c = run(
            Scripted::new([
                Ok("0,0.0\r\n10,0."),
                Err(ErrorKind::TimedOut),
                Ok("5\r\n"),
                Ok("End\r\n"),
            ]),
            200,
            3,
        )
        .unwrap();
        assert_eq!(
            c.points,
            vec![Point { t: 0.0, v: 0.0 }, Point { t: 0.01, v: 0.5 }]
        );
    }

    #[test]
    fn test_no_data() {
        let timeouts = std::iter::repeat(Err(ErrorKind::TimedOut)).take(10);
        assert!(matches!(
            run(Scripted::new(timeouts), 200, 3),
            Err(TransportError::NoData(4))
        ));
    }

    #[test]
    fn test_quiet_after_partial_run() {
        let chunks = std::iter::once(Ok("0,0.0\n10,0.5\n"))
            .chain(std::iter::repeat(Err(ErrorKind::TimedOut)).take(10));
        let c = run(Scripted::new(chunks), 200, 3).unwrap();
        assert!(!c.complete);
        assert_eq!(c.points.len(), 2);
    }

    #[test]
    fn test_closed_stream() {
        let c = run(Scripted::new([Ok("0,0.0\n")]), 200, 3).unwrap();
        assert!(!c.complete);
        assert_eq!(c.points.len(), 1);
    }

    #[test]
    fn test_progress_reported() {
        let mut seen = Vec::new();
        read_run(
            &mut BufReader::new(Scripted::new([Ok("0,0.0\nnoise\n10,0.5\nEnd\n")])),
            200,
            3,
            |n| seen.push(n),
        )
        .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_replay_source() {
        let path = std::env::temp_dir().join(format!("step-plot-replay-{}.csv", std::process::id()));
        std::fs::write(&path, "0,0.0\n10,0.5\nEnd\n").unwrap();
        let c = DataSource::Replay(path.clone()).acquire(200, |_| {}).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(c.points.len(), 2);
        assert!(!c.complete);

        let missing = DataSource::Replay(PathBuf::from("/nonexistent/run.csv"));
        assert!(matches!(
            missing.acquire(200, |_| {}),
            Err(TransportError::Replay { .. })
        ));
    }

    #[test]
    fn test_serial_and_replay_agree() {
        for (bytes, limit) in [
            ("0,0.0\n10,0.5\nEnd\n", 200),
            ("0,0.0\n10,0.5\nEnd\n", 2),
            ("0,0.0\n10,0.5\n20,0.7\n", 2),
            ("0,0.0\n10,0.5\n", 200),
        ] {
            let serial = run(Scripted::new([Ok(bytes)]), limit, 3).unwrap();

            let path = std::env::temp_dir().join(format!(
                "step-plot-agree-{}-{}.csv",
                limit,
                std::process::id()
            ));
            std::fs::write(&path, bytes).unwrap();
            let replay = DataSource::Replay(path.clone()).acquire(limit, |_| {}).unwrap();
            std::fs::remove_file(&path).unwrap();

            assert_eq!(serial, replay, "{:?} with limit {}", bytes, limit);
        }
    }

    #[test]
    fn test_missing_port_is_unavailable() {
        let settings = SerialSettings {
            port: "/nonexistent/tty-step-plot".to_owned(),
            ..SerialSettings::default()
        };
        assert!(matches!(
            DataSource::Serial(settings).acquire(200, |_| {}),
            Err(TransportError::Unavailable { .. })
        ));
    }
}
