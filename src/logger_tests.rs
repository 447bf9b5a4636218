use super::*;
use crate::sink::{FileSink, RotatingDirectorySink, TerminalFormat, TerminalSink};
use crate::rotation::RotationPolicy;
use std::io;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stream that fails while `broken` is set.
#[derive(Clone, Default)]
struct Flaky {
    broken: Arc<AtomicBool>,
    inner: Captured,
}

impl Write for Flaky {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::other("device unplugged"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn terminal(captured: &Captured) -> TerminalSink {
    TerminalSink::with_writer(Box::new(captured.clone()), TerminalFormat::Default)
}

#[test]
fn test_logger_with_no_sinks_accepts_records() {
    let logger = Logger::builder().build();
    logger.info("nothing listens", Fields::new());
    let stats = logger.stats();
    assert_eq!(stats.accepted, 1);
    assert!(stats.sinks.is_empty());
    logger.shutdown().unwrap();
}

#[test]
fn test_logger_fans_out_to_every_sink() {
    let temp_dir = TempDir::new().unwrap();
    let captured = Captured::default();
    let file_path = temp_dir.path().join("cloudflared.log");
    let logger = Logger::builder()
        .sink(terminal(&captured))
        .sink(FileSink::open(&file_path).unwrap())
        .sink(RotatingDirectorySink::open(temp_dir.path().join("logs"), RotationPolicy::default()).unwrap())
        .build();

    logger.info("Starting tunnel", Fields::new().with("tunnelID", "t-1"));
    logger.shutdown().unwrap();

    assert_eq!(captured.lines().len(), 1);
    assert!(captured.lines()[0].contains("INF Starting tunnel tunnelID=t-1"));
    for path in [file_path, temp_dir.path().join("logs").join("cloudflared.log")] {
        let content = std::fs::read_to_string(path).unwrap();
        let json: serde_json::Value = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(json["message"], "Starting tunnel");
        assert_eq!(json["tunnelID"], "t-1");
    }
}

#[test]
fn test_logger_filters_below_min_level() {
    let captured = Captured::default();
    let logger = Logger::builder()
        .min_level(Level::Info)
        .sink(terminal(&captured))
        .build();

    logger.debug("noise", Fields::new());
    logger.info("signal", Fields::new());

    assert_eq!(captured.lines().len(), 1);
    let stats = logger.stats();
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.accepted, 1);
    assert!(!logger.enabled(Level::Debug));
    assert!(logger.enabled(Level::Error));
}

#[test]
fn test_failing_sink_does_not_block_others() {
    let captured = Captured::default();
    let flaky = Flaky::default();
    flaky.broken.store(true, Ordering::SeqCst);
    let logger = Logger::builder()
        .sink(TerminalSink::with_writer(Box::new(flaky.clone()), TerminalFormat::Json))
        .sink(terminal(&captured))
        .build();

    for i in 0..5 {
        logger.info("request served", Fields::new().with("seq", i));
    }

    let lines = captured.lines();
    // Five records plus one failure report.
    assert_eq!(lines.len(), 6);
    assert_eq!(lines.iter().filter(|l| l.contains("Log sink failed")).count(), 1);

    let stats = logger.stats();
    assert_eq!(stats.sinks[0].failed, 5);
    assert_eq!(stats.sinks[0].written, 0);
    assert_eq!(stats.sinks[1].written, 5);
    assert_eq!(stats.total_failed(), 5);
}

#[test]
fn test_sink_recovery_is_reported() {
    let captured = Captured::default();
    let flaky = Flaky::default();
    let logger = Logger::builder()
        .sink(TerminalSink::with_writer(Box::new(flaky.clone()), TerminalFormat::Default))
        .sink(terminal(&captured))
        .build();

    flaky.broken.store(true, Ordering::SeqCst);
    logger.warn("first", Fields::new());
    logger.warn("second", Fields::new());
    flaky.broken.store(false, Ordering::SeqCst);
    logger.warn("third", Fields::new());

    let lines = captured.lines();
    assert_eq!(lines.iter().filter(|l| l.contains("Log sink failed")).count(), 1);
    assert_eq!(lines.iter().filter(|l| l.contains("Log sink recovered")).count(), 1);
    assert_eq!(flaky.inner.lines().len(), 1);
    assert!(flaky.inner.lines()[0].contains("third"));
}

#[test]
fn test_shutdown_is_idempotent_and_rejects_later_records() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cloudflared.log");
    let logger = Logger::builder().sink(FileSink::open(&path).unwrap()).build();

    logger.info("before", Fields::new());
    logger.shutdown().unwrap();
    logger.shutdown().unwrap();
    assert!(logger.is_shut_down());

    logger.info("after", Fields::new());
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert_eq!(logger.stats().rejected, 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_shutdown_aggregates_close_errors() {
    let captured = Captured::default();
    let logger = Logger::builder()
        .sink(terminal(&captured))
        .sink(FileSink::open("/dev/full").unwrap())
        .build();
    logger.info("lost on /dev/full", Fields::new());

    let err = logger.shutdown().unwrap_err();
    assert_eq!(err.errors.len(), 1);
    assert_eq!(err.errors[0].sink(), "file");
    // The terminal sink was still closed.
    assert!(logger.shutdown().is_ok());
}

#[test]
fn test_clones_share_sinks() {
    let captured = Captured::default();
    let logger = Logger::builder().sink(terminal(&captured)).build();
    let clone = logger.clone();
    clone.error("from clone", Fields::new());
    logger.shutdown().unwrap();
    assert!(clone.is_shut_down());
    assert_eq!(captured.lines().len(), 1);
}

#[test]
fn test_context_logger_merges_fields() {
    let captured = Captured::default();
    let logger = Logger::builder()
        .min_level(Level::Debug)
        .sink(TerminalSink::with_writer(Box::new(captured.clone()), TerminalFormat::Json))
        .build();

    let tunnel = logger.with_fields(Fields::new().with("tunnelID", "t-1"));
    let conn = tunnel.with_fields(Fields::new().with("connIndex", 2_u8));
    conn.info("Registered tunnel connection", Fields::new().with("location", "ams01"));
    conn.debug("override", Fields::new().with("connIndex", 3_u8));

    let lines = captured.lines();
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["tunnelID"], "t-1");
    assert_eq!(first["connIndex"], 2);
    assert_eq!(first["location"], "ams01");
    let second: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(second["connIndex"], 3);
    assert_eq!(conn.fields().len(), 2);
}

#[test]
fn test_context_logger_respects_level() {
    let captured = Captured::default();
    let logger = Logger::builder()
        .min_level(Level::Warn)
        .sink(terminal(&captured))
        .build();
    let ctx = logger.with_fields(Fields::new().with("tunnelID", "t-1"));
    ctx.info("quiet", Fields::new());
    ctx.error("loud", Fields::new());
    assert_eq!(captured.lines().len(), 1);
    assert_eq!(ctx.logger().stats().filtered, 1);
}

#[test]
fn test_reentry_flag_only_set_inside_log() {
    assert!(!is_logging_on_this_thread());
    {
        let _guard = ReentryGuard::enter();
        assert!(is_logging_on_this_thread());
    }
    assert!(!is_logging_on_this_thread());
}

#[test]
fn test_stats_track_rotations() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Logger::builder()
        .sink(RotatingDirectorySink::open(temp_dir.path(), RotationPolicy::new(10).unwrap()).unwrap())
        .build();
    logger.info("one", Fields::new());
    logger.info("two", Fields::new());
    let stats = logger.stats();
    assert_eq!(stats.sink("directory").unwrap().rotations, 2);
    assert!(stats.sink("file").is_none());
}

#[test]
fn test_rotation_failure_is_reported_once_without_failing_the_sink() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    std::fs::create_dir(dir.join("cloudflared.log.1")).unwrap();
    std::fs::write(dir.join("cloudflared.log.1").join("pin"), "x").unwrap();
    let captured = Captured::default();
    let logger = Logger::builder()
        .sink(terminal(&captured))
        .sink(RotatingDirectorySink::open(dir, RotationPolicy::new(10).unwrap()).unwrap())
        .build();

    logger.info("one", Fields::new());
    logger.info("two", Fields::new());

    let lines = captured.lines();
    assert_eq!(lines.iter().filter(|l| l.contains("Log rotation failed")).count(), 1);
    assert!(!lines.iter().any(|l| l.contains("Log sink failed")));
    assert_eq!(logger.stats().total_failed(), 0);
}

#[test]
fn test_drop_flushes_sinks() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cloudflared.log");
    {
        let logger = Logger::builder().sink(FileSink::open(&path).unwrap()).build();
        logger.info("dropped without shutdown", Fields::new());
    }
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("dropped without shutdown"));
}
