//! Defines the diagnostic console that logs to stderr.
//!
//! Results go to the output file; everything the `log` facade emits goes here so the two
//! never interleave.

use std::io::{self, Write};

use log::LevelFilter;
use spin::{Mutex, Once};

type Sink = Box<dyn Write + Send>;

pub struct Console {
    sink: Mutex<Option<Sink>>,
}

static DEFAULT: Once<Console> = Once::new();

impl Console {
    /// Creates the global console, installs it as the logger and sets the level filter.
    pub fn init(level: LevelFilter) -> &'static Self {
        let console = Self::default();
        console.install(level);
        console
    }

    pub fn default() -> &'static Self {
        DEFAULT.call_once(|| Console {
            sink: Mutex::new(Some(Box::new(io::stderr()))),
        })
    }

    pub fn install(&'static self, level: LevelFilter) {
        // A logger may already be installed (e.g. by a test harness); keep it.
        if log::set_logger(self).is_ok() {
            log::set_max_level(level);
        }
    }

    /// Redirects log output to `sink`.
    pub fn attach(&self, sink: impl Write + Send + 'static) {
        *self.sink.lock() = Some(Box::new(sink));
    }

    /// Drops all log output until another sink is attached.
    pub fn detach(&self) {
        *self.sink.lock() = None;
    }
}

impl log::Log for Console {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = &mut *self.sink.lock() {
            // Nowhere left to report a failure to write a diagnostic.
            let _ = write_log_entry_to(sink, record);
        }
    }

    fn flush(&self) {
        if let Some(sink) = &mut *self.sink.lock() {
            let _ = sink.flush();
        }
    }
}

/// Maps the number of `-v` flags to a level filter.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn write_log_entry_to(writer: &mut impl Write, record: &log::Record) -> io::Result<()> {
    #[cfg(any(debug_assertions, feature = "detailed-logging"))]
    return writeln!(
        writer,
        "[{} {}:{} {}] {}",
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.target(),
        record.args()
    );
    #[cfg(not(any(debug_assertions, feature = "detailed-logging")))]
    return writeln!(writer, "[{:5}] {}", record.level(), record.args());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_for_verbosity(1), LevelFilter::Info);
        assert_eq!(level_for_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(3), LevelFilter::Trace);
        assert_eq!(level_for_verbosity(200), LevelFilter::Trace);
    }

    /// A cloneable in-memory sink.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    #[test]
    fn attach_redirects_and_detach_silences() {
        let console = Console::init(LevelFilter::Trace);
        let captured = Captured::default();

        console.attach(captured.clone());
        log::info!("redirected line");
        console.detach();
        log::info!("dropped line");

        let text = captured.text();
        assert!(text.contains("redirected line"));
        assert!(!text.contains("dropped line"));
    }

    #[test]
    fn entry_contains_level_and_message() {
        let mut out = Vec::new();
        write_log_entry_to(
            &mut out,
            &log::Record::builder()
                .args(format_args!("snapshot ready"))
                .level(log::Level::Info)
                .target("paging::snapshot")
                .build(),
        )
        .unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("[INFO"));
        assert!(line.trim_end().ends_with("snapshot ready"));
    }
}
