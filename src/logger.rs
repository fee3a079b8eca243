//! Log setup. Events go to stderr through the progress bar so bar redraws and log lines
//! do not interleave.

use indicatif::ProgressBar;
use std::io::Write;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
fn default_directive(quiet: bool, verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the level picked from the flags.
pub fn init(bar: &ProgressBar, quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(quiet, verbose)));
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(ProgressWriter { bar: bar.clone() });
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

/// Hands out one [BarLine] per event.
#[derive(Clone)]
struct ProgressWriter {
    bar: ProgressBar,
}

impl<'a> MakeWriter<'a> for ProgressWriter {
    type Writer = BarLine;

    fn make_writer(&'a self) -> Self::Writer {
        BarLine {
            bar: self.bar.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and prints it with the bar suspended when dropped.
struct BarLine {
    bar: ProgressBar,
    buf: Vec<u8>,
}

impl Write for BarLine {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for BarLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        self.bar.suspend(|| {
            let _ = std::io::stderr().write_all(&buf);
        });
    }
}
