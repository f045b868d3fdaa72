use env_logger::fmt::Formatter;
use env_logger::Builder;
use log::{LevelFilter, Record};
use std::io;
use std::io::Write;

/// Log lines start with `c ` so they never mix with result lines on stdout.
fn comment_line(buf: &mut Formatter, record: &Record) -> io::Result<()> {
    writeln!(buf, "c {} - {}", record.level(), record.args())
}

fn builder() -> Builder {
    let mut builder = Builder::from_default_env();
    builder.format(comment_line);
    builder
}

pub fn build_logger_for_level(level: LevelFilter) {
    builder().filter(None, level).init();
}

/// Level taken from `RUST_LOG`.
pub fn build_logger() {
    builder().init();
}

