use std::{io::Write as _, os::fd::AsFd as _, time::SystemTime};

use anstyle::{AnsiColor, Effects, Style};
use env_logger::{Env, fmt::Formatter};
use log::{Level, Record};

/// Keeps the mirror silent unless something goes wrong.
const QUIET_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "debug";

/// Installs the global logger. `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: bool) {
    let default_filter = if verbose { VERBOSE_FILTER } else { QUIET_FILTER };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_filter));
    if stderr_is_journal() {
        builder.format(format_journal);
    } else {
        builder.format(format_terminal);
    }
    builder.init();
}

/// `$JOURNAL_STREAM` holds `device:inode` of the stream systemd connected us to
/// (see `systemd.exec(5)`); it is only trustworthy if stderr still is that stream.
fn stderr_is_journal() -> bool {
    let Some(expected) = std::env::var_os("JOURNAL_STREAM") else {
        return false;
    };
    rustix::fs::fstat(std::io::stderr().as_fd())
        .is_ok_and(|stat| expected.to_string_lossy() == format!("{}:{}", stat.st_dev, stat.st_ino))
}

fn syslog_priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 6,
        Level::Debug | Level::Trace => 7,
    }
}

fn format_journal(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        syslog_priority(record.level()),
        record.target(),
        record.args()
    )
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Error => AnsiColor::Red.on_default().effects(Effects::BOLD),
        Level::Warn => AnsiColor::Yellow.on_default(),
        Level::Info => AnsiColor::Green.on_default(),
        Level::Debug => AnsiColor::Blue.on_default(),
        Level::Trace => AnsiColor::Cyan.on_default(),
    }
}

fn format_terminal(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let subtle = AnsiColor::BrightBlack.on_default();
    let level = level_style(record.level());
    write!(buf, "{subtle}[{subtle:#}")?;
    match jiff::Timestamp::try_from(SystemTime::now()) {
        Ok(now) => write!(buf, "{now:.3} ")?,
        Err(_) => write!(buf, "timestamp_error ")?,
    }
    write!(buf, "{level}{}{level:#} {}", record.level(), record.target())?;
    if let Some(line) = record.line() {
        write!(buf, ":{line}")?;
    }
    writeln!(buf, "{subtle}]{subtle:#} {}", record.args())
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(Level::Error, 3)]
    #[case(Level::Warn, 4)]
    #[case(Level::Info, 6)]
    #[case(Level::Trace, 7)]
    fn test_levels_map_to_syslog_priorities(#[case] level: Level, #[case] priority: u8) {
        assert_eq!(syslog_priority(level), priority);
    }
}
