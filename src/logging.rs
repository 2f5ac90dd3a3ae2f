// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Logging setup. This crate never installs a global logger on its own
//! initiative -- a driver binary calls [`setup`] once at start-up, the same
//! way it would call [`crate::config::RunConfig::from_env_or_default`].

use log::LevelFilter;

/// Configure a plain [`fern::Dispatch`] to stdout: `[target line N][level]
/// message`, no timestamps, no color.
///
/// Calling this more than once per process will return an error from
/// `fern`/`log`, which is surfaced here as `Err` rather than panicking, since
/// a test harness may legitimately try to set it up more than once.
pub fn setup(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} line {}][{}] {}",
                record.target(),
                record.line().unwrap_or(0),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}
