// Copyright 2018 Ian Johnson

// This file is part of Chip-8.

// Chip-8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8.  If not, see <http://www.gnu.org/licenses/>.

//! The `chip8vm` binary program.
//!
//! Runs a program headless for a fixed time, optionally restoring and saving
//! machine state and printing the final screen.

extern crate chip8vm;
extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

use std::io::Write;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::{App, Arg, ArgMatches};
use failure::{Error, ResultExt};
use log::LevelFilter;

use chip8vm::emulator::Options;
use chip8vm::keyconfig::DEFAULT_PATH;
use chip8vm::{Emulator, HostKey, KeyConfiguration};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// An error resulting from the program itself failing (e.g. an unknown
/// opcode), as opposed to a problem with the setup.
#[derive(Debug, Fail)]
#[fail(display = "the program stopped with an error (see the log for the machine state)")]
struct ProgramFailedError;

fn main() {
    let matches = App::new("chip8vm")
        .version(VERSION)
        .author("Ian Johnson <ianprime0509@gmail.com>")
        .about("A headless Chip-8 virtual machine")
        .help_message("show this help message and exit")
        .version_message("show version information and exit")
        .arg(
            Arg::with_name("speed")
                .long("speed")
                .value_name("FACTOR")
                .help("set the speed multiplier (default 1.0)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("seconds")
                .long("seconds")
                .value_name("SECS")
                .help("run for this long before exiting (default 5)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("keys")
                .long("keys")
                .value_name("FILE")
                .help("read key bindings from FILE")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("load-state")
                .long("load-state")
                .value_name("FILE")
                .help("restore the machine from FILE before running")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("save-state")
                .long("save-state")
                .value_name("FILE")
                .help("save the machine to FILE on exit")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("dump-screen")
                .long("dump-screen")
                .help("print the screen on exit"),
        )
        .arg(
            Arg::with_name("press")
                .long("press")
                .value_name("KEY")
                .help("hold down the given host key for the whole run")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("increase verbosity"),
        )
        .arg(
            Arg::with_name("FILE")
                .help("set the program file to run")
                .required(true)
                .index(1),
        )
        .get_matches();

    let verbosity = matches.occurrences_of("verbose");
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter(None, filter)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        for cause in e.iter_chain().skip(1) {
            info!("caused by: {}", cause);
        }
        trace!("backtrace: {}", e.backtrace());
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let mut opts = Options::new();
    process_opts(&mut opts, matches)?;
    let seconds = matches
        .value_of("seconds")
        .map(|n| n.parse::<f64>())
        .unwrap_or(Ok(5.0))
        .context("invalid seconds argument")?;

    let mut emulator = Emulator::new(opts)?;
    emulator.set_key_configuration(KeyConfiguration::load(
        matches.value_of("keys").unwrap_or(DEFAULT_PATH),
    ));

    let filename = matches.value_of("FILE").unwrap();
    emulator.load_rom_file(filename)?;
    if let Some(state) = matches.value_of("load-state") {
        emulator
            .load_state_from(state)
            .with_context(|_| format!("could not load state from '{}'", state))?;
    }
    if let Some(key) = matches.value_of("press") {
        emulator.key_down(&HostKey::new(key));
    }

    emulator.start()?;
    let run_time = Duration::from_millis((seconds.max(0.0) * 1000.0) as u64);
    let started = Instant::now();
    while started.elapsed() < run_time && !emulator.is_stopped() {
        thread::sleep(Duration::from_millis(10));
    }
    let failed = emulator.is_stopped();
    emulator.stop();

    if let Some(state) = matches.value_of("save-state") {
        emulator
            .save_state_to(state)
            .with_context(|_| format!("could not save state to '{}'", state))?;
    }
    if matches.is_present("dump-screen") {
        print!("{}", emulator.display());
    }

    if failed {
        Err(ProgramFailedError)?;
    }
    Ok(())
}

/// Processes the command-line arguments and changes the necessary fields of
/// the given emulator options.
fn process_opts(opts: &mut Options, matches: &ArgMatches) -> Result<(), Error> {
    if let Some(speed) = matches.value_of("speed") {
        opts.speed = speed.parse::<f64>().context("invalid speed argument")?;
    }

    Ok(())
}
