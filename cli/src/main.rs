use std::env;
use std::fs;
use std::io::{self, Write};

use clap::{App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use anyhow::Error;

use smtbool_core::solver::Solver;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("SMTBOOL_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is smtbool {}", env!("CARGO_PKG_VERSION"));
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("smtbool")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg(Arg::from_usage(
            "--log=[FILTER] 'Override the SMTBOOL_LOG filter for this run'",
        ))
        .get_matches();

    init_logging();

    if let Some(filter) = matches.value_of("log") {
        log::set_max_level(filter.parse().unwrap_or(LevelFilter::Info));
    }

    banner();

    let mut solver = Solver::new();

    let stdin = io::stdin();

    let mut locked_stdin;
    let mut opened_file;

    let file = match matches.value_of("INPUT") {
        Some(path) => {
            info!("Reading file '{}'", path);
            opened_file = fs::File::open(path)?;
            &mut opened_file as &mut dyn io::Read
        }
        None => {
            info!("Reading from stdin");
            locked_stdin = stdin.lock();
            &mut locked_stdin as &mut dyn io::Read
        }
    };

    solver.add_dimacs_cnf(file)?;

    match solver.solve() {
        Some(true) => {
            println!("s SATISFIABLE");
            print!("v");
            for l in solver.model().unwrap() {
                print!(" {}", l);
            }
            println!(" 0");
            Ok(10)
        }
        Some(false) => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
        None => {
            println!("s UNKNOWN");
            Ok(0)
        }
    }
}
