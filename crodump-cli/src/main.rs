use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};

mod export;

fn execute(matches: &ArgMatches) -> anyhow::Result<()> {
    let database_dir: &String = matches.get_one("database_dir").unwrap();
    let target_dir: &String = matches.get_one("target_dir").unwrap();

    let db = crodump::Database::parse(database_dir)
        .with_context(|| format!("failed to parse database in `{database_dir}`"))?;

    export::write_tables(&db, &PathBuf::from(target_dir))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = Command::new("crodump")
        .about("Generate CSV files from a CronosPro/CronosPlus database")
        .arg(
            Arg::new("database_dir")
                .required(true)
                .value_name("DATABASE_DIR")
                .help("Folder containing CroStru.dat, CroBank.tad and CroBank.dat"),
        )
        .arg(
            Arg::new("target_dir")
                .required(true)
                .value_name("TARGET_DIR")
                .help("Folder to write one CSV file per table into"),
        )
        .get_matches();

    if let Err(error) = execute(&matches) {
        eprintln!("Error: {error:#}");
        process::exit(1);
    }
}
