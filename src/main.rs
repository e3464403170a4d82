// Ensure each result error is either unwrapped or returned
#![deny(unused_must_use)]

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

mod class;
mod error;
mod gc;
mod interp;
mod jar;
mod reader;

use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::process::exit;

use pretty_env_logger::env_logger::{Builder, Target};
use log::LevelFilter;

use crate::class::Class;
use crate::jar::load_jar;

fn init_logging() {
    Builder::from_default_env()
        .filter_level(LevelFilter::Debug)
        .target(Target::Stdout)
        .init();
}

fn read_file(path: &str) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// A bare `.class` file starts with the class magic; anything else is
/// handed to the JAR loader, which will itself fail cleanly if it isn't a
/// valid ZIP.
fn is_class_file(data: &[u8]) -> bool {
    data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == 0xCAFE_BABE
}

/// I/O errors (missing file, permission denied, short read) propagate
/// verbatim as `io::Error`; format/runtime errors convert through
/// `From<CoreError> for io::Error` so both can travel the same `?` chain.
fn load(path: &str) -> io::Result<Vec<Class>> {
    let data = read_file(path)?;

    if is_class_file(&data) {
        info!("loading {:?} as a standalone class file", path);
        Ok(vec![Class::parse(&data).map_err(io::Error::from)?])
    } else {
        info!("loading {:?} as a JAR archive", path);
        load_jar(&data).map_err(io::Error::from)
    }
}

fn main() {
    init_logging();

    let mut args = env::args();
    let _binary = args.next();
    let path = match args.next() {
        Some(p) => p,
        None => {
            eprintln!("usage: coreclass <path-to-.jar-or-.class>");
            exit(1);
        }
    };

    match load(&path) {
        Ok(classes) => {
            info!("loaded {} class(es) from {:?}", classes.len(), path);
            for class in &classes {
                match class.name() {
                    Ok(name) => println!("{}", name),
                    Err(e) => warn!("loaded class with unresolvable name: {}", e),
                }
            }
        }
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    }
}
