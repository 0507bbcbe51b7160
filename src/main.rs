use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;

use structopt::StructOpt;

use crate::cpu::{load_cpu_config, CPU};
use crate::loader::loader::{load, LoadError};

mod cpu;
mod loader;
mod frontend;
mod backend;
mod instructions;
mod memory_subsystem;
#[cfg(test)]
mod cpu_tests;

#[derive(StructOpt, Debug)]
#[structopt(name = "tomasim")]
struct Opt {
    /// Path of the program to load
    #[structopt(short, long, parse(from_os_str))]
    file: PathBuf,

    /// Sets a custom config file
    #[structopt(short, long, parse(from_os_str), default_value = "cpu.yaml")]
    config: PathBuf,
}

fn main() {
    env_logger::init();

    let opt = Opt::from_args();

    let cpu_config_path = opt.config.to_str().unwrap();
    let cpu_config = match load_cpu_config(cpu_config_path) {
        Ok(config) => config,
        Err(error) => {
            println!("Failed to load {}. Cause: {}", cpu_config_path, error);
            exit(1);
        }
    };

    let path = opt.file.to_str().unwrap();
    println!("Loading {}", path);
    let load_result = load(cpu_config.clone(), path);
    let program = match load_result {
        Ok(p) => Rc::new(p),
        Err(err) => {
            println!("Loading program '{}' failed.", path);
            match err {
                LoadError::ParseError(msg) => {
                    println!("{}", msg);
                    exit(1);
                }

                LoadError::NotFoundError(msg) => {
                    println!("{}", msg);
                    exit(1);
                }
            }
        }
    };

    let mut cpu = CPU::new(&cpu_config);
    cpu.run(&program);
}
