use std::cell::RefCell;
use std::error::Error;
use std::fs::File;
use std::rc::Rc;

use serde::Deserialize;

use crate::backend::backend::Backend;
use crate::frontend::frontend::Frontend;
use crate::instructions::instructions::{InstrQueue, Program, RegisterType, WordType};
use crate::memory_subsystem::memory_subsystem::MemorySubsystem;

pub(crate) struct PerfCounters {
    pub fetched_cnt: u64,
    pub issue_cnt: u64,
    pub dispatch_cnt: u64,
    pub broadcast_cnt: u64,
    pub retired_cnt: u64,
    pub cycle_cnt: u64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self { fetched_cnt: 0, issue_cnt: 0, dispatch_cnt: 0, broadcast_cnt: 0, retired_cnt: 0, cycle_cnt: 0 }
    }
}

#[derive(Clone, Deserialize, Debug, Default)]
pub(crate) struct Trace {
    pub fetch: bool,
    pub issue: bool,
    pub dispatch: bool,
    pub broadcast: bool,
    pub commit: bool,
    pub cycle: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub(crate) struct CpuConfig {
    // the size of the instruction queue between frontend and backend
    pub(crate) instr_queue_capacity: u16,
    // the number of reservation stations
    pub(crate) rs_count: u16,
    // the capacity of the reorder buffer
    pub(crate) rob_capacity: u16,
    // the size of the memory in machine words
    pub(crate) memory_size: u32,
    // if processing of a single instruction should be traced (printed)
    pub(crate) trace: Trace,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            instr_queue_capacity: 8,
            rs_count: 8,
            rob_capacity: 16,
            memory_size: 64,
            trace: Trace::default(),
        }
    }
}

pub fn load_cpu_config(file_path: &str) -> Result<CpuConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config = serde_yaml::from_reader(file)?;
    Ok(config)
}

pub(crate) struct CPU {
    backend: Backend,
    frontend: Frontend,
    pub(crate) memory_subsystem: Rc<RefCell<MemorySubsystem>>,
    pub(crate) arch_reg_file: Rc<RefCell<ArchRegFile>>,
    trace: Trace,
    pub(crate) perf_counters: Rc<RefCell<PerfCounters>>,
}

impl CPU {
    pub(crate) fn new(cpu_config: &CpuConfig) -> CPU {
        let instr_queue = Rc::new(RefCell::new(InstrQueue::new(cpu_config.instr_queue_capacity)));

        let perf_counters = Rc::new(RefCell::new(PerfCounters::new()));

        let memory_subsystem = Rc::new(RefCell::new(
            MemorySubsystem::new(cpu_config)));

        let arch_reg_file = Rc::new(RefCell::new(
            ArchRegFile::new(GENERAL_REG_CNT)));

        let backend = Backend::new(
            cpu_config,
            Rc::clone(&instr_queue),
            Rc::clone(&memory_subsystem),
            Rc::clone(&arch_reg_file),
            Rc::clone(&perf_counters),
        );

        let frontend = Frontend::new(
            cpu_config,
            Rc::clone(&instr_queue),
            Rc::clone(&perf_counters),
        );

        CPU {
            backend,
            frontend,
            memory_subsystem,
            arch_reg_file,
            trace: cpu_config.trace.clone(),
            perf_counters: Rc::clone(&perf_counters),
        }
    }

    pub(crate) fn run(&mut self, program: &Rc<Program>) {
        self.frontend.init(program);

        self.memory_subsystem.borrow_mut().init(program);

        log::info!("Running program with {} instructions", program.code.len());

        while !self.backend.exit {
            {
                let mut perf_counters = self.perf_counters.borrow_mut();
                perf_counters.cycle_cnt += 1;
                assert!(perf_counters.cycle_cnt < MAX_CYCLES,
                        "CPU: exceeded {} cycles without reaching an exit instruction", MAX_CYCLES);
            }

            if self.trace.cycle {
                let perf_counters = self.perf_counters.borrow();
                println!("[Cycles:{}][Fetched={}][Issued={}][Dispatched={}][Broadcast={}][Retired={}][IPC={:.2}]",
                         perf_counters.cycle_cnt,
                         perf_counters.fetched_cnt,
                         perf_counters.issue_cnt,
                         perf_counters.dispatch_cnt,
                         perf_counters.broadcast_cnt,
                         perf_counters.retired_cnt,
                         perf_counters.retired_cnt as f32 / perf_counters.cycle_cnt as f32
                );
            }

            self.backend.do_cycle();
            self.frontend.do_cycle();
        }

        let perf_counters = self.perf_counters.borrow();
        println!("Program complete: {} instructions in {} cycles (IPC={:.2})",
                 perf_counters.retired_cnt,
                 perf_counters.cycle_cnt,
                 perf_counters.retired_cnt as f32 / perf_counters.cycle_cnt as f32);
    }
}

pub const GENERAL_REG_CNT: u16 = 16;

// safety net for programs that never reach a halt
const MAX_CYCLES: u64 = 1_000_000;

pub struct ArchRegFile {
    entries: Vec<WordType>,
}

impl ArchRegFile {
    pub(crate) fn new(reg_count: u16) -> ArchRegFile {
        let mut array = Vec::with_capacity(reg_count as usize);
        for _ in 0..reg_count {
            array.push(0);
        }

        ArchRegFile { entries: array }
    }

    pub fn get_value(&self, reg: RegisterType) -> WordType {
        self.entries[reg as usize]
    }

    pub fn set_value(&mut self, reg: RegisterType, value: WordType) {
        self.entries[reg as usize] = value;
    }
}
