use std::cell::RefCell;
use std::rc::Rc;

use crate::cpu::{CpuConfig, PerfCounters, Trace};
use crate::instructions::instructions::{InstrQueue, Program, HALT};

/// Feeds the instruction queue in program order, one instruction per cycle.
/// When the program runs off the end of the code a halt is synthesized so the
/// backend always sees a terminating instruction.
pub(crate) struct Frontend {
    instr_queue: Rc<RefCell<InstrQueue>>,
    program_option: Option<Rc<Program>>,
    pc: usize,
    exit: bool,
    trace: Trace,
    perf_counters: Rc<RefCell<PerfCounters>>,
}

impl Frontend {
    pub(crate) fn new(cpu_config: &CpuConfig,
                      instr_queue: Rc<RefCell<InstrQueue>>,
                      perf_counters: Rc<RefCell<PerfCounters>>,
    ) -> Frontend {
        Frontend {
            instr_queue,
            program_option: None,
            pc: 0,
            exit: false,
            trace: cpu_config.trace.clone(),
            perf_counters,
        }
    }

    pub(crate) fn init(&mut self, program: &Rc<Program>) {
        self.program_option = Some(Rc::clone(program));
        self.pc = 0;
        self.exit = false;
    }

    pub(crate) fn do_cycle(&mut self) {
        match &self.program_option {
            None => return,
            Some(program) => {
                if self.exit {
                    return;
                }

                let mut instr_queue = self.instr_queue.borrow_mut();
                if instr_queue.is_full() {
                    return;
                }

                let instr = if program.code.len() == self.pc {
                    // ran off the end of the program
                    Rc::new(HALT)
                } else {
                    program.get_instr(self.pc)
                };

                if self.trace.fetch {
                    println!("Fetched [{}] pc={}", instr, self.pc);
                }

                if instr.exe_flags.is_exit {
                    self.exit = true;
                }

                instr_queue.enqueue(instr);
                self.pc += 1;
                self.perf_counters.borrow_mut().fetched_cnt += 1;
            }
        }
    }
}
