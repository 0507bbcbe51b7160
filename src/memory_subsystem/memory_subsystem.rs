use std::rc::Rc;

use crate::cpu::CpuConfig;
use crate::instructions::instructions::{Program, WordType};

/// Word addressed memory. Loads and stores go straight to the backing vector
/// when a memory instruction finishes executing.
pub(crate) struct MemorySubsystem {
    pub(crate) memory: Vec<WordType>,
}

impl MemorySubsystem {
    pub fn new(cpu_config: &CpuConfig) -> MemorySubsystem {
        let mut memory = Vec::with_capacity(cpu_config.memory_size as usize);

        for _ in 0..cpu_config.memory_size {
            memory.push(0);
        }

        MemorySubsystem {
            memory,
        }
    }

    pub(crate) fn init(&mut self, program: &Rc<Program>) {
        for k in 0..self.memory.len() {
            self.memory[k] = 0;
        }

        for data in program.data_items.values() {
            self.memory[data.offset as usize] = data.value;
        }
    }
}
