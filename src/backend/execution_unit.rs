use std::collections::VecDeque;
use std::rc::Rc;

use crate::backend::reservation_station::RSTable;
use crate::instructions::instructions::{FUType, Instr, Opcode, WordType, FU_TYPE_CNT};
use crate::memory_subsystem::memory_subsystem::MemorySubsystem;

#[derive(Clone, Copy, Debug, PartialEq)]
enum FUState {
    IDLE,
    EXECUTING,
    COMPLETED,
}

pub(crate) struct FUOutput {
    pub(crate) result: WordType,
    pub(crate) rob_index: u16,
    pub(crate) rs_index: u16,
}

/// A single execution unit. It accepts one instruction at dispatch, counts
/// down its latency, and holds the result until the common data bus picks it
/// up. Memory instructions touch the memory subsystem in their final cycle.
pub(crate) struct FU {
    fu_type: FUType,
    state: FUState,
    cycles_remaining: u8,
    rob_index: u16,
    rs_index: u16,
    rs1_data: WordType,
    rs2_data: WordType,
    result: WordType,
    instr: Option<Rc<Instr>>,
}

impl FU {
    fn new(fu_type: FUType) -> Self {
        Self {
            fu_type,
            state: FUState::IDLE,
            cycles_remaining: 0,
            rob_index: 0,
            rs_index: 0,
            rs1_data: 0,
            rs2_data: 0,
            result: 0,
            instr: None,
        }
    }

    pub fn busy(&self) -> bool {
        self.state != FUState::IDLE
    }

    pub fn done(&self) -> bool {
        self.state == FUState::COMPLETED
    }

    pub fn issue(
        &mut self,
        instr: Rc<Instr>,
        rs1_data: WordType,
        rs2_data: WordType,
        rob_index: u16,
        rs_index: u16,
    ) {
        assert!(self.state == FUState::IDLE, "FU: {:?} unit accepted an instruction while busy", self.fu_type);

        self.state = FUState::EXECUTING;
        self.cycles_remaining = self.fu_type.latency();
        self.rob_index = rob_index;
        self.rs_index = rs_index;
        self.rs1_data = rs1_data;
        self.rs2_data = rs2_data;
        self.result = 0;
        self.instr = Some(instr);
    }

    pub fn execute(&mut self, memory_subsystem: &mut MemorySubsystem) {
        if self.state != FUState::EXECUTING {
            return;
        }

        self.cycles_remaining -= 1;
        if self.cycles_remaining > 0 {
            return;
        }

        let instr = self.instr.as_ref().unwrap();
        let rs1 = self.rs1_data;
        let rs2 = self.rs2_data;
        self.result = match instr.opcode {
            Opcode::NOP => 0,
            Opcode::HALT => 0,
            Opcode::LI => instr.imm,
            Opcode::MOV => rs1,
            Opcode::ADD => rs1.wrapping_add(rs2),
            Opcode::SUB => rs1.wrapping_sub(rs2),
            Opcode::AND => rs1 & rs2,
            Opcode::OR => rs1 | rs2,
            Opcode::XOR => rs1 ^ rs2,
            Opcode::ADDI => rs1.wrapping_add(instr.imm),
            Opcode::MUL => rs1.wrapping_mul(rs2),
            Opcode::DIV => {
                // divide by zero yields all ones, like RISC-V
                if rs2 == 0 {
                    WordType::MAX
                } else {
                    rs1 / rs2
                }
            }
            Opcode::LW => {
                let address = rs1.wrapping_add(instr.imm) as usize;
                memory_subsystem.memory[address]
            }
            Opcode::SW => {
                let address = rs1.wrapping_add(instr.imm) as usize;
                memory_subsystem.memory[address] = rs2;
                rs2
            }
        };
        self.state = FUState::COMPLETED;
    }

    pub fn get_output(&self) -> FUOutput {
        assert!(self.state == FUState::COMPLETED, "FU: {:?} unit has no result", self.fu_type);
        FUOutput { result: self.result, rob_index: self.rob_index, rs_index: self.rs_index }
    }

    pub fn clear(&mut self) {
        self.state = FUState::IDLE;
        self.cycles_remaining = 0;
        self.instr = None;
    }
}

/// One execution unit per functional unit category, indexed by FUType.
pub(crate) struct FUTable {
    array: Vec<FU>,
}

impl FUTable {
    pub fn new() -> Self {
        let mut array = Vec::with_capacity(FU_TYPE_CNT);
        array.push(FU::new(FUType::ALU));
        array.push(FU::new(FUType::MUL));
        array.push(FU::new(FUType::LSU));
        Self { array }
    }

    pub fn get(&self, fu_type: FUType) -> &FU {
        &self.array[fu_type as usize]
    }

    pub fn get_mut(&mut self, fu_type: FUType) -> &mut FU {
        &mut self.array[fu_type as usize]
    }

    pub fn execute_all(&mut self, memory_subsystem: &mut MemorySubsystem) {
        for fu in self.array.iter_mut() {
            fu.execute(memory_subsystem);
        }
    }

    /// The first unit holding a finished result, if any.
    pub fn find_done(&self) -> Option<FUType> {
        for fu in self.array.iter() {
            if fu.done() {
                return Some(fu.fu_type);
            }
        }
        None
    }
}

/// Keeps memory instructions in program order. Stations are locked while an
/// older memory instruction is still in flight and unlocked as the queue
/// drains, so the dispatch scan never reorders loads and stores.
pub(crate) struct LSUOrdering {
    queue: VecDeque<u16>,
}

impl LSUOrdering {
    pub fn new(capacity: u16) -> Self {
        Self { queue: VecDeque::with_capacity(capacity as usize) }
    }

    pub fn on_issue(&mut self, rs_index: u16, rs_table: &mut RSTable) {
        self.queue.push_back(rs_index);
        if self.queue.len() > 1 {
            rs_table.set_locked(rs_index, true);
        }
    }

    pub fn on_release(&mut self, rs_index: u16, rs_table: &mut RSTable) {
        let front = self.queue.pop_front().unwrap_or_else(|| {
            panic!("LSUOrdering: station {} released with no memory op in flight", rs_index)
        });
        assert!(
            front == rs_index,
            "LSUOrdering: memory op in station {} released before older op in station {}",
            rs_index, front
        );

        if let Some(&next) = self.queue.front() {
            rs_table.set_locked(next, false);
        }
    }
}
