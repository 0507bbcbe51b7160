use std::rc::Rc;

use crate::backend::common_data_bus::CDBMessage;
use crate::instructions::instructions::{Instr, WordType};

/// A source operand of an issued instruction. Either the value was available
/// at issue (or arrived over the common data bus since), or we are still
/// waiting on the reservation station that will produce it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Operand {
    Ready(WordType),
    Pending(u16),
}

impl Operand {
    pub fn is_ready(&self) -> bool {
        matches!(self, Operand::Ready(_))
    }

    pub fn value(&self) -> WordType {
        match self {
            Operand::Ready(value) => *value,
            Operand::Pending(rs_index) => panic!("Operand: still waiting on station {}", rs_index),
        }
    }
}

pub(crate) struct RS {
    pub(crate) valid: bool,
    pub(crate) running: bool,
    pub(crate) locked: bool,
    pub(crate) rob_index: u16,
    pub(crate) rs1: Operand,
    pub(crate) rs2: Operand,
    pub(crate) instr: Option<Rc<Instr>>,
}

impl RS {
    fn new() -> Self {
        Self {
            valid: false,
            running: false,
            locked: false,
            rob_index: 0,
            rs1: Operand::Ready(0),
            rs2: Operand::Ready(0),
            instr: None,
        }
    }

    fn reset(&mut self) {
        self.valid = false;
        self.running = false;
        self.locked = false;
        self.rob_index = 0;
        self.rs1 = Operand::Ready(0);
        self.rs2 = Operand::Ready(0);
        self.instr = None;
    }

    fn update_operands(&mut self, broadcast: &CDBMessage) {
        if let Operand::Pending(rs_index) = self.rs1 {
            if rs_index == broadcast.rs_index {
                self.rs1 = Operand::Ready(broadcast.result);
            }
        }
        if let Operand::Pending(rs_index) = self.rs2 {
            if rs_index == broadcast.rs_index {
                self.rs2 = Operand::Ready(broadcast.result);
            }
        }
    }
}

/// The pool of reservation stations. A station is claimed at issue, holds the
/// instruction and its operands until dispatch, and is released when its
/// result goes out over the common data bus.
pub(crate) struct RSTable {
    capacity: u16,
    array: Vec<RS>,
}

impl RSTable {
    pub fn new(capacity: u16) -> Self {
        let mut array = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            array.push(RS::new());
        }
        Self { capacity, array }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.array.iter().all(|rs| rs.valid)
    }

    pub fn size(&self) -> u16 {
        self.array.iter().filter(|rs| rs.valid).count() as u16
    }

    /// Claims the lowest-index free station and fills it in.
    pub fn issue(&mut self, rob_index: u16, rs1: Operand, rs2: Operand, instr: Rc<Instr>) -> u16 {
        let index = match self.array.iter().position(|rs| !rs.valid) {
            Some(index) => index,
            None => panic!("RSTable: no free station"),
        };

        let rs = &mut self.array[index];
        rs.valid = true;
        rs.running = false;
        rs.locked = false;
        rs.rob_index = rob_index;
        rs.rs1 = rs1;
        rs.rs2 = rs2;
        rs.instr = Some(instr);
        index as u16
    }

    pub fn operands_ready(&self, index: u16) -> bool {
        let rs = &self.array[index as usize];
        rs.rs1.is_ready() && rs.rs2.is_ready()
    }

    /// Wakes up every valid station waiting on the station that produced the
    /// broadcast.
    pub fn update_operands(&mut self, broadcast: &CDBMessage) {
        for rs in self.array.iter_mut() {
            if rs.valid {
                rs.update_operands(broadcast);
            }
        }
    }

    pub fn locked(&self, index: u16) -> bool {
        self.array[index as usize].locked
    }

    pub fn set_locked(&mut self, index: u16, locked: bool) {
        self.array[index as usize].locked = locked;
    }

    pub fn release(&mut self, index: u16) {
        let rs = &mut self.array[index as usize];
        assert!(rs.valid, "RSTable: can't release free station {}", index);
        rs.reset();
    }

    pub fn get(&self, index: u16) -> &RS {
        &self.array[index as usize]
    }

    pub fn get_mut(&mut self, index: u16) -> &mut RS {
        &mut self.array[index as usize]
    }
}
