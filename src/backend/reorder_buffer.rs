use std::rc::Rc;

use crate::backend::common_data_bus::CDBMessage;
use crate::instructions::instructions::{Instr, WordType};

pub(crate) struct ROBEntry {
    pub(crate) instr: Option<Rc<Instr>>,
    pub(crate) ready: bool,
    pub(crate) result: WordType,
}

impl ROBEntry {
    fn new() -> Self {
        Self { instr: None, ready: false, result: 0 }
    }

    fn reset(&mut self) {
        self.instr = None;
        self.ready = false;
        self.result = 0;
    }
}

/// The Reorder Buffer. Instructions enter at the tail in program order at
/// issue, collect their result over the common data bus, and leave at the
/// head in program order at commit. Head and tail are monotonic sequence
/// counters; the slot index is the sequence modulo the capacity.
pub(crate) struct ROB {
    capacity: u16,
    head: u64,
    tail: u64,
    entries: Vec<ROBEntry>,
}

impl ROB {
    pub fn new(capacity: u16) -> Self {
        let mut entries = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            entries.push(ROBEntry::new());
        }
        Self { capacity, head: 0, tail: 0, entries }
    }

    fn to_index(&self, seq: u64) -> u16 {
        (seq % self.capacity as u64) as u16
    }

    pub fn size(&self) -> u16 {
        (self.tail - self.head) as u16
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    /// Claims the tail slot for the next instruction in program order and
    /// returns its slot index.
    pub fn allocate(&mut self, instr: Rc<Instr>) -> u16 {
        assert!(!self.is_full(), "ROB: can't allocate when full");

        let index = self.to_index(self.tail);
        let entry = &mut self.entries[index as usize];
        entry.reset();
        entry.instr = Some(instr);
        self.tail += 1;
        index
    }

    pub fn get_entry(&self, index: u16) -> &ROBEntry {
        &self.entries[index as usize]
    }

    /// Records a broadcast result; the entry becomes eligible for commit.
    pub fn update(&mut self, broadcast: &CDBMessage) {
        let entry = &mut self.entries[broadcast.rob_index as usize];
        assert!(entry.instr.is_some(), "ROB: update on slot {} without an instruction", broadcast.rob_index);

        entry.result = broadcast.result;
        entry.ready = true;
    }

    pub fn head_index(&self) -> u16 {
        assert!(!self.is_empty(), "ROB: no head when empty");
        self.to_index(self.head)
    }

    /// Retires the head entry. Only legal when the head is ready.
    pub fn pop(&mut self) {
        assert!(!self.is_empty(), "ROB: can't pop when empty");

        let index = self.to_index(self.head);
        let entry = &mut self.entries[index as usize];
        assert!(entry.ready, "ROB: can't pop slot {} before its result arrived", index);

        entry.instr = None;
        self.head += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::instructions::NOP;

    fn nop() -> Rc<Instr> {
        Rc::new(NOP)
    }

    #[test]
    fn test_allocate_and_pop_in_order() {
        let mut rob = ROB::new(4);
        assert!(rob.is_empty());

        let a = rob.allocate(nop());
        let b = rob.allocate(nop());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(rob.size(), 2);
        assert_eq!(rob.head_index(), a);

        rob.update(&CDBMessage { result: 10, rob_index: a, rs_index: 0 });
        assert_eq!(rob.get_entry(a).result, 10);
        assert!(rob.get_entry(a).ready);

        rob.pop();
        assert_eq!(rob.head_index(), b);
        assert_eq!(rob.size(), 1);
    }

    #[test]
    fn test_wraparound() {
        let mut rob = ROB::new(2);
        for round in 0..5 {
            let index = rob.allocate(nop());
            assert_eq!(index, (round % 2) as u16);
            rob.update(&CDBMessage { result: round, rob_index: index, rs_index: 0 });
            rob.pop();
        }
        assert!(rob.is_empty());
    }

    #[test]
    fn test_is_full() {
        let mut rob = ROB::new(2);
        rob.allocate(nop());
        assert!(!rob.is_full());
        rob.allocate(nop());
        assert!(rob.is_full());
    }

    #[test]
    #[should_panic(expected = "ROB: can't allocate when full")]
    fn test_allocate_when_full() {
        let mut rob = ROB::new(1);
        rob.allocate(nop());
        rob.allocate(nop());
    }

    #[test]
    #[should_panic(expected = "ROB: can't pop")]
    fn test_pop_before_ready() {
        let mut rob = ROB::new(2);
        rob.allocate(nop());
        rob.pop();
    }
}
