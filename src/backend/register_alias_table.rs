use crate::instructions::instructions::RegisterType;

/// The Register Alias Table. This structure is used for the register renaming
/// process. The RAT entry for a given architectural register points to the ROB
/// slot of the youngest in-flight instruction that writes it. As long as such
/// an entry exists, it should be used instead of the architectural register
/// file.
pub(crate) struct RAT {
    table: Vec<Option<u16>>,
}

impl RAT {
    pub fn new(reg_count: u16) -> Self {
        let mut table = Vec::with_capacity(reg_count as usize);
        for _ in 0..reg_count {
            table.push(None);
        }
        Self { table }
    }

    pub fn exists(&self, reg: RegisterType) -> bool {
        self.table[reg as usize].is_some()
    }

    pub fn get(&self, reg: RegisterType) -> u16 {
        match self.table[reg as usize] {
            Some(rob_index) => rob_index,
            None => panic!("RAT: no mapping for r{}", reg),
        }
    }

    // Unconditionally overwrites: a rename hides any older mapping.
    pub fn set(&mut self, reg: RegisterType, rob_index: u16) {
        self.table[reg as usize] = Some(rob_index);
    }

    pub fn clear(&mut self, reg: RegisterType) {
        assert!(self.table[reg as usize].is_some(), "RAT: can't clear r{} without a mapping", reg);
        self.table[reg as usize] = None;
    }
}

/// The Rename-to-Station Table: for a renamed ROB slot, the reservation
/// station that will produce its value. Entries are written at issue and
/// overwritten when the slot is reused for another register write; a stale
/// entry is never consulted because lookups only happen while the producing
/// instruction is still in flight.
pub(crate) struct RST {
    table: Vec<Option<u16>>,
}

impl RST {
    pub fn new(rob_capacity: u16) -> Self {
        let mut table = Vec::with_capacity(rob_capacity as usize);
        for _ in 0..rob_capacity {
            table.push(None);
        }
        Self { table }
    }

    pub fn get(&self, rob_index: u16) -> u16 {
        match self.table[rob_index as usize] {
            Some(rs_index) => rs_index,
            None => panic!("RST: no producing station for ROB slot {}", rob_index),
        }
    }

    pub fn set(&mut self, rob_index: u16, rs_index: u16) {
        self.table[rob_index as usize] = Some(rs_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rat_set_get_clear() {
        let mut rat = RAT::new(4);
        assert!(!rat.exists(2));

        rat.set(2, 7);
        assert!(rat.exists(2));
        assert_eq!(rat.get(2), 7);

        // a younger writer overwrites the mapping
        rat.set(2, 9);
        assert_eq!(rat.get(2), 9);

        rat.clear(2);
        assert!(!rat.exists(2));
    }

    #[test]
    #[should_panic(expected = "RAT: no mapping")]
    fn test_rat_get_without_mapping() {
        let rat = RAT::new(4);
        rat.get(0);
    }

    #[test]
    #[should_panic(expected = "RAT: can't clear")]
    fn test_rat_clear_without_mapping() {
        let mut rat = RAT::new(4);
        rat.clear(0);
    }

    #[test]
    fn test_rst_set_get() {
        let mut rst = RST::new(4);
        rst.set(1, 3);
        assert_eq!(rst.get(1), 3);

        // slot reuse overwrites
        rst.set(1, 0);
        assert_eq!(rst.get(1), 0);
    }

    #[test]
    #[should_panic(expected = "RST: no producing station")]
    fn test_rst_get_without_entry() {
        let rst = RST::new(4);
        rst.get(2);
    }
}
