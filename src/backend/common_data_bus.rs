use crate::instructions::instructions::WordType;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CDBMessage {
    pub(crate) result: WordType,
    pub(crate) rob_index: u16,
    pub(crate) rs_index: u16,
}

/// The Common Data Bus. One result per cycle travels from a finished
/// execution unit to every reservation station and the ROB. The single slot
/// is filled during execute and drained during the next cycle's writeback.
pub(crate) struct CDB {
    slot: Option<CDBMessage>,
}

impl CDB {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn push(&mut self, message: CDBMessage) {
        assert!(self.slot.is_none(), "CDB: can't push when a broadcast is already pending");
        self.slot = Some(message);
    }

    pub fn data(&self) -> CDBMessage {
        match self.slot {
            Some(message) => message,
            None => panic!("CDB: no pending broadcast"),
        }
    }

    pub fn pop(&mut self) {
        assert!(self.slot.is_some(), "CDB: can't pop without a pending broadcast");
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_data_pop() {
        let mut cdb = CDB::new();
        assert!(cdb.is_empty());

        cdb.push(CDBMessage { result: 42, rob_index: 3, rs_index: 1 });
        assert!(!cdb.is_empty());

        let message = cdb.data();
        assert_eq!(message.result, 42);
        assert_eq!(message.rob_index, 3);
        assert_eq!(message.rs_index, 1);

        cdb.pop();
        assert!(cdb.is_empty());
    }

    #[test]
    #[should_panic(expected = "CDB: can't push")]
    fn test_push_twice() {
        let mut cdb = CDB::new();
        cdb.push(CDBMessage { result: 1, rob_index: 0, rs_index: 0 });
        cdb.push(CDBMessage { result: 2, rob_index: 1, rs_index: 1 });
    }
}
