use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::common_data_bus::{CDBMessage, CDB};
use crate::backend::execution_unit::{FUTable, LSUOrdering};
use crate::backend::register_alias_table::{RAT, RST};
use crate::backend::reorder_buffer::ROB;
use crate::backend::reservation_station::{Operand, RSTable};
use crate::cpu::{ArchRegFile, CpuConfig, PerfCounters, Trace, GENERAL_REG_CNT};
use crate::instructions::instructions::{FUType, InstrQueue, RegisterType};
use crate::memory_subsystem::memory_subsystem::MemorySubsystem;

/// The out of order backend. Instructions come out of the instruction queue
/// in program order, get renamed onto ROB slots and reservation stations, run
/// on the execution units as soon as their operands allow, and retire through
/// the ROB head in program order again.
pub(crate) struct Backend {
    instr_queue: Rc<RefCell<InstrQueue>>,
    arch_reg_file: Rc<RefCell<ArchRegFile>>,
    memory_subsystem: Rc<RefCell<MemorySubsystem>>,
    perf_counters: Rc<RefCell<PerfCounters>>,
    rs_table: RSTable,
    rat: RAT,
    rst: RST,
    rob: ROB,
    fu_table: FUTable,
    cdb: CDB,
    lsu_ordering: LSUOrdering,
    trace: Trace,
    pub(crate) exit: bool,
}

impl Backend {
    pub(crate) fn new(
        cpu_config: &CpuConfig,
        instr_queue: Rc<RefCell<InstrQueue>>,
        memory_subsystem: Rc<RefCell<MemorySubsystem>>,
        arch_reg_file: Rc<RefCell<ArchRegFile>>,
        perf_counters: Rc<RefCell<PerfCounters>>,
    ) -> Backend {
        Backend {
            instr_queue,
            arch_reg_file,
            memory_subsystem,
            perf_counters,
            rs_table: RSTable::new(cpu_config.rs_count),
            rat: RAT::new(GENERAL_REG_CNT),
            rst: RST::new(cpu_config.rob_capacity),
            rob: ROB::new(cpu_config.rob_capacity),
            fu_table: FUTable::new(),
            cdb: CDB::new(),
            lsu_ordering: LSUOrdering::new(cpu_config.rs_count),
            trace: cpu_config.trace.clone(),
            exit: false,
        }
    }

    pub(crate) fn do_cycle(&mut self) {
        // Stages run in reverse pipeline order, so a result produced in this
        // cycle becomes visible to an earlier stage no sooner than the next
        // cycle.
        self.cycle_commit();
        self.cycle_writeback();
        self.cycle_execute();
        self.cycle_issue();
    }

    // Takes the next instruction out of the instruction queue and hands it a
    // ROB slot and a reservation station. On a structural stall the
    // instruction stays in the queue and nothing is modified.
    fn cycle_issue(&mut self) {
        if self.instr_queue.borrow().is_empty() {
            return;
        }

        if self.rob.is_full() || self.rs_table.is_full() {
            return;
        }

        let instr = self.instr_queue.borrow().peek();

        // operands resolve against the state from before this instruction's
        // own rename, so an instruction reading and writing the same register
        // sees the older producer
        let rs1 = self.resolve_operand(instr.exe_flags.use_rs1, instr.rs1);
        let rs2 = self.resolve_operand(instr.exe_flags.use_rs2, instr.rs2);

        let rob_index = self.rob.allocate(Rc::clone(&instr));
        let rs_index = self.rs_table.issue(rob_index, rs1, rs2, Rc::clone(&instr));

        if instr.exe_flags.use_rd {
            self.rat.set(instr.rd, rob_index);
            self.rst.set(rob_index, rs_index);
        }

        if instr.fu_type == FUType::LSU {
            self.lsu_ordering.on_issue(rs_index, &mut self.rs_table);
        }

        if self.trace.issue {
            println!("Issued [{}]", instr);
        }
        self.perf_counters.borrow_mut().issue_cnt += 1;
        self.instr_queue.borrow_mut().dequeue();
    }

    fn resolve_operand(&self, used: bool, reg: RegisterType) -> Operand {
        if !used {
            return Operand::Ready(0);
        }

        if self.rat.exists(reg) {
            let rob_index = self.rat.get(reg);
            let entry = self.rob.get_entry(rob_index);
            if entry.ready {
                // completed but not yet committed; the value lives in the ROB
                Operand::Ready(entry.result)
            } else {
                Operand::Pending(self.rst.get(rob_index))
            }
        } else {
            Operand::Ready(self.arch_reg_file.borrow().get_value(reg))
        }
    }

    // Ticks the execution units, moves at most one finished result onto the
    // common data bus and dispatches at most one runnable station.
    fn cycle_execute(&mut self) {
        {
            let mut memory_subsystem = self.memory_subsystem.borrow_mut();
            self.fu_table.execute_all(&mut memory_subsystem);
        }

        if self.cdb.is_empty() {
            if let Some(fu_type) = self.fu_table.find_done() {
                let output = self.fu_table.get(fu_type).get_output();
                self.cdb.push(CDBMessage {
                    result: output.result,
                    rob_index: output.rob_index,
                    rs_index: output.rs_index,
                });
                self.fu_table.get_mut(fu_type).clear();
            }
        }

        self.cycle_dispatch();
    }

    fn cycle_dispatch(&mut self) {
        for index in 0..self.rs_table.capacity() {
            let rs = self.rs_table.get(index);
            if !rs.valid || rs.running {
                continue;
            }
            if !self.rs_table.operands_ready(index) || rs.locked {
                continue;
            }

            let fu_type = rs.instr.as_ref().unwrap().fu_type;
            if self.fu_table.get(fu_type).busy() {
                // a busy unit does not block younger entries wanting another unit
                continue;
            }

            let instr = Rc::clone(rs.instr.as_ref().unwrap());
            let rs1_data = rs.rs1.value();
            let rs2_data = rs.rs2.value();
            let rob_index = rs.rob_index;

            self.fu_table.get_mut(fu_type).issue(Rc::clone(&instr), rs1_data, rs2_data, rob_index, index);
            self.rs_table.get_mut(index).running = true;

            if self.trace.dispatch {
                println!("Dispatched [{}] to the {:?} unit", instr, fu_type);
            }
            self.perf_counters.borrow_mut().dispatch_cnt += 1;
            return;
        }
    }

    // Broadcasts the pending result to every waiting station, releases the
    // producing station and marks the ROB slot ready for commit.
    fn cycle_writeback(&mut self) {
        if self.cdb.is_empty() {
            return;
        }

        let broadcast = self.cdb.data();

        self.rs_table.update_operands(&broadcast);

        let instr = Rc::clone(self.rs_table.get(broadcast.rs_index).instr.as_ref().unwrap());
        self.rs_table.release(broadcast.rs_index);
        if instr.fu_type == FUType::LSU {
            self.lsu_ordering.on_release(broadcast.rs_index, &mut self.rs_table);
        }

        self.rob.update(&broadcast);
        self.cdb.pop();

        if self.trace.broadcast {
            println!("Broadcast [{}] result={}", instr, broadcast.result);
        }
        self.perf_counters.borrow_mut().broadcast_cnt += 1;
    }

    // Retires the ROB head once its result has arrived, making the register
    // update architecturally visible.
    fn cycle_commit(&mut self) {
        if self.rob.is_empty() {
            return;
        }

        let head_index = self.rob.head_index();
        let entry = self.rob.get_entry(head_index);
        if !entry.ready {
            return;
        }

        let instr = Rc::clone(entry.instr.as_ref().unwrap());
        let result = entry.result;

        if instr.exe_flags.use_rd {
            self.arch_reg_file.borrow_mut().set_value(instr.rd, result);

            // a younger writer may have renamed the register again; only the
            // mapping installed by this instruction may be cleared
            if self.rat.exists(instr.rd) && self.rat.get(instr.rd) == head_index {
                self.rat.clear(instr.rd);
            }
        }

        self.rob.pop();

        if self.trace.commit {
            println!("Committed [{}] result={}", instr, result);
        }

        {
            let mut perf_counters = self.perf_counters.borrow_mut();
            perf_counters.retired_cnt += 1;
            assert!(
                perf_counters.retired_cnt <= perf_counters.fetched_cnt,
                "Backend: retired count {} exceeds fetched count {}",
                perf_counters.retired_cnt,
                perf_counters.fetched_cnt
            );
        }

        if instr.exe_flags.is_exit {
            self.exit = true;
        }
    }
}
