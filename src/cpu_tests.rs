use std::rc::Rc;

use crate::cpu::{CpuConfig, CPU};
use crate::instructions::instructions::{Program, RegisterType, WordType};

#[cfg(test)]
mod tests {
    use crate::loader::loader::{load_from_string, LoadError};

    use super::*;

    #[test]
    fn test_li() {
        let src = r#"
.text
    li r0, 5
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(0, 5);
        harness.assert_retired_cnt(2);
    }

    #[test]
    fn test_same_src_dst_reg() {
        let src = r#"
.text
    li r0, 5
    addi r0, r0, 10
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(0, 15);
    }

    #[test]
    fn test_add() {
        let src = r#"
.text
    li r0, 100
    li r1, 10
    add r2, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(0, 100);
        harness.assert_reg_value(1, 10);
        harness.assert_reg_value(2, 110);
    }

    #[test]
    fn test_sub_wrapping() {
        let src = r#"
.text
    li r0, 10
    li r1, 100
    sub r2, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        // 10 - 100 in two's complement
        harness.assert_reg_value(2, 4294967206);
    }

    #[test]
    fn test_and_or_xor() {
        let src = r#"
.text
    li r0, 12
    li r1, 10
    and r2, r0, r1
    or r3, r0, r1
    xor r4, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 8);
        harness.assert_reg_value(3, 14);
        harness.assert_reg_value(4, 6);
    }

    #[test]
    fn test_mul() {
        let src = r#"
.text
    li r0, 7
    li r1, 6
    mul r2, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 42);
    }

    #[test]
    fn test_div() {
        let src = r#"
.text
    li r0, 100
    li r1, 7
    div r2, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 14);
    }

    #[test]
    fn test_div_by_zero() {
        let src = r#"
.text
    li r0, 5
    li r1, 0
    div r2, r0, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 4294967295);
    }

    #[test]
    fn test_addi_negative() {
        let src = r#"
.text
    li r0, 10
    addi r1, r0, -4
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(1, 6);
    }

    #[test]
    fn test_waw() {
        let src = r#"
.text
    li r0, 1
    li r0, 2
    li r0, 3
    li r0, 4
    li r0, 5
    li r0, 6
    li r0, 7
    li r0, 8
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(0, 8);
    }

    #[test]
    fn test_dependency_chain() {
        let src = r#"
.text
    li r0, 1
    mov r1, r0
    mov r2, r1
    mov r3, r2
    mov r4, r3
    mov r5, r4
    mov r6, r5
    mov r7, r6
    mov r8, r7
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(8, 1);
    }

    #[test]
    fn test_raw_forwarding() {
        let src = r#"
.text
    li r0, 21
    add r1, r0, r0
    add r2, r1, r1
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(1, 42);
        harness.assert_reg_value(2, 84);
    }

    #[test]
    fn test_mul_overlap() {
        let src = r#"
.text
    li r0, 6
    li r1, 7
    mul r2, r0, r1
    add r3, r0, r1
    sub r4, r1, r0
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 42);
        harness.assert_reg_value(3, 13);
        harness.assert_reg_value(4, 1);
    }

    #[test]
    fn test_lw() {
        let src = r#"
.data
    var_a: .word 42
.text
    li r1, =var_a
    lw r0, 0(r1)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(0, 42);
    }

    #[test]
    fn test_sw() {
        let src = r#"
.data
    var_a: .word 0
.text
    li r0, 123
    li r1, =var_a
    sw r0, 0(r1)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_variable_value("var_a", 123);
    }

    #[test]
    fn test_lw_sw() {
        let src = r#"
.data
    var_a: .word 6
    var_b: .word 9
    var_c: .word 0
.text
    li r3, =var_a
    lw r0, 0(r3)
    li r3, =var_b
    lw r1, 0(r3)
    add r2, r0, r1
    li r3, =var_c
    sw r2, 0(r3)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_variable_value("var_c", 15);
    }

    #[test]
    fn test_sw_offset() {
        let src = r#"
.data
    base: .word 0
    pad1: .word 0
    pad2: .word 0
.text
    li r0, =base
    li r1, 77
    sw r1, 2(r0)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_variable_value("base", 0);
        harness.assert_variable_value("pad1", 0);
        harness.assert_variable_value("pad2", 77);
    }

    #[test]
    fn test_store_load_same_address() {
        let src = r#"
.data
    cell: .word 0
.text
    li r0, =cell
    li r1, 42
    sw r1, 0(r0)
    lw r2, 0(r0)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(2, 42);
    }

    #[test]
    fn test_younger_load_waits_for_older_store() {
        let src = r#"
.data
    cell: .word 5
.text
    li r0, =cell
    li r1, 6
    li r2, 7
    mul r3, r1, r2
    sw r3, 0(r0)
    lw r4, 0(r0)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        // the load is ready long before the store, but may not pass it
        harness.assert_reg_value(4, 42);
    }

    #[test]
    fn test_store_store_order() {
        let src = r#"
.data
    cell: .word 0
.text
    li r0, =cell
    li r1, 1
    li r2, 2
    sw r1, 0(r0)
    sw r2, 0(r0)
    halt
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_variable_value("cell", 2);
    }

    #[test]
    fn test_halt_stops_fetch() {
        let src = r#"
.text
    li r1, 1
    halt
    li r1, 99
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        harness.assert_reg_value(1, 1);
        harness.assert_retired_cnt(2);
    }

    #[test]
    fn test_empty_program() {
        let src = r#"
; nothing to run
"#;
        let mut harness = TestHarness::default();
        harness.run(src);
        // the frontend synthesizes the terminating halt
        harness.assert_retired_cnt(1);
    }

    #[test]
    fn test_structural_stall_small_config() {
        let src = r#"
.text
    li r0, 1
    addi r0, r0, 1
    addi r0, r0, 1
    addi r0, r0, 1
    addi r0, r0, 1
    mul r1, r0, r0
    addi r1, r1, 1
    halt
"#;
        let mut cpu_config = CpuConfig::default();
        cpu_config.instr_queue_capacity = 2;
        cpu_config.rs_count = 2;
        cpu_config.rob_capacity = 2;

        let mut harness = TestHarness::with_config(cpu_config);
        harness.run(src);
        harness.assert_reg_value(0, 5);
        harness.assert_reg_value(1, 26);
    }

    struct TestHarness {
        program: Option<Rc<Program>>,
        cpu: Option<CPU>,
        cpu_config: CpuConfig,
    }

    impl TestHarness {
        fn default() -> TestHarness {
            Self::with_config(CpuConfig::default())
        }

        fn with_config(cpu_config: CpuConfig) -> TestHarness {
            TestHarness {
                program: None,
                cpu: Some(CPU::new(&cpu_config)),
                cpu_config,
            }
        }

        fn run(&mut self, src: &str) {
            self.program = Some(self.load_program(src));
            let program = Rc::clone(self.program.as_ref().unwrap());
            self.cpu.as_mut().unwrap().run(&program);
        }

        fn load_program(&mut self, src: &str) -> Rc<Program> {
            let load_result = load_from_string(self.cpu_config.clone(), src.to_string());
            match load_result {
                Ok(p) => Rc::new(p),
                Err(err) => {
                    match err {
                        LoadError::ParseError(msg) => {
                            panic!("{}", msg);
                        }

                        LoadError::NotFoundError(msg) => {
                            panic!("{}", msg);
                        }
                    }
                }
            }
        }

        fn assert_reg_value(&self, reg: RegisterType, value: WordType) {
            if let Some(ref cpu) = self.cpu {
                let reg_file = cpu.arch_reg_file.borrow();
                assert_eq!(reg_file.get_value(reg), value, "Register r{} does not have the expected value", reg);
            } else {
                panic!("CPU is not initialized");
            }
        }

        fn assert_variable_value(&self, name: &str, value: WordType) {
            if let Some(ref cpu) = self.cpu {
                let program = self.program.as_ref().expect("Program not initialized");
                let data_item = program.data_items.get(name).expect("Data item not found");
                let offset = data_item.offset;
                let memory_subsystem = cpu.memory_subsystem.borrow();
                match memory_subsystem.memory.get(offset as usize) {
                    Some(&actual_value) => {
                        assert_eq!(actual_value, value, "Variable '{}' does not have the expected value", name);
                    }
                    None => {
                        panic!("Memory offset {} is invalid", offset);
                    }
                }
            } else {
                panic!("CPU is not initialized");
            }
        }

        fn assert_retired_cnt(&self, value: u64) {
            if let Some(ref cpu) = self.cpu {
                assert_eq!(cpu.perf_counters.borrow().retired_cnt, value);
            } else {
                panic!("CPU is not initialized");
            }
        }
    }
}
