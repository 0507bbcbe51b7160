use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::cpu::GENERAL_REG_CNT;

pub(crate) type RegisterType = u16;
pub(crate) type WordType = u32;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Opcode {
    NOP,
    LI,
    MOV,
    ADD,
    SUB,
    AND,
    OR,
    XOR,
    ADDI,
    MUL,
    DIV,
    LW,
    SW,
    HALT,
}

pub(crate) fn mnemonic(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::NOP => "NOP",
        Opcode::LI => "LI",
        Opcode::MOV => "MOV",
        Opcode::ADD => "ADD",
        Opcode::SUB => "SUB",
        Opcode::AND => "AND",
        Opcode::OR => "OR",
        Opcode::XOR => "XOR",
        Opcode::ADDI => "ADDI",
        Opcode::MUL => "MUL",
        Opcode::DIV => "DIV",
        Opcode::LW => "LW",
        Opcode::SW => "SW",
        Opcode::HALT => "HALT",
    }
}

pub(crate) fn get_opcode(mnemonic: &str) -> Option<Opcode> {
    let string = mnemonic.to_uppercase();
    let mnemonic_uppercased = string.as_str();

    match mnemonic_uppercased {
        "NOP" => Some(Opcode::NOP),
        "LI" => Some(Opcode::LI),
        "MOV" => Some(Opcode::MOV),
        "ADD" => Some(Opcode::ADD),
        "SUB" => Some(Opcode::SUB),
        "AND" => Some(Opcode::AND),
        "OR" => Some(Opcode::OR),
        "XOR" => Some(Opcode::XOR),
        "ADDI" => Some(Opcode::ADDI),
        "MUL" => Some(Opcode::MUL),
        "DIV" => Some(Opcode::DIV),
        "LW" => Some(Opcode::LW),
        "SW" => Some(Opcode::SW),
        "HALT" => Some(Opcode::HALT),
        _ => None,
    }
}

pub(crate) fn get_register(name: &str) -> Option<RegisterType> {
    let name_uppercased = name.to_uppercase();
    let reg_name = name_uppercased.strip_prefix('R')?;
    let reg: RegisterType = reg_name.parse().ok()?;

    if reg >= GENERAL_REG_CNT {
        return None;
    }
    Some(reg)
}

// Which register operands an instruction actually reads and writes, plus
// whether committing it terminates the program.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExeFlags {
    pub(crate) use_rs1: bool,
    pub(crate) use_rs2: bool,
    pub(crate) use_rd: bool,
    pub(crate) is_exit: bool,
}

// The functional unit category an instruction executes on.
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum FUType {
    ALU,
    MUL,
    LSU,
}

pub(crate) const FU_TYPE_CNT: usize = 3;

impl FUType {
    pub(crate) fn latency(&self) -> u8 {
        match self {
            FUType::ALU => 1,
            FUType::MUL => 3,
            FUType::LSU => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Instr {
    pub(crate) opcode: Opcode,
    pub(crate) rd: RegisterType,
    pub(crate) rs1: RegisterType,
    pub(crate) rs2: RegisterType,
    pub(crate) imm: WordType,
    pub(crate) exe_flags: ExeFlags,
    pub(crate) fu_type: FUType,
    pub(crate) line: Option<usize>,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", mnemonic(self.opcode))?;

        match self.opcode {
            Opcode::NOP | Opcode::HALT => {}
            Opcode::LI => write!(f, "r{},{}", self.rd, self.imm as i32)?,
            Opcode::MOV => write!(f, "r{},r{}", self.rd, self.rs1)?,
            Opcode::ADD |
            Opcode::SUB |
            Opcode::AND |
            Opcode::OR |
            Opcode::XOR |
            Opcode::MUL |
            Opcode::DIV => write!(f, "r{},r{},r{}", self.rd, self.rs1, self.rs2)?,
            Opcode::ADDI => write!(f, "r{},r{},{}", self.rd, self.rs1, self.imm as i32)?,
            Opcode::LW => write!(f, "r{},{}(r{})", self.rd, self.imm as i32, self.rs1)?,
            Opcode::SW => write!(f, "r{},{}(r{})", self.rs2, self.imm as i32, self.rs1)?,
        }

        if let Some(line) = self.line {
            write!(f, " ; line {}", line)?;
        }

        Ok(())
    }
}

// Operand forms as they come out of the parser.
#[derive(Clone, Copy, Debug)]
pub(crate) enum AsmOperand {
    Register(RegisterType),
    Immediate(WordType),
    // offset(base)
    MemRef(WordType, RegisterType),
}

pub(crate) fn create_instr(opcode: Opcode, operands: &[AsmOperand], line: usize) -> Result<Instr, String> {
    let mut instr = Instr {
        opcode,
        rd: 0,
        rs1: 0,
        rs2: 0,
        imm: 0,
        exe_flags: ExeFlags { use_rs1: false, use_rs2: false, use_rd: false, is_exit: false },
        fu_type: FUType::ALU,
        line: Some(line),
    };

    match opcode {
        Opcode::NOP => {
            if !operands.is_empty() {
                return Err(format!("{:?} expects 0 operands, but {} are provided", opcode, operands.len()));
            }
        }
        Opcode::HALT => {
            if !operands.is_empty() {
                return Err(format!("{:?} expects 0 operands, but {} are provided", opcode, operands.len()));
            }
            instr.exe_flags.is_exit = true;
        }
        Opcode::LI => {
            if operands.len() != 2 {
                return Err(format!("{:?} expects 2 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rd = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::Immediate(value) => instr.imm = value,
                _ => return Err(format!("{:?} expects an immediate as second operand", opcode)),
            }

            instr.exe_flags.use_rd = true;
        }
        Opcode::MOV => {
            if operands.len() != 2 {
                return Err(format!("{:?} expects 2 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rd = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::Register(reg) => instr.rs1 = reg,
                _ => return Err(format!("{:?} expects a register as second operand", opcode)),
            }

            instr.exe_flags.use_rs1 = true;
            instr.exe_flags.use_rd = true;
        }
        Opcode::ADD |
        Opcode::SUB |
        Opcode::AND |
        Opcode::OR |
        Opcode::XOR |
        Opcode::MUL |
        Opcode::DIV => {
            if operands.len() != 3 {
                return Err(format!("{:?} expects 3 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rd = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::Register(reg) => instr.rs1 = reg,
                _ => return Err(format!("{:?} expects a register as second operand", opcode)),
            }
            match operands[2] {
                AsmOperand::Register(reg) => instr.rs2 = reg,
                _ => return Err(format!("{:?} expects a register as third operand", opcode)),
            }

            instr.exe_flags.use_rs1 = true;
            instr.exe_flags.use_rs2 = true;
            instr.exe_flags.use_rd = true;

            if opcode == Opcode::MUL || opcode == Opcode::DIV {
                instr.fu_type = FUType::MUL;
            }
        }
        Opcode::ADDI => {
            if operands.len() != 3 {
                return Err(format!("{:?} expects 3 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rd = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::Register(reg) => instr.rs1 = reg,
                _ => return Err(format!("{:?} expects a register as second operand", opcode)),
            }
            match operands[2] {
                AsmOperand::Immediate(value) => instr.imm = value,
                _ => return Err(format!("{:?} expects an immediate as third operand", opcode)),
            }

            instr.exe_flags.use_rs1 = true;
            instr.exe_flags.use_rd = true;
        }
        Opcode::LW => {
            if operands.len() != 2 {
                return Err(format!("{:?} expects 2 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rd = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::MemRef(offset, base) => {
                    instr.imm = offset;
                    instr.rs1 = base;
                }
                _ => return Err(format!("{:?} expects a memory reference as second operand", opcode)),
            }

            instr.exe_flags.use_rs1 = true;
            instr.exe_flags.use_rd = true;
            instr.fu_type = FUType::LSU;
        }
        Opcode::SW => {
            if operands.len() != 2 {
                return Err(format!("{:?} expects 2 operands, but {} are provided", opcode, operands.len()));
            }

            match operands[0] {
                AsmOperand::Register(reg) => instr.rs2 = reg,
                _ => return Err(format!("{:?} expects a register as first operand", opcode)),
            }
            match operands[1] {
                AsmOperand::MemRef(offset, base) => {
                    instr.imm = offset;
                    instr.rs1 = base;
                }
                _ => return Err(format!("{:?} expects a memory reference as second operand", opcode)),
            }

            instr.exe_flags.use_rs1 = true;
            instr.exe_flags.use_rs2 = true;
            instr.fu_type = FUType::LSU;
        }
    }

    Ok(instr)
}

pub(crate) const NOP: Instr = Instr {
    opcode: Opcode::NOP,
    rd: 0,
    rs1: 0,
    rs2: 0,
    imm: 0,
    exe_flags: ExeFlags { use_rs1: false, use_rs2: false, use_rd: false, is_exit: false },
    fu_type: FUType::ALU,
    line: None,
};

pub(crate) const HALT: Instr = Instr {
    opcode: Opcode::HALT,
    rd: 0,
    rs1: 0,
    rs2: 0,
    imm: 0,
    exe_flags: ExeFlags { use_rs1: false, use_rs2: false, use_rd: false, is_exit: true },
    fu_type: FUType::ALU,
    line: None,
};

// The InstrQueue sits between frontend and backend.
pub(crate) struct InstrQueue {
    capacity: u16,
    head: u64,
    tail: u64,
    instructions: Vec<Rc<Instr>>,
}

impl InstrQueue {
    pub fn new(capacity: u16) -> Self {
        let mut instructions = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            instructions.push(Rc::new(NOP));
        }

        InstrQueue {
            capacity,
            head: 0,
            tail: 0,
            instructions,
        }
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

    pub fn enqueue(&mut self, instr: Rc<Instr>) {
        assert!(!self.is_full(), "InstrQueue: can't enqueue when full");

        let index = (self.tail % self.capacity as u64) as usize;
        self.instructions[index] = instr;
        self.tail += 1;
    }

    pub fn dequeue(&mut self) {
        assert!(!self.is_empty(), "InstrQueue: can't dequeue when empty");
        self.head += 1;
    }

    pub fn peek(&self) -> Rc<Instr> {
        assert!(!self.is_empty(), "InstrQueue: can't peek when empty");

        let index = (self.head % self.capacity as u64) as usize;
        Rc::clone(&self.instructions[index])
    }
}

pub(crate) struct Data {
    pub(crate) value: WordType,
    pub(crate) offset: u64,
}

pub(crate) struct Program {
    pub(crate) data_items: HashMap<String, Rc<Data>>,
    pub(crate) code: Vec<Rc<Instr>>,
}

impl Program {
    pub fn get_instr(&self, pos: usize) -> Rc<Instr> {
        Rc::clone(&self.code[pos])
    }
}
