use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

use regex::Regex;

use crate::cpu::CpuConfig;
use crate::instructions::instructions::{create_instr, get_opcode, get_register, AsmOperand, Data, Instr, Program, WordType};

#[derive(Debug)]
pub enum LoadError {
    NotFoundError(String),
    ParseError(String),
}

/// Turns assembly text into a Program. The first pass collects the data
/// section so that `=variable` references resolve no matter where the
/// declaration sits in the file; the second pass parses the instructions.
struct Loader {
    cpu_config: CpuConfig,
    heap_size: u64,
    code: Vec<Instr>,
    data_section: HashMap<String, Rc<Data>>,
    data_line_re: Regex,
    instr_line_re: Regex,
    mem_ref_re: Regex,
}

impl Loader {
    fn load(&mut self, input: &str) -> Result<(), LoadError> {
        self.first_pass(input)?;
        self.second_pass(input)?;
        Ok(())
    }

    fn first_pass(&mut self, input: &str) -> Result<(), LoadError> {
        let mut in_data = false;
        for (line_nr, raw_line) in input.lines().enumerate() {
            let line_nr = line_nr + 1;
            let line = strip_comment(raw_line);
            if line.is_empty() {
                continue;
            }

            if line.starts_with('.') {
                in_data = self.parse_directive(line, line_nr)?;
                continue;
            }

            if in_data {
                self.parse_data_line(line, line_nr)?;
            }
        }
        Ok(())
    }

    fn second_pass(&mut self, input: &str) -> Result<(), LoadError> {
        let mut in_data = false;
        for (line_nr, raw_line) in input.lines().enumerate() {
            let line_nr = line_nr + 1;
            let line = strip_comment(raw_line);
            if line.is_empty() {
                continue;
            }

            if line.starts_with('.') {
                in_data = self.parse_directive(line, line_nr)?;
                continue;
            }

            if !in_data {
                self.parse_instr_line(line, line_nr)?;
            }
        }
        Ok(())
    }

    fn parse_directive(&self, line: &str, line_nr: usize) -> Result<bool, LoadError> {
        match line {
            ".data" => Ok(true),
            ".text" => Ok(false),
            _ => Err(LoadError::ParseError(format!("Unknown directive '{}' at line {}", line, line_nr))),
        }
    }

    fn parse_data_line(&mut self, line: &str, line_nr: usize) -> Result<(), LoadError> {
        let captures = match self.data_line_re.captures(line) {
            Some(captures) => captures,
            None => {
                return Err(LoadError::ParseError(format!("Invalid data line '{}' at line {}", line, line_nr)));
            }
        };

        let variable_name = String::from(&captures[1]);
        if !is_valid_variable_name(&variable_name) {
            return Err(LoadError::ParseError(format!("Illegal variable name '{}' at line {}", variable_name, line_nr)));
        }

        if self.data_section.contains_key(&variable_name) {
            return Err(LoadError::ParseError(format!("Duplicate variable declaration '{}' at line {}", variable_name, line_nr)));
        }

        let value = match parse_immediate(&captures[2]) {
            Some(value) => value,
            None => {
                return Err(LoadError::ParseError(format!("Invalid value '{}' at line {}", &captures[2], line_nr)));
            }
        };

        if self.heap_size >= self.cpu_config.memory_size as u64 {
            return Err(LoadError::ParseError(format!("Not enough memory for variable '{}' at line {}", variable_name, line_nr)));
        }

        self.data_section.insert(variable_name, Rc::new(Data { value, offset: self.heap_size }));
        self.heap_size += 1;
        Ok(())
    }

    fn parse_instr_line(&mut self, line: &str, line_nr: usize) -> Result<(), LoadError> {
        let captures = match self.instr_line_re.captures(line) {
            Some(captures) => captures,
            None => {
                return Err(LoadError::ParseError(format!("Invalid line '{}' at line {}", line, line_nr)));
            }
        };

        let mnemonic = &captures[1];
        let opcode = match get_opcode(mnemonic) {
            Some(opcode) => opcode,
            None => {
                return Err(LoadError::ParseError(format!("Unknown mnemonic '{}' at line {}", mnemonic, line_nr)));
            }
        };

        let mut operands = Vec::new();
        if let Some(rest) = captures.get(2) {
            for part in rest.as_str().split(',') {
                operands.push(self.parse_operand(part.trim(), line_nr)?);
            }
        }

        match create_instr(opcode, &operands, line_nr) {
            Ok(instr) => {
                self.code.push(instr);
                Ok(())
            }
            Err(msg) => Err(LoadError::ParseError(format!("{} at line {}", msg, line_nr))),
        }
    }

    fn parse_operand(&self, s: &str, line_nr: usize) -> Result<AsmOperand, LoadError> {
        // =variable resolves to the variable's address in the data section
        if let Some(variable_name) = s.strip_prefix('=') {
            return match self.data_section.get(variable_name) {
                Some(data) => Ok(AsmOperand::Immediate(data.offset as WordType)),
                None => Err(LoadError::ParseError(format!("Unknown variable '{}' at line {}", variable_name, line_nr))),
            };
        }

        if let Some(captures) = self.mem_ref_re.captures(s) {
            let offset = match parse_immediate(&captures[1]) {
                Some(offset) => offset,
                None => {
                    return Err(LoadError::ParseError(format!("Invalid offset '{}' at line {}", &captures[1], line_nr)));
                }
            };
            let base = match get_register(&captures[2]) {
                Some(base) => base,
                None => {
                    return Err(LoadError::ParseError(format!("Illegal base register '{}' at line {}", &captures[2], line_nr)));
                }
            };
            return Ok(AsmOperand::MemRef(offset, base));
        }

        if let Some(reg) = get_register(s) {
            return Ok(AsmOperand::Register(reg));
        }

        if let Some(value) = parse_immediate(s) {
            return Ok(AsmOperand::Immediate(value));
        }

        Err(LoadError::ParseError(format!("Unknown operand '{}' at line {}", s, line_nr)))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

// Accepts decimal and 0x hex, both optionally negative. Negative values are
// stored in two's complement.
fn parse_immediate(s: &str) -> Option<WordType> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    let value = if negative { -magnitude } else { magnitude };
    if value < i32::MIN as i64 || value > u32::MAX as i64 {
        return None;
    }
    Some(value as WordType)
}

fn is_valid_variable_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let re = Regex::new(r"^(?i)R\d+$").unwrap();
    if re.is_match(name) {
        return false;
    }

    if get_opcode(name).is_some() {
        // it can't be an existing mnemonic
        return false;
    }

    true
}

pub(crate) fn load(cpu_config: CpuConfig, path: &str) -> Result<Program, LoadError> {
    let input = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return Err(LoadError::NotFoundError(format!("Can't read '{}': {}", path, err)));
        }
    };

    load_from_string(cpu_config, input)
}

pub(crate) fn load_from_string(cpu_config: CpuConfig, input: String) -> Result<Program, LoadError> {
    let mut loader = Loader {
        cpu_config,
        heap_size: 0,
        code: Vec::new(),
        data_section: HashMap::<String, Rc<Data>>::new(),
        data_line_re: Regex::new(r"^([A-Za-z_]\w*):\s*\.word\s+(-?\w+)$").unwrap(),
        instr_line_re: Regex::new(r"^(\w+)(?:\s+(.*))?$").unwrap(),
        mem_ref_re: Regex::new(r"^(-?\w+)\((\w+)\)$").unwrap(),
    };

    loader.load(&input)?;

    log::debug!("Loaded {} instructions and {} data items", loader.code.len(), loader.data_section.len());

    let mut code = Vec::with_capacity(loader.code.len());
    for instr in loader.code {
        code.push(Rc::new(instr));
    }
    Ok(Program { code, data_items: loader.data_section })
}
