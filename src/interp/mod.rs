//! Reference interpreter for the dialect.
//!
//! Executes a program directly over a byte-addressed memory and a
//! key-addressed storage map, recording the externally observable trace:
//! the halt outcome, final storage, and emitted logs. The optimizer must
//! preserve exactly that trace, so tests run a program before and after
//! optimization and compare.
//!
//! Words are 64-bit; memory cells still span 32 bytes with the value in
//! the low 8 bytes, so offset arithmetic behaves like the word-addressed
//! target. External calls and contract creation are not modeled.


use std::collections::BTreeMap;
use std::fmt;

use crate::ir::{Block, Expr, ExprKind, FunctionDef, Stmt, StmtKind};

/// Memory cell width in bytes.
const CELL: u64 = 32;
/// Hard cap on memory growth, in bytes.
const MEMORY_LIMIT: u64 = 1 << 20;

pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Stop,
    Return(Vec<u8>),
    Revert(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub topics: Vec<u64>,
    pub data: Vec<u8>,
}

/// Everything an outside observer can see of one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    pub outcome: Outcome,
    pub storage: BTreeMap<u64, u64>,
    pub logs: Vec<LogEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterpError {
    StepLimit,
    MemoryLimit,
    Unsupported(&'static str),
    Malformed(String),
}

impl fmt::Display for InterpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpError::StepLimit => write!(f, "step limit exhausted"),
            InterpError::MemoryLimit => write!(f, "memory limit exceeded"),
            InterpError::Unsupported(what) => write!(f, "unsupported instruction: {what}"),
            InterpError::Malformed(what) => write!(f, "malformed program: {what}"),
        }
    }
}

impl std::error::Error for InterpError {}

/// Run a program against the given calldata and an empty initial state.
pub fn run(block: &Block, calldata: &[u8], step_limit: u64) -> Result<Trace, InterpError> {
    let mut functions = BTreeMap::new();
    collect_functions(block, &mut functions);
    let mut interp = Interpreter {
        functions,
        calldata,
        memory: Vec::new(),
        storage: BTreeMap::new(),
        returndata: Vec::new(),
        logs: Vec::new(),
        steps: step_limit,
    };
    let mut vars = BTreeMap::new();
    let outcome = match interp.exec_block(block, &mut vars) {
        Ok(_) => Outcome::Stop,
        Err(Interrupt::Halt(outcome)) => outcome,
        Err(Interrupt::Fault(error)) => return Err(error),
    };
    // A revert discards all state changes; only the revert data survives.
    let (storage, logs) = match &outcome {
        Outcome::Revert(_) => (BTreeMap::new(), Vec::new()),
        _ => (interp.storage, interp.logs),
    };
    Ok(Trace {
        outcome,
        storage,
        logs,
    })
}

fn collect_functions<'a>(block: &'a Block, out: &mut BTreeMap<String, &'a FunctionDef>) {
    crate::ir::visit::walk_stmts(block, &mut |stmt| {
        if let StmtKind::FnDef(func) = &stmt.kind {
            out.insert(func.name.clone(), func);
        }
    });
}

enum Interrupt {
    Halt(Outcome),
    Fault(InterpError),
}

impl From<InterpError> for Interrupt {
    fn from(error: InterpError) -> Self {
        Interrupt::Fault(error)
    }
}

/// How a statement sequence ended, short of halting the whole run.
enum Signal {
    Normal,
    Break,
    Continue,
    Leave,
}

type Vars = BTreeMap<String, u64>;

struct Interpreter<'a> {
    functions: BTreeMap<String, &'a FunctionDef>,
    calldata: &'a [u8],
    memory: Vec<u8>,
    storage: BTreeMap<u64, u64>,
    returndata: Vec<u8>,
    logs: Vec<LogEvent>,
    steps: u64,
}

impl<'a> Interpreter<'a> {
    fn tick(&mut self) -> Result<(), Interrupt> {
        if self.steps == 0 {
            return Err(InterpError::StepLimit.into());
        }
        self.steps -= 1;
        Ok(())
    }

    fn exec_block(&mut self, block: &'a Block, vars: &mut Vars) -> Result<Signal, Interrupt> {
        for stmt in &block.stmts {
            match self.exec_stmt(stmt, vars)? {
                Signal::Normal => {}
                signal => return Ok(signal),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt, vars: &mut Vars) -> Result<Signal, Interrupt> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, vars)?;
                Ok(Signal::Normal)
            }
            StmtKind::Let { vars: names, value } => {
                let values = match value {
                    Some(expr) => self.eval(expr, vars)?,
                    None => vec![0; names.len()],
                };
                self.bind(names, values, vars)?;
                Ok(Signal::Normal)
            }
            StmtKind::Assign { targets, value } => {
                let values = self.eval(value, vars)?;
                self.bind(targets, values, vars)?;
                Ok(Signal::Normal)
            }
            StmtKind::If { cond, body } => {
                if self.eval_one(cond, vars)? != 0 {
                    self.exec_block(body, vars)
                } else {
                    Ok(Signal::Normal)
                }
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                let scrutinee = self.eval_one(expr, vars)?;
                for case in cases {
                    if case.value == scrutinee {
                        return self.exec_block(&case.body, vars);
                    }
                }
                match default {
                    Some(default) => self.exec_block(default, vars),
                    None => Ok(Signal::Normal),
                }
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                match self.exec_block(init, vars)? {
                    Signal::Normal => {}
                    signal => return Ok(signal),
                }
                loop {
                    self.tick()?;
                    if self.eval_one(cond, vars)? == 0 {
                        return Ok(Signal::Normal);
                    }
                    match self.exec_block(body, vars)? {
                        Signal::Normal | Signal::Continue => {}
                        Signal::Break => return Ok(Signal::Normal),
                        Signal::Leave => return Ok(Signal::Leave),
                    }
                    match self.exec_block(post, vars)? {
                        Signal::Normal => {}
                        Signal::Break => return Ok(Signal::Normal),
                        signal => return Ok(signal),
                    }
                }
            }
            StmtKind::Break => Ok(Signal::Break),
            StmtKind::Continue => Ok(Signal::Continue),
            StmtKind::Leave => Ok(Signal::Leave),
            StmtKind::FnDef(_) => Ok(Signal::Normal),
            StmtKind::Block(inner) => self.exec_block(inner, vars),
        }
    }

    fn bind(&mut self, names: &[String], values: Vec<u64>, vars: &mut Vars) -> Result<(), Interrupt> {
        if names.len() != values.len() {
            return Err(InterpError::Malformed(format!(
                "expected {} values, got {}",
                names.len(),
                values.len()
            ))
            .into());
        }
        for (name, value) in names.iter().zip(values) {
            vars.insert(name.clone(), value);
        }
        Ok(())
    }

    fn eval_one(&mut self, expr: &'a Expr, vars: &mut Vars) -> Result<u64, Interrupt> {
        let values = self.eval(expr, vars)?;
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(InterpError::Malformed(format!(
                "expected a single value, got {}",
                values.len()
            ))
            .into()),
        }
    }

    fn eval(&mut self, expr: &'a Expr, vars: &mut Vars) -> Result<Vec<u64>, Interrupt> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(vec![*value]),
            ExprKind::Ident(name) => match vars.get(name) {
                Some(value) => Ok(vec![*value]),
                None => Err(InterpError::Malformed(format!("undefined variable '{name}'")).into()),
            },
            ExprKind::Call { name, args } => {
                self.tick()?;
                // Arguments evaluate right to left.
                let mut values = Vec::with_capacity(args.len());
                for arg in args.iter().rev() {
                    values.push(self.eval_one(arg, vars)?);
                }
                values.reverse();
                if let Some(func) = self.functions.get(name).copied() {
                    self.call_function(func, values)
                } else {
                    self.eval_builtin(name, &values)
                }
            }
        }
    }

    fn call_function(
        &mut self,
        func: &'a FunctionDef,
        args: Vec<u64>,
    ) -> Result<Vec<u64>, Interrupt> {
        if args.len() != func.params.len() {
            return Err(InterpError::Malformed(format!(
                "function '{}' takes {} arguments, got {}",
                func.name,
                func.params.len(),
                args.len()
            ))
            .into());
        }
        let mut frame: Vars = BTreeMap::new();
        for (param, value) in func.params.iter().zip(args) {
            frame.insert(param.clone(), value);
        }
        for name in &func.returns {
            frame.insert(name.clone(), 0);
        }
        match self.exec_block(&func.body, &mut frame)? {
            Signal::Normal | Signal::Leave => {}
            Signal::Break | Signal::Continue => {
                return Err(
                    InterpError::Malformed("loop exit escaped a function body".into()).into(),
                );
            }
        }
        Ok(func
            .returns
            .iter()
            .map(|name| frame.get(name).copied().unwrap_or(0))
            .collect())
    }

    fn eval_builtin(&mut self, name: &str, args: &[u64]) -> Result<Vec<u64>, Interrupt> {
        let value = match (name, args) {
            ("add", [a, b]) => a.wrapping_add(*b),
            ("sub", [a, b]) => a.wrapping_sub(*b),
            ("mul", [a, b]) => a.wrapping_mul(*b),
            ("div", [a, b]) => {
                if *b == 0 {
                    0
                } else {
                    a / b
                }
            }
            ("mod", [a, b]) => {
                if *b == 0 {
                    0
                } else {
                    a % b
                }
            }
            ("exp", [a, b]) => wrapping_pow(*a, *b),
            ("lt", [a, b]) => u64::from(a < b),
            ("gt", [a, b]) => u64::from(a > b),
            ("eq", [a, b]) => u64::from(a == b),
            ("iszero", [a]) => u64::from(*a == 0),
            ("and", [a, b]) => a & b,
            ("or", [a, b]) => a | b,
            ("xor", [a, b]) => a ^ b,
            ("not", [a]) => !a,
            ("shl", [shift, value]) => {
                if *shift >= 64 {
                    0
                } else {
                    value << shift
                }
            }
            ("shr", [shift, value]) => {
                if *shift >= 64 {
                    0
                } else {
                    value >> shift
                }
            }
            ("byte", [index, value]) => {
                // Byte 0 is the most significant of the 32-byte cell; the
                // value occupies the low 8 bytes.
                if *index >= 32 || *index < 24 {
                    0
                } else {
                    (value >> (8 * (31 - index))) & 0xff
                }
            }
            ("pop", [_]) => return Ok(Vec::new()),
            ("address" | "caller" | "callvalue" | "chainid", []) => 0,
            ("balance", [_]) => 0,
            ("gas", []) => self.steps,
            ("codesize", []) => 0,
            ("calldatasize", []) => self.calldata.len() as u64,
            ("calldataload", [offset]) => load_word(self.calldata, *offset),
            ("returndatasize", []) => self.returndata.len() as u64,
            ("msize", []) => self.memory.len() as u64,
            ("mload", [offset]) => {
                self.touch(*offset, CELL)?;
                load_word(&self.memory, *offset)
            }
            ("mstore", [offset, value]) => {
                self.touch(*offset, CELL)?;
                store_word(&mut self.memory, *offset, *value);
                return Ok(Vec::new());
            }
            ("mstore8", [offset, value]) => {
                self.touch(*offset, 1)?;
                self.memory[*offset as usize] = (*value & 0xff) as u8;
                return Ok(Vec::new());
            }
            ("keccak256", [offset, length]) => {
                self.touch(*offset, *length)?;
                digest(self.mem_slice(*offset, *length))
            }
            ("calldatacopy", [dest, src, length]) => {
                self.copy_into_memory_from(self.calldata.to_vec(), *dest, *src, *length)?;
                return Ok(Vec::new());
            }
            ("codecopy", [dest, src, length]) => {
                self.copy_into_memory_from(Vec::new(), *dest, *src, *length)?;
                return Ok(Vec::new());
            }
            ("extcodecopy", [_, dest, src, length]) => {
                self.copy_into_memory_from(Vec::new(), *dest, *src, *length)?;
                return Ok(Vec::new());
            }
            ("returndatacopy", [dest, src, length]) => {
                // Reading past the end of the return data aborts.
                let end = src.checked_add(*length);
                if end.is_none() || end.unwrap() > self.returndata.len() as u64 {
                    return Err(Interrupt::Halt(Outcome::Revert(Vec::new())));
                }
                let data = self.returndata.clone();
                self.copy_into_memory_from(data, *dest, *src, *length)?;
                return Ok(Vec::new());
            }
            ("sload", [key]) => self.storage.get(key).copied().unwrap_or(0),
            ("sstore", [key, value]) => {
                if *value == 0 {
                    self.storage.remove(key);
                } else {
                    self.storage.insert(*key, *value);
                }
                return Ok(Vec::new());
            }
            ("log0" | "log1" | "log2" | "log3" | "log4", [offset, length, topics @ ..]) => {
                self.touch(*offset, *length)?;
                let data = self.mem_slice(*offset, *length).to_vec();
                self.logs.push(LogEvent {
                    topics: topics.to_vec(),
                    data,
                });
                return Ok(Vec::new());
            }
            ("return", [offset, length]) => {
                self.touch(*offset, *length)?;
                let data = self.mem_slice(*offset, *length).to_vec();
                return Err(Interrupt::Halt(Outcome::Return(data)));
            }
            ("revert", [offset, length]) => {
                self.touch(*offset, *length)?;
                let data = self.mem_slice(*offset, *length).to_vec();
                return Err(Interrupt::Halt(Outcome::Revert(data)));
            }
            ("stop", []) => return Err(Interrupt::Halt(Outcome::Stop)),
            ("invalid", []) => return Err(Interrupt::Halt(Outcome::Revert(Vec::new()))),
            ("selfdestruct", [_]) => return Err(Interrupt::Halt(Outcome::Stop)),
            ("call" | "callcode" | "delegatecall" | "staticcall" | "create" | "create2", _) => {
                return Err(InterpError::Unsupported("external calls").into());
            }
            _ => {
                return Err(InterpError::Malformed(format!(
                    "unknown builtin or bad argument count: '{name}'"
                ))
                .into());
            }
        };
        Ok(vec![value])
    }

    fn mem_slice(&self, offset: u64, length: u64) -> &[u8] {
        if length == 0 {
            &[]
        } else {
            &self.memory[offset as usize..(offset + length) as usize]
        }
    }

    /// Grow memory to cover `[offset, offset + length)`, rounded up to a
    /// whole cell.
    fn touch(&mut self, offset: u64, length: u64) -> Result<(), Interrupt> {
        if length == 0 {
            return Ok(());
        }
        let end = offset
            .checked_add(length)
            .ok_or(InterpError::MemoryLimit)?;
        let rounded = end.div_ceil(CELL) * CELL;
        if rounded > MEMORY_LIMIT {
            return Err(InterpError::MemoryLimit.into());
        }
        if rounded as usize > self.memory.len() {
            self.memory.resize(rounded as usize, 0);
        }
        Ok(())
    }

    fn copy_into_memory_from(
        &mut self,
        source: Vec<u8>,
        dest: u64,
        src: u64,
        length: u64,
    ) -> Result<(), Interrupt> {
        self.touch(dest, length)?;
        for i in 0..length {
            let byte = source.get((src.wrapping_add(i)) as usize).copied().unwrap_or(0);
            self.memory[(dest + i) as usize] = byte;
        }
        Ok(())
    }
}

/// Read the value of the 32-byte cell at `offset`: bytes past the end of
/// the buffer count as zero, and only the low 8 bytes carry the value.
fn load_word(buffer: &[u8], offset: u64) -> u64 {
    let mut value = 0u64;
    for i in 24..32 {
        let byte = buffer
            .get(offset.wrapping_add(i) as usize)
            .copied()
            .unwrap_or(0);
        value = (value << 8) | u64::from(byte);
    }
    value
}

fn store_word(buffer: &mut [u8], offset: u64, value: u64) {
    for i in 0..24 {
        buffer[(offset + i) as usize] = 0;
    }
    for i in 0..8 {
        buffer[(offset + 24 + i) as usize] = (value >> (8 * (7 - i))) as u8;
    }
}

fn wrapping_pow(mut base: u64, mut exponent: u64) -> u64 {
    let mut result = 1u64;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1;
    }
    result
}

/// Stand-in digest for `keccak256`: stable and collision-poor enough for
/// testing, not cryptographic.
fn digest(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
