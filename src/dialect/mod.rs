//! The builtin-instruction table for the target dialect.
//!
//! Every mutation of memory or storage in the IR happens through one of
//! these builtins, so the table is the single source of truth the analyses
//! consult: abstract side effects per address space, control-flow side
//! effects, and — for the store eliminator — the precise read/write
//! operation signatures (which argument is the start offset, which the
//! length, or whether the length is a fixed constant).

use std::collections::BTreeMap;

/// Word granularity of the memory-alias rules, in bytes.
pub const WORD_SIZE: u64 = 32;

/// The two mutable address spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Location {
    Memory,
    Storage,
}

/// Abstract effect on an address space, ordered by strength.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effect {
    #[default]
    None,
    Read,
    Write,
}

impl Effect {
    pub fn join(self, other: Effect) -> Effect {
        self.max(other)
    }
}

/// Abstract side effects of a builtin or user-defined function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SideEffects {
    pub memory: Effect,
    pub storage: Effect,
    /// Everything outside the two tracked spaces: logs, balances, external
    /// calls, contract creation.
    pub other_state: Effect,
}

impl SideEffects {
    pub fn join(self, other: SideEffects) -> SideEffects {
        SideEffects {
            memory: self.memory.join(other.memory),
            storage: self.storage.join(other.storage),
            other_state: self.other_state.join(other.other_state),
        }
    }
}

/// Whether a call can return to its caller and/or halt the whole execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlFlowEffects {
    /// Some path through the callee returns normally.
    pub can_continue: bool,
    /// Some path ends the whole execution in a committing way (as opposed
    /// to aborting, which discards storage effects).
    pub can_terminate: bool,
}

impl ControlFlowEffects {
    pub const NORMAL: ControlFlowEffects = ControlFlowEffects {
        can_continue: true,
        can_terminate: false,
    };
    pub const TERMINATES: ControlFlowEffects = ControlFlowEffects {
        can_continue: false,
        can_terminate: true,
    };
    pub const ABORTS: ControlFlowEffects = ControlFlowEffects {
        can_continue: false,
        can_terminate: false,
    };
}

/// One declared read or write of a builtin, with the argument positions
/// carrying the address range. `start_param`/`length_param` index into the
/// call's arguments; `length_constant` is used instead of a parameter when
/// the instruction has a fixed access width. A signature with no start and
/// no length describes an access of unknown extent.
#[derive(Clone, Copy, Debug)]
pub struct OpSignature {
    pub location: Location,
    pub effect: Effect,
    pub start_param: Option<usize>,
    pub length_param: Option<usize>,
    pub length_constant: Option<u64>,
}

impl OpSignature {
    fn read(location: Location) -> Self {
        Self {
            location,
            effect: Effect::Read,
            start_param: None,
            length_param: None,
            length_constant: None,
        }
    }

    fn write(location: Location) -> Self {
        Self {
            location,
            effect: Effect::Write,
            start_param: None,
            length_param: None,
            length_constant: None,
        }
    }

    fn at(mut self, start_param: usize) -> Self {
        self.start_param = Some(start_param);
        self
    }

    fn len_param(mut self, length_param: usize) -> Self {
        self.length_param = Some(length_param);
        self
    }

    fn len_const(mut self, length: u64) -> Self {
        self.length_constant = Some(length);
        self
    }
}

/// A primitive instruction of the dialect.
#[derive(Clone, Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub arg_count: usize,
    pub return_count: usize,
    pub side_effects: SideEffects,
    pub control_flow: ControlFlowEffects,
    /// Declared reads/writes on the tracked address spaces.
    pub operations: Vec<OpSignature>,
    /// True if calls can be moved/elided freely: no side effects and the
    /// result does not depend on mutable state.
    pub movable: bool,
}

/// The instruction table plus target flags.
#[derive(Clone, Debug)]
pub struct Dialect {
    builtins: BTreeMap<&'static str, Builtin>,
    /// Whether memory contents remain externally observable after the
    /// program ends (return-data / object semantics). Governs whether
    /// still-pending memory stores at program end must be kept.
    pub memory_observable_at_exit: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect {
    /// The default target: memory is scratch space owned by the program
    /// and unobservable once it halts.
    pub fn new() -> Self {
        Self {
            builtins: build_table(),
            memory_observable_at_exit: false,
        }
    }

    pub fn with_observable_memory() -> Self {
        Self {
            builtins: build_table(),
            memory_observable_at_exit: true,
        }
    }

    pub fn builtin(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }
}

fn build_table() -> BTreeMap<&'static str, Builtin> {
    use Location::{Memory, Storage};

    let mut table = BTreeMap::new();

    let mut add = |name: &'static str,
                   arg_count: usize,
                   return_count: usize,
                   side_effects: SideEffects,
                   control_flow: ControlFlowEffects,
                   operations: Vec<OpSignature>,
                   movable: bool| {
        table.insert(
            name,
            Builtin {
                name,
                arg_count,
                return_count,
                side_effects,
                control_flow,
                operations,
                movable,
            },
        );
    };

    let pure = SideEffects::default();
    let reads_mem = SideEffects {
        memory: Effect::Read,
        ..SideEffects::default()
    };
    let writes_mem = SideEffects {
        memory: Effect::Write,
        ..SideEffects::default()
    };
    let reads_env = SideEffects {
        other_state: Effect::Read,
        ..SideEffects::default()
    };

    // ── Arithmetic and logic (pure, movable) ──
    for name in [
        "add", "sub", "mul", "div", "mod", "exp", "lt", "gt", "eq", "and", "or", "xor", "shl",
        "shr", "byte",
    ] {
        add(name, 2, 1, pure, ControlFlowEffects::NORMAL, vec![], true);
    }
    for name in ["iszero", "not"] {
        add(name, 1, 1, pure, ControlFlowEffects::NORMAL, vec![], true);
    }
    add("pop", 1, 0, pure, ControlFlowEffects::NORMAL, vec![], true);

    // ── Execution environment (immutable during a run) ──
    for name in ["address", "caller", "callvalue", "calldatasize", "codesize", "chainid"] {
        add(name, 0, 1, pure, ControlFlowEffects::NORMAL, vec![], true);
    }
    add("calldataload", 1, 1, pure, ControlFlowEffects::NORMAL, vec![], true);
    // Mutable environment reads.
    add("gas", 0, 1, reads_env, ControlFlowEffects::NORMAL, vec![], false);
    add("balance", 1, 1, reads_env, ControlFlowEffects::NORMAL, vec![], false);
    add(
        "returndatasize",
        0,
        1,
        reads_env,
        ControlFlowEffects::NORMAL,
        vec![],
        false,
    );
    // Reads the memory extent, not its contents; its mere presence disables
    // memory-store elimination globally.
    add("msize", 0, 1, reads_mem, ControlFlowEffects::NORMAL, vec![], false);

    // ── Memory ──
    add(
        "mload",
        1,
        1,
        reads_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::read(Memory).at(0).len_const(WORD_SIZE)],
        false,
    );
    add(
        "mstore",
        2,
        0,
        writes_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(0).len_const(WORD_SIZE)],
        false,
    );
    add(
        "mstore8",
        2,
        0,
        writes_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(0).len_const(1)],
        false,
    );
    add(
        "keccak256",
        2,
        1,
        reads_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::read(Memory).at(0).len_param(1)],
        false,
    );
    add(
        "calldatacopy",
        3,
        0,
        writes_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(0).len_param(2)],
        false,
    );
    add(
        "codecopy",
        3,
        0,
        writes_mem,
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(0).len_param(2)],
        false,
    );
    add(
        "extcodecopy",
        4,
        0,
        SideEffects {
            memory: Effect::Write,
            other_state: Effect::Read,
            ..SideEffects::default()
        },
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(1).len_param(3)],
        false,
    );
    add(
        "returndatacopy",
        3,
        0,
        SideEffects {
            memory: Effect::Write,
            other_state: Effect::Read,
            ..SideEffects::default()
        },
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Memory).at(0).len_param(2)],
        false,
    );

    // ── Storage ──
    add(
        "sload",
        1,
        1,
        SideEffects {
            storage: Effect::Read,
            ..SideEffects::default()
        },
        ControlFlowEffects::NORMAL,
        vec![OpSignature::read(Storage).at(0).len_const(1)],
        false,
    );
    add(
        "sstore",
        2,
        0,
        SideEffects {
            storage: Effect::Write,
            ..SideEffects::default()
        },
        ControlFlowEffects::NORMAL,
        vec![OpSignature::write(Storage).at(0).len_const(1)],
        false,
    );

    // ── Logging ──
    for (name, arg_count) in [("log0", 2), ("log1", 3), ("log2", 4), ("log3", 5), ("log4", 6)] {
        add(
            name,
            arg_count,
            0,
            SideEffects {
                memory: Effect::Read,
                other_state: Effect::Write,
                ..SideEffects::default()
            },
            ControlFlowEffects::NORMAL,
            vec![OpSignature::read(Memory).at(0).len_param(1)],
            false,
        );
    }

    // ── External calls and creation ──
    let call_effects = SideEffects {
        memory: Effect::Write,
        storage: Effect::Write,
        other_state: Effect::Write,
    };
    add(
        "call",
        7,
        1,
        call_effects,
        ControlFlowEffects::NORMAL,
        vec![
            OpSignature::read(Memory).at(3).len_param(4),
            OpSignature::write(Memory).at(5).len_param(6),
            OpSignature::read(Storage),
            OpSignature::write(Storage),
        ],
        false,
    );
    add(
        "delegatecall",
        6,
        1,
        call_effects,
        ControlFlowEffects::NORMAL,
        vec![
            OpSignature::read(Memory).at(2).len_param(3),
            OpSignature::write(Memory).at(4).len_param(5),
            OpSignature::read(Storage),
            OpSignature::write(Storage),
        ],
        false,
    );
    add(
        "staticcall",
        6,
        1,
        SideEffects {
            memory: Effect::Write,
            storage: Effect::Read,
            other_state: Effect::Read,
        },
        ControlFlowEffects::NORMAL,
        vec![
            OpSignature::read(Memory).at(2).len_param(3),
            OpSignature::write(Memory).at(4).len_param(5),
            OpSignature::read(Storage),
        ],
        false,
    );
    add(
        "create",
        3,
        1,
        call_effects,
        ControlFlowEffects::NORMAL,
        vec![
            OpSignature::read(Memory).at(1).len_param(2),
            OpSignature::read(Storage),
            OpSignature::write(Storage),
        ],
        false,
    );
    add(
        "create2",
        4,
        1,
        call_effects,
        ControlFlowEffects::NORMAL,
        vec![
            OpSignature::read(Memory).at(1).len_param(2),
            OpSignature::read(Storage),
            OpSignature::write(Storage),
        ],
        false,
    );

    // ── Halting ──
    add(
        "return",
        2,
        0,
        reads_mem,
        ControlFlowEffects::TERMINATES,
        vec![OpSignature::read(Memory).at(0).len_param(1)],
        false,
    );
    add(
        "revert",
        2,
        0,
        reads_mem,
        ControlFlowEffects::ABORTS,
        vec![OpSignature::read(Memory).at(0).len_param(1)],
        false,
    );
    add("stop", 0, 0, pure, ControlFlowEffects::TERMINATES, vec![], false);
    add("invalid", 0, 0, pure, ControlFlowEffects::ABORTS, vec![], false);
    add(
        "selfdestruct",
        1,
        0,
        SideEffects {
            storage: Effect::Write,
            other_state: Effect::Write,
            ..SideEffects::default()
        },
        ControlFlowEffects::TERMINATES,
        vec![],
        false,
    );

    table
}
