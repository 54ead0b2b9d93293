use crate::lowering::{LoweredType, TypeConverter};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A memory location together with the lowered type stored there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub value: ValueId,
    pub ty: LoweredType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOwnership {
    Init,
    Assign,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    AllocStack {
        result: ValueId,
        ty: LoweredType,
    },
    Apply {
        callee: String,
        indirect_results: Vec<ValueId>,
        direct_results: Vec<ValueId>,
    },
    Load {
        result: ValueId,
        address: ValueId,
        take: bool,
    },
    Store {
        value: ValueId,
        address: ValueId,
        ownership: StoreOwnership,
    },
    CopyAddr {
        source: ValueId,
        dest: ValueId,
        take: bool,
        init: bool,
    },
    TupleElementAddr {
        result: ValueId,
        address: ValueId,
        index: usize,
    },
    Tuple {
        result: ValueId,
        elements: Vec<ValueId>,
    },
    DestructureTuple {
        operand: ValueId,
        results: Vec<ValueId>,
    },
    Reabstract {
        result: ValueId,
        operand: ValueId,
        thunk: String,
    },
    ReabstractAddr {
        source: ValueId,
        dest: ValueId,
        thunk: String,
    },
    BridgeToNative {
        result: ValueId,
        operand: ValueId,
        from: String,
        to: String,
    },
    DebugValue {
        name: String,
        value: ValueId,
    },
    DestroyValue {
        operand: ValueId,
    },
    DestroyAddr {
        address: ValueId,
    },
    DeallocStack {
        address: ValueId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::AllocStack { result, ty } => {
                write!(f, "{result} = alloc_stack {}", ty.as_object())
            }
            Instruction::Apply {
                callee,
                indirect_results,
                direct_results,
            } => {
                let direct = join_values(direct_results);
                let indirect = join_values(indirect_results);
                if direct_results.is_empty() {
                    write!(f, "apply @{callee}({indirect})")
                } else {
                    write!(f, "({direct}) = apply @{callee}({indirect})")
                }
            }
            Instruction::Load {
                result,
                address,
                take,
            } => {
                let qualifier = if *take { "take" } else { "copy" };
                write!(f, "{result} = load [{qualifier}] {address}")
            }
            Instruction::Store {
                value,
                address,
                ownership,
            } => {
                let qualifier = match ownership {
                    StoreOwnership::Init => "init",
                    StoreOwnership::Assign => "assign",
                };
                write!(f, "store {value} to [{qualifier}] {address}")
            }
            Instruction::CopyAddr {
                source,
                dest,
                take,
                init,
            } => {
                let take = if *take { "[take] " } else { "" };
                let init = if *init { "[init] " } else { "" };
                write!(f, "copy_addr {take}{source} to {init}{dest}")
            }
            Instruction::TupleElementAddr {
                result,
                address,
                index,
            } => write!(f, "{result} = tuple_element_addr {address}, {index}"),
            Instruction::Tuple { result, elements } => {
                write!(f, "{result} = tuple ({})", join_values(elements))
            }
            Instruction::DestructureTuple { operand, results } => {
                write!(f, "({}) = destructure_tuple {operand}", join_values(results))
            }
            Instruction::Reabstract {
                result,
                operand,
                thunk,
            } => write!(f, "{result} = reabstract {operand} via @{thunk}"),
            Instruction::ReabstractAddr {
                source,
                dest,
                thunk,
            } => write!(f, "reabstract_addr {source} to {dest} via @{thunk}"),
            Instruction::BridgeToNative {
                result,
                operand,
                from,
                to,
            } => write!(f, "{result} = bridge_to_native {operand} : {from} to {to}"),
            Instruction::DebugValue { name, value } => {
                write!(f, "debug_value {value}, let, name \"{name}\"")
            }
            Instruction::DestroyValue { operand } => write!(f, "destroy_value {operand}"),
            Instruction::DestroyAddr { address } => write!(f, "destroy_addr {address}"),
            Instruction::DeallocStack { address } => write!(f, "dealloc_stack {address}"),
        }
    }
}

fn join_values(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ValueId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScopeCleanup {
    DestroyValue(ValueId),
    DestroyAddr(ValueId),
}

#[derive(Default)]
struct Scope {
    cleanups: Vec<ScopeCleanup>,
    stack_slots: Vec<ValueId>,
}

struct FunctionState {
    name: String,
    next_value: u32,
    instructions: Vec<Instruction>,
    bindings: Vec<(String, ValueId)>,
    scopes: Vec<Scope>,
}

/// Shared handle onto the instruction stream of the function being emitted.
///
/// Cloning the handle does not copy the function; managed values keep a clone so their
/// cleanups can be emitted when they are dropped.
#[derive(Clone)]
pub struct FunctionBuilder {
    state: Rc<RefCell<FunctionState>>,
    types: Rc<TypeConverter>,
}

impl fmt::Debug for FunctionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FunctionBuilder")
            .field("name", &state.name)
            .field("instructions", &state.instructions.len())
            .finish()
    }
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, types: TypeConverter) -> Self {
        Self {
            state: Rc::new(RefCell::new(FunctionState {
                name: name.into(),
                next_value: 0,
                instructions: Vec::new(),
                bindings: Vec::new(),
                scopes: vec![Scope::default()],
            })),
            types: Rc::new(types),
        }
    }

    pub fn types(&self) -> &TypeConverter {
        &self.types
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.state.borrow().instructions.clone()
    }

    pub fn instruction_count(&self) -> usize {
        self.state.borrow().instructions.len()
    }

    pub fn bindings(&self) -> Vec<(String, ValueId)> {
        self.state.borrow().bindings.clone()
    }

    /// Renders the function body one instruction per line.
    pub fn listing(&self) -> String {
        let state = self.state.borrow();
        let mut out = format!("fn @{} {{\n", state.name);
        for instruction in &state.instructions {
            out.push_str("  ");
            out.push_str(&instruction.to_string());
            out.push('\n');
        }
        out.push('}');
        out
    }

    pub fn fresh_value(&self) -> ValueId {
        let mut state = self.state.borrow_mut();
        let id = ValueId(state.next_value);
        state.next_value += 1;
        id
    }

    pub fn emit(&self, instruction: Instruction) {
        self.state.borrow_mut().instructions.push(instruction);
    }

    /// Emits during drop. A builder that is already borrowed is being torn down by a
    /// panic, and the instruction is dropped with it.
    pub(crate) fn emit_from_drop(&self, instruction: Instruction) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.instructions.push(instruction);
        }
    }

    pub fn alloc_stack(&self, ty: LoweredType) -> Address {
        let ty = ty.as_address();
        let result = self.fresh_value();
        self.emit(Instruction::AllocStack {
            result,
            ty: ty.clone(),
        });
        if let Some(scope) = self.state.borrow_mut().scopes.last_mut() {
            scope.stack_slots.push(result);
        }
        Address { value: result, ty }
    }

    pub fn apply(
        &self,
        callee: &str,
        indirect_results: &[Address],
        direct_count: usize,
    ) -> Vec<ValueId> {
        let direct_results: Vec<ValueId> = (0..direct_count).map(|_| self.fresh_value()).collect();
        self.emit(Instruction::Apply {
            callee: callee.to_string(),
            indirect_results: indirect_results.iter().map(|addr| addr.value).collect(),
            direct_results: direct_results.clone(),
        });
        direct_results
    }

    pub fn load(&self, address: &Address, take: bool) -> ValueId {
        let result = self.fresh_value();
        self.emit(Instruction::Load {
            result,
            address: address.value,
            take,
        });
        result
    }

    pub fn store(&self, value: ValueId, address: &Address, ownership: StoreOwnership) {
        self.emit(Instruction::Store {
            value,
            address: address.value,
            ownership,
        });
    }

    pub fn copy_addr(&self, source: ValueId, dest: &Address, take: bool, init: bool) {
        self.emit(Instruction::CopyAddr {
            source,
            dest: dest.value,
            take,
            init,
        });
    }

    pub fn tuple_element_addr(&self, address: &Address, index: usize) -> Address {
        let ty = self.types.tuple_element(&address.ty, index).as_address();
        let result = self.fresh_value();
        self.emit(Instruction::TupleElementAddr {
            result,
            address: address.value,
            index,
        });
        Address { value: result, ty }
    }

    pub fn tuple(&self, elements: Vec<ValueId>) -> ValueId {
        let result = self.fresh_value();
        self.emit(Instruction::Tuple { result, elements });
        result
    }

    pub fn destructure_tuple(
        &self,
        operand: ValueId,
        ty: &LoweredType,
    ) -> Vec<(ValueId, LoweredType)> {
        let count = ty.ty.tuple_elements().map(<[_]>::len).unwrap_or_else(|| {
            panic!("destructure_tuple of non-tuple `{ty}`")
        });
        let results: Vec<(ValueId, LoweredType)> = (0..count)
            .map(|index| {
                let element = self.types.tuple_element(ty, index).as_object();
                (self.fresh_value(), element)
            })
            .collect();
        self.emit(Instruction::DestructureTuple {
            operand,
            results: results.iter().map(|(id, _)| *id).collect(),
        });
        results
    }

    pub fn reabstract(&self, operand: ValueId, from: &LoweredType, to: &LoweredType) -> ValueId {
        let result = self.fresh_value();
        self.emit(Instruction::Reabstract {
            result,
            operand,
            thunk: thunk_name(from, to),
        });
        result
    }

    pub fn reabstract_addr(&self, source: &Address, dest: &Address) {
        self.emit(Instruction::ReabstractAddr {
            source: source.value,
            dest: dest.value,
            thunk: thunk_name(&source.ty, &dest.ty),
        });
    }

    pub fn bridge_to_native(
        &self,
        operand: ValueId,
        from: &LoweredType,
        to: &LoweredType,
    ) -> ValueId {
        let result = self.fresh_value();
        self.emit(Instruction::BridgeToNative {
            result,
            operand,
            from: from.to_string(),
            to: to.to_string(),
        });
        result
    }

    /// Binds `value` to a named local; the local owns the value until its scope ends.
    pub fn bind_let(&self, name: &str, value: ValueId, trivial: bool) {
        self.emit(Instruction::DebugValue {
            name: name.to_string(),
            value,
        });
        let mut state = self.state.borrow_mut();
        state.bindings.push((name.to_string(), value));
        if !trivial {
            if let Some(scope) = state.scopes.last_mut() {
                scope.cleanups.push(ScopeCleanup::DestroyValue(value));
            }
        }
    }

    /// Registers an initialized stack slot owned by the current scope.
    pub fn bind_stack_slot(&self, name: &str, address: &Address) {
        self.emit(Instruction::DebugValue {
            name: name.to_string(),
            value: address.value,
        });
        let mut state = self.state.borrow_mut();
        state.bindings.push((name.to_string(), address.value));
        if !address.ty.is_trivial() {
            if let Some(scope) = state.scopes.last_mut() {
                scope.cleanups.push(ScopeCleanup::DestroyAddr(address.value));
            }
        }
    }

    /// Ends the innermost scope: destroys what its bindings own, then releases its
    /// stack slots in reverse allocation order.
    pub fn pop_scope(&self) {
        let mut state = self.state.borrow_mut();
        let Some(scope) = state.scopes.pop() else {
            return;
        };
        for cleanup in scope.cleanups.into_iter().rev() {
            state.instructions.push(match cleanup {
                ScopeCleanup::DestroyValue(operand) => Instruction::DestroyValue { operand },
                ScopeCleanup::DestroyAddr(address) => Instruction::DestroyAddr { address },
            });
        }
        for address in scope.stack_slots.into_iter().rev() {
            state.instructions.push(Instruction::DeallocStack { address });
        }
        if state.scopes.is_empty() {
            state.scopes.push(Scope::default());
        }
    }
}

fn thunk_name(from: &LoweredType, to: &LoweredType) -> String {
    let mut name = String::from("reabstraction_thunk_");
    let mut last_was_sep = false;
    for ch in format!("{}_to_{}", from.as_object(), to.as_object()).chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            name.push('_');
            last_was_sep = true;
        }
    }
    name.trim_end_matches('_').to_string()
}
