//! Result plans: how the results of an emitted call reach their destinations.
//!
//! Planning happens in two passes over the same declared result shape. Before the
//! call is emitted, [`ResultPlanBuilder`] claims the result slots left to right and
//! records which addresses the callee must write its indirect results into. After the
//! call, [`ResultPlan::finish`] claims the direct results in the same order, reshapes
//! them where the declared and concrete representations differ, and delivers them.

pub mod apply;
mod builder;
pub mod explain;
mod finish;


pub use builder::ResultPlanBuilder;

use crate::codegen::{
    builder::{Address, FunctionBuilder, ValueId},
    destination::Destination,
    managed::ManagedValue,
};
use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use crate::lowering::{convention::Representation, ResultSlot};
use std::collections::VecDeque;
use std::fmt;

/// What every planning and finishing step needs from the surrounding emitter.
#[derive(Clone, Copy, Debug)]
pub struct PlanContext<'a> {
    pub builder: &'a FunctionBuilder,
    pub rep: Representation,
}

impl<'a> PlanContext<'a> {
    pub fn new(builder: &'a FunctionBuilder, rep: Representation) -> Self {
        Self { builder, rep }
    }
}

/// Forward-only cursor over an operation's result slots.
#[derive(Debug)]
pub struct ResultSlots<'s> {
    slots: &'s [ResultSlot],
    claimed: usize,
}

impl<'s> ResultSlots<'s> {
    pub fn new(slots: &'s [ResultSlot]) -> Self {
        Self { slots, claimed: 0 }
    }

    pub fn claim(&mut self) -> &'s ResultSlot {
        let Some(slot) = self.slots.get(self.claimed) else {
            panic!(
                "result plan claimed more than the {} result slots available",
                self.slots.len()
            );
        };
        self.claimed += 1;
        slot
    }

    pub fn remaining(&self) -> usize {
        self.slots.len() - self.claimed
    }

    pub fn assert_exhausted(&self) {
        assert_eq!(
            self.remaining(),
            0,
            "result plan left {} of {} result slots unclaimed",
            self.remaining(),
            self.slots.len()
        );
    }
}

/// Forward-only cursor over the direct results an emitted call produced.
#[derive(Debug, Default)]
pub struct DirectResults {
    values: VecDeque<ManagedValue>,
    claimed: usize,
}

impl DirectResults {
    pub fn new(values: Vec<ManagedValue>) -> Self {
        Self {
            values: values.into(),
            claimed: 0,
        }
    }

    pub fn claim(&mut self) -> ManagedValue {
        let Some(value) = self.values.pop_front() else {
            panic!(
                "result plan claimed a direct result after all {} were consumed",
                self.claimed
            );
        };
        self.claimed += 1;
        value
    }

    pub fn claimed(&self) -> usize {
        self.claimed
    }

    pub fn assert_exhausted(&self) {
        assert!(
            self.values.is_empty(),
            "result plan left {} direct results unclaimed",
            self.values.len()
        );
    }
}

/// Buffer allocated for an indirect result. The plan node holding it takes ownership
/// of its contents once the callee has initialized it.
#[derive(Debug)]
pub struct Temporary {
    address: Address,
}

impl Temporary {
    pub fn new(builder: &FunctionBuilder, ty: crate::lowering::LoweredType) -> Self {
        Self {
            address: builder.alloc_stack(ty),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn into_managed(self, builder: &FunctionBuilder) -> ManagedValue {
        ManagedValue::owned_address(builder, &self.address)
    }
}

/// Value produced by a plan subtree that had nowhere to deliver it.
#[derive(Debug)]
pub enum RValue {
    /// Everything was delivered into a destination.
    Used,
    Scalar(ManagedValue),
    Tuple(Vec<RValue>),
}

impl RValue {
    pub fn is_used(&self) -> bool {
        matches!(self, RValue::Used)
    }

    /// Leaf values in tuple order.
    pub fn leaves(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<ValueId>) {
        match self {
            RValue::Used => {}
            RValue::Scalar(value) => out.push(value.value()),
            RValue::Tuple(elements) => {
                for element in elements {
                    element.collect_leaves(out);
                }
            }
        }
    }

    /// Collapses the result into one value of type `subst`, building tuples as needed.
    pub fn into_single_value(self, builder: &FunctionBuilder, subst: &TypeExpr) -> ManagedValue {
        match self {
            RValue::Used => panic!("result of type `{subst}` was already delivered"),
            RValue::Scalar(value) => value,
            RValue::Tuple(elements) => {
                let lowered = builder.types().lower(subst);
                let values: Vec<ManagedValue> = elements
                    .into_iter()
                    .enumerate()
                    .map(|(index, element)| {
                        element.into_single_value(builder, subst.tuple_element_type(index))
                    })
                    .collect();
                assert!(
                    !lowered.is_address_only(),
                    "address-only tuple `{subst}` cannot be collapsed into one value"
                );
                let ids = values.into_iter().map(ManagedValue::forward).collect();
                let tuple = builder.tuple(ids);
                ManagedValue::owned(builder, tuple, lowered.as_object())
            }
        }
    }
}

impl fmt::Display for RValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RValue::Used => write!(f, "<delivered>"),
            RValue::Scalar(value) => write!(f, "{}", value.value()),
            RValue::Tuple(elements) => {
                write!(f, "(")?;
                for (idx, element) in elements.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One node of a result plan. Built once, finished once.
#[derive(Debug)]
pub enum ResultPlan {
    /// The callee writes straight into the destination's address.
    InPlace { destination: Box<dyn Destination> },
    /// A single result, possibly returned through a temporary and possibly needing
    /// reabstraction. The concrete type may still be a tuple when the declared shape
    /// was opaque.
    Scalar {
        temporary: Option<Temporary>,
        orig: AbstractionPattern,
        destination: Option<Box<dyn Destination>>,
    },
    TupleValue { elements: Vec<ResultPlan> },
    TupleDestination {
        destination: Box<dyn Destination>,
        elements: Vec<ResultPlan>,
    },
    /// Evaluates an address-only tuple into one buffer, then moves the buffer into a
    /// destination that could not be split.
    IndirectStoreFromTemporary {
        destination: Box<dyn Destination>,
        sub_plan: Box<ResultPlan>,
        temporary: Temporary,
    },
    StoreFromValue {
        destination: Box<dyn Destination>,
        sub_plan: Box<ResultPlan>,
    },
}

impl ResultPlan {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResultPlan::InPlace { .. } => "InPlace",
            ResultPlan::Scalar { .. } => "Scalar",
            ResultPlan::TupleValue { .. } => "TupleValue",
            ResultPlan::TupleDestination { .. } => "TupleDestination",
            ResultPlan::IndirectStoreFromTemporary { .. } => "IndirectStoreFromTemporary",
            ResultPlan::StoreFromValue { .. } => "StoreFromValue",
        }
    }

    pub fn children(&self) -> Vec<&ResultPlan> {
        match self {
            ResultPlan::InPlace { .. } | ResultPlan::Scalar { .. } => Vec::new(),
            ResultPlan::TupleValue { elements } | ResultPlan::TupleDestination { elements, .. } => {
                elements.iter().collect()
            }
            ResultPlan::IndirectStoreFromTemporary { sub_plan, .. }
            | ResultPlan::StoreFromValue { sub_plan, .. } => vec![sub_plan.as_ref()],
        }
    }
}
