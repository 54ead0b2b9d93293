//! Emitting a call together with the plan for its results.

use super::{DirectResults, PlanContext, RValue, ResultPlan, ResultPlanBuilder, ResultSlots};
use crate::codegen::{builder::Address, destination::Destination, managed::ManagedValue};
use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use crate::lowering::{LoweredType, ResultSlot};
use tracing::debug;

/// A result plan built ahead of its call.
#[derive(Debug)]
pub struct PlannedResults<'s> {
    pub plan: ResultPlan,
    pub indirect_results: Vec<Address>,
    slots: &'s [ResultSlot],
}

impl<'s> PlannedResults<'s> {
    pub fn direct_result_types(&self) -> Vec<LoweredType> {
        self.slots
            .iter()
            .filter(|slot| !slot.is_indirect())
            .map(|slot| slot.ty.clone())
            .collect()
    }

    /// Emits the call with the planned indirect buffers and finishes the plan against
    /// its direct results.
    pub fn emit(self, cx: PlanContext<'_>, callee: &str, subst: &TypeExpr) -> RValue {
        let direct_types = self.direct_result_types();
        let ids = cx
            .builder
            .apply(callee, &self.indirect_results, direct_types.len());
        let values = ids
            .into_iter()
            .zip(direct_types)
            .map(|(id, ty)| ManagedValue::owned(cx.builder, id, ty))
            .collect();
        let mut direct = DirectResults::new(values);
        let result = self.plan.finish(cx, subst, &mut direct);
        direct.assert_exhausted();
        result
    }
}

/// Plans the results of a call before it is emitted.
pub fn plan_results<'s>(
    cx: PlanContext<'_>,
    slots: &'s [ResultSlot],
    destination: Option<Box<dyn Destination>>,
    orig: &AbstractionPattern,
    subst: &TypeExpr,
) -> PlannedResults<'s> {
    let mut cursor = ResultSlots::new(slots);
    let mut indirect_results = Vec::new();
    let plan = ResultPlanBuilder::new(cx).build(
        &mut cursor,
        &mut indirect_results,
        destination,
        orig,
        subst,
    );
    cursor.assert_exhausted();
    let indirect_slots = slots.iter().filter(|slot| slot.is_indirect()).count();
    assert_eq!(
        indirect_results.len(),
        indirect_slots,
        "planned {} indirect buffers for {} indirect slots",
        indirect_results.len(),
        indirect_slots
    );
    debug!(
        plan = plan.kind_name(),
        indirect = indirect_results.len(),
        direct = slots.len() - indirect_slots,
        "planned call results"
    );
    PlannedResults {
        plan,
        indirect_results,
        slots,
    }
}

/// Plans, emits, and finishes one call.
pub fn emit_apply(
    cx: PlanContext<'_>,
    callee: &str,
    slots: &[ResultSlot],
    destination: Option<Box<dyn Destination>>,
    orig: &AbstractionPattern,
    subst: &TypeExpr,
) -> RValue {
    plan_results(cx, slots, destination, orig, subst).emit(cx, callee, subst)
}
