use super::{PlanContext, ResultPlan, ResultSlots, Temporary};
use crate::codegen::{
    builder::Address,
    destination::{AddressDestination, Destination},
};
use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use tracing::debug;

pub struct ResultPlanBuilder<'a> {
    cx: PlanContext<'a>,
}

impl<'a> ResultPlanBuilder<'a> {
    pub fn new(cx: PlanContext<'a>) -> Self {
        Self { cx }
    }

    /// Builds the plan for results of declared shape `orig` and concrete type `subst`.
    ///
    /// Slots are claimed left to right. Every indirect slot pushes exactly one address
    /// onto `indirect_results`, in claim order; the call must be emitted with those
    /// buffers in that order.
    pub fn build(
        &self,
        slots: &mut ResultSlots<'_>,
        indirect_results: &mut Vec<Address>,
        destination: Option<Box<dyn Destination>>,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
    ) -> ResultPlan {
        if orig.is_tuple() {
            return self.build_for_tuple(slots, indirect_results, destination, orig, subst);
        }

        let slot = slots.claim();
        let in_place = destination
            .as_ref()
            .and_then(|destination| destination.address_for_in_place())
            .filter(|address| {
                slot.is_indirect() && !address.ty.has_abstraction_difference(&slot.ty)
            });

        match (in_place, destination) {
            (Some(address), Some(destination)) => {
                debug!(slot = %slot, address = %address.value, "result initializes in place");
                indirect_results.push(address);
                ResultPlan::InPlace { destination }
            }
            (_, destination) => {
                let temporary = slot.is_indirect().then(|| {
                    let temporary = Temporary::new(self.cx.builder, slot.ty.clone());
                    indirect_results.push(temporary.address().clone());
                    temporary
                });
                debug!(
                    slot = %slot,
                    temporary = temporary.is_some(),
                    destination = destination.is_some(),
                    "scalar result"
                );
                ResultPlan::Scalar {
                    temporary,
                    orig: orig.clone(),
                    destination,
                }
            }
        }
    }

    fn build_for_tuple(
        &self,
        slots: &mut ResultSlots<'_>,
        indirect_results: &mut Vec<Address>,
        destination: Option<Box<dyn Destination>>,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
    ) -> ResultPlan {
        let count = orig.tuple_element_count();
        let subst_count = subst
            .tuple_elements()
            .map(<[_]>::len)
            .unwrap_or_else(|| panic!("tuple pattern `{orig}` paired with non-tuple `{subst}`"));
        assert_eq!(
            count, subst_count,
            "tuple pattern `{orig}` has {count} elements but `{subst}` has {subst_count}"
        );

        let Some(mut destination) = destination else {
            let elements = (0..count)
                .map(|index| {
                    self.build(
                        slots,
                        indirect_results,
                        None,
                        orig.tuple_element(index),
                        subst.tuple_element_type(index),
                    )
                })
                .collect();
            return ResultPlan::TupleValue { elements };
        };

        if destination.can_split_into_tuple_elements() {
            let children = destination.split_into_tuple_elements(self.cx.builder, subst);
            debug!(%subst, destination = %destination.describe(), "splitting tuple destination");
            let elements = children
                .into_iter()
                .enumerate()
                .map(|(index, child)| {
                    self.build(
                        slots,
                        indirect_results,
                        Some(child),
                        orig.tuple_element(index),
                        subst.tuple_element_type(index),
                    )
                })
                .collect();
            return ResultPlan::TupleDestination {
                destination,
                elements,
            };
        }

        // The destination only takes whole values from here on.
        let types = self.cx.builder.types();
        if types.is_address_only(subst) {
            let temporary = Temporary::new(self.cx.builder, types.lower(subst));
            debug!(
                %subst,
                temporary = %temporary.address().value,
                "address-only tuple via temporary"
            );
            let buffer: Box<dyn Destination> =
                Box::new(AddressDestination::new(temporary.address().clone()));
            let sub_plan =
                self.build_for_tuple(slots, indirect_results, Some(buffer), orig, subst);
            return ResultPlan::IndirectStoreFromTemporary {
                destination,
                sub_plan: Box::new(sub_plan),
                temporary,
            };
        }

        debug!(%subst, "tuple stored as one value");
        let sub_plan = self.build_for_tuple(slots, indirect_results, None, orig, subst);
        ResultPlan::StoreFromValue {
            destination,
            sub_plan: Box::new(sub_plan),
        }
    }
}
