use super::{DirectResults, PlanContext, RValue, ResultPlan, Temporary};
use crate::codegen::{
    convert::{self, Emitted},
    destination::Destination,
};
use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use tracing::trace;

impl ResultPlan {
    /// Consumes the plan once the call has been emitted, claiming direct results from
    /// the front of `direct` in the order the builder claimed their slots.
    pub fn finish(
        self,
        cx: PlanContext<'_>,
        subst: &TypeExpr,
        direct: &mut DirectResults,
    ) -> RValue {
        trace!(kind = self.kind_name(), %subst, "finishing result plan");
        match self {
            ResultPlan::InPlace { mut destination } => {
                destination.finish(cx.builder);
                RValue::Used
            }
            ResultPlan::Scalar {
                temporary,
                orig,
                destination,
            } => finish_scalar(cx, subst, direct, temporary, &orig, destination),
            ResultPlan::TupleValue { elements } => {
                check_arity(subst, elements.len());
                RValue::Tuple(
                    elements
                        .into_iter()
                        .enumerate()
                        .map(|(index, plan)| {
                            plan.finish(cx, subst.tuple_element_type(index), direct)
                        })
                        .collect(),
                )
            }
            ResultPlan::TupleDestination {
                mut destination,
                elements,
            } => {
                check_arity(subst, elements.len());
                for (index, plan) in elements.into_iter().enumerate() {
                    let element = plan.finish(cx, subst.tuple_element_type(index), direct);
                    debug_assert!(
                        element.is_used(),
                        "element {index} of `{subst}` was not delivered"
                    );
                }
                destination.finish(cx.builder);
                RValue::Used
            }
            ResultPlan::IndirectStoreFromTemporary {
                mut destination,
                sub_plan,
                temporary,
            } => {
                let sub_result = sub_plan.finish(cx, subst, direct);
                debug_assert!(sub_result.is_used(), "sub-plan did not emit into its temporary");
                let value = temporary.into_managed(cx.builder);
                destination.copy_or_init_value_into(cx.builder, value, true);
                destination.finish(cx.builder);
                RValue::Used
            }
            ResultPlan::StoreFromValue {
                mut destination,
                sub_plan,
            } => {
                let value = sub_plan
                    .finish(cx, subst, direct)
                    .into_single_value(cx.builder, subst);
                destination.copy_or_init_value_into(cx.builder, value, true);
                destination.finish(cx.builder);
                RValue::Used
            }
        }
    }
}

fn finish_scalar(
    cx: PlanContext<'_>,
    subst: &TypeExpr,
    direct: &mut DirectResults,
    temporary: Option<Temporary>,
    orig: &AbstractionPattern,
    mut destination: Option<Box<dyn Destination>>,
) -> RValue {
    let builder = cx.builder;
    let subst_tl = builder.types().lower(subst);

    let mut value = match temporary {
        Some(temporary) => {
            let value = temporary.into_managed(builder);
            if subst_tl.is_address_only() {
                value
            } else {
                convert::load_take(builder, value)
            }
        }
        None => direct.claim(),
    };

    if value.ty().has_abstraction_difference(&subst_tl) {
        if cx.rep.is_foreign() {
            value = convert::bridged_to_native(builder, value, subst);
        } else {
            match convert::orig_to_subst(builder, value, orig, subst, destination.as_mut()) {
                Emitted::InContext => return RValue::Used,
                Emitted::Value(converted) => value = converted,
            }
        }
    }

    match destination {
        Some(mut destination) => {
            destination.copy_or_init_value_into(builder, value, true);
            destination.finish(builder);
            RValue::Used
        }
        None => RValue::Scalar(value),
    }
}

fn check_arity(subst: &TypeExpr, planned: usize) {
    let actual = subst
        .tuple_elements()
        .map(<[_]>::len)
        .unwrap_or_else(|| panic!("tuple plan finished at non-tuple `{subst}`"));
    assert_eq!(
        planned, actual,
        "tuple plan has {planned} elements but `{subst}` has {actual}"
    );
}
