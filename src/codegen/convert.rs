//! Value conversions the result planner relies on.

use crate::codegen::{builder::FunctionBuilder, destination::Destination, managed::ManagedValue};
use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use tracing::trace;

/// Outcome of a conversion that was offered a destination.
#[derive(Debug)]
pub enum Emitted {
    /// The converted value was written into the destination, which is now finished.
    InContext,
    Value(ManagedValue),
}

/// Moves a value out of the memory it was returned in.
pub fn load_take(builder: &FunctionBuilder, value: ManagedValue) -> ManagedValue {
    let Some(address) = value.as_address() else {
        panic!("load_take of non-address {value:?}");
    };
    value.forward();
    let loaded = builder.load(&address, true);
    ManagedValue::owned(builder, loaded, address.ty.as_object())
}

/// Converts a value returned through a foreign convention to its native type.
pub fn bridged_to_native(
    builder: &FunctionBuilder,
    value: ManagedValue,
    subst: &TypeExpr,
) -> ManagedValue {
    let native = builder.types().lower(subst).as_object();
    let value = if value.is_address() {
        load_take(builder, value)
    } else {
        value
    };
    trace!(from = %value.ty(), to = %native, "bridging to native");
    let (operand, from) = value.forward_with_type();
    let result = builder.bridge_to_native(operand, &from, &native);
    ManagedValue::owned(builder, result, native)
}

/// Reabstracts a value produced at `orig` to the natural representation of `subst`.
///
/// When `context` exposes an address the result is written there and the context is
/// finished; otherwise the converted value is returned.
pub fn orig_to_subst(
    builder: &FunctionBuilder,
    value: ManagedValue,
    orig: &AbstractionPattern,
    subst: &TypeExpr,
    context: Option<&mut Box<dyn Destination>>,
) -> Emitted {
    let target = builder.types().lower(subst);
    trace!(%orig, from = %value.ty(), to = %target, "reabstracting");
    let in_place = context.as_ref().and_then(|dest| dest.address_for_in_place());

    if let Some(source) = value.as_address() {
        value.forward();
        let dest = match &in_place {
            Some(address) => address.clone(),
            None => builder.alloc_stack(target.clone()),
        };
        builder.reabstract_addr(&source, &dest);
        return match context {
            Some(context) if in_place.is_some() => {
                context.finish(builder);
                Emitted::InContext
            }
            _ => Emitted::Value(ManagedValue::owned_address(builder, &dest)),
        };
    }

    let (operand, from) = value.forward_with_type();
    let converted = builder.reabstract(operand, &from, &target);
    let converted = ManagedValue::owned(builder, converted, target.as_object());
    match context {
        Some(context) if in_place.is_some() => {
            context.copy_or_init_value_into(builder, converted, true);
            context.finish(builder);
            Emitted::InContext
        }
        _ => Emitted::Value(converted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::Instruction;
    use crate::codegen::destination::{AddressDestination, BindingDestination};
    use crate::language::parser::parse_type;
    use crate::lowering::{convention::Representation, TypeConverter};

    fn thunked_function(builder: &FunctionBuilder) -> (TypeExpr, ManagedValue) {
        let subst = parse_type("(Int) -> Int").expect("parse");
        let ty = builder.types().lower_abstracted(
            &AbstractionPattern::Opaque,
            &subst,
            Representation::Thick,
        );
        let value = builder.fresh_value();
        (subst, ManagedValue::owned(builder, value, ty))
    }

    #[test]
    fn reabstraction_without_context_returns_the_converted_value() {
        let builder = FunctionBuilder::new("convert", TypeConverter::default());
        let (subst, value) = thunked_function(&builder);
        let original = value.value();
        let Emitted::Value(converted) =
            orig_to_subst(&builder, value, &AbstractionPattern::Opaque, &subst, None)
        else {
            panic!("expected a value");
        };
        assert!(!converted.ty().has_abstraction_difference(&builder.types().lower(&subst)));
        assert!(matches!(
            builder.instructions().last(),
            Some(Instruction::Reabstract { operand, .. }) if *operand == original
        ));
        converted.forward();
    }

    #[test]
    fn reabstraction_delivers_into_addressable_context() {
        let builder = FunctionBuilder::new("convert", TypeConverter::default());
        let (subst, value) = thunked_function(&builder);
        let slot = builder.alloc_stack(builder.types().lower(&subst));
        let mut context: Box<dyn Destination> = Box::new(AddressDestination::new(slot));
        let emitted = orig_to_subst(
            &builder,
            value,
            &AbstractionPattern::Opaque,
            &subst,
            Some(&mut context),
        );
        assert!(matches!(emitted, Emitted::InContext));
        assert!(context.is_finished());
    }

    #[test]
    fn binding_context_without_address_gets_the_value_back() {
        let builder = FunctionBuilder::new("convert", TypeConverter::default());
        let (subst, value) = thunked_function(&builder);
        let mut context: Box<dyn Destination> =
            Box::new(BindingDestination::new(&builder, "f", &subst));
        let emitted = orig_to_subst(
            &builder,
            value,
            &AbstractionPattern::Opaque,
            &subst,
            Some(&mut context),
        );
        assert!(!context.is_finished());
        match emitted {
            Emitted::Value(value) => {
                value.forward();
            }
            Emitted::InContext => panic!("binding has no address"),
        }
    }

    #[test]
    fn bridging_loads_and_converts() {
        let builder = FunctionBuilder::new("convert", TypeConverter::default());
        let string = TypeExpr::named("String");
        let foreign = builder.types().lower_abstracted(
            &AbstractionPattern::of(&string),
            &string,
            Representation::CFunction,
        );
        let value = builder.fresh_value();
        let foreign = ManagedValue::owned(&builder, value, foreign);
        let native = bridged_to_native(&builder, foreign, &string);
        assert_eq!(native.ty().to_string(), "$String");
        assert!(matches!(
            builder.instructions().last(),
            Some(Instruction::BridgeToNative { from, to, .. })
                if from == "$NSString" && to == "$String"
        ));
        native.forward();
    }
}
