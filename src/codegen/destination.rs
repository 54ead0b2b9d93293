use crate::codegen::{
    builder::{Address, FunctionBuilder, StoreOwnership},
    managed::ManagedValue,
};
use crate::language::types::TypeExpr;
use crate::lowering::LoweredType;
use std::fmt;
use std::mem;

/// Where a planned result ends up.
pub trait Destination: fmt::Debug {
    /// Short description used when explaining plans.
    fn describe(&self) -> String;

    /// An address a callee may write into directly, if this destination has one.
    fn address_for_in_place(&self) -> Option<Address>;

    fn can_split_into_tuple_elements(&self) -> bool;

    /// Produces one child destination per element of the tuple `subst`. The parent
    /// stays alive and must still be finished after its children.
    fn split_into_tuple_elements(
        &mut self,
        builder: &FunctionBuilder,
        subst: &TypeExpr,
    ) -> Vec<Box<dyn Destination>>;

    /// Moves `value` into the destination. Does not finish it.
    fn copy_or_init_value_into(
        &mut self,
        builder: &FunctionBuilder,
        value: ManagedValue,
        is_init: bool,
    );

    /// Commits the destination. Called exactly once, after every write.
    fn finish(&mut self, builder: &FunctionBuilder);

    fn is_finished(&self) -> bool;
}

fn mark_finished(finished: &mut bool, what: &dyn fmt::Display) {
    assert!(!*finished, "{what} finished twice");
    *finished = true;
}

/// Moves an owned value into `address`, consuming it.
pub fn store_value_into(
    builder: &FunctionBuilder,
    value: ManagedValue,
    address: &Address,
    is_init: bool,
) {
    let ownership = if is_init {
        StoreOwnership::Init
    } else {
        StoreOwnership::Assign
    };
    if value.is_address() {
        let take = value.has_cleanup();
        builder.copy_addr(value.forward(), address, take, is_init);
    } else {
        builder.store(value.forward(), address, ownership);
    }
}

/// A known memory location, such as a local variable's storage or an outer indirect
/// result.
#[derive(Debug)]
pub struct AddressDestination {
    address: Address,
    split: bool,
    finished: bool,
}

impl AddressDestination {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            split: false,
            finished: false,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl Destination for AddressDestination {
    fn describe(&self) -> String {
        format!("address {} : {}", self.address.value, self.address.ty)
    }

    fn address_for_in_place(&self) -> Option<Address> {
        (!self.split).then(|| self.address.clone())
    }

    fn can_split_into_tuple_elements(&self) -> bool {
        self.address.ty.ty.is_tuple()
    }

    fn split_into_tuple_elements(
        &mut self,
        builder: &FunctionBuilder,
        subst: &TypeExpr,
    ) -> Vec<Box<dyn Destination>> {
        let count = subst.tuple_elements().map(<[_]>::len).unwrap_or(0);
        assert_eq!(
            Some(count),
            self.address.ty.ty.tuple_elements().map(<[_]>::len),
            "cannot split {} as `{subst}`",
            self.describe()
        );
        self.split = true;
        (0..count)
            .map(|index| {
                let element = builder.tuple_element_addr(&self.address, index);
                Box::new(AddressDestination::new(element)) as Box<dyn Destination>
            })
            .collect()
    }

    fn copy_or_init_value_into(
        &mut self,
        builder: &FunctionBuilder,
        value: ManagedValue,
        is_init: bool,
    ) {
        store_value_into(builder, value, &self.address, is_init);
    }

    fn finish(&mut self, _builder: &FunctionBuilder) {
        let what = self.describe();
        mark_finished(&mut self.finished, &what);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A named local (`let name = ...`). Loadable values are bound directly; address-only
/// values get their own stack slot, which the callee may initialize in place.
#[derive(Debug)]
pub struct BindingDestination {
    name: String,
    ty: LoweredType,
    storage: Option<Address>,
    bound: bool,
    finished: bool,
}

impl BindingDestination {
    pub fn new(builder: &FunctionBuilder, name: impl Into<String>, subst: &TypeExpr) -> Self {
        let ty = builder.types().lower(subst);
        let storage = ty.is_address_only().then(|| builder.alloc_stack(ty.clone()));
        Self {
            name: name.into(),
            ty,
            storage,
            bound: false,
            finished: false,
        }
    }
}

impl Destination for BindingDestination {
    fn describe(&self) -> String {
        match &self.storage {
            Some(address) => format!("let {} in {} : {}", self.name, address.value, self.ty),
            None => format!("let {} : {}", self.name, self.ty),
        }
    }

    fn address_for_in_place(&self) -> Option<Address> {
        self.storage.clone()
    }

    fn can_split_into_tuple_elements(&self) -> bool {
        false
    }

    fn split_into_tuple_elements(
        &mut self,
        _builder: &FunctionBuilder,
        subst: &TypeExpr,
    ) -> Vec<Box<dyn Destination>> {
        panic!("{} cannot be split as `{subst}`", self.describe())
    }

    fn copy_or_init_value_into(
        &mut self,
        builder: &FunctionBuilder,
        value: ManagedValue,
        is_init: bool,
    ) {
        assert!(!self.bound, "{} bound twice", self.describe());
        self.bound = true;
        if let Some(storage) = &self.storage {
            store_value_into(builder, value, storage, is_init);
            return;
        }
        let value = match value.as_address() {
            Some(address) => {
                let take = value.has_cleanup();
                value.forward();
                let loaded = builder.load(&address, take);
                ManagedValue::owned(builder, loaded, address.ty.as_object())
            }
            None => value,
        };
        let trivial = value.ty().is_trivial();
        builder.bind_let(&self.name, value.forward(), trivial);
    }

    fn finish(&mut self, builder: &FunctionBuilder) {
        let what = self.describe();
        mark_finished(&mut self.finished, &what);
        match &self.storage {
            Some(storage) => builder.bind_stack_slot(&self.name, storage),
            None => assert!(self.bound, "{what} finished without a value"),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A destructuring pattern such as `let (a, b) = ...`: one child destination per element.
#[derive(Debug)]
pub struct TupleDestination {
    elements: Vec<Box<dyn Destination>>,
    arity: usize,
    finished: bool,
}

impl TupleDestination {
    pub fn new(elements: Vec<Box<dyn Destination>>) -> Self {
        Self {
            arity: elements.len(),
            elements,
            finished: false,
        }
    }
}

impl Destination for TupleDestination {
    fn describe(&self) -> String {
        if self.elements.is_empty() {
            return format!("tuple of {}", self.arity);
        }
        let rendered: Vec<String> = self.elements.iter().map(|dest| dest.describe()).collect();
        format!("tuple ({})", rendered.join(", "))
    }

    fn address_for_in_place(&self) -> Option<Address> {
        None
    }

    fn can_split_into_tuple_elements(&self) -> bool {
        true
    }

    fn split_into_tuple_elements(
        &mut self,
        _builder: &FunctionBuilder,
        subst: &TypeExpr,
    ) -> Vec<Box<dyn Destination>> {
        let count = subst.tuple_elements().map(<[_]>::len);
        assert_eq!(
            count,
            Some(self.elements.len()),
            "cannot split {} as `{subst}`",
            self.describe()
        );
        mem::take(&mut self.elements)
    }

    fn copy_or_init_value_into(
        &mut self,
        builder: &FunctionBuilder,
        value: ManagedValue,
        is_init: bool,
    ) {
        let (id, ty) = value.forward_with_type();
        let parts: Vec<ManagedValue> = if ty.is_address() {
            let address = Address { value: id, ty };
            (0..self.elements.len())
                .map(|index| {
                    let element = builder.tuple_element_addr(&address, index);
                    ManagedValue::owned_address(builder, &element)
                })
                .collect()
        } else {
            builder
                .destructure_tuple(id, &ty)
                .into_iter()
                .map(|(value, element_ty)| ManagedValue::owned(builder, value, element_ty))
                .collect()
        };
        assert_eq!(
            parts.len(),
            self.elements.len(),
            "tuple value does not match {}",
            self.describe()
        );
        for (element, part) in self.elements.iter_mut().zip(parts) {
            element.copy_or_init_value_into(builder, part, is_init);
            element.finish(builder);
        }
    }

    fn finish(&mut self, _builder: &FunctionBuilder) {
        let what = self.describe();
        mark_finished(&mut self.finished, &what);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::Instruction;
    use crate::language::parser::parse_type;
    use crate::lowering::TypeConverter;

    fn builder() -> FunctionBuilder {
        FunctionBuilder::new("dest", TypeConverter::default())
    }

    #[test]
    fn address_destination_splits_into_element_addresses() {
        let builder = builder();
        let subst = parse_type("(Int, any Shape)").expect("parse");
        let slot = builder.alloc_stack(builder.types().lower(&subst));
        let mut dest = AddressDestination::new(slot.clone());
        assert!(dest.can_split_into_tuple_elements());
        let children = dest.split_into_tuple_elements(&builder, &subst);
        assert_eq!(children.len(), 2);
        assert!(dest.address_for_in_place().is_none());
        let second = children[1].address_for_in_place().expect("element address");
        assert!(second.ty.is_address_only());
        assert!(matches!(
            builder.instructions().last(),
            Some(Instruction::TupleElementAddr { index: 1, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "finished twice")]
    fn finishing_twice_is_fatal() {
        let builder = builder();
        let slot = builder.alloc_stack(builder.types().lower(&TypeExpr::named("Int")));
        let mut dest = AddressDestination::new(slot);
        dest.finish(&builder);
        dest.finish(&builder);
    }

    #[test]
    fn loadable_binding_binds_the_value() {
        let builder = builder();
        let string = TypeExpr::named("String");
        let mut dest = BindingDestination::new(&builder, "s", &string);
        assert!(dest.address_for_in_place().is_none());
        let lowered = builder.types().lower(&string);
        let value = builder.fresh_value();
        dest.copy_or_init_value_into(&builder, ManagedValue::owned(&builder, value, lowered), true);
        dest.finish(&builder);
        assert_eq!(builder.bindings(), vec![("s".to_string(), value)]);
        builder.pop_scope();
        assert_eq!(
            builder.instructions().last(),
            Some(&Instruction::DestroyValue { operand: value })
        );
    }

    #[test]
    fn address_only_binding_owns_a_stack_slot() {
        let builder = builder();
        let shape = TypeExpr::Existential("Shape".into());
        let dest = BindingDestination::new(&builder, "shape", &shape);
        let storage = dest.address_for_in_place().expect("storage");
        assert!(matches!(
            builder.instructions().first(),
            Some(Instruction::AllocStack { result, .. }) if *result == storage.value
        ));
        assert!(!dest.can_split_into_tuple_elements());
    }

    #[test]
    fn tuple_destination_destructures_whole_values() {
        let builder = builder();
        let subst = parse_type("(Int, String)").expect("parse");
        let elements: Vec<Box<dyn Destination>> = vec![
            Box::new(BindingDestination::new(&builder, "a", &TypeExpr::named("Int"))),
            Box::new(BindingDestination::new(&builder, "b", &TypeExpr::named("String"))),
        ];
        let mut dest = TupleDestination::new(elements);
        let lowered = builder.types().lower(&subst);
        let value = builder.fresh_value();
        dest.copy_or_init_value_into(&builder, ManagedValue::owned(&builder, value, lowered), true);
        dest.finish(&builder);
        let names: Vec<String> = builder.bindings().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(
            builder.instructions().first(),
            Some(Instruction::DestructureTuple { operand, .. }) if *operand == value
        ));
    }
}
