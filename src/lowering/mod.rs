//! Type lowering: how a concrete type is represented once it reaches emitted code.

pub mod convention;
pub mod options;

use crate::language::{abstraction::AbstractionPattern, types::TypeExpr};
use convention::Representation;
use options::LoweringOptions;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Object,
    Address,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeProperties {
    pub address_only: bool,
    pub trivial: bool,
}

/// Physical representation of a value relative to its substituted type.
///
/// Two lowered types of the same substituted type differ in abstraction exactly when
/// their representations differ.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Repr {
    Natural,
    /// A function value passed at maximal abstraction; callers must wrap it in a
    /// reabstraction thunk before using it at its substituted type.
    Thunked,
    /// A value in the foreign type it was bridged to.
    Bridged(String),
    Tuple(Vec<Repr>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LoweredType {
    pub ty: TypeExpr,
    pub repr: Repr,
    pub category: Category,
    pub props: TypeProperties,
}

impl LoweredType {
    pub fn is_address_only(&self) -> bool {
        self.props.address_only
    }

    pub fn is_trivial(&self) -> bool {
        self.props.trivial
    }

    pub fn is_address(&self) -> bool {
        matches!(self.category, Category::Address)
    }

    pub fn as_address(&self) -> LoweredType {
        LoweredType {
            category: Category::Address,
            ..self.clone()
        }
    }

    pub fn as_object(&self) -> LoweredType {
        LoweredType {
            category: Category::Object,
            ..self.clone()
        }
    }

    pub fn with_repr(&self, repr: Repr) -> LoweredType {
        LoweredType {
            repr,
            ..self.clone()
        }
    }

    /// Whether a value of this type must be converted before it can be used as `other`.
    /// Object/address category is not an abstraction difference.
    pub fn has_abstraction_difference(&self, other: &LoweredType) -> bool {
        self.repr != other.repr
    }
}

impl fmt::Display for LoweredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self.category {
            Category::Object => "$",
            Category::Address => "$*",
        };
        write!(f, "{}{}", sigil, render_repr(&self.ty, &self.repr))
    }
}

fn render_repr(ty: &TypeExpr, repr: &Repr) -> String {
    match (ty, repr) {
        (_, Repr::Natural) => ty.canonical_name(),
        (_, Repr::Thunked) => format!("@abstract {}", ty.canonical_name()),
        (_, Repr::Bridged(foreign)) => foreign.clone(),
        (TypeExpr::Tuple(elements), Repr::Tuple(reprs)) => {
            let rendered: Vec<String> = elements
                .iter()
                .zip(reprs)
                .map(|(element, repr)| render_repr(&element.ty, repr))
                .collect();
            format!("({})", rendered.join(", "))
        }
        (_, Repr::Tuple(_)) => ty.canonical_name(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultConvention {
    Indirect,
    Direct,
}

/// One leaf of an operation's result signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultSlot {
    pub convention: ResultConvention,
    pub ty: LoweredType,
}

impl ResultSlot {
    pub fn indirect(ty: LoweredType) -> Self {
        Self {
            convention: ResultConvention::Indirect,
            ty: ty.as_address(),
        }
    }

    pub fn direct(ty: LoweredType) -> Self {
        Self {
            convention: ResultConvention::Direct,
            ty: ty.as_object(),
        }
    }

    pub fn is_indirect(&self) -> bool {
        matches!(self.convention, ResultConvention::Indirect)
    }
}

impl fmt::Display for ResultSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.convention {
            ResultConvention::Indirect => write!(f, "@out {}", self.ty),
            ResultConvention::Direct => write!(f, "@owned {}", self.ty),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TypeConverter {
    options: LoweringOptions,
}

impl TypeConverter {
    pub fn new(options: LoweringOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    pub fn properties(&self, ty: &TypeExpr) -> TypeProperties {
        match ty {
            TypeExpr::Param(_) | TypeExpr::Existential(_) => TypeProperties {
                address_only: true,
                trivial: false,
            },
            TypeExpr::Named(name, _) => TypeProperties {
                address_only: self.options.is_address_only_nominal(name),
                trivial: self.options.is_trivial_nominal(name),
            },
            TypeExpr::Tuple(elements) => {
                let mut props = TypeProperties {
                    address_only: false,
                    trivial: true,
                };
                for element in elements {
                    let element_props = self.properties(&element.ty);
                    props.address_only |= element_props.address_only;
                    props.trivial &= element_props.trivial;
                }
                props
            }
            TypeExpr::Function { .. } => TypeProperties {
                address_only: false,
                trivial: false,
            },
        }
    }

    pub fn is_address_only(&self, ty: &TypeExpr) -> bool {
        self.properties(ty).address_only
    }

    /// Lowers `ty` at its own abstraction level.
    pub fn lower(&self, ty: &TypeExpr) -> LoweredType {
        self.finish_lowering(ty, natural_repr(ty))
    }

    /// Lowers `subst` the way a callee declared with `orig` hands it back.
    pub fn lower_abstracted(
        &self,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
        rep: Representation,
    ) -> LoweredType {
        let repr = self.abstracted_repr(orig, subst, rep);
        self.finish_lowering(subst, repr)
    }

    pub fn tuple_element(&self, tuple: &LoweredType, index: usize) -> LoweredType {
        let element = tuple.ty.tuple_element_type(index).clone();
        let repr = match &tuple.repr {
            Repr::Tuple(reprs) => match reprs.get(index) {
                Some(repr) => repr.clone(),
                None => panic!("tuple representation of `{}` has no element {index}", tuple),
            },
            _ => natural_repr(&element),
        };
        LoweredType {
            props: self.properties(&element),
            ty: element,
            repr,
            category: tuple.category,
        }
    }

    /// Computes the ordered result slots of an operation declared with `orig` and
    /// called at `subst`. Opaque leaves and address-only leaves are returned indirectly.
    pub fn result_slots(
        &self,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
        rep: Representation,
    ) -> Vec<ResultSlot> {
        let mut slots = Vec::new();
        self.collect_result_slots(orig, subst, rep, &mut slots);
        slots
    }

    fn collect_result_slots(
        &self,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
        rep: Representation,
        slots: &mut Vec<ResultSlot>,
    ) {
        if orig.is_tuple() {
            let count = orig.tuple_element_count();
            assert_tuple_arity(orig, subst, count);
            for index in 0..count {
                self.collect_result_slots(
                    orig.tuple_element(index),
                    subst.tuple_element_type(index),
                    rep,
                    slots,
                );
            }
            return;
        }
        let ty = self.lower_abstracted(orig, subst, rep);
        if orig.is_opaque() || ty.is_address_only() {
            slots.push(ResultSlot::indirect(ty));
        } else {
            slots.push(ResultSlot::direct(ty));
        }
    }

    fn abstracted_repr(
        &self,
        orig: &AbstractionPattern,
        subst: &TypeExpr,
        rep: Representation,
    ) -> Repr {
        match (orig, subst) {
            (AbstractionPattern::Tuple(patterns), TypeExpr::Tuple(_)) => {
                assert_tuple_arity(orig, subst, patterns.len());
                Repr::Tuple(
                    patterns
                        .iter()
                        .enumerate()
                        .map(|(index, pattern)| {
                            self.abstracted_repr(pattern, subst.tuple_element_type(index), rep)
                        })
                        .collect(),
                )
            }
            (AbstractionPattern::Tuple(_), _) => {
                panic!("tuple pattern `{orig}` paired with non-tuple `{subst}`")
            }
            (AbstractionPattern::Opaque, TypeExpr::Function { .. }) => Repr::Thunked,
            (AbstractionPattern::Opaque, TypeExpr::Tuple(elements)) => Repr::Tuple(
                elements
                    .iter()
                    .map(|element| {
                        self.abstracted_repr(&AbstractionPattern::Opaque, &element.ty, rep)
                    })
                    .collect(),
            ),
            // Address-only nominals stay in memory and cross unbridged.
            (AbstractionPattern::Type(TypeExpr::Named(name, _)), _)
                if rep.is_foreign() && !self.options.is_address_only_nominal(name) =>
            {
                match self.options.bridged_name(name) {
                    Some(foreign) => Repr::Bridged(foreign.to_string()),
                    None => natural_repr(subst),
                }
            }
            _ => natural_repr(subst),
        }
    }

    fn finish_lowering(&self, ty: &TypeExpr, repr: Repr) -> LoweredType {
        let props = self.properties(ty);
        LoweredType {
            ty: ty.clone(),
            repr,
            category: if props.address_only {
                Category::Address
            } else {
                Category::Object
            },
            props,
        }
    }
}

fn natural_repr(ty: &TypeExpr) -> Repr {
    match ty {
        TypeExpr::Tuple(elements) => {
            Repr::Tuple(elements.iter().map(|element| natural_repr(&element.ty)).collect())
        }
        _ => Repr::Natural,
    }
}

fn assert_tuple_arity(orig: &AbstractionPattern, subst: &TypeExpr, count: usize) {
    let subst_count = match subst.tuple_elements() {
        Some(elements) => elements.len(),
        None => panic!("tuple pattern `{orig}` paired with non-tuple `{subst}`"),
    };
    assert_eq!(
        count, subst_count,
        "tuple pattern `{orig}` has {count} elements but `{subst}` has {subst_count}"
    );
}
