use crate::language::types::TypeExpr;
use std::fmt;

/// The declared shape of a result before substitution.
///
/// Tuples are kept structural so the planner can destructure them; everything else is
/// either a concrete original type or an opaque generic position whose values travel
/// at maximal abstraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbstractionPattern {
    Opaque,
    Type(TypeExpr),
    Tuple(Vec<AbstractionPattern>),
}

impl AbstractionPattern {
    pub fn of(ty: &TypeExpr) -> Self {
        match ty {
            TypeExpr::Param(_) => AbstractionPattern::Opaque,
            TypeExpr::Tuple(elements) => AbstractionPattern::Tuple(
                elements
                    .iter()
                    .map(|element| AbstractionPattern::of(&element.ty))
                    .collect(),
            ),
            other => AbstractionPattern::Type(other.clone()),
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, AbstractionPattern::Tuple(_))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, AbstractionPattern::Opaque)
    }

    pub fn tuple_element_count(&self) -> usize {
        match self {
            AbstractionPattern::Tuple(elements) => elements.len(),
            other => panic!("abstraction pattern `{other}` is not a tuple"),
        }
    }

    pub fn tuple_element(&self, index: usize) -> &AbstractionPattern {
        match self {
            AbstractionPattern::Tuple(elements) => match elements.get(index) {
                Some(element) => element,
                None => panic!("tuple pattern element {index} out of range for `{self}`"),
            },
            other => panic!("abstraction pattern `{other}` is not a tuple"),
        }
    }

    /// Checks that every tuple position of `self` lines up with a tuple of the same
    /// arity in `subst`. Opaque positions accept anything.
    pub fn matches_shape(&self, subst: &TypeExpr) -> bool {
        match (self, subst) {
            (AbstractionPattern::Tuple(patterns), TypeExpr::Tuple(elements)) => {
                patterns.len() == elements.len()
                    && patterns
                        .iter()
                        .zip(elements)
                        .all(|(pattern, element)| pattern.matches_shape(&element.ty))
            }
            (AbstractionPattern::Tuple(_), _) => false,
            (AbstractionPattern::Type(TypeExpr::Tuple(_)), _) => false,
            (AbstractionPattern::Type(_), TypeExpr::Tuple(_)) => false,
            _ => true,
        }
    }
}

impl fmt::Display for AbstractionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractionPattern::Opaque => write!(f, "_"),
            AbstractionPattern::Type(ty) => write!(f, "{ty}"),
            AbstractionPattern::Tuple(elements) => {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_destructures_tuples_and_hides_params() {
        let ty = TypeExpr::tuple([
            TypeExpr::param("T"),
            TypeExpr::tuple([TypeExpr::named("Int"), TypeExpr::param("U")]),
        ]);
        let pattern = AbstractionPattern::of(&ty);
        assert_eq!(pattern.to_string(), "(_, (Int, _))");
        assert_eq!(pattern.tuple_element_count(), 2);
        assert!(pattern.tuple_element(0).is_opaque());
        assert!(pattern.tuple_element(1).is_tuple());
    }

    #[test]
    fn matches_shape_rejects_arity_mismatch() {
        let pattern = AbstractionPattern::of(&TypeExpr::tuple([
            TypeExpr::param("T"),
            TypeExpr::param("U"),
        ]));
        let good = TypeExpr::tuple([TypeExpr::named("Int"), TypeExpr::unit()]);
        let bad = TypeExpr::tuple([TypeExpr::named("Int")]);
        assert!(pattern.matches_shape(&good));
        assert!(!pattern.matches_shape(&bad));
        assert!(AbstractionPattern::Opaque.matches_shape(&bad));
    }
}
