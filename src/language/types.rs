use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Named(String, Vec<TypeExpr>),
    Tuple(Vec<TupleElement>),
    Function {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
    },
    Existential(String),
    Param(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TupleElement {
    pub label: Option<String>,
    pub ty: TypeExpr,
}

impl TupleElement {
    pub fn unlabeled(ty: TypeExpr) -> Self {
        Self { label: None, ty }
    }

    pub fn labeled(label: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            label: Some(label.into()),
            ty,
        }
    }
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into(), Vec::new())
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeExpr::Param(name.into())
    }

    pub fn unit() -> Self {
        TypeExpr::Tuple(Vec::new())
    }

    pub fn tuple(elements: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Tuple(elements.into_iter().map(TupleElement::unlabeled).collect())
    }

    pub fn function(params: Vec<TypeExpr>, result: TypeExpr) -> Self {
        TypeExpr::Function {
            params,
            result: Box::new(result),
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, TypeExpr::Tuple(_))
    }

    pub fn tuple_elements(&self) -> Option<&[TupleElement]> {
        match self {
            TypeExpr::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Element type at `index` of a tuple type.
    ///
    /// Callers only ask for elements of tuples whose arity was fixed upstream, so a
    /// non-tuple or an out-of-range index is an internal error.
    pub fn tuple_element_type(&self, index: usize) -> &TypeExpr {
        match self {
            TypeExpr::Tuple(elements) => match elements.get(index) {
                Some(element) => &element.ty,
                None => panic!(
                    "tuple element {index} out of range for `{}`",
                    self.canonical_name()
                ),
            },
            other => panic!("`{}` is not a tuple type", other.canonical_name()),
        }
    }

    pub fn substitute(&self, map: &HashMap<String, TypeExpr>) -> TypeExpr {
        match self {
            TypeExpr::Param(name) => map
                .get(name)
                .cloned()
                .unwrap_or_else(|| TypeExpr::Param(name.clone())),
            TypeExpr::Named(name, args) => TypeExpr::Named(
                name.clone(),
                args.iter().map(|ty| ty.substitute(map)).collect(),
            ),
            TypeExpr::Tuple(elements) => TypeExpr::Tuple(
                elements
                    .iter()
                    .map(|element| TupleElement {
                        label: element.label.clone(),
                        ty: element.ty.substitute(map),
                    })
                    .collect(),
            ),
            TypeExpr::Function { params, result } => TypeExpr::Function {
                params: params.iter().map(|ty| ty.substitute(map)).collect(),
                result: Box::new(result.substitute(map)),
            },
            TypeExpr::Existential(protocol) => TypeExpr::Existential(protocol.clone()),
        }
    }

    pub fn has_params(&self) -> bool {
        match self {
            TypeExpr::Param(_) => true,
            TypeExpr::Named(_, args) => args.iter().any(TypeExpr::has_params),
            TypeExpr::Tuple(elements) => elements.iter().any(|element| element.ty.has_params()),
            TypeExpr::Function { params, result } => {
                params.iter().any(TypeExpr::has_params) || result.has_params()
            }
            TypeExpr::Existential(_) => false,
        }
    }

    pub fn canonical_name(&self) -> String {
        match self {
            TypeExpr::Named(name, args) => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let rendered: Vec<String> = args.iter().map(|ty| ty.canonical_name()).collect();
                    format!("{}<{}>", name, rendered.join(", "))
                }
            }
            TypeExpr::Tuple(elements) => {
                let rendered: Vec<String> = elements
                    .iter()
                    .map(|element| match &element.label {
                        Some(label) => format!("{}: {}", label, element.ty.canonical_name()),
                        None => element.ty.canonical_name(),
                    })
                    .collect();
                format!("({})", rendered.join(", "))
            }
            TypeExpr::Function { params, result } => {
                let rendered: Vec<String> = params.iter().map(|ty| ty.canonical_name()).collect();
                format!("({}) -> {}", rendered.join(", "), result.canonical_name())
            }
            TypeExpr::Existential(protocol) => format!("any {protocol}"),
            TypeExpr::Param(name) => format!("${name}"),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}
