use crate::codegen::builder::{Address, FunctionBuilder, Instruction, ValueId};
use crate::lowering::LoweredType;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CleanupKind {
    DestroyValue,
    DestroyAddr,
}

/// Pending destroy of one value. Fires on drop unless disarmed by forwarding.
struct Cleanup {
    builder: FunctionBuilder,
    kind: CleanupKind,
    value: ValueId,
    active: bool,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let instruction = match self.kind {
            CleanupKind::DestroyValue => Instruction::DestroyValue {
                operand: self.value,
            },
            CleanupKind::DestroyAddr => Instruction::DestroyAddr {
                address: self.value,
            },
        };
        self.builder.emit_from_drop(instruction);
    }
}

/// A value plus its obligation to be destroyed exactly once.
///
/// `forward` hands the value on and disarms the obligation; dropping the handle
/// instead emits the destroy.
#[must_use = "dropping a managed value destroys it"]
pub struct ManagedValue {
    value: ValueId,
    ty: LoweredType,
    cleanup: Option<Cleanup>,
}

impl fmt::Debug for ManagedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedValue")
            .field("value", &self.value)
            .field("ty", &self.ty.to_string())
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

impl ManagedValue {
    /// A value that needs no cleanup, either because it is trivial or because someone
    /// else owns it.
    pub fn unmanaged(value: ValueId, ty: LoweredType) -> Self {
        Self {
            value,
            ty,
            cleanup: None,
        }
    }

    /// Takes ownership of a freshly produced +1 value, registering a destroy unless the
    /// type is trivial.
    pub fn owned(builder: &FunctionBuilder, value: ValueId, ty: LoweredType) -> Self {
        let cleanup = if ty.is_trivial() {
            None
        } else {
            Some(Cleanup {
                builder: builder.clone(),
                kind: if ty.is_address() {
                    CleanupKind::DestroyAddr
                } else {
                    CleanupKind::DestroyValue
                },
                value,
                active: true,
            })
        };
        Self { value, ty, cleanup }
    }

    /// Takes ownership of the value initialized in `address`.
    pub fn owned_address(builder: &FunctionBuilder, address: &Address) -> Self {
        Self::owned(builder, address.value, address.ty.as_address())
    }

    pub fn value(&self) -> ValueId {
        self.value
    }

    pub fn ty(&self) -> &LoweredType {
        &self.ty
    }

    pub fn is_address(&self) -> bool {
        self.ty.is_address()
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    pub fn as_address(&self) -> Option<Address> {
        self.is_address().then(|| Address {
            value: self.value,
            ty: self.ty.clone(),
        })
    }

    /// Hands the value on. The caller becomes responsible for its destruction.
    pub fn forward(self) -> ValueId {
        self.forward_with_type().0
    }

    /// Like `forward`, keeping the lowered type for the new owner.
    pub fn forward_with_type(mut self) -> (ValueId, LoweredType) {
        if let Some(mut cleanup) = self.cleanup.take() {
            cleanup.active = false;
        }
        (self.value, self.ty)
    }
}
