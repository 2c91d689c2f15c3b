//! Shared runtime handle
//!
//! A `Vm` is the unit tools hold on to: a runtime behind a lock plus a
//! process-unique id so caches outside the runtime can key entities by
//! `(VmId, Value)` without mixing up handles from different runtimes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RtResult;
use crate::runtime::Runtime;
use crate::value::Value;

static NEXT_VM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique runtime identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VmId(u64);

impl VmId {
    fn next() -> Self {
        VmId(NEXT_VM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A runtime shared between the program and the tools inspecting it
#[derive(Debug)]
pub struct Vm {
    id: VmId,
    runtime: Mutex<Runtime>,
}

impl Vm {
    /// Create a fresh runtime
    pub fn new() -> Arc<Self> {
        Self::from_runtime(Runtime::new())
    }

    /// Wrap an existing runtime
    pub fn from_runtime(runtime: Runtime) -> Arc<Self> {
        Arc::new(Self {
            id: VmId::next(),
            runtime: Mutex::new(runtime),
        })
    }

    /// Runtime identity
    pub fn id(&self) -> VmId {
        self.id
    }

    /// Run `f` with exclusive access to the runtime
    ///
    /// Not reentrant: `f` must not call back into `with` on the same `Vm`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Runtime) -> R) -> R {
        let mut runtime = self.runtime.lock();
        f(&mut runtime)
    }

    /// Dynamic dispatch on the runtime
    pub fn send(&self, receiver: &Value, name: &str, args: &[Value]) -> RtResult<Value> {
        self.with(|rt| rt.send(receiver, name, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Vm::new();
        let b = Vm::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_send_through_handle() {
        let vm = Vm::new();
        let object = vm.with(|rt| rt.core().object);
        assert_eq!(
            vm.send(&Value::Module(object), "name", &[]).unwrap(),
            Value::str("Object")
        );
    }
}
