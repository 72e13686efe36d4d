use crate::ir::{Buffer, ShapeResolver};
use std::collections::{HashMap, HashSet};

/// All state built up during [`super::Kernel::compile`] and held immutable
/// through `run`.
#[derive(Debug, Default)]
pub struct KernelState {
    /// `bufs[value]`: every non-output producer value resolves to exactly
    /// one buffer, keyed by graph value id.
    pub bufs: HashMap<usize, String>,
    /// `scalars[value]`: every scalar graph input or scalar constant
    /// resolves to exactly one IR variable name.
    pub scalars: HashMap<usize, String>,
    pub shapes: ShapeResolver,
    /// Set of buffer names corresponding to graph outputs; disjoint from
    /// intermediates.
    pub buf_outputs: HashSet<String>,
    /// `(buffer, raw pointer)` pairs, pointer valid for the Kernel's
    /// lifetime. `None` marks an opaque custom-class constant the backend
    /// alone resolves.
    pub constants: Vec<ConstantBinding>,
    /// Owned storage for cloned/synthesized constant tensors, keeping their
    /// backing bytes alive for the Kernel's lifetime.
    pub unpacked_constant_tensors: Vec<Vec<u8>>,
    /// Codegen argument order: built up by the Input Binder, then the
    /// Output Restrider/lowering dispatcher appends outputs, and finally
    /// constants.
    pub buffer_args: Vec<String>,
    pub buffers: HashMap<String, Buffer>,
    pub has_random: bool,
    pub has_broadcast: bool,
}

#[derive(Debug)]
pub struct ConstantBinding {
    pub buf_name: String,
    pub data_ptr: Option<*const u8>,
    pub byte_len: usize,
}

// `*const u8` is only ever read back by the Runtime Invoker while the owning
// `unpacked_constant_tensors`/source graph constant outlive the Kernel; the
// Kernel never sends itself across threads while holding live raw pointers.
unsafe impl Send for ConstantBinding {}
unsafe impl Sync for ConstantBinding {}

impl KernelState {
    pub fn register_buffer(&mut self, buf: Buffer) {
        self.buffers.insert(buf.name.clone(), buf);
    }
}
