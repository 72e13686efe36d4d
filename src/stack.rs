//! The Runtime Invoker's calling convention: a flat, position-matched stack
//! of arguments mirroring `KernelState::buffer_args` order, used by `run`,
//! `run_kernel`, and `run_fast`.

/// One positional call argument. Tensor data is a flat row-major `f64`
/// buffer for every dtype; narrower dtypes round-trip losslessly for the
/// integer and single-precision ranges this crate's own lowerings produce.
#[derive(Debug, Clone)]
pub enum CallArg {
    Buffer(Vec<f64>),
    Scalar(f64),
}

impl CallArg {
    pub fn as_buffer(&self) -> Option<&[f64]> {
        match self {
            CallArg::Buffer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            CallArg::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// A positional argument list, ordered to match `buffer_args`. `run` takes
/// one of these directly; `run_kernel`/`run_fast` build one from raw
/// pointers/void-star style call sites in a real embedder (out of scope
/// here — this crate exposes the typed form only).
#[derive(Debug, Clone, Default)]
pub struct EvalStack(Vec<CallArg>);

impl EvalStack {
    pub fn new(args: Vec<CallArg>) -> Self {
        Self(args)
    }

    pub fn get(&self, pos: usize) -> Option<&CallArg> {
        self.0.get(pos)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallArg> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_buffer_and_scalar_args() {
        let stack = EvalStack::new(vec![CallArg::Buffer(vec![1.0, 2.0]), CallArg::Scalar(3.0)]);
        assert_eq!(stack.get(0).unwrap().as_buffer(), Some(&[1.0, 2.0][..]));
        assert_eq!(stack.get(1).unwrap().as_scalar(), Some(3.0));
        assert_eq!(stack.len(), 2);
    }
}
