use crate::ir::ComputeTensor;

/// Names of intermediate buffers whose dims are all compile-time constant,
/// and so can be allocated once at kernel construction instead of on every
/// call.
pub fn static_buffer_names(computes: &[ComputeTensor]) -> Vec<String> {
    computes
        .iter()
        .filter(|c| c.buf.has_constant_dims())
        .map(|c| c.buf.name.clone())
        .collect()
}
