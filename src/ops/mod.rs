//! Kernels run by the built-in [CpuBackend](../backend/struct.CpuBackend.html).
pub mod gradient_descent_ops;
