//! Hessian row cache
//!
//! Signed-Gram rows Qᵢⱼ = yᵢ·yⱼ·K(xᵢ, xⱼ) are materialised one row at a
//! time in 32-bit floats and kept in a capacity-bounded store that evicts
//! the least-recently-used row. Returned rows are reference-counted, so a
//! row handed to a caller stays valid after eviction.

pub mod hessian;
pub mod row;
pub mod store;

pub use self::hessian::*;
pub use self::row::*;
pub use self::store::*;
