//! Kernel functions and the component-accumulating kernel façade

pub mod component;
pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod traits;

pub use self::component::*;
pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::traits::*;
