pub mod dates;
pub mod value;

pub use dates::{date_or_zero, date_to_variant, is_zero_time, zero_time};
pub use value::{PropertyBag, VarType, Variant};
