pub mod data_type;
pub mod record;
pub mod report;

pub use data_type::*;
pub use record::*;
pub use report::*;
