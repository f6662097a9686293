//! Ratelink mapping
//!
//! Declarative conversion between vendor record shapes and the canonical
//! schema. A [`MappingSpec`] names, for each canonical field, the external
//! `source_field`, an optional transform, a default and validation rules.
//! [`FieldMapper`] compiles a mapping once and then maps records in either
//! direction without ever failing on record contents.
//!
//! Supported transforms: `string`, `int`, `float`, `bool`, `date` (with an
//! explicit `format`), `list` (delimited), `uppercase`, `lowercase`,
//! `replace`, `format` and `enum` lookups. `uppercase`, `lowercase`,
//! `replace` and many-to-one `enum` tables do not invert exactly.

pub mod mapper;
pub mod rules;
pub mod spec;
pub mod transform;

pub use mapper::{validate_spec, FieldMapper, FieldWarning, MappedRecord};
pub use rules::ValidationRule;
pub use spec::{FieldMapping, MappingSpec, TransformSpec, ValidationSpec};
pub use transform::{Transform, TransformError};
