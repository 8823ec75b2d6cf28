pub mod detector;
pub mod timestamp;

pub use detector::{detect_type, FieldType, TypedValue, TypedValueData};
pub use timestamp::{is_likely_timestamp, normalize_timestamp, parse_timestamp};
