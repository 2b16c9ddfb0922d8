pub mod logger;
pub mod readable_size;
