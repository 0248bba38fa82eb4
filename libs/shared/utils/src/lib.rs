pub mod jwt;
pub mod test_utils;
pub mod time_format;
pub mod validation;
