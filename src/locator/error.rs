use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LocatorError {
    #[error("{field} is required")]
    MissingCoordinate { field: &'static str },
    #[error("{field} must be a number")]
    NonNumericCoordinate { field: &'static str },
    #[error("{field} is out of range: {value}")]
    CoordinateOutOfRange { field: &'static str, value: f64 },
    #[error("location not found: {id}")]
    LocationNotFound { id: u32 },
}

impl LocatorError {
    /// 入力検証エラー（HTTP 400 相当）かどうか
    pub fn is_validation(&self) -> bool {
        !matches!(self, LocatorError::LocationNotFound { .. })
    }
}
