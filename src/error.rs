use thiserror::Error;

/// Everything the tracking workflow can fail with
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("price source failed: {0}")]
    Upstream(String),

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),

    #[error("notification failed: {0}")]
    Notify(String),
}

impl TrackerError {
    pub fn listing_not_found(id: i64) -> Self {
        TrackerError::NotFound(format!("listing {}", id))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Rejects negative, NaN and infinite prices
pub fn validate_price(field: &str, price: f64) -> Result<f64> {
    if !price.is_finite() {
        return Err(TrackerError::Validation(format!("{} must be a number", field)));
    }
    if price < 0.0 {
        return Err(TrackerError::Validation(format!("{} must not be negative", field)));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price("price", 0.0).unwrap(), 0.0);
        assert_eq!(validate_price("price", 12.5).unwrap(), 12.5);
        assert!(matches!(validate_price("price", -1.0), Err(TrackerError::Validation(_))));
        assert!(matches!(validate_price("price", f64::NAN), Err(TrackerError::Validation(_))));
        assert!(matches!(
            validate_price("price", f64::INFINITY),
            Err(TrackerError::Validation(_))
        ));
    }
}
