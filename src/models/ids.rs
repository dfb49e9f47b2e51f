//! Document id minting
//!
//! Ids are plain strings so documents coming from other replicas or older
//! export files keep whatever ids they already have.

use chrono::Utc;
use uuid::Uuid;

/// Mint a new document id: millisecond timestamp plus a random suffix
pub fn mint_id() -> String {
    format!("{}:{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_ids_are_unique() {
        let a = mint_id();
        let b = mint_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_minted_id_shape() {
        let id = mint_id();
        let (timestamp, suffix) = id.split_once(':').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 32);
    }
}
