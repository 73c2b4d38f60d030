use uuid::Uuid;

/// Produces fresh unique identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidIdGenerator;
        let first = ids.generate();
        let second = ids.generate();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
