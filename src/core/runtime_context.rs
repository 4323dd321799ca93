use std::sync::atomic::{AtomicU64, Ordering};

/// Source of server-side step ids
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

// --- Real implementation ---

#[derive(Debug, Default)]
pub struct RealIdGenerator;

impl IdGenerator for RealIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

// --- Fake implementation ---

#[derive(Debug)]
pub struct FakeIdGenerator {
    pub prefix: String,
    pub counter: AtomicU64,
}

impl FakeIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for FakeIdGenerator {
    fn next_id(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_ids_are_uuids() {
        let gen = RealIdGenerator;
        let a = gen.next_id();
        assert_ne!(a, gen.next_id());
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_fake_ids_are_sequential() {
        let gen = FakeIdGenerator::new("step");
        assert_eq!(gen.next_id(), "step-0");
        assert_eq!(gen.next_id(), "step-1");
    }
}
