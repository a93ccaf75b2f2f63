/// Generate a single-use CSRF `state` value (UUID v4, 122 random bits).
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_long_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
