// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for reconcilers/mod.rs

#[cfg(test)]
mod tests {
    use crate::reconcilers::generation_changed;

    #[test]
    fn test_generation_changed_when_both_known_and_different() {
        assert!(generation_changed(Some(2), Some(1)));
    }

    #[test]
    fn test_generation_unchanged_when_equal() {
        assert!(!generation_changed(Some(3), Some(3)));
    }

    #[test]
    fn test_generation_unknown_is_not_a_change() {
        assert!(!generation_changed(Some(1), None));
        assert!(!generation_changed(None, Some(1)));
        assert!(!generation_changed(None, None));
    }
}
