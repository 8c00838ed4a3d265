//! # Debug Label Stack
//!
//! Tracks the nesting of application debug labels (debug-utils labels and
//! debug markers) within one command buffer.
//!
//! Records capture the stack as an immutable [`Labels`] snapshot. The
//! snapshot is cached until the stack next changes, so a run of workloads
//! under the same labels shares one allocation.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Immutable snapshot of the open labels, outermost first
pub type Labels = Arc<[String]>;

/// Mutable stack of open debug labels
#[derive(Debug, Clone, Default)]
pub struct LabelStack {
    labels: Vec<String>,
    snapshot: Option<Labels>,
}

impl LabelStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new label
    pub fn push(&mut self, label: &str) {
        self.labels.push(String::from(label));
        self.snapshot = None;
    }

    /// Close the innermost label; an unbalanced pop is ignored
    pub fn pop(&mut self) -> Option<String> {
        let label = self.labels.pop()?;
        self.snapshot = None;
        Some(label)
    }

    /// Close every label
    pub fn clear(&mut self) {
        self.labels.clear();
        self.snapshot = None;
    }

    /// Number of open labels
    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    /// Open labels, outermost first
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Snapshot of the current stack
    pub fn snapshot(&mut self) -> Labels {
        self.snapshot
            .get_or_insert_with(|| Arc::from(self.labels.as_slice()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_depth() {
        let mut stack = LabelStack::new();
        stack.push("frame");
        stack.push("shadows");
        assert_eq!(stack.depth(), 2);

        assert_eq!(stack.pop().as_deref(), Some("shadows"));
        assert_eq!(stack.as_slice(), ["frame"]);
    }

    #[test]
    fn test_unbalanced_pop_is_ignored() {
        let mut stack = LabelStack::new();
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_snapshot_shared_until_changed() {
        let mut stack = LabelStack::new();
        stack.push("gbuffer");

        let a = stack.snapshot();
        let b = stack.snapshot();
        assert!(Arc::ptr_eq(&a, &b));

        stack.push("opaque");
        let c = stack.snapshot();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(&*a, ["gbuffer"]);
        assert_eq!(&*c, ["gbuffer", "opaque"]);
    }
}
