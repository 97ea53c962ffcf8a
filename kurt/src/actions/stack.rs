//! Frame stack for action bodies
//!
//! Action bodies do not close over a lexical scope. Each dispatch pushes its
//! argument frame, and names resolve against the frames live at that moment,
//! starting from the outermost. A name bound by the outermost call therefore
//! cannot be shadowed by a nested call or `let`.

use crate::interp::{Dict, Value};

#[derive(Debug, Default)]
pub struct FrameStack {
    /// Index 0 is the outermost frame
    frames: Vec<Dict>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame; returns the new depth
    pub fn push(&mut self, frame: Dict) -> usize {
        self.frames.push(frame);
        self.frames.len()
    }

    pub fn pop(&mut self) -> Option<Dict> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look up a name, outermost frame first
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .find(|frame| frame.exists(name))
            .map(|frame| frame.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pairs: &[(&str, f64)]) -> Dict {
        Dict::from_pairs(pairs.iter().map(|(k, v)| (*k, Value::Num(*v)))).unwrap()
    }

    #[test]
    fn test_push_pop() {
        let mut stack = FrameStack::new();
        assert_eq!(stack.push(frame(&[("x", 1.0)])), 1);
        stack.push(frame(&[("y", 2.0)]));
        assert_eq!(stack.get("x"), Some(Value::Num(1.0)));
        assert_eq!(stack.get("y"), Some(Value::Num(2.0)));

        stack.pop();
        assert_eq!(stack.get("y"), None);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_outermost_wins() {
        let mut stack = FrameStack::new();
        stack.push(frame(&[("x", 1.0)]));
        stack.push(frame(&[("x", 2.0), ("y", 3.0)]));
        assert_eq!(stack.get("x"), Some(Value::Num(1.0)));
        assert_eq!(stack.get("y"), Some(Value::Num(3.0)));
    }

    #[test]
    fn test_pop_empty() {
        let mut stack = FrameStack::new();
        assert!(stack.pop().is_none());
        assert_eq!(stack.get("x"), None);
        assert_eq!(stack.depth(), 0);
    }
}
