//! Ancestor tracking for the tag stream

/// Names of the currently open tags, outermost first.
///
/// Handlers use this as a guard: the same tag name means different things under
/// different parents (`СвФЛ` under a manager block vs. under a founder block).
#[derive(Debug, Default, Clone)]
pub struct ContextStack {
    open: Vec<String>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: &str) {
        self.open.push(tag.to_string());
    }

    /// Remove the innermost open tag with this name.
    ///
    /// Closing a tag that is not on the stack is a no-op: after [`clear`](Self::clear)
    /// at an entity boundary, the enclosing document tags close without having
    /// been re-pushed.
    pub fn pop(&mut self, tag: &str) {
        if let Some(pos) = self.open.iter().rposition(|t| t == tag) {
            self.open.truncate(pos);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.open.iter().any(|t| t == tag)
    }

    pub fn contains_all(&self, tags: &[&str]) -> bool {
        tags.iter().all(|t| self.contains(t))
    }

    /// Whether the tags directly enclosing the innermost one end with `path`
    /// (outermost first). `[A, B]` matches `.../A/B/current` but not `.../A/B/X/current`.
    pub fn parents_end_with(&self, path: &[&str]) -> bool {
        let Some((_, parents)) = self.open.split_last() else {
            return false;
        };
        parents.len() >= path.len()
            && parents[parents.len() - path.len()..]
                .iter()
                .zip(path)
                .all(|(open, tag)| open == tag)
    }

    /// Innermost open tag
    pub fn current(&self) -> Option<&str> {
        self.open.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }
}
