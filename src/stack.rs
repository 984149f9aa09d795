//! Stack growth for the recursive parser and evaluator.
//!
//! Nested expressions and user recursion recurse on the host stack. Entry
//! points wrap themselves in [`ensure_sufficient_stack`], which moves onto a
//! freshly allocated segment when the remaining stack runs low.

/// Grow when less than this remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
