//! Statement buffering and fragment accumulation.

pub(crate) mod writer;

/// Marker chunk terminating one triple statement: a line consisting of
/// just `.`
pub(crate) const STATEMENT_TERMINATOR: &str = ".\n";

/// A batch of complete triple statements accumulated up to the size
/// threshold before being submitted as one bulk-insert.
#[derive(Debug, Default)]
pub(crate) struct Fragment {
    text: String,
    bytes: usize,
    statements: usize,
}

impl Fragment {
    /// Accumulated byte length of the committed statements.
    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of complete statements in the fragment.
    pub(crate) fn statements(&self) -> usize {
        self.statements
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.statements == 0
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

/// Accumulates raw chunks and moves each complete statement into the current
/// fragment once its terminating marker chunk arrives.
///
/// A statement is never split across two fragments: only whole statements
/// are committed, and uncommitted trailing bytes stay in the pending buffer.
#[derive(Debug, Default)]
pub(crate) struct StatementBuffer {
    pending: String,
    fragment: Fragment,
}

impl StatementBuffer {
    /// Append one raw chunk. A chunk equal to exactly the terminator marker
    /// commits the pending buffer into the fragment.
    pub(crate) fn append(&mut self, chunk: &str) {
        self.pending.push_str(chunk);

        if chunk == STATEMENT_TERMINATOR {
            self.fragment.bytes += self.pending.len();
            self.fragment.statements += 1;
            self.fragment.text.push_str(&self.pending);
            self.pending.clear();
        }
    }

    pub(crate) fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Take the current fragment, leaving an empty one behind.
    pub(crate) fn take_fragment(&mut self) -> Fragment {
        std::mem::take(&mut self.fragment)
    }

    /// Uncommitted trailing bytes.
    pub(crate) fn pending(&self) -> &str {
        &self.pending
    }
}
