/// Accumulates text blocks under a character budget.
///
/// A block is either appended whole or not at all. The first block that does
/// not fit closes the budget: later, smaller blocks are refused too, so the
/// output is always a prefix of the input blocks.
#[derive(Debug, Clone)]
pub struct BlockBudget {
    max_chars: usize,
    separator: &'static str,
    text: String,
    used_chars: usize,
    blocks: usize,
    exhausted: bool,
}

impl BlockBudget {
    pub const DEFAULT_SEPARATOR: &'static str = "\n";

    #[must_use]
    pub fn new(max_chars: usize) -> Self {
        Self::with_separator(max_chars, Self::DEFAULT_SEPARATOR)
    }

    #[must_use]
    pub fn with_separator(max_chars: usize, separator: &'static str) -> Self {
        Self {
            max_chars,
            separator,
            text: String::new(),
            used_chars: 0,
            blocks: 0,
            exhausted: false,
        }
    }

    /// Append `block`; returns `false` (and closes the budget) if it does not fit.
    pub fn push(&mut self, block: &str) -> bool {
        if self.exhausted {
            return false;
        }
        let sep_chars = if self.blocks == 0 {
            0
        } else {
            self.separator.chars().count()
        };
        let next = self
            .used_chars
            .saturating_add(sep_chars)
            .saturating_add(block.chars().count());
        if next > self.max_chars {
            self.exhausted = true;
            return false;
        }
        if self.blocks > 0 {
            self.text.push_str(self.separator);
        }
        self.text.push_str(block);
        self.used_chars = next;
        self.blocks += 1;
        true
    }

    #[must_use]
    pub fn used_chars(&self) -> usize {
        self.used_chars
    }

    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Join `blocks` with `separator`, stopping before the first block that would
/// exceed `max_chars`. Blank blocks are skipped.
pub fn join_blocks<I, S>(blocks: I, separator: &'static str, max_chars: usize) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut budget = BlockBudget::with_separator(max_chars, separator);
    for block in blocks {
        let block = block.as_ref();
        if block.trim().is_empty() {
            continue;
        }
        if !budget.push(block) {
            break;
        }
    }
    budget.into_text()
}
