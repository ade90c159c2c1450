//! Artifacts pasted by other parties, drafted then submitted.
use crate::{Error, Result};

/// Pasted text awaiting submission.
#[derive(Debug, Clone, Default)]
pub struct Drafts {
    entries: Vec<String>,
}

impl Drafts {
    /// Draft texts in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether no draft is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a draft and return its index.
    pub fn add(&mut self, text: impl Into<String>) -> usize {
        self.entries.push(text.into());
        self.entries.len() - 1
    }

    /// Replace the text of a draft.
    pub fn edit(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> Result<()> {
        let draft = self
            .entries
            .get_mut(index)
            .ok_or_else(|| missing_draft(index))?;
        *draft = text.into();
        Ok(())
    }

    /// Remove a draft and return its text.
    pub fn remove(&mut self, index: usize) -> Result<String> {
        if index >= self.entries.len() {
            return Err(missing_draft(index));
        }
        Ok(self.entries.remove(index))
    }
}

/// Artifacts collected from other parties.
///
/// Pasted text is kept as editable drafts until submitted. Submitting
/// validates every draft and appends them all or none; submitted
/// entries can no longer change.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    submitted: Vec<T>,
    drafts: Drafts,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            submitted: Vec::new(),
            drafts: Drafts::default(),
        }
    }
}

impl<T> Collection<T> {
    /// Submitted entries in submission order.
    pub fn submitted(&self) -> &[T] {
        &self.submitted
    }

    /// Pending drafts.
    pub fn drafts(&self) -> &Drafts {
        &self.drafts
    }

    /// Mutable access to the pending drafts.
    pub fn drafts_mut(&mut self) -> &mut Drafts {
        &mut self.drafts
    }

    /// Validate every draft and append the results.
    ///
    /// The validator receives the draft text and every entry accepted
    /// so far, submitted or from earlier drafts of this batch.
    pub(crate) fn submit_with<F>(
        &mut self,
        mut validate: F,
    ) -> Result<usize>
    where
        T: Clone,
        F: FnMut(&str, &[T]) -> Result<T>,
    {
        if self.drafts.is_empty() {
            return Err(Error::invalid("drafts", "nothing to submit"));
        }

        let mut accepted = self.submitted.clone();
        for draft in self.drafts.entries() {
            let entry = validate(draft, &accepted)?;
            accepted.push(entry);
        }

        let count = self.drafts.entries.len();
        self.submitted = accepted;
        self.drafts.entries.clear();
        Ok(count)
    }
}

fn missing_draft(index: usize) -> Error {
    Error::invalid("draft", format!("no draft at index {index}"))
}
