//! # Transcript
//!
//! The in-memory conversation shown to the user. Entries are only ever
//! appended; the one exception is the typing placeholder, which is removed
//! once the agent's reply (or an error) arrives. There is never more than
//! one placeholder.

/// Who an entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Said { speaker: Speaker, text: String },

    /// The remote side is composing a reply.
    Typing,
}

impl Entry {
    pub fn is_typing(&self) -> bool {
        matches!(self, Entry::Typing)
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a spoken entry and returns it.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> &Entry {
        self.entries.push(Entry::Said {
            speaker,
            text: text.into(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Adds the typing placeholder unless one is already shown.
    ///
    /// Returns `true` if a placeholder was added.
    pub fn show_typing(&mut self) -> bool {
        if self.has_typing() {
            return false;
        }
        self.entries.push(Entry::Typing);
        true
    }

    /// Removes the typing placeholder, returning `true` if one was present.
    pub fn clear_typing(&mut self) -> bool {
        match self.entries.iter().position(Entry::is_typing) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn has_typing(&self) -> bool {
        self.entries.iter().any(Entry::is_typing)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing_count(t: &Transcript) -> usize {
        t.entries().iter().filter(|e| e.is_typing()).count()
    }

    #[test]
    fn placeholder_is_never_duplicated() {
        let mut t = Transcript::new();
        assert!(t.show_typing());
        assert!(!t.show_typing());
        t.push(Speaker::User, "still there?");
        assert!(!t.show_typing());
        assert_eq!(typing_count(&t), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn clearing_removes_only_the_placeholder() {
        let mut t = Transcript::new();
        t.push(Speaker::User, "hello");
        t.show_typing();
        t.push(Speaker::System, "note");
        assert!(t.clear_typing());
        assert!(!t.clear_typing());
        assert_eq!(
            t.entries(),
            &[
                Entry::Said {
                    speaker: Speaker::User,
                    text: "hello".into()
                },
                Entry::Said {
                    speaker: Speaker::System,
                    text: "note".into()
                },
            ]
        );
    }

    #[test]
    fn interleaved_updates_keep_at_most_one_placeholder() {
        let mut t = Transcript::new();
        for step in 0..50 {
            match step % 4 {
                0 | 1 => {
                    t.show_typing();
                }
                2 => {
                    t.clear_typing();
                    t.push(Speaker::Agent, format!("reply {step}"));
                }
                _ => {
                    t.clear_typing();
                }
            }
            assert!(typing_count(&t) <= 1);
        }
    }
}
