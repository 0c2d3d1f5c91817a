//! The stat triple read off one inventory slot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A recognizable visual category, e.g. a gem term id or `"locked"`.
pub type Label = String;

/// The three inspectable properties of one essence.
///
/// `None` in a slot means the property could not be recognized on this pass.
/// Equality is slot-wise, so two reads that both failed on the same slot are equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EssenceStats {
    /// Base attribute (termType 0)
    pub attribute: Option<Label>,
    /// Secondary attribute (termType 1)
    pub secondary: Option<Label>,
    /// Skill attribute (termType 2)
    pub skill: Option<Label>,
}

impl EssenceStats {
    pub fn new(
        attribute: Option<impl Into<Label>>,
        secondary: Option<impl Into<Label>>,
        skill: Option<impl Into<Label>>,
    ) -> Self {
        Self {
            attribute: attribute.map(Into::into),
            secondary: secondary.map(Into::into),
            skill: skill.map(Into::into),
        }
    }

    /// Shorthand for a triple with every slot present.
    pub fn complete(attribute: &str, secondary: &str, skill: &str) -> Self {
        Self::new(Some(attribute), Some(secondary), Some(skill))
    }

    pub fn slots(&self) -> [Option<&str>; 3] {
        [
            self.attribute.as_deref(),
            self.secondary.as_deref(),
            self.skill.as_deref(),
        ]
    }

    /// True when all three slots were recognized.
    pub fn is_complete(&self) -> bool {
        self.slots().iter().all(Option::is_some)
    }

    /// True when at least one slot carries a label.
    pub fn has_any(&self) -> bool {
        self.slots().iter().any(Option::is_some)
    }
}

impl fmt::Display for EssenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, s, k] = self.slots();
        write!(
            f,
            "{} / {} / {}",
            a.unwrap_or("?"),
            s.unwrap_or("?"),
            k.unwrap_or("?")
        )
    }
}

/// Binary quality decision for one essence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Wanted,
    Discardable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Wanted => write!(f, "treasure"),
            Verdict::Discardable => write!(f, "trash"),
        }
    }
}
