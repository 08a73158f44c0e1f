use serde::Serialize;
use std::fmt::{Display, Formatter};

/// How far the result of an algorithm can be trusted.
///
/// Each flag only ever goes from `true` to `false` as results of nested or parallel algorithms
/// are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AlgorithmStatus {
    sound: bool,
    precise: bool,
    property_checked: bool,
}

impl AlgorithmStatus {
    pub const SOUND_AND_PRECISE: Self = Self::new(true, true);
    pub const SOUND_AND_IMPRECISE: Self = Self::new(true, false);
    pub const UNSOUND_AND_PRECISE: Self = Self::new(false, true);
    pub const UNSOUND_AND_IMPRECISE: Self = Self::new(false, false);
    /// Nothing was checked at all, e.g. a run that was cancelled before it started.
    pub const NO_PROPERTY_CHECKED: Self = Self {
        sound: true,
        precise: true,
        property_checked: false,
    };

    const fn new(sound: bool, precise: bool) -> Self {
        Self {
            sound,
            precise,
            property_checked: true,
        }
    }

    pub fn is_sound(&self) -> bool {
        self.sound
    }

    /// Target states found under this status are real counterexamples.
    pub fn is_precise(&self) -> bool {
        self.precise
    }

    pub fn was_property_checked(&self) -> bool {
        self.property_checked
    }

    /// Combine with the status of another part of the same analysis.
    pub fn update(self, other: Self) -> Self {
        Self {
            sound: self.sound && other.sound,
            precise: self.precise && other.precise,
            property_checked: self.property_checked && other.property_checked,
        }
    }

    pub fn with_sound(self, sound: bool) -> Self {
        Self {
            sound: self.sound && sound,
            ..self
        }
    }

    pub fn with_precise(self, precise: bool) -> Self {
        Self {
            precise: self.precise && precise,
            ..self
        }
    }

    pub fn with_property_checked(self, checked: bool) -> Self {
        Self {
            property_checked: self.property_checked && checked,
            ..self
        }
    }
}

impl Default for AlgorithmStatus {
    fn default() -> Self {
        Self::SOUND_AND_PRECISE
    }
}

impl Display for AlgorithmStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}",
            if self.sound { "sound" } else { "unsound" },
            if self.precise { "precise" } else { "imprecise" }
        )?;
        if !self.property_checked {
            write!(f, ", property not checked")?;
        }
        Ok(())
    }
}

/// The answer to the verification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Safe,
    Unsafe,
    Unknown,
}

impl Verdict {
    /// Interpret a finished run. A target state only counts when the run was precise; the
    /// absence of one only counts when the run was sound and nothing is left to explore.
    pub fn from_run(status: AlgorithmStatus, has_target: bool, has_waiting: bool) -> Self {
        if !status.was_property_checked() {
            Verdict::Unknown
        } else if has_target {
            if status.is_precise() {
                Verdict::Unsafe
            } else {
                Verdict::Unknown
            }
        } else if !has_waiting && status.is_sound() {
            Verdict::Safe
        } else {
            Verdict::Unknown
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Safe => write!(f, "SAFE"),
            Verdict::Unsafe => write!(f, "UNSAFE"),
            Verdict::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
