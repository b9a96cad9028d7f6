//! Staff roster and the signed-in staff member.
//!
//! Sign-in is a selection from a small fixed roster, not authentication.
//! The only thing a staff session gates is recording sales.

use serde::{Deserialize, Serialize};

/// Default roster used when none is configured.
pub const DEFAULT_STAFF: &[&str] = &["Carlos", "Mario"];

/// Staff-session errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StaffError {
    /// Nobody is signed in.
    #[error("Select a staff member before recording a sale.")]
    NotSignedIn,
    /// The name is not on the roster.
    #[error("Unknown staff member: {0}")]
    UnknownMember(String),
}

/// A member of the studio staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub avatar_url: String,
}

impl StaffMember {
    /// Build a roster entry with a generated initials avatar.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        let avatar_url = format!(
            "https://ui-avatars.com/api/?name={}&background=222&color=fff&font-size=0.5",
            name.replace(' ', "+")
        );
        Self { name, avatar_url }
    }
}

/// The fixed set of selectable staff members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StaffRoster(Vec<StaffMember>);

impl Default for StaffRoster {
    fn default() -> Self {
        Self::from_names(DEFAULT_STAFF.iter().copied())
    }
}

impl StaffRoster {
    /// Build a roster from names, skipping blanks and duplicates.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut members: Vec<StaffMember> = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() || members.iter().any(|m| m.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            members.push(StaffMember::new(name));
        }
        Self(members)
    }

    /// Find a member by case-insensitive name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&StaffMember> {
        let name = name.trim();
        self.0.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// All members.
    #[must_use]
    pub fn members(&self) -> &[StaffMember] {
        &self.0
    }

    /// `true` if the roster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// At most one signed-in staff member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaffSession {
    current: Option<StaffMember>,
}

impl StaffSession {
    /// Sign in as a roster member, replacing any current member.
    ///
    /// # Errors
    ///
    /// Returns [`StaffError::UnknownMember`] if the name is not on the roster.
    pub fn sign_in(&mut self, roster: &StaffRoster, name: &str) -> Result<&StaffMember, StaffError> {
        let member = roster
            .find(name)
            .ok_or_else(|| StaffError::UnknownMember(name.trim().to_string()))?
            .clone();
        let member: &StaffMember = self.current.insert(member);
        Ok(member)
    }

    /// Sign out. Returns the member who was signed in.
    pub const fn sign_out(&mut self) -> Option<StaffMember> {
        self.current.take()
    }

    /// The signed-in member, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&StaffMember> {
        self.current.as_ref()
    }

    /// The signed-in member.
    ///
    /// # Errors
    ///
    /// Returns [`StaffError::NotSignedIn`] when nobody is signed in.
    pub fn require(&self) -> Result<&StaffMember, StaffError> {
        self.current.as_ref().ok_or(StaffError::NotSignedIn)
    }
}
