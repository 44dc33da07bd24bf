//! Acting users.
//!
//! A [`User`] is whoever performs a workflow action. The workflow engine only needs the
//! user name (it is what lands in `authors`, `reviewers` and `last_modified_by`); the
//! display name and email are used when the on-disk store writes Git commits.

use crate::{WorkflowError, WorkflowResult};
use refset_types::{NonEmptyText, UserName};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Login name, recorded on tracking records and concepts.
    pub user_name: UserName,

    /// Human-readable name used as the Git committer name.
    pub display_name: NonEmptyText,

    /// Email address, if known. Falls back to `<user_name>@<committer_email_domain>`.
    pub email: Option<String>,
}

impl User {
    /// Build a user whose display name is the user name itself.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidUser`] when `user_name` is empty, multi-line,
    /// contains whitespace or is too long.
    pub fn from_user_name(user_name: impl AsRef<str>) -> WorkflowResult<Self> {
        let user_name = UserName::new(user_name)?;
        let display_name = NonEmptyText::new(user_name.as_str())?;
        Ok(Self {
            user_name,
            display_name,
            email: None,
        })
    }

    /// Attach a display name.
    pub fn with_display_name(mut self, display_name: impl AsRef<str>) -> WorkflowResult<Self> {
        self.display_name = NonEmptyText::new(display_name)?;
        Ok(self)
    }

    /// Attach an email address.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if `email` is not a single `local@domain` address.
    pub fn with_email(mut self, email: impl Into<String>) -> WorkflowResult<Self> {
        let email = email.into().trim().to_string();
        let valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(WorkflowError::InvalidInput(format!(
                "'{email}' is not a valid email address"
            )));
        }
        self.email = Some(email);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        self.user_name.as_str()
    }

    /// Email used for Git commits made on behalf of this user.
    pub fn commit_email(&self, committer_email_domain: &str) -> String {
        match &self.email {
            Some(email) => email.clone(),
            None => format!("{}@{committer_email_domain}", self.user_name.as_str()),
        }
    }
}
