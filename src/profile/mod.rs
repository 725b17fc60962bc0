use crate::api::ApiClient;
use crate::model::{ProfileUpdate, User, UserStatus};
use crate::session::SessionStore;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    NotSignedIn,
    NotEditing,
    EmptyUsername,
    InvalidEmail(String),
    /// Server answered `{ "success": false }`
    Rejected(UserStatus),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::NotSignedIn => write!(f, "no user is signed in"),
            ProfileError::NotEditing => write!(f, "profile is not being edited"),
            ProfileError::EmptyUsername => write!(f, "username is required"),
            ProfileError::InvalidEmail(email) => {
                write!(f, "invalid email address '{}'", email)
            }
            ProfileError::Rejected(status) => {
                write!(f, "server rejected status change to {}", status)
            }
        }
    }
}

impl std::error::Error for ProfileError {}

/// Editable copy of the profile fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub status: UserStatus,
}

impl ProfileForm {
    fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            status: user.status,
        }
    }

    fn validate(&self) -> Result<ProfileUpdate, ProfileError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !valid_email {
            return Err(ProfileError::InvalidEmail(email.to_string()));
        }
        Ok(ProfileUpdate {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            avatar: None,
            status: Some(self.status),
        })
    }
}

/// Edit/save flow for the signed-in user's profile.
///
/// Saved changes are written back to the [`SessionStore`].
pub struct ProfileEditor {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    form: Option<ProfileForm>,
}

impl ProfileEditor {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            form: None,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn is_editing(&self) -> bool {
        self.form.is_some()
    }

    pub fn form(&self) -> Option<&ProfileForm> {
        self.form.as_ref()
    }

    /// Start editing from the stored user. Restarts an edit in progress.
    pub fn begin_edit(&mut self) -> Result<&ProfileForm, ProfileError> {
        let user = self.session.current_user().ok_or(ProfileError::NotSignedIn)?;
        Ok(&*self.form.insert(ProfileForm::from_user(&user)))
    }

    /// Discard pending edits. Returns whether an edit was in progress.
    pub fn cancel(&mut self) -> bool {
        self.form.take().is_some()
    }

    fn form_mut(&mut self) -> Result<&mut ProfileForm, ProfileError> {
        self.form.as_mut().ok_or(ProfileError::NotEditing)
    }

    pub fn set_username(&mut self, username: impl Into<String>) -> Result<(), ProfileError> {
        self.form_mut()?.username = username.into();
        Ok(())
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> Result<(), ProfileError> {
        self.form_mut()?.email = email.into();
        Ok(())
    }

    pub fn set_status(&mut self, status: UserStatus) -> Result<(), ProfileError> {
        self.form_mut()?.status = status;
        Ok(())
    }

    /// Send the edited fields and leave edit mode.
    ///
    /// The form stays open when validation fails.
    pub async fn save(&mut self) -> Result<User, ProfileError> {
        if !self.session.is_authenticated() {
            return Err(ProfileError::NotSignedIn);
        }
        let update = self.form.as_ref().ok_or(ProfileError::NotEditing)?.validate()?;

        let user = self.api.update_profile(&update).await;
        self.session.update_user(user.clone());
        self.form = None;
        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// Change presence immediately, outside the edit form
    pub async fn change_status(&mut self, status: UserStatus) -> Result<User, ProfileError> {
        let mut user = self.session.current_user().ok_or(ProfileError::NotSignedIn)?;

        let ack = self.api.update_status(status).await;
        if !ack.success {
            return Err(ProfileError::Rejected(status));
        }

        user.status = status;
        self.session.update_user(user.clone());
        if let Some(form) = self.form.as_mut() {
            form.status = status;
        }
        info!(user_id = %user.id, status = %status, "Status changed");
        Ok(user)
    }
}
