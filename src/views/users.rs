use crate::models::{Role, User, UserCreate, UserUpdate};
use crate::services::UserService;

use super::{error_message, is_valid_email, matches_search, FormErrors, PendingDelete};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoleFilter {
    #[default]
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todos" => Some(RoleFilter::All),
            other => Role::from_str(other).map(RoleFilter::Only),
        }
    }

    pub fn admits(&self, role: Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(only) => *only == role,
        }
    }
}

#[derive(Clone, Default)]
pub struct UserForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Option<Role>,
}

impl std::fmt::Debug for UserForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserForm")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl UserForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone().unwrap_or_default(),
            email: user.email.clone(),
            role: Some(user.role),
            ..Default::default()
        }
    }

    fn check_identity(&self, errors: &mut FormErrors) {
        if self.full_name.trim().is_empty() {
            errors.add("full_name", "El nombre es obligatorio");
        }
        if self.email.trim().is_empty() {
            errors.add("email", "El correo electrónico es obligatorio");
        } else if !is_valid_email(&self.email) {
            errors.add("email", "El correo electrónico no es válido");
        }
    }

    fn check_password(&self, errors: &mut FormErrors) {
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("La contraseña debe tener al menos {} caracteres", MIN_PASSWORD_LEN),
            );
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Las contraseñas no coinciden");
        }
    }

    /// New users need every field; students are the default role.
    pub fn validate_new(&self) -> Result<UserCreate, FormErrors> {
        let mut errors = FormErrors::default();
        self.check_identity(&mut errors);
        self.check_password(&mut errors);
        errors.into_result()?;

        Ok(UserCreate {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            full_name: self.full_name.trim().to_string(),
            role: self.role.unwrap_or(Role::Student),
        })
    }

    /// Edits keep the current password unless a new one is typed.
    pub fn validate_edit(&self) -> Result<UserUpdate, FormErrors> {
        let mut errors = FormErrors::default();
        self.check_identity(&mut errors);
        let change_password = !self.password.is_empty() || !self.confirm_password.is_empty();
        if change_password {
            self.check_password(&mut errors);
        }
        errors.into_result()?;

        Ok(UserUpdate {
            email: Some(self.email.trim().to_string()),
            full_name: Some(self.full_name.trim().to_string()),
            password: change_password.then(|| self.password.clone()),
            role: self.role,
        })
    }
}

pub struct UsersView {
    service: UserService,
    users: Vec<User>,
    search_term: String,
    role_filter: RoleFilter,
    loading: bool,
    error: Option<String>,
    pending_delete: Option<PendingDelete>,
}

impl UsersView {
    pub fn new(service: UserService) -> Self {
        Self {
            service,
            users: Vec::new(),
            search_term: String::new(),
            role_filter: RoleFilter::All,
            loading: false,
            error: None,
            pending_delete: None,
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        match self.service.list_all().await {
            Ok(users) => self.users = users,
            Err(e) => {
                tracing::error!("Failed to load users: {}", e);
                self.error = Some(error_message(&e, "Error al cargar los usuarios."));
            }
        }
        self.loading = false;
    }

    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn set_role_filter(&mut self, filter: RoleFilter) {
        self.role_filter = filter;
    }

    pub fn visible(&self) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| self.role_filter.admits(u.role))
            .filter(|u| matches_search(&self.search_term, &[u.display_name(), u.email.as_str()]))
            .collect()
    }

    pub async fn create(&mut self, form: &UserForm) -> Result<(), FormErrors> {
        let request = form.validate_new()?;
        self.error = None;
        match self.service.create(&request).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, role = user.role.as_str(), "User created");
                self.users.push(user);
            }
            Err(e) => {
                tracing::error!("Failed to create user: {}", e);
                self.error = Some(error_message(&e, "Error al crear el usuario."));
            }
        }
        Ok(())
    }

    pub async fn update(&mut self, id: i64, form: &UserForm) -> Result<(), FormErrors> {
        let changes = form.validate_edit()?;
        self.error = None;
        match self.service.update(id, &changes).await {
            Ok(updated) => {
                if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
                    *user = updated;
                }
            }
            Err(e) => {
                tracing::error!("Failed to update user {}: {}", id, e);
                self.error = Some(error_message(&e, "Error al actualizar el usuario."));
            }
        }
        Ok(())
    }

    pub fn ask_delete(&mut self, id: i64) -> Option<&PendingDelete> {
        let user = self.users.iter().find(|u| u.id == id)?;
        self.pending_delete = Some(PendingDelete {
            id,
            prompt: format!(
                "¿Estás seguro que deseas eliminar al usuario {}? Esta acción no se puede deshacer.",
                user.display_name()
            ),
        });
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) {
        let Some(pending) = self.pending_delete.take() else {
            return;
        };
        self.error = None;
        match self.service.delete(pending.id).await {
            Ok(()) => self.users.retain(|u| u.id != pending.id),
            Err(e) => {
                tracing::error!("Failed to delete user {}: {}", pending.id, e);
                self.error = Some(error_message(&e, "Error al eliminar el usuario."));
            }
        }
    }
}
