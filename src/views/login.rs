use crate::routes::{home_for, Route};
use crate::services::AuthService;

use super::{error_message, is_valid_email, FormErrors};

const BAD_CREDENTIALS: &str = "Correo electrónico o contraseña incorrectos.";

#[derive(Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "El correo electrónico es obligatorio");
        } else if !is_valid_email(email) {
            errors.add("email", "El correo electrónico no es válido");
        }
        if self.password.is_empty() {
            errors.add("password", "La contraseña es obligatoria");
        }
        errors.into_result()
    }
}

pub struct LoginView {
    auth: AuthService,
    pub form: LoginForm,
    loading: bool,
    error: Option<String>,
}

impl LoginView {
    pub fn new(auth: AuthService) -> Self {
        Self {
            auth,
            form: LoginForm::default(),
            loading: false,
            error: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Logs in and returns the home route for the user's role. `Ok(None)`
    /// means the backend refused; the reason is in `error`.
    pub async fn submit(&mut self) -> Result<Option<Route>, FormErrors> {
        self.form.validate()?;
        self.loading = true;
        self.error = None;

        let result = self.auth.login(&self.form.email, &self.form.password).await;
        self.loading = false;

        match result {
            Ok(user) => {
                self.form.password.clear();
                Ok(Some(home_for(user.role)))
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                self.error = Some(match e.status() {
                    Some(401) => BAD_CREDENTIALS.to_string(),
                    _ => error_message(&e, "Error al iniciar sesión."),
                });
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::testing::{client, ok, ScriptedTransport};
    use crate::api::Method;

    fn view(transport: std::sync::Arc<ScriptedTransport>) -> LoginView {
        LoginView::new(AuthService::new(client(transport)))
    }

    fn login_ok(role: &str) -> serde_json::Value {
        ok(json!({
            "user": {"id": 3, "email": "luis@example.com", "role": role},
            "access_token": "jwt",
            "token_type": "bearer"
        }))
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_call() {
        let transport = ScriptedTransport::new();
        let mut view = view(transport.clone());
        view.form.email = "luis-at-example".to_string();

        let errors = view.submit().await.unwrap_err();
        assert_eq!(errors.get("email"), Some("El correo electrónico no es válido"));
        assert_eq!(errors.get("password"), Some("La contraseña es obligatoria"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_routes_by_role() {
        for (role, route) in [
            ("teacher", Route::Teacher),
            ("student", Route::SubjectSelection),
            ("admin", Route::Admin),
        ] {
            let transport = ScriptedTransport::new();
            transport.on(Method::Post, "auth/login", 200, login_ok(role));
            let mut view = view(transport);
            view.form.email = "luis@example.com".to_string();
            view.form.password = "secreto".to_string();

            assert_eq!(view.submit().await.unwrap(), Some(route));
            assert!(view.form.password.is_empty());
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let transport = ScriptedTransport::new();
        transport.on(Method::Post, "auth/login", 401, json!({"detail": "Incorrect email or password"}));
        let mut view = view(transport);
        view.form.email = "luis@example.com".to_string();
        view.form.password = "mala".to_string();

        assert_eq!(view.submit().await.unwrap(), None);
        assert_eq!(view.error(), Some(BAD_CREDENTIALS));
        assert!(!view.is_loading());
    }

    #[test]
    fn test_debug_hides_password() {
        let form = LoginForm {
            email: "a@b.co".to_string(),
            password: "secreto".to_string(),
        };
        assert!(!format!("{:?}", form).contains("secreto"));
    }
}
