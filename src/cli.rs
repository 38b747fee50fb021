//! Terminal front end. Each screen reads commands through the line editor
//! and drives the matching view; routing between screens goes through the
//! role guards.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::style::ContentStyle;

use tutor::api::{ApiClient, HttpTransport};
use tutor::config::{Settings, APP_NAME};
use tutor::models::{Attachment, Message, Role};
use tutor::routes::{self, Route};
use tutor::services::{markdown, Services};
use tutor::session::{EndReason, Session};
use tutor::storage::Database;
use tutor::views::chat_area::SendRejected;
use tutor::views::sidebar::EMPTY_MESSAGE;
use tutor::views::{
    ChatArea, Dashboard, DocumentsView, KeyAction, LoginView, RoleFilter, StudentView,
    SubjectForm, SubjectSelection, SubjectsView, TopicForm, TopicsView, UserForm, UsersView,
};

use crate::term::{self, Echo, Line, Prompt};

const CHAT_HELP: &str = "\
/lista                 conversaciones
/abrir <id>            abrir una conversación
/nueva                 empezar una conversación nueva
/fijar <id>            fijar o soltar una conversación
/borrar <id>           eliminar una conversación
/buscar <texto>        filtrar la lista
/imagen <ruta>         adjuntar una imagen al siguiente mensaje
/ver-imagen <id> <ruta> guardar la imagen de un mensaje
/asignaturas           cambiar de asignatura
/salir                 cerrar sesión
Mayús+Intro o Alt+Intro sigue el mensaje en otra línea.";

const STAFF_HELP: &str = "\
/panel                          resumen
/asignaturas                    listar asignaturas
/nueva-asignatura               crear una asignatura
/activar <id>                   activar o desactivar una asignatura
/borrar-asignatura <id>         eliminar una asignatura
/usuarios [rol]                 listar usuarios (all, admin, teacher, student)
/nuevo-usuario                  crear un usuario
/borrar-usuario <id>            eliminar un usuario
/documentos [asignatura]        listar documentos
/subir <asignatura> <ruta>      subir un PDF
/descargar <id> <ruta>          guardar un documento
/borrar-documento <id>          eliminar un documento
/resumen <asignatura>           resumen de los documentos
/temas <asignatura>             listar temas
/nuevo-tema <asignatura>        crear un tema
/salir                          cerrar sesión";

pub struct Shell {
    services: Services,
    session: Arc<Session>,
    db: Database,
    prompt: Prompt,
    out: Out,
    subject_id: Option<i64>,
}

impl Shell {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let db = Database::open(&settings.database_path())?;
        let session = Arc::new(Session::restore(db.clone()).await);
        let transport = HttpTransport::new(&settings.api_url, settings.request_timeout())
            .with_context(|| format!("Invalid API URL: {}", settings.api_url))?;
        let api = ApiClient::new(Arc::new(transport), session.clone());

        let prompt = Prompt::new();
        let out = Out { styled: prompt.styled() };

        Ok(Self {
            services: Services::new(api),
            session,
            db,
            prompt,
            out,
            subject_id: None,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        self.out.heading(APP_NAME);
        self.watch_session();

        if self.session.is_logged_in() {
            if let Err(e) = self.services.auth.refresh_current_user().await {
                tracing::warn!("Failed to refresh stored user: {}", e);
            }
        }

        let mut route = routes::fallback(&self.session.snapshot());
        loop {
            route = routes::resolve(route.path(), &self.session.snapshot());
            tracing::debug!(path = route.path(), "Showing screen");
            let next = match route {
                Route::Login => self.login().await?,
                Route::SubjectSelection => self.select_subject().await?,
                Route::Chat => self.chat().await?,
                Route::Teacher | Route::Admin => self.staff().await?,
            };
            match next {
                Some(next) => route = next,
                None => break,
            }
        }
        Ok(())
    }

    fn watch_session(&self) {
        let mut rx = self.session.subscribe();
        let out = self.out;
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let ended = rx.borrow_and_update().ended;
                if matches!(ended, Some(EndReason::Unauthorized | EndReason::Expired)) {
                    let text = out.paint(term::error(), "Tu sesión ha expirado. Inicia sesión de nuevo.");
                    // The editor may hold raw mode, so line breaks are explicit.
                    eprint!("\r\n{}\r\n", text);
                }
            }
        });
    }

    fn session_lost(&self) -> bool {
        !self.session.is_logged_in()
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        Ok(self.prompt.read(prompt, Echo::Plain).await?.map(Line::into_text))
    }

    async fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        Ok(self.prompt.read(prompt, Echo::Masked).await?.map(Line::into_text))
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.read_line(&format!("{} [s/N] ", prompt)).await?;
        Ok(matches!(answer.as_deref().map(str::trim), Some("s" | "S" | "si" | "sí")))
    }

    async fn logout(&mut self) -> Result<Option<Route>> {
        self.services.auth.logout().await;
        self.subject_id = None;
        Ok(Some(Route::Login))
    }

    async fn login(&mut self) -> Result<Option<Route>> {
        let mut view = LoginView::new(self.services.auth.clone());
        loop {
            let Some(email) = self.read_line("Correo electrónico: ").await? else {
                return Ok(None);
            };
            let Some(password) = self.read_secret("Contraseña: ").await? else {
                return Ok(None);
            };
            view.form.email = email;
            view.form.password = password;

            match view.submit().await {
                Ok(Some(route)) => return Ok(Some(route)),
                Ok(None) => self.out.error(view.error()),
                Err(errors) => self.out.error(Some(&errors.to_string())),
            }
        }
    }

    async fn select_subject(&mut self) -> Result<Option<Route>> {
        let mut view = SubjectSelection::new(self.services.users.clone());
        view.load().await;
        if self.session_lost() {
            return Ok(Some(Route::Login));
        }
        self.out.error(view.error());

        loop {
            self.out.heading("Elige una asignatura:");
            for (i, subject) in view.subjects().iter().enumerate() {
                let marker = if view.selected().map(|s| s.id) == Some(subject.id) { "*" } else { " " };
                println!(" {} {}. {}", marker, i + 1, subject.name);
            }
            let Some(line) = self.read_line("Número (o /salir): ").await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line == "/salir" {
                return self.logout().await;
            }

            let subject_id = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| view.subjects().get(i))
                .map(|s| s.id);
            let Some(subject_id) = subject_id else {
                self.out.error(Some("Selección no válida"));
                continue;
            };
            if let Some(route) = view.select(subject_id) {
                self.subject_id = Some(subject_id);
                return Ok(Some(route));
            }
        }
    }

    async fn chat(&mut self) -> Result<Option<Route>> {
        let mut view = StudentView::new(&self.services, self.subject_id);
        if let Some(user_id) = self.session.snapshot().user_id() {
            view = view.with_pin_store(self.db.clone(), user_id);
        }
        let mut transcript = Transcript::default();

        view.open().await;
        print_sidebar(&view, self.out);
        self.out.notice("Escribe /ayuda para ver los comandos.");
        transcript.show(&mut view.chat_area, self.out);

        loop {
            if self.session_lost() {
                return Ok(Some(Route::Login));
            }
            let prompt = if view.input.text().is_empty() { "> " } else { ". " };
            let Some(line) = self.prompt.read(prompt, Echo::Plain).await? else {
                return Ok(None);
            };
            let shift = matches!(line, Line::Newline(_));
            let line = line.into_text();

            let command = line.strip_prefix('/').filter(|_| view.input.text().is_empty() && !shift);
            if let Some(command) = command {
                let (name, arg) = split_command(command);
                match (name, parse_id(arg)) {
                    ("lista", _) => print_sidebar(&view, self.out),
                    ("abrir", Some(id)) => view.select(id).await,
                    ("nueva", _) => view.start_new(),
                    ("fijar", Some(id)) => {
                        view.pin(id).await;
                        print_sidebar(&view, self.out);
                    }
                    ("borrar", Some(id)) => {
                        if self.confirm("¿Eliminar la conversación?").await? {
                            view.delete(id).await;
                            print_sidebar(&view, self.out);
                        }
                    }
                    ("buscar", _) => {
                        view.sidebar.search(arg);
                        print_sidebar(&view, self.out);
                    }
                    ("imagen", _) => match Attachment::from_path(Path::new(arg)).await {
                        Ok(image) => {
                            if let Err(message) = view.input.attach(image) {
                                self.out.error(Some(&message));
                            }
                        }
                        Err(e) => self.out.error(Some(&format!("{:#}", e))),
                    },
                    ("ver-imagen", _) => {
                        let (id, path) = split_command(arg);
                        match parse_id(id) {
                            Some(message_id) if !path.is_empty() => {
                                if let Some(bytes) = view.image(message_id).await {
                                    tokio::fs::write(path, &bytes)
                                        .await
                                        .with_context(|| format!("Failed to write {}", path))?;
                                    self.out.notice(&format!("Guardada en {}", path));
                                }
                            }
                            _ => self.out.error(Some("Uso: /ver-imagen <mensaje> <ruta>")),
                        }
                    }
                    ("asignaturas", _) => return Ok(Some(Route::SubjectSelection)),
                    ("salir", _) => return self.logout().await,
                    _ => self.out.line(CHAT_HELP),
                }
                print_errors(&view, self.out);
                transcript.show(&mut view.chat_area, self.out);
                continue;
            }

            let text = format!("{}{}", view.input.text(), line);
            view.input.set_text(text);
            if view.input.on_key(true, shift) != KeyAction::Send {
                continue;
            }

            match view.submit().await {
                Ok(()) | Err(SendRejected::Empty) => {}
                Err(SendRejected::Busy) => self.out.error(Some("Espera a que termine el envío anterior.")),
                Err(SendRejected::NoConversation) => self.out.error(Some("No hay ninguna conversación abierta.")),
            }
            print_errors(&view, self.out);
            transcript.show(&mut view.chat_area, self.out);
        }
    }

    async fn staff(&mut self) -> Result<Option<Route>> {
        let Some(role) = self.session.snapshot().role() else {
            return Ok(Some(Route::Login));
        };
        let mut dashboard = Dashboard::new(&self.services, role);
        let mut subjects = SubjectsView::new(self.services.subjects.clone());
        let mut users = UsersView::new(self.services.users.clone());
        let mut documents = DocumentsView::new(&self.services);

        print_dashboard(&mut dashboard, self.out).await;
        self.out.notice("Escribe /ayuda para ver los comandos.");

        loop {
            if self.session_lost() {
                return Ok(Some(Route::Login));
            }
            let Some(line) = self.read_line("> ").await? else {
                return Ok(None);
            };
            let Some(command) = line.trim().strip_prefix('/') else {
                self.out.line(STAFF_HELP);
                continue;
            };
            let (name, arg) = split_command(command);
            let admin = role == Role::Admin;

            match name {
                "panel" => print_dashboard(&mut dashboard, self.out).await,
                "asignaturas" => {
                    subjects.load().await;
                    subjects.search(arg);
                    for s in subjects.visible() {
                        let state = if s.active { "activa" } else { "inactiva" };
                        println!(
                            "  [{}] {} ({}, {} profesores, {} estudiantes)",
                            s.id, s.name, state, s.teacher_count, s.student_count
                        );
                    }
                    self.out.error(subjects.error());
                }
                "nueva-asignatura" if admin => {
                    let form = SubjectForm {
                        name: self.read_line("Nombre: ").await?.unwrap_or_default(),
                        code: self.read_line("Código (opcional): ").await?.unwrap_or_default(),
                        description: self.read_line("Descripción: ").await?.unwrap_or_default(),
                    };
                    match subjects.create(&form).await {
                        Ok(()) => self.out.error(subjects.error()),
                        Err(errors) => self.out.error(Some(&errors.to_string())),
                    }
                }
                "activar" if admin => {
                    if let Some(id) = parse_id(arg) {
                        subjects.toggle_active(id).await;
                        self.out.error(subjects.error());
                    }
                }
                "borrar-asignatura" if admin => {
                    let prompt = parse_id(arg)
                        .and_then(|id| subjects.ask_delete(id))
                        .map(|pending| pending.prompt.clone());
                    match prompt {
                        Some(prompt) if self.confirm(&prompt).await? => {
                            subjects.confirm_delete().await;
                            self.out.error(subjects.error());
                        }
                        Some(_) => subjects.cancel_delete(),
                        None => self.out.error(Some("Carga antes la lista con /asignaturas")),
                    }
                }
                "usuarios" if admin => {
                    users.set_role_filter(RoleFilter::parse(arg).unwrap_or_default());
                    users.load().await;
                    for u in users.visible() {
                        println!("  [{}] {} <{}> {}", u.id, u.display_name(), u.email, u.role.display_name());
                    }
                    self.out.error(users.error());
                }
                "nuevo-usuario" if admin => {
                    let form = UserForm {
                        full_name: self.read_line("Nombre completo: ").await?.unwrap_or_default(),
                        email: self.read_line("Correo electrónico: ").await?.unwrap_or_default(),
                        password: self.read_secret("Contraseña: ").await?.unwrap_or_default(),
                        confirm_password: self.read_secret("Repite la contraseña: ").await?.unwrap_or_default(),
                        role: self
                            .read_line("Rol (admin, teacher, student): ")
                            .await?
                            .and_then(|r| Role::from_str(r.trim())),
                    };
                    match users.create(&form).await {
                        Ok(()) => self.out.error(users.error()),
                        Err(errors) => self.out.error(Some(&errors.to_string())),
                    }
                }
                "borrar-usuario" if admin => {
                    let prompt = parse_id(arg)
                        .and_then(|id| users.ask_delete(id))
                        .map(|pending| pending.prompt.clone());
                    match prompt {
                        Some(prompt) if self.confirm(&prompt).await? => {
                            users.confirm_delete().await;
                            self.out.error(users.error());
                        }
                        Some(_) => users.cancel_delete(),
                        None => self.out.error(Some("Carga antes la lista con /usuarios")),
                    }
                }
                "documentos" => {
                    documents.set_filter(parse_id(arg), None);
                    documents.load().await;
                    for d in documents.visible() {
                        println!("  [{}] {}", d.id, d.title);
                    }
                    self.out.error(documents.error());
                }
                "subir" => {
                    let (subject, path) = split_command(arg);
                    let Some(subject_id) = parse_id(subject) else {
                        self.out.error(Some("Uso: /subir <asignatura> <ruta>"));
                        continue;
                    };
                    let file = match Attachment::from_path(Path::new(path)).await {
                        Ok(file) => file,
                        Err(e) => {
                            self.out.error(Some(&format!("{:#}", e)));
                            continue;
                        }
                    };
                    documents.set_filter(Some(subject_id), None);
                    documents.open_upload().await;
                    if let Err(message) = documents.upload.select_file(file) {
                        self.out.error(Some(&message));
                        documents.upload.close();
                        continue;
                    }
                    documents.upload.title = self.read_line("Título: ").await?.unwrap_or_default();
                    documents.upload.description =
                        self.read_line("Descripción (opcional): ").await?.unwrap_or_default();
                    match documents.submit_upload().await {
                        Ok(true) => self.out.notice("Documento subido."),
                        Ok(false) => self.out.error(documents.upload.upload_error()),
                        Err(errors) => self.out.error(Some(&errors.to_string())),
                    }
                    documents.upload.close();
                }
                "descargar" => {
                    let (id, path) = split_command(arg);
                    let Some(id) = parse_id(id) else {
                        self.out.error(Some("Uso: /descargar <id> <ruta>"));
                        continue;
                    };
                    if let Some(bytes) = documents.download(id).await {
                        tokio::fs::write(path, &bytes)
                            .await
                            .with_context(|| format!("Failed to write {}", path))?;
                        self.out.notice(&format!("Guardado en {}", path));
                    }
                    self.out.error(documents.error());
                }
                "borrar-documento" => {
                    let prompt = parse_id(arg)
                        .and_then(|id| documents.ask_delete(id))
                        .map(|pending| pending.prompt.clone());
                    match prompt {
                        Some(prompt) if self.confirm(&prompt).await? => {
                            documents.confirm_delete().await;
                            self.out.error(documents.error());
                        }
                        Some(_) => documents.cancel_delete(),
                        None => self.out.error(Some("Carga antes la lista con /documentos")),
                    }
                }
                "resumen" => {
                    documents.set_filter(parse_id(arg), None);
                    documents.load_summary().await;
                    match documents.summary() {
                        Some(summary) => {
                            self.out.heading(&format!("{} documentos", summary.document_count));
                            println!("{}", markdown::render_terminal(&summary.summary, self.out.styled));
                        }
                        None => self.out.notice("Sin resumen para esta asignatura."),
                    }
                }
                "temas" | "nuevo-tema" => {
                    let Some(subject_id) = parse_id(arg) else {
                        self.out.error(Some(&format!("Uso: /{} <asignatura>", name)));
                        continue;
                    };
                    let mut topics = TopicsView::new(self.services.topics.clone(), subject_id);
                    if name == "nuevo-tema" {
                        let form = TopicForm {
                            name: self.read_line("Nombre: ").await?.unwrap_or_default(),
                            description: self.read_line("Descripción (opcional): ").await?.unwrap_or_default(),
                        };
                        if let Err(errors) = topics.create(&form).await {
                            self.out.error(Some(&errors.to_string()));
                        }
                    }
                    topics.load().await;
                    for t in topics.visible() {
                        println!("  [{}] {}", t.id, t.name);
                    }
                    self.out.error(topics.error());
                }
                "salir" => return self.logout().await,
                _ => self.out.line(STAFF_HELP),
            }
        }
    }
}

/// Prints the messages of the open conversation that have not been shown yet.
#[derive(Default)]
struct Transcript {
    conversation_id: Option<i64>,
    shown: usize,
}

impl Transcript {
    fn show(&mut self, area: &mut ChatArea, out: Out) {
        if !area.take_scroll_request() && self.conversation_id == area.conversation_id() {
            return;
        }
        if self.conversation_id != area.conversation_id() {
            self.conversation_id = area.conversation_id();
            self.shown = 0;
            if let Some(id) = self.conversation_id {
                out.notice(&format!("── Conversación {} ──", id));
            }
        }
        out.error(area.error());

        let confirmed: Vec<&Message> = area.messages().iter().filter(|m| !m.pending).collect();
        for message in confirmed.iter().skip(self.shown) {
            let speaker = if message.is_bot { "Tutor:" } else { "Tú:" };
            println!("{}", out.paint(term::speaker(), speaker));
            if message.is_bot {
                println!("{}", markdown::render_terminal(&message.text, out.styled));
            } else if !message.text.is_empty() {
                println!("{}", message.text);
            }
            if message.image_id.is_some() {
                out.notice(&format!("[imagen adjunta: /ver-imagen {} <ruta>]", message.id));
            }
            println!();
        }
        self.shown = self.shown.max(confirmed.len());
    }
}

/// Styled printing for the shell. Styling is dropped when stdout is not a
/// terminal.
#[derive(Debug, Clone, Copy)]
struct Out {
    styled: bool,
}

impl Out {
    fn paint(self, style: ContentStyle, text: &str) -> String {
        term::paint(style, text, self.styled)
    }

    fn line(self, text: &str) {
        println!("{}", text);
    }

    fn heading(self, text: &str) {
        println!("{}", self.paint(term::heading(), text));
    }

    fn notice(self, text: &str) {
        println!("{}", self.paint(term::notice(), text));
    }

    fn error(self, error: Option<&str>) {
        if let Some(error) = error {
            println!("{}", self.paint(term::error(), error));
        }
    }
}

fn print_sidebar(view: &StudentView, out: Out) {
    out.error(view.sidebar.error());
    if view.sidebar.is_empty_state() {
        out.notice(EMPTY_MESSAGE);
        return;
    }
    for (label, entries) in view.sidebar.grouped(Utc::now()) {
        if !label.is_empty() {
            out.heading(label);
        }
        for entry in entries {
            let marker = if view.sidebar.active() == Some(entry.id()) { "*" } else { " " };
            println!(" {} [{}] {}", marker, entry.id(), entry.title);
        }
    }
}

fn print_errors(view: &StudentView, out: Out) {
    out.error(view.error());
    out.error(view.input.error());
}

async fn print_dashboard(dashboard: &mut Dashboard, out: Out) {
    dashboard.load().await;
    match dashboard.stats() {
        Some(stats) => {
            out.heading("Resumen");
            println!(
                "Usuarios: {} ({} estudiantes, {} profesores)",
                stats.total_users(),
                stats.students,
                stats.teachers
            );
            println!(
                "Asignaturas: {} activas, {} inactivas",
                stats.active_subjects, stats.inactive_subjects
            );
            println!("Documentos: {}", stats.documents);
        }
        None => out.error(dashboard.error()),
    }
}

fn split_command(command: &str) -> (&str, &str) {
    let command = command.trim();
    match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    }
}

fn parse_id(arg: &str) -> Option<i64> {
    arg.trim().parse().ok()
}
