use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;

use finscribe_answer::{BackendClient, ClearOutcome, DocumentCatalog, fetch_document_catalog};
use finscribe_chat::transcript::{self, ASSISTANT_LABEL, USER_LABEL};
use finscribe_chat::{
    Completion, Role, SessionContext, SessionController, SessionEvent, SessionResult,
};
use tokio::sync::mpsc;

use crate::command::{Command, HELP};
use crate::input::InputLines;
use crate::settings::{Settings, SettingsStore};

/// Line-oriented front end over a [`SessionController`].
///
/// Input lines and answer completions are handled on one task, one at a time, so the
/// controller never sees two mutations interleave.
pub struct TerminalApp<W> {
    controller: SessionController,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    backend: BackendClient,
    settings: SettingsStore,
    context: SessionContext,
    export_path: PathBuf,
    output: W,
}

impl<W: Write> TerminalApp<W> {
    pub fn new(
        mut controller: SessionController,
        backend: BackendClient,
        settings: SettingsStore,
        output: W,
    ) -> Self {
        let events = controller.subscribe();
        let current = settings.settings();
        let context = current.session_context();
        let export_path = PathBuf::from(&current.export_file_name);
        Self {
            controller,
            events,
            backend,
            settings,
            context,
            export_path,
            output,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Runs until `quit` or the end of input.
    pub async fn run(&mut self, input: &mut InputLines) -> io::Result<()> {
        self.greet()?;
        self.refresh_documents().await?;

        loop {
            tokio::select! {
                line = input.next() => match line {
                    Some(line) => {
                        if self.handle_line(&line).await?.is_break() {
                            break;
                        }
                        self.output.flush()?;
                        input.resume();
                    }
                    None => break,
                },
                Some(completion) = self.controller.next_completion() => {
                    self.apply_completion(completion)?;
                    self.output.flush()?;
                }
            }
        }

        tracing::info!(in_flight = self.controller.in_flight(), "terminal session ended");
        Ok(())
    }

    pub fn apply_completion(&mut self, completion: Completion) -> io::Result<()> {
        self.controller.apply_completion(completion);
        self.drain_events()
    }

    pub async fn handle_line(&mut self, line: &str) -> io::Result<ControlFlow<()>> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(ControlFlow::Continue(())),
            Err(error) => {
                tracing::debug!(error = %error, "rejected input line");
                writeln!(self.output, "! {error}")?;
                return Ok(ControlFlow::Continue(()));
            }
        };

        match command {
            Command::Ask(text) => {
                let result = self.controller.submit(&self.context, &text).map(drop);
                self.report(result)?;
            }
            Command::Edit { index, text } => {
                let draft = text.unwrap_or_else(|| {
                    self.controller
                        .turns()
                        .get(index)
                        .and_then(|turn| turn.content.text())
                        .unwrap_or_default()
                        .to_string()
                });
                let result = self.controller.edit(index, draft);
                self.report(result)?;
            }
            Command::Draft(text) => {
                if self.controller.update_draft(text) {
                    self.show()?;
                } else {
                    writeln!(self.output, "! no edit in progress")?;
                }
            }
            Command::Save(index) => {
                let result = self
                    .controller
                    .save_and_regenerate(&self.context, index)
                    .map(drop);
                self.report(result)?;
            }
            Command::Cancel => {
                if self.controller.cancel_edit() {
                    self.show()?;
                } else {
                    writeln!(self.output, "! no edit in progress")?;
                }
            }
            Command::Regenerate(index) => {
                let result = self.controller.regenerate(&self.context, index).map(drop);
                self.report(result)?;
            }
            Command::Clear(index) => {
                let result = self.controller.clear(index);
                self.report(result)?;
            }
            Command::Reset => {
                self.controller.clear_session();
                writeln!(self.output, "session cleared")?;
            }
            Command::Copy(index) => match self.controller.turns().get(index) {
                Some(turn) => writeln!(self.output, "{}", transcript::turn_text(turn))?,
                None => writeln!(self.output, "! no turn at index {index}")?,
            },
            Command::Export(index) => self.export(index).await?,
            Command::Documents => {
                self.refresh_documents().await?;
                self.list_documents()?;
            }
            Command::KnowledgeBaseStatus => self.knowledge_base_status().await?,
            Command::ClearKnowledgeBase => self.clear_knowledge_base().await?,
            Command::Login { user_id, username } => self.login(user_id, username).await?,
            Command::Logout => self.logout()?,
            Command::Show => self.show()?,
            Command::Help => writeln!(self.output, "{HELP}")?,
            Command::Quit => return Ok(ControlFlow::Break(())),
        }

        Ok(ControlFlow::Continue(()))
    }

    fn greet(&mut self) -> io::Result<()> {
        match self.context.username() {
            Some(username) => writeln!(self.output, "Welcome, {username}")?,
            None if self.context.is_authenticated() => writeln!(self.output, "Welcome")?,
            None => writeln!(
                self.output,
                "! User ID is missing. Sign in with `login <user id>`."
            )?,
        }
        writeln!(self.output, "type `help` for commands")
    }

    fn report(&mut self, result: SessionResult<()>) -> io::Result<()> {
        match result {
            Ok(()) => self.show(),
            Err(error) => {
                tracing::debug!(error = %error, "command rejected");
                writeln!(self.output, "! {error}")
            }
        }
    }

    fn show(&mut self) -> io::Result<()> {
        let editing = self.controller.edit_state();
        for (index, turn) in self.controller.turns().iter().enumerate() {
            let label = match turn.role {
                Role::User => USER_LABEL,
                Role::Assistant => ASSISTANT_LABEL,
            };
            write!(
                self.output,
                "[{index}] {label}: {}",
                transcript::turn_text(turn)
            )?;
            match &editing {
                Some(edit) if edit.index == index => {
                    writeln!(self.output, "  (editing: {})", edit.draft)?
                }
                _ => writeln!(self.output)?,
            }
            if let Some(document_name) = &turn.document_name {
                writeln!(self.output, "    Document: {document_name}")?;
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) -> io::Result<()> {
        while let Ok(event) = self.events.try_recv() {
            let Some(index) = event.index() else {
                if let SessionEvent::DocumentsWarning { message } = event {
                    writeln!(self.output, "! {message}")?;
                }
                continue;
            };
            let Some(turn) = self.controller.turns().get(index) else {
                continue;
            };
            writeln!(
                self.output,
                "[{index}] {ASSISTANT_LABEL}: {}",
                transcript::turn_text(turn)
            )?;
            if let Some(document_name) = &turn.document_name {
                writeln!(self.output, "    Document: {document_name}")?;
            }
        }
        Ok(())
    }

    async fn export(&mut self, index: Option<usize>) -> io::Result<()> {
        let text = match index {
            Some(index) => match self.controller.turns().get(index) {
                Some(turn) => transcript::turn_text(turn).to_string(),
                None => return writeln!(self.output, "! no turn at index {index}"),
            },
            None => transcript::render(self.controller.turns()),
        };

        match tokio::fs::write(&self.export_path, text).await {
            Ok(()) => writeln!(self.output, "exported to {}", self.export_path.display()),
            Err(error) => {
                tracing::warn!(
                    path = %self.export_path.display(),
                    error = %error,
                    "failed to export transcript"
                );
                writeln!(self.output, "! failed to export: {error}")
            }
        }
    }

    async fn refresh_documents(&mut self) -> io::Result<()> {
        let Ok(user_id) = self.context.identity("list-documents") else {
            return Ok(());
        };
        let catalog = fetch_document_catalog(&self.backend, user_id).await;
        self.controller.set_documents(catalog);
        self.drain_events()
    }

    fn list_documents(&mut self) -> io::Result<()> {
        if self.controller.documents().is_empty() {
            return writeln!(self.output, "no documents");
        }
        for document in self.controller.documents() {
            writeln!(self.output, "- {document}")?;
        }
        Ok(())
    }

    async fn knowledge_base_status(&mut self) -> io::Result<()> {
        let user_id = match self.context.identity("check-knowledge-base") {
            Ok(user_id) => user_id,
            Err(error) => return writeln!(self.output, "! {error}"),
        };
        match self.backend.knowledge_base_status(user_id).await {
            Ok(status) if status.is_empty() => writeln!(self.output, "knowledge base is empty"),
            Ok(status) => writeln!(
                self.output,
                "knowledge base holds {} records",
                status.record_count
            ),
            Err(error) => {
                tracing::warn!(error = %error, "knowledge base status failed");
                writeln!(self.output, "! {error}")
            }
        }
    }

    async fn clear_knowledge_base(&mut self) -> io::Result<()> {
        let user_id = match self.context.identity("clear-knowledge-base") {
            Ok(user_id) => user_id,
            Err(error) => return writeln!(self.output, "! {error}"),
        };
        match self.backend.clear_knowledge_base(user_id).await {
            Ok(ClearOutcome::Cleared) => writeln!(self.output, "knowledge base cleared"),
            Ok(ClearOutcome::AlreadyEmpty) => {
                writeln!(self.output, "knowledge base is already empty")
            }
            Err(error) => {
                tracing::warn!(error = %error, "knowledge base clear failed");
                writeln!(self.output, "! {error}")
            }
        }
    }

    async fn login(&mut self, user_id: String, username: Option<String>) -> io::Result<()> {
        let next = Settings {
            user_id,
            username: username.unwrap_or_default(),
            ..(*self.settings.settings()).clone()
        };
        // The identity applies to this run even when persisting it fails.
        self.context = next.session_context();
        if let Err(error) = self.settings.update(next) {
            tracing::warn!(error = %error, "failed to persist sign-in");
            writeln!(self.output, "! {error}")?;
        }
        self.greet()?;
        self.refresh_documents().await
    }

    fn logout(&mut self) -> io::Result<()> {
        let next = Settings {
            user_id: String::new(),
            username: String::new(),
            ..(*self.settings.settings()).clone()
        };
        if let Err(error) = self.settings.update(next) {
            tracing::warn!(error = %error, "failed to persist sign-out");
            writeln!(self.output, "! {error}")?;
        }
        self.context = SessionContext::anonymous();
        self.controller.clear_session();
        self.controller
            .set_documents(DocumentCatalog::from_backend(Vec::new()));
        writeln!(self.output, "signed out")
    }
}
