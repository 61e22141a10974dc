use std::sync::Arc;

use crate::client::QueryBackend;
use crate::context::SystemContext;
use crate::error::SessionError;

/// The three prompt shapes the session sends: ask, explain, refine.
///
/// Holds the backend and the startup context snapshot; both are immutable
/// for the life of the session.
pub struct Assistant {
    backend: Arc<dyn QueryBackend>,
    system: SystemContext,
}

impl Assistant {
    pub fn new(backend: Arc<dyn QueryBackend>, system: SystemContext) -> Self {
        Self { backend, system }
    }

    pub async fn ask(&self, question: &str, context: &str) -> Result<String, SessionError> {
        let system = self.query_prompt(question);
        let user = with_context(question, "Attached Context", context);
        tracing::info!(chars = question.len(), context = context.len(), "dispatching query");
        Ok(self.backend.query(&system, &user).await?)
    }

    pub async fn explain(&self, command: &str, context: &str) -> Result<String, SessionError> {
        let system = "You are a helpful assistant explaining Linux commands. Be concise.";
        let user = with_context(
            &format!("Explain the following command briefly: '{command}'"),
            "Context",
            context,
        );
        tracing::info!("dispatching explain");
        Ok(self.backend.query(system, &user).await?)
    }

    pub async fn refine(
        &self,
        question: &str,
        command: &str,
        refinement: &str,
        context: &str,
    ) -> Result<String, SessionError> {
        let system = self.refine_prompt();
        let request = format!(
            "Original Request: '{question}'. Original Command: '{command}'. \
             Refinement Request: '{refinement}'.\n\
             Return the updated command inside a markdown code block:\n\
             ```bash\nnew command\n```\n\
             You may explain the change briefly if needed."
        );
        let user = with_context(&request, "Context", context);
        tracing::info!("dispatching refine");
        Ok(self.backend.query(&system, &user).await?)
    }

    fn query_prompt(&self, question: &str) -> String {
        let ctx = &self.system;
        let mut prompt = format!(
            "You are a command line helper for {} running {} shell. Your user asks: '{question}'.\n\
             If the user asks for a command, provide it inside a markdown code block, like:\n\
             ```bash\ncommand here\n```\n\
             You can also provide a brief explanation outside the block. \
             If the user asks a question, answer it normally.",
            ctx.distro, ctx.shell
        );
        if !ctx.package_manager.is_empty() && ctx.package_manager != "unknown" {
            prompt.push_str(&format!("\nThe package manager is {}.", ctx.package_manager));
        }
        push_preferences(&mut prompt, ctx);
        prompt
    }

    fn refine_prompt(&self) -> String {
        let mut prompt = format!(
            "You are a command line helper for {}. Update the command based on user request.",
            self.system.distro
        );
        push_preferences(&mut prompt, &self.system);
        prompt
    }
}

fn push_preferences(prompt: &mut String, ctx: &SystemContext) {
    if ctx.preferences.is_empty() {
        return;
    }
    prompt.push_str("\nUser preferences:");
    for (key, value) in &ctx.preferences {
        prompt.push_str(&format!("\n- {key}: {value}"));
    }
}

fn with_context(text: &str, heading: &str, context: &str) -> String {
    if context.is_empty() {
        text.to_string()
    } else {
        format!("{text}\n\n{heading}:\n{context}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl QueryBackend for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn query(&self, system: &str, user: &str) -> Result<String, QueryError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok("ok".to_string())
        }
    }

    fn assistant(backend: Arc<Recorder>) -> Assistant {
        let system = SystemContext {
            os: "linux".to_string(),
            distro: "Arch Linux".to_string(),
            shell: "zsh".to_string(),
            package_manager: "pacman".to_string(),
            clipboard: None,
            preferences: vec![("editor".to_string(), "vim".to_string())],
        };
        Assistant::new(backend, system)
    }

    #[tokio::test]
    async fn test_ask_composes_system_prompt() {
        let backend = Arc::new(Recorder::default());
        let a = assistant(backend.clone());
        a.ask("list files", "").await.unwrap();

        let calls = backend.calls.lock().unwrap();
        let (system, user) = &calls[0];
        assert!(system.contains("Arch Linux running zsh shell"));
        assert!(system.contains("Your user asks: 'list files'"));
        assert!(system.contains("pacman"));
        assert!(system.contains("- editor: vim"));
        assert_eq!(user, "list files");
    }

    #[tokio::test]
    async fn test_context_is_appended_under_heading() {
        let backend = Arc::new(Recorder::default());
        let a = assistant(backend.clone());
        a.ask("what is this", "\n--- File: a.txt ---\nhello\n").await.unwrap();
        a.explain("ls -la", "ctx").await.unwrap();

        let calls = backend.calls.lock().unwrap();
        assert!(calls[0].1.starts_with("what is this\n\nAttached Context:\n"));
        assert!(calls[0].1.contains("--- File: a.txt ---"));
        assert_eq!(calls[1].1, "Explain the following command briefly: 'ls -la'\n\nContext:\nctx");
    }

    #[tokio::test]
    async fn test_refine_carries_question_and_command() {
        let backend = Arc::new(Recorder::default());
        let a = assistant(backend.clone());
        a.refine("list files", "ls -la", "only directories", "").await.unwrap();

        let calls = backend.calls.lock().unwrap();
        let (system, user) = &calls[0];
        assert!(system.starts_with("You are a command line helper for Arch Linux."));
        assert!(user.starts_with(
            "Original Request: 'list files'. Original Command: 'ls -la'. \
             Refinement Request: 'only directories'."
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_query_failed() {
        struct Down;

        #[async_trait]
        impl QueryBackend for Down {
            fn name(&self) -> &str {
                "down"
            }
            async fn query(&self, _: &str, _: &str) -> Result<String, QueryError> {
                Err(QueryError::Empty("down"))
            }
        }

        let a = Assistant::new(Arc::new(Down), SystemContext::default());
        let err = a.ask("x", "").await.unwrap_err();
        assert!(matches!(err, SessionError::QueryFailed(_)));
    }
}
