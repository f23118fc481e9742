//! Form state, last result, and the single in-flight gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use super::client::CoverGenerator;
use super::models::{
    CoverForm, CoverFormPatch, CoverRequest, FieldIssue, FormField, GenerationResult, TextEcho,
    ValidationError,
};
use super::prompt::PromptBuilder;

/// Why a generation attempt was not started.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("a cover is already being generated")]
    InProgress,
}

#[derive(Debug, Default)]
struct State {
    form: CoverForm,
    result: Option<GenerationResult>,
    /// Bumped by `reset`; attempts started under an older epoch are stale.
    epoch: u64,
}

/// Held for the duration of one attempt; dropping it (completion, panic or
/// a cancelled future) reopens the gate.
struct Attempt<'a> {
    in_flight: &'a AtomicBool,
    epoch: u64,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Everything a form view needs to render.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceView {
    pub form: CoverForm,
    pub echo: TextEcho,
    pub issues: Vec<FieldIssue>,
    pub in_progress: bool,
    pub can_generate: bool,
    pub result: Option<GenerationResult>,
}

/// Owns the form and serializes generation attempts.
///
/// The lock guards state only; it is released before the generator is
/// awaited, so form edits stay possible while an attempt is running.
pub struct CoverWorkspace {
    state: Mutex<State>,
    in_flight: AtomicBool,
    builder: PromptBuilder,
    generator: Arc<dyn CoverGenerator>,
}

impl CoverWorkspace {
    pub fn new(builder: PromptBuilder, generator: Arc<dyn CoverGenerator>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            in_flight: AtomicBool::new(false),
            builder,
            generator,
        }
    }

    pub fn builder(&self) -> &PromptBuilder {
        &self.builder
    }

    pub async fn set_field(&self, field: FormField, value: impl Into<String>) {
        self.state.lock().await.form.set(field, value);
    }

    pub async fn apply(&self, patch: CoverFormPatch) {
        self.state.lock().await.form.apply(patch);
    }

    /// Clear the form and forget the last result. An attempt still running
    /// finishes, but its result is discarded.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.form.reset();
        state.result = None;
        state.epoch += 1;
    }

    pub async fn form(&self) -> CoverForm {
        self.state.lock().await.form.clone()
    }

    pub async fn result(&self) -> Option<GenerationResult> {
        self.state.lock().await.result.clone()
    }

    pub async fn view(&self) -> WorkspaceView {
        let state = self.state.lock().await;
        let in_progress = self.in_flight.load(Ordering::Acquire);
        let issues = match state.form.snapshot() {
            Ok(_) => Vec::new(),
            Err(err) => err.issues,
        };
        WorkspaceView {
            echo: state.form.echo(&self.builder.template().placeholder_author),
            can_generate: issues.is_empty() && !in_progress,
            issues,
            in_progress,
            result: state.result.clone(),
            form: state.form.clone(),
        }
    }

    /// Prompt for the current form, without generating.
    pub async fn preview(&self) -> Result<String, ValidationError> {
        let request = self.state.lock().await.form.snapshot()?;
        Ok(self.builder.build(&request))
    }

    /// Run one attempt with a prompt built from the form as it is now.
    ///
    /// Endpoint failures are not errors here: they come back as
    /// [`GenerationResult::Failed`] and are kept as the current result,
    /// unless the form was reset while the attempt was running.
    pub async fn generate(&self) -> Result<GenerationResult, SubmitError> {
        let (attempt, request) = self.begin().await?;
        let prompt = self.builder.build(&request);

        tracing::info!(
            title_chars = request.title.chars().count(),
            genre = %request.genre,
            "generation attempt started"
        );

        let result = match self.generator.generate(&prompt).await {
            Ok(image_url) => GenerationResult::Image { image_url },
            Err(err) => {
                tracing::warn!(error = %err, "generation attempt failed");
                GenerationResult::Failed {
                    message: err.message,
                }
            }
        };

        let mut state = self.state.lock().await;
        if state.epoch == attempt.epoch {
            state.result = Some(result.clone());
        } else {
            tracing::debug!("form was reset mid-attempt, result discarded");
        }
        drop(attempt);
        Ok(result)
    }

    /// Regenerating is another attempt from the current form.
    pub async fn regenerate(&self) -> Result<GenerationResult, SubmitError> {
        self.generate().await
    }

    async fn begin(&self) -> Result<(Attempt<'_>, CoverRequest), SubmitError> {
        let state = self.state.lock().await;
        if self.in_flight.load(Ordering::Acquire) {
            return Err(SubmitError::InProgress);
        }
        let request = state.form.snapshot()?;
        self.in_flight.store(true, Ordering::Release);
        let attempt = Attempt {
            in_flight: &self.in_flight,
            epoch: state.epoch,
        };
        Ok((attempt, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::covers::client::GenerationError;
    use crate::modules::covers::models::ImageRef;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Scripted generator that records every prompt it receives.
    #[derive(Default)]
    struct FakeGenerator {
        prompts: StdMutex<Vec<String>>,
        replies: StdMutex<Vec<Result<ImageRef, GenerationError>>>,
    }

    impl FakeGenerator {
        fn replying(replies: Vec<Result<ImageRef, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                prompts: StdMutex::new(Vec::new()),
                replies: StdMutex::new(replies),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CoverGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<ImageRef, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies.lock().unwrap().remove(0)
        }
    }

    /// Blocks inside `generate` until released.
    struct GatedGenerator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CoverGenerator for GatedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<ImageRef, GenerationError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ImageRef::new("https://x/gated.png"))
        }
    }

    /// Never answers its first call; later calls succeed.
    #[derive(Default)]
    struct StallingGenerator {
        calls: StdMutex<usize>,
    }

    #[async_trait]
    impl CoverGenerator for StallingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<ImageRef, GenerationError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == 1 {
                std::future::pending::<()>().await;
            }
            Ok(ImageRef::new("https://x/retry.png"))
        }
    }

    struct PanickingGenerator;

    #[async_trait]
    impl CoverGenerator for PanickingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<ImageRef, GenerationError> {
            panic!("generator blew up");
        }
    }

    fn image(url: &str) -> Result<ImageRef, GenerationError> {
        Ok(ImageRef::new(url))
    }

    async fn ready_workspace(generator: Arc<dyn CoverGenerator>) -> CoverWorkspace {
        let workspace = CoverWorkspace::new(PromptBuilder::default(), generator);
        workspace.set_field(FormField::Title, "The Magic Book").await;
        workspace.set_field(FormField::Genre, "Fantasy").await;
        workspace
    }

    #[tokio::test]
    async fn incomplete_form_never_reaches_the_generator() {
        let generator = FakeGenerator::replying(vec![image("https://x/y.png")]);
        let workspace = CoverWorkspace::new(PromptBuilder::default(), generator.clone());
        workspace.set_field(FormField::Genre, "Horror").await;

        let view = workspace.view().await;
        assert!(!view.can_generate);
        assert_eq!(view.issues[0].field, FormField::Title);

        let err = workspace.generate().await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(_)));
        assert!(generator.prompts().is_empty());
        assert!(!workspace.view().await.in_progress);
    }

    #[tokio::test]
    async fn success_stores_image_and_clears_flag() {
        let generator = FakeGenerator::replying(vec![image("https://x/y.png")]);
        let workspace = ready_workspace(generator.clone()).await;

        let result = workspace.generate().await.unwrap();
        assert_eq!(
            result.image().map(ImageRef::as_str),
            Some("https://x/y.png")
        );

        let view = workspace.view().await;
        assert!(!view.in_progress);
        assert!(view.can_generate);
        assert_eq!(view.result, Some(result));
    }

    #[tokio::test]
    async fn endpoint_failure_becomes_failed_result() {
        let generator = FakeGenerator::replying(vec![
            image("https://x/old.png"),
            Err(GenerationError::new("rate limited", Some(500))),
        ]);
        let workspace = ready_workspace(generator).await;
        workspace.generate().await.unwrap();

        let result = workspace.generate().await.unwrap();
        assert_eq!(
            result,
            GenerationResult::Failed {
                message: "rate limited".to_string()
            }
        );
        let view = workspace.view().await;
        assert!(!view.in_progress);
        assert!(view.result.as_ref().and_then(GenerationResult::image).is_none());
    }

    #[tokio::test]
    async fn regenerate_builds_a_fresh_prompt_each_time() {
        let generator = FakeGenerator::replying(vec![
            image("https://x/1.png"),
            image("https://x/2.png"),
        ]);
        let workspace = ready_workspace(generator.clone()).await;

        workspace.generate().await.unwrap();
        workspace.set_field(FormField::Title, "The Magic Book Returns").await;
        workspace.set_field(FormField::Mood, "Whimsical & Fun").await;
        let second = workspace.regenerate().await.unwrap();

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("Returns"));
        assert!(!prompts[0].contains("Mood:"));
        assert!(prompts[1].contains("The Magic Book Returns"));
        assert!(prompts[1].contains("Mood: Whimsical & Fun"));
        assert_eq!(second.image().map(ImageRef::as_str), Some("https://x/2.png"));
    }

    #[tokio::test]
    async fn second_attempt_is_rejected_while_one_is_in_flight() {
        let generator = Arc::new(GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let workspace = Arc::new(ready_workspace(generator.clone()).await);

        let running = tokio::spawn({
            let workspace = workspace.clone();
            async move { workspace.generate().await }
        });
        generator.entered.notified().await;

        let view = workspace.view().await;
        assert!(view.in_progress);
        assert!(!view.can_generate);
        assert!(matches!(
            workspace.generate().await,
            Err(SubmitError::InProgress)
        ));

        // Edits are still accepted mid-flight.
        workspace.set_field(FormField::Author, "Jane Doe").await;

        generator.release.notify_one();
        let result = running.await.unwrap().unwrap();
        assert_eq!(result.image().map(ImageRef::as_str), Some("https://x/gated.png"));
        assert!(!workspace.view().await.in_progress);
        assert_eq!(workspace.form().await.author, "Jane Doe");
    }

    #[tokio::test]
    async fn preview_matches_what_generate_sends() {
        let generator = FakeGenerator::replying(vec![image("https://x/y.png")]);
        let workspace = ready_workspace(generator.clone()).await;

        let preview = workspace.preview().await.unwrap();
        workspace.generate().await.unwrap();
        assert_eq!(generator.prompts(), vec![preview]);
    }

    #[tokio::test]
    async fn reset_clears_form_and_result() {
        let generator = FakeGenerator::replying(vec![image("https://x/y.png")]);
        let workspace = ready_workspace(generator).await;
        workspace.generate().await.unwrap();

        workspace.reset().await;
        let view = workspace.view().await;
        assert_eq!(view.form, CoverForm::default());
        assert!(view.result.is_none());
        assert_eq!(view.echo.author_chars, "[Author Name]".chars().count());
    }

    #[tokio::test]
    async fn cancelled_attempt_reopens_the_gate() {
        let generator = Arc::new(StallingGenerator::default());
        let workspace = ready_workspace(generator).await;

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(50), workspace.generate()).await;
        assert!(timed_out.is_err());

        let view = workspace.view().await;
        assert!(!view.in_progress);
        assert!(view.can_generate);

        let retry = workspace.generate().await.unwrap();
        assert_eq!(retry.image().map(ImageRef::as_str), Some("https://x/retry.png"));
    }

    #[tokio::test]
    async fn panicking_generator_does_not_lock_the_workspace() {
        let workspace = Arc::new(ready_workspace(Arc::new(PanickingGenerator)).await);

        let joined = tokio::spawn({
            let workspace = workspace.clone();
            async move { workspace.generate().await }
        })
        .await;
        assert!(joined.is_err());

        let view = workspace.view().await;
        assert!(!view.in_progress);
        assert!(view.can_generate);
        assert!(view.result.is_none());
    }

    #[tokio::test]
    async fn reset_mid_flight_discards_the_stale_result() {
        let generator = Arc::new(GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let workspace = Arc::new(ready_workspace(generator.clone()).await);

        let running = tokio::spawn({
            let workspace = workspace.clone();
            async move { workspace.generate().await }
        });
        generator.entered.notified().await;

        workspace.reset().await;
        generator.release.notify_one();
        running.await.unwrap().unwrap();

        let view = workspace.view().await;
        assert!(!view.in_progress);
        assert!(view.result.is_none());
        assert_eq!(view.form, CoverForm::default());
    }
}
