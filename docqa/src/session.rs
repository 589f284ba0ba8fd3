use std::{io, path::Path, sync::Arc};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    index::{BuildError, Distance, VectorIndex},
    loader::{LoadError, Loader},
    process_query,
    provider::{Embedder, Generator},
    splitter::split_documents,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Ingesting,
    Ready,
    AwaitingQuery,
    Answering,
    Exited,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl IngestError {
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Load(LoadError::Encrypted(_)) => {
                Some("Hint: The PDF might be password-protected.".to_string())
            }
            Self::Load(_) => None,
            Self::Build(err) => err.hint(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Empty,
    Query(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();

        if line.is_empty() {
            Self::Empty
        } else if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            Self::Quit
        } else {
            Self::Query(line.to_string())
        }
    }
}

/// One ingestion followed by an interactive question loop.
pub struct Session {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Option<VectorIndex>,
    distance: Distance,
    top_k: usize,
    ask_for_k: bool,
    state: State,
}

impl Session {
    #[must_use]
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            generator,
            index: None,
            distance: config.distance,
            top_k: config.top_k,
            ask_for_k: config.ask_for_k,
            state: State::Ingesting,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Loads, splits and embeds everything under `path`, returning the number of indexed chunks.
    ///
    /// # Errors
    ///
    /// Any failure leaves the session without an index in the `Exited` state.
    pub async fn ingest(&mut self, path: &Path, loader: &Loader) -> Result<usize, IngestError> {
        let result = self.build_index(path, loader).await;

        match result {
            Ok(index) => {
                let len = index.len();
                self.index = Some(index);
                self.state = State::Ready;

                Ok(len)
            }
            Err(err) => {
                self.state = State::Exited;
                Err(err)
            }
        }
    }

    async fn build_index(&self, path: &Path, loader: &Loader) -> Result<VectorIndex, IngestError> {
        let documents = loader.load(path)?;
        let chunks = split_documents(documents);

        Ok(VectorIndex::build(chunks, self.embedder.as_ref(), self.distance).await?)
    }

    /// Answers questions read from `input` until the user quits or input ends.
    /// Does nothing unless ingestion succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `output` fails.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if self.state != State::Ready {
            debug!("Not ready to answer questions ({:?})", self.state);
            return Ok(());
        }

        output
            .write_all(
                b"\n--- RAG CLI Ready ---\nAsk questions about the documents. Type 'quit' or 'exit' to stop.\n",
            )
            .await?;

        let mut lines = input.lines();
        self.state = State::AwaitingQuery;

        while self.state == State::AwaitingQuery {
            let Some(line) = prompt(&mut lines, &mut output, "\nYour Question: ").await? else {
                self.state = State::Exited;
                break;
            };

            let query = match Input::parse(&line) {
                Input::Quit => {
                    self.state = State::Exited;
                    break;
                }
                Input::Empty => continue,
                Input::Query(query) => query,
            };

            let k = if self.ask_for_k {
                let question = format!("Number of chunks to retrieve [{}]: ", self.top_k);
                let Some(line) = prompt(&mut lines, &mut output, &question).await? else {
                    self.state = State::Exited;
                    break;
                };

                self.parse_k(&line)
            } else {
                self.top_k
            };

            self.state = State::Answering;
            let answer = process_query(
                self.embedder.as_ref(),
                self.generator.as_ref(),
                self.index.as_ref(),
                &query,
                k,
            )
            .await;

            output
                .write_all(format!("\nAnswer:\n{answer}\n").as_bytes())
                .await?;
            output.flush().await?;
            self.state = State::AwaitingQuery;
        }

        info!("Session ended");

        Ok(())
    }

    fn parse_k(&self, line: &str) -> usize {
        let line = line.trim();

        if line.is_empty() {
            return self.top_k;
        }

        line.parse().unwrap_or_else(|_| {
            warn!("Invalid number of chunks '{line}', using {}", self.top_k);
            self.top_k
        })
    }
}

/// Writes `question` and reads one line. `None` means the input is exhausted or unreadable.
async fn prompt<R, W>(lines: &mut Lines<R>, output: &mut W, question: &str) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(question.as_bytes()).await?;
    output.flush().await?;

    match lines.next_line().await {
        Ok(line) => Ok(line),
        Err(err) => {
            error!("Failed to read input: {err}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Provider, provider::ServiceError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        async fn embed_query(&self, _: &str) -> Result<Vec<f32>, ServiceError> {
            Ok(vec![1.0, 0.0])
        }

        fn model(&self) -> &str {
            "constant"
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("42".to_string())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    async fn ready_session(text: &str, ask_for_k: bool) -> (Session, Arc<RecordingGenerator>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, text).unwrap();

        let mut config = Config::new(Provider::Gemini, "test");
        config.ask_for_k = ask_for_k;

        let generator = Arc::new(RecordingGenerator::default());
        let mut session = Session::new(&config, Arc::new(ConstantEmbedder), generator.clone());
        session.ingest(&path, &Loader::default()).await.unwrap();

        (session, generator)
    }

    async fn run(session: &mut Session, input: &str) -> String {
        let mut output = Vec::new();
        session.run(input.as_bytes(), &mut output).await.unwrap();

        String::from_utf8(output).unwrap()
    }

    #[test]
    fn should_parse_input() {
        assert_eq!(Input::parse("  QUIT "), Input::Quit);
        assert_eq!(Input::parse("Exit"), Input::Quit);
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(
            Input::parse(" why? "),
            Input::Query("why?".to_string())
        );
    }

    #[tokio::test]
    async fn should_become_ready_after_ingestion() {
        // When
        let (session, _) = ready_session("Some facts.", true).await;

        // Then
        assert_eq!(session.state(), State::Ready);
        assert_eq!(session.index().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_exit_on_quit() {
        // Given
        let (mut session, generator) = ready_session("Some facts.", true).await;

        // When
        let output = run(&mut session, "\n\nquit\nignored question\n").await;

        // Then
        assert_eq!(session.state(), State::Exited);
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert_eq!(output.matches("Your Question: ").count(), 3);
    }

    #[tokio::test]
    async fn should_exit_on_end_of_input() {
        // Given
        let (mut session, _) = ready_session("Some facts.", false).await;

        // When
        let output = run(&mut session, "").await;

        // Then
        assert_eq!(session.state(), State::Exited);
        assert!(output.contains("--- RAG CLI Ready ---"));
    }

    #[tokio::test]
    async fn should_answer_until_exit() {
        // Given
        let (mut session, generator) = ready_session("Some facts.", true).await;

        // When
        let output = run(&mut session, "first?\n\nsecond?\n2\nexit\n").await;

        // Then
        assert_eq!(output.matches("\nAnswer:\n42\n").count(), 2);
        assert_eq!(output.matches("Number of chunks to retrieve [4]: ").count(), 2);
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
        assert_eq!(session.state(), State::Exited);
    }

    #[tokio::test]
    async fn should_skip_the_k_prompt_when_disabled() {
        // Given
        let (mut session, _) = ready_session("Some facts.", false).await;

        // When
        let output = run(&mut session, "question?\nquit\n").await;

        // Then
        assert!(!output.contains("Number of chunks"));
        assert!(output.contains("\nAnswer:\n42\n"));
    }

    #[tokio::test]
    async fn should_fall_back_to_default_k() {
        // Given
        let (session, _) = ready_session("Some facts.", true).await;

        // Then
        assert_eq!(session.parse_k(""), 4);
        assert_eq!(session.parse_k(" 9 "), 9);
        assert_eq!(session.parse_k("lots"), 4);
        assert_eq!(session.parse_k("0"), 0);
    }

    #[tokio::test]
    async fn should_not_run_without_an_index() {
        // Given
        let config = Config::new(Provider::Gemini, "test");
        let mut session = Session::new(
            &config,
            Arc::new(ConstantEmbedder),
            Arc::new(RecordingGenerator::default()),
        );

        // When
        let result = session
            .ingest(Path::new("/definitely/not/here"), &Loader::default())
            .await;
        let output = run(&mut session, "question?\n").await;

        // Then
        assert!(matches!(result, Err(IngestError::Load(LoadError::NotFound(_)))));
        assert_eq!(session.state(), State::Exited);
        assert!(output.is_empty());
    }
}
