//! docchat - ask questions about a document from the terminal
//!
//! Reads one question per line from stdin and prints the answer as it
//! streams in. `/context` prints the retrieved context, `/quit` or EOF
//! exits, Ctrl-C cancels the answer in progress.

use clap::Parser;
use docchat::config::ChatConfig;
use docchat::document::{save_document, DocumentSource, HttpDocumentSource};
use docchat::runtime::{spawn_conversation, ChatHandle, HandleError, HttpTransport};
use docchat::state_machine::ConversationView;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "docchat", version, about = "Chat with a document over a streaming endpoint")]
struct Cli {
    /// Identifier of the document to chat about
    document_id: String,

    /// Download the document to this path before chatting
    #[arg(long, value_name = "PATH")]
    save_document: Option<PathBuf>,

    /// Print the retrieved context after every answer
    #[arg(long)]
    show_context: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = ChatConfig::from_env();
    tracing::info!(
        document_id = %cli.document_id,
        chat_endpoint = %config.chat_endpoint,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Starting docchat"
    );
    if config.credentials.session_cookie.is_none() && config.credentials.bearer_token.is_none() {
        tracing::warn!("No credentials configured. Set DOCCHAT_SESSION_COOKIE or DOCCHAT_BEARER_TOKEN.");
    }

    if let Some(path) = &cli.save_document {
        let source = HttpDocumentSource::new(&config)?;
        let bytes = source.fetch(&cli.document_id).await?;
        save_document(path, &bytes).await?;
    }

    let transport = HttpTransport::new(&config)?;
    let (handle, task) = spawn_conversation(&cli.document_id, transport, config.turn_settings());

    let result = repl(&handle, cli.show_context).await;

    handle.close();
    task.await?;
    tracing::info!("Conversation closed");
    result
}

async fn repl(handle: &ChatHandle, show_context: bool) -> Result<(), BoxError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            result = tokio::signal::ctrl_c() => {
                result?;
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/context" => print_context(&handle.view().context_text).await?,
            question => match handle.submit(question).await {
                Ok(_) => follow_turn(handle, show_context).await?,
                Err(HandleError::Rejected(e)) => eprintln!("{e}"),
                Err(HandleError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// What a turn view shows that has not been printed yet
#[derive(Debug, Default)]
struct Progress {
    fresh: String,
    finished: bool,
    context: Option<String>,
}

fn take_progress(
    views: &mut watch::Receiver<ConversationView>,
    printed: usize,
    show_context: bool,
) -> Progress {
    let view = views.borrow_and_update();
    let finished = view.turn_state.is_terminal();
    if let Some(note) = view.diagnostics.note.as_ref().filter(|_| finished) {
        tracing::debug!(note = %note, "Turn note");
    }
    Progress {
        fresh: view
            .last_answer()
            .and_then(|a| a.get(printed..))
            .unwrap_or_default()
            .to_string(),
        finished,
        context: (finished && show_context).then(|| view.context_text.clone()),
    }
}

/// Print the answer as it grows until the turn ends
async fn follow_turn(handle: &ChatHandle, show_context: bool) -> Result<(), BoxError> {
    let mut views = handle.subscribe();
    let mut stdout = tokio::io::stdout();
    let mut printed = 0;
    let mut cancelled = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut progress = take_progress(&mut views, printed, show_context);
    loop {
        if !progress.fresh.is_empty() {
            stdout.write_all(progress.fresh.as_bytes()).await?;
            stdout.flush().await?;
            printed += progress.fresh.len();
        }
        if progress.finished {
            stdout.write_all(b"\n").await?;
            if let Some(context) = &progress.context {
                print_context(context).await?;
            }
            handle.acknowledge().await?;
            break;
        }

        tokio::select! {
            result = &mut ctrl_c, if !cancelled => {
                result?;
                cancelled = true;
                handle.cancel().await?;
                progress = Progress::default();
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                progress = take_progress(&mut views, printed, show_context);
            }
        }
    }
    Ok(())
}

async fn print_context(context: &str) -> Result<(), BoxError> {
    let mut stdout = tokio::io::stdout();
    let text = if context.is_empty() {
        "(no context retrieved)"
    } else {
        context
    };
    stdout.write_all(format!("--- context ---\n{text}\n---------------\n").as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
