use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use studio_contracts::chat::{
    encode_log, parse_command, ChatEntry, ChatLog, ChatStore, ComposerCommand, JsonFileChatStore,
    CHAT_HELP_COMMANDS,
};
use studio_contracts::events::EventWriter;
use studio_contracts::generation::Style;
use studio_contracts::ids;
use studio_engine::mock::{DEFAULT_FAILURE_RATE, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use studio_engine::{
    GenerationService, HttpGenerationClient, MockBehavior, MockGenerationService, Phase,
    RequestController, Resolution, Settings, UploadedImage,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "studio", version, about = "AI Studio image generation playground")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the mock generation endpoint.
    Serve(ServeArgs),
    /// Send one generation request.
    Generate(GenerateArgs),
    /// Interactive composer.
    Chat(ChatArgs),
    /// Print the stored chat log.
    History(HistoryArgs),
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long, default_value_t = DEFAULT_MIN_DELAY_MS)]
    min_delay_ms: u64,
    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_MS)]
    max_delay_ms: u64,
    #[arg(long)]
    failure_rate: Option<f64>,
}

#[derive(Debug, Parser)]
struct BackendArgs {
    /// Generation endpoint URL.
    #[arg(long, conflicts_with = "offline")]
    endpoint: Option<String>,
    /// Use the in-process mock instead of an endpoint.
    #[arg(long)]
    offline: bool,
    #[arg(long)]
    history: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    style: Style,
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    backend: BackendArgs,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[arg(long)]
    history: Option<PathBuf>,
    /// Print the raw stored JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

const EXIT_FAILED: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    init_tracing(&settings, cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async move {
        match cli.command {
            Command::Serve(args) => run_serve(&settings, args).await,
            Command::Generate(args) => run_generate(&settings, args).await,
            Command::Chat(args) => run_chat(&settings, args).await,
            Command::History(args) => run_history(&settings, args),
        }
    })
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run_serve(settings: &Settings, args: ServeArgs) -> Result<i32> {
    let config = settings.server(args.host, args.port)?;
    let behavior = MockBehavior {
        min_delay: std::time::Duration::from_millis(args.min_delay_ms),
        max_delay: std::time::Duration::from_millis(args.max_delay_ms),
        failure_rate: settings.failure_rate(args.failure_rate, DEFAULT_FAILURE_RATE)?,
    };
    let service = Arc::new(MockGenerationService::new(behavior));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(shutdown.clone()));

    println!(
        "Mock endpoint on http://{}{} (Ctrl+C to stop)",
        config.bind_addr(),
        studio_contracts::generation::GENERATE_PATH
    );
    studio_engine::server::serve(&config, service, shutdown).await?;
    Ok(0)
}

async fn run_generate(settings: &Settings, args: GenerateArgs) -> Result<i32> {
    let service = build_service(settings, &args.backend)?;
    let mut controller = build_controller(settings, &args.backend)?;

    let upload = UploadedImage::from_path(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    controller
        .attach_image(&upload)
        .with_context(|| format!("failed to prepare {}", args.image.display()))?;
    controller.set_prompt(args.prompt);
    controller.set_style(Some(args.style));

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(stop.clone()));

    eprintln!("Generating with {} backend...", service.name());
    let resolution = controller.generate(service.as_ref(), &stop).await?;
    print_resolution(&resolution, &controller);
    Ok(match resolution {
        Resolution::Succeeded(_) => 0,
        Resolution::Failed(_) => EXIT_FAILED,
        Resolution::Cancelled => EXIT_CANCELLED,
    })
}

async fn run_chat(settings: &Settings, args: ChatArgs) -> Result<i32> {
    let service = build_service(settings, &args.backend)?;
    let mut controller = build_controller(settings, &args.backend)?;
    let lines = BufReader::new(tokio::io::stdin()).lines();

    let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });

    println!(
        "AI Studio chat started ({} backend). Type /help for commands.",
        service.name()
    );
    chat_session(&mut controller, service.as_ref(), lines, interrupts).await?;
    Ok(0)
}

/// Composer loop. An interrupt cancels the request in flight, or ends the
/// session when nothing is pending.
async fn chat_session<S, G, R>(
    controller: &mut RequestController<S>,
    service: &G,
    mut lines: Lines<R>,
    mut interrupts: mpsc::UnboundedReceiver<()>,
) -> Result<()>
where
    S: ChatStore,
    G: GenerationService + ?Sized,
    R: AsyncBufRead + Unpin,
{
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            biased;
            line = lines.next_line() => line?,
            Some(()) = interrupts.recv() => {
                println!();
                debug!("interrupt at idle prompt; leaving chat");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        match parse_command(&line) {
            ComposerCommand::Noop => {}
            ComposerCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Plain text sets the prompt.");
            }
            ComposerCommand::AttachImage { path } => {
                if path.is_empty() {
                    println!("/image requires a path");
                    continue;
                }
                match UploadedImage::from_path(Path::new(&path)) {
                    Ok(upload) => match controller.attach_image(&upload) {
                        Ok(prepared) => println!(
                            "Image selected ({}x{}, from {}x{})",
                            prepared.width,
                            prepared.height,
                            prepared.source_width,
                            prepared.source_height
                        ),
                        Err(err) => println!("Error: {err}"),
                    },
                    Err(err) => println!("Error: {err}"),
                }
            }
            ComposerCommand::RemoveImage => {
                if controller.remove_image() {
                    println!("Image removed");
                } else {
                    println!("No image selected");
                }
            }
            ComposerCommand::SetStyle { style } => {
                if style.trim().is_empty() {
                    controller.set_style(None);
                    println!("Style cleared");
                    continue;
                }
                match style.parse::<Style>() {
                    Ok(style) => {
                        controller.set_style(Some(style));
                        println!("Style set to {style}");
                    }
                    Err(err) => println!(
                        "{err}. Choose one of: {}",
                        Style::ALL.map(|style| style.as_str()).join(", ")
                    ),
                }
            }
            ComposerCommand::SetPrompt { prompt } => {
                controller.set_prompt(prompt.trim());
                println!("Prompt set");
            }
            ComposerCommand::Generate => {
                let submission = match controller.submit() {
                    Ok(submission) => submission,
                    Err(err) => {
                        println!("Cannot generate: {err}");
                        continue;
                    }
                };
                println!("Generating... type /stop or press Ctrl+C to cancel");

                let run = submission.run(service);
                tokio::pin!(run);
                let resolution = loop {
                    tokio::select! {
                        biased;
                        resolution = &mut run => break resolution,
                        Some(()) = interrupts.recv() => {
                            controller.cancel();
                        }
                        line = lines.next_line() => match line? {
                            Some(line) if parse_command(&line) == ComposerCommand::Stop => {
                                controller.cancel();
                            }
                            Some(_) => println!("A request is in progress; /stop to cancel."),
                            None => {
                                controller.cancel();
                            }
                        },
                    }
                };
                controller.resolve(submission.request_id(), resolution.clone());
                print_resolution(&resolution, controller);
            }
            ComposerCommand::Stop => {
                if !controller.cancel() {
                    println!("Nothing to stop");
                }
            }
            ComposerCommand::History => print_log(controller.chat()),
            ComposerCommand::Status => print_status(controller),
            ComposerCommand::Quit => break,
            ComposerCommand::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}

fn run_history(settings: &Settings, args: HistoryArgs) -> Result<i32> {
    let path = settings.history_path(args.history)?;
    let log = JsonFileChatStore::new(&path).load();
    if args.json {
        println!("{}", encode_log(&log)?);
    } else if log.is_empty() {
        println!("No history at {}", path.display());
    } else {
        print_log(&log);
    }
    Ok(0)
}

fn build_service(settings: &Settings, args: &BackendArgs) -> Result<Box<dyn GenerationService>> {
    if args.offline {
        return Ok(Box::new(MockGenerationService::default()));
    }
    let endpoint = settings.endpoint(args.endpoint.clone());
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        bail!("endpoint must be an http(s) URL (got '{endpoint}')");
    }
    debug!(endpoint = %endpoint, "using http backend");
    Ok(Box::new(HttpGenerationClient::new(endpoint)?))
}

fn build_controller(
    settings: &Settings,
    args: &BackendArgs,
) -> Result<RequestController<JsonFileChatStore>> {
    let history = settings.history_path(args.history.clone())?;
    info!(path = %history.display(), "chat history");
    let controller = RequestController::new(JsonFileChatStore::new(history));
    Ok(match args.events.as_ref() {
        Some(path) => controller.with_events(EventWriter::new(path, ids::request_id())),
        None => controller,
    })
}

async fn cancel_on_shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    debug!("shutdown signal received");
    token.cancel();
}

fn print_resolution<S: ChatStore>(resolution: &Resolution, controller: &RequestController<S>) {
    match resolution {
        Resolution::Succeeded(result) => println!(
            "Generated {} ({}, \"{}\") at {}: {}",
            result.id,
            result.style,
            result.prompt,
            result.created_at,
            describe_image(&result.encoded_image)
        ),
        Resolution::Failed(err) => println!("Error: {err}"),
        Resolution::Cancelled => println!(
            "{}",
            controller
                .notification(Instant::now())
                .unwrap_or(studio_engine::controller::STOPPED_NOTIFICATION)
        ),
    }
}

fn print_status<S: ChatStore>(controller: &RequestController<S>) {
    let phase = match controller.phase() {
        Phase::Idle => "idle",
        Phase::Composing => "composing",
        Phase::Pending => "generating",
    };
    println!("Status: {phase}");
    let summary = controller.live_summary();
    if !summary.is_empty() {
        println!("{summary}");
    }
    if let Some(error) = controller.error() {
        println!("Error: {error}");
    }
    if let Some(note) = controller.notification(Instant::now()) {
        println!("{note}");
    }
    println!("History: {} entries", controller.chat().len());
}

fn print_log(log: &ChatLog) {
    if log.is_empty() {
        println!("(no history)");
        return;
    }
    for entry in log {
        println!("{}", describe_entry(entry));
    }
}

fn describe_entry(entry: &ChatEntry) -> String {
    match entry {
        ChatEntry::User {
            encoded_image,
            created_at,
            ..
        } => format!("[{created_at}] you: {}", describe_image(encoded_image)),
        ChatEntry::Pending { .. } => "assistant: generating...".to_string(),
        ChatEntry::Result { result, .. } => format!(
            "[{}] assistant: {} \"{}\" ({})",
            result.created_at,
            result.style,
            result.prompt,
            describe_image(&result.encoded_image)
        ),
        ChatEntry::Error { error_message, .. } => format!("assistant: error: {error_message}"),
    }
}

fn describe_image(data_url: &str) -> String {
    let media_type = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|value| !value.is_empty())
        .unwrap_or("image");
    format!("{media_type}, {} KiB encoded", data_url.len().div_ceil(1024))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use async_trait::async_trait;
    use clap::Parser;
    use studio_contracts::chat::{ChatEntry, MemoryChatStore};
    use studio_contracts::generation::{GenerationRequest, GenerationResult, Style};
    use studio_engine::controller::STOPPED_NOTIFICATION;
    use studio_engine::{
        GenerationService, MockBehavior, MockGenerationService, Phase, PreparedImage,
        RequestController, ServiceError,
    };
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;

    use super::{chat_session, describe_entry, describe_image, Cli, Command};

    struct StalledService;

    #[async_trait]
    impl GenerationService for StalledService {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult, ServiceError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn interrupt_at_idle_prompt_ends_session() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        let service = MockGenerationService::new(MockBehavior::instant(0.0));
        let (_stdin, reader) = tokio::io::duplex(64);
        let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
        interrupt_tx.send(()).unwrap();

        chat_session(
            &mut controller,
            &service,
            BufReader::new(reader).lines(),
            interrupts,
        )
        .await
        .unwrap();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.chat().is_empty());
    }

    #[tokio::test]
    async fn interrupt_during_generation_cancels_request() {
        let mut controller = RequestController::new(MemoryChatStore::new());
        controller.attach_prepared(PreparedImage {
            data_url: "data:image/jpeg;base64,AAAA".to_string(),
            width: 4,
            height: 4,
            source_width: 4,
            source_height: 4,
        });
        controller.set_prompt("red sneakers");
        controller.set_style(Some(Style::Streetwear));
        let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
        interrupt_tx.send(()).unwrap();

        chat_session(
            &mut controller,
            &StalledService,
            BufReader::new(&b"/generate\n"[..]).lines(),
            interrupts,
        )
        .await
        .unwrap();
        assert_eq!(controller.pending_request_id(), None);
        assert_eq!(controller.chat().len(), 1);
        assert!(matches!(controller.chat().entries()[0], ChatEntry::User { .. }));
        assert_eq!(
            controller.notification(Instant::now()),
            Some(STOPPED_NOTIFICATION)
        );
    }

    #[test]
    fn describe_image_reads_media_type() {
        assert_eq!(
            describe_image("data:image/jpeg;base64,AAAA"),
            "image/jpeg, 1 KiB encoded"
        );
        assert_eq!(describe_image("blob"), "image, 1 KiB encoded");
    }

    #[test]
    fn describe_entry_covers_every_kind() {
        let result = ChatEntry::Result {
            id: "r1".to_string(),
            result: GenerationResult {
                id: "g1".to_string(),
                encoded_image: "data:image/jpeg;base64,AAAA".to_string(),
                prompt: "red sneakers".to_string(),
                style: Style::Streetwear,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        };
        assert_eq!(
            describe_entry(&result),
            "[2026-01-01T00:00:00.000Z] assistant: Streetwear \"red sneakers\" (image/jpeg, 1 KiB encoded)"
        );
        let error = ChatEntry::Error {
            id: "r2".to_string(),
            error_message: "Model overloaded".to_string(),
        };
        assert_eq!(describe_entry(&error), "assistant: error: Model overloaded");
        let pending = ChatEntry::Pending {
            id: "r3".to_string(),
        };
        assert_eq!(describe_entry(&pending), "assistant: generating...");
    }

    #[test]
    fn generate_args_parse_style_case_insensitively() {
        let cli = Cli::try_parse_from([
            "studio", "generate", "--image", "shoe.png", "--prompt", "red sneakers", "--style",
            "streetwear", "--offline",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.style, Style::Streetwear);
                assert!(args.backend.offline);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "studio", "generate", "--image", "a.png", "--prompt", "p", "--style", "Baroque",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "studio", "chat", "--offline", "--endpoint", "http://x/api/generate",
        ])
        .is_err());
    }
}
