//! Command-line relay: stages one media link locally, then delivers it to a
//! directory destination. Exercises the same pipeline the bot drives, with a
//! console transport standing in for the messaging platform.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use console::style;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use media_relay::relay::sanitize_title;
use media_relay::transport::{StatusHandle, TransportFailure};
use media_relay::upload::{Destination, UploadSink, UploadedReference};
use media_relay::{
    AppConfig, Error, ExtractorPool, RelayState, Relayer, Result, SessionStore, Tier,
    TokioFileSystem, TransferError, YtDlpExtractor, select,
};

/// Destination that lands delivered files in a local directory.
struct DirectoryDestination {
    dir: PathBuf,
}

struct FileSink {
    file: tokio::fs::File,
    path: PathBuf,
}

#[async_trait]
impl UploadSink for FileSink {
    async fn write_chunk(&mut self, chunk: Bytes) -> std::result::Result<(), TransferError> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::UploadFailed(e.to_string()))
    }

    async fn finish(mut self: Box<Self>) -> std::result::Result<UploadedReference, TransferError> {
        self.file
            .flush()
            .await
            .map_err(|e| TransferError::UploadFailed(e.to_string()))?;
        Ok(UploadedReference {
            id: self.path.display().to_string(),
        })
    }
}

#[async_trait]
impl Destination for DirectoryDestination {
    async fn begin_upload(
        &self,
        label: &str,
        _byte_total: u64,
    ) -> std::result::Result<Box<dyn UploadSink>, TransferError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TransferError::UploadFailed(e.to_string()))?;
        let path = self.dir.join(sanitize_title(label));
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| TransferError::UploadFailed(e.to_string()))?;
        Ok(Box::new(FileSink { file, path }))
    }
}

/// Status display backed by an indicatif spinner.
struct ConsoleStatus {
    bar: ProgressBar,
}

impl ConsoleStatus {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

#[async_trait]
impl StatusHandle for ConsoleStatus {
    async fn edit(&self, text: &str) -> std::result::Result<(), TransportFailure> {
        self.bar.set_message(text.replace('\n', " \u{b7} "));
        Ok(())
    }

    async fn delete(&self) -> std::result::Result<(), TransportFailure> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

fn usage() -> ! {
    eprintln!("usage: relay <media-url> [output-dir]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = AppConfig::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(link) = args.first().cloned() else {
        usage();
    };
    let out_dir = args.get(1).map_or_else(|| PathBuf::from("."), PathBuf::from);

    if !media_relay::url::is_media_link(&link) {
        eprintln!("{link} does not look like a supported media link");
        std::process::exit(2);
    }

    // Background liveness probe, same as the hosted deployment.
    let api = config.api.clone();
    tokio::spawn(async move {
        if let Err(e) = media_relay::api::serve(&api.host, api.port).await {
            log::warn!("liveness endpoint down: {e}");
        }
    });

    let pool = ExtractorPool::new(
        Arc::new(YtDlpExtractor::new(
            config.extractor_bin(),
            config.relay.user_agent.clone(),
            config.relay.cookie_header.clone(),
        )),
        config.relay.max_concurrent_extractions,
    );

    println!("{}", style("Reading media info\u{2026}").cyan());
    let info = pool.extract(&link).await?;
    let renditions = select(&info.formats);
    if renditions.is_empty() {
        return Err(Error::NoUsableRendition);
    }
    let media = info.reference();

    println!("{}", style(&media.title).bold());
    for (tier, rendition) in &renditions {
        let audio = if rendition.has_audio { "with audio" } else { "silent" };
        println!("  {tier}  .{} ({audio})", rendition.extension);
    }

    let tier = prompt_tier()?;
    let store = Arc::new(SessionStore::new());
    let key = store.open(0, media, renditions);

    let relayer = Relayer::new(
        reqwest::Client::new(),
        Arc::new(TokioFileSystem::new()),
        Arc::clone(&store),
        config.relay.download_options(),
        config.relay.download_dir.clone(),
    );
    let destination = DirectoryDestination { dir: out_dir };
    let status = ConsoleStatus::new();

    let state = relayer
        .run(0, &key, tier, &destination, &status, &CancellationToken::new())
        .await;

    match state {
        RelayState::Done => {
            println!("{}", style("Delivered.").green());
            Ok(())
        }
        _ => std::process::exit(1),
    }
}

fn prompt_tier() -> Result<Tier> {
    let term = console::Term::stdout();
    term.write_str("Pick a tier (360/480/720): ")
        .map_err(Error::Io)?;
    let choice = term.read_line().map_err(Error::Io)?;
    choice
        .trim()
        .parse()
        .map_err(|()| Error::Config(format!("unknown tier {:?}", choice.trim())))
}
