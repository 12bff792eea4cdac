pub mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use highlight_gateway::{GatewayConfig, HttpGateway, DEFAULT_BASE_URL};
use highlight_model::{
    Comment, Content, DocumentRef, Highlight, HighlightId, NewHighlight, Position, ScaledRect,
};
use highlight_server::ServerConfig;
use highlight_sync::{Dispatcher, HighlightGateway, HighlightSession, SyncStatus};
use std::cell::RefCell;
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use crate::logging::{init_logging, LogConfig};

#[derive(Debug, Parser)]
#[command(name = "highlighter")]
#[command(about = "PDF highlight server and client")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Base URL of the highlight server.
    #[arg(long, env = "HIGHLIGHTER_SERVER", default_value = DEFAULT_BASE_URL, global = true)]
    server: String,

    /// Seconds to wait for each server request.
    #[arg(long, default_value_t = 10, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the highlight server.
    Serve(ServeArgs),
    /// List the documents the server offers.
    Documents,
    /// Print the highlights stored for a document.
    List {
        /// File name under the server's /pdf route, or a full document URL.
        #[arg(value_name = "DOCUMENT")]
        document: String,
        /// Print the raw JSON records.
        #[arg(long)]
        json: bool,
    },
    /// Highlight a region of a document.
    Add(AddArgs),
    /// Delete a highlight by id.
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Open a document and scroll to the highlight named by a fragment.
    Open {
        #[arg(value_name = "DOCUMENT")]
        document: String,
        /// Fragment of a shared link, e.g. `#highlight-<id>`.
        #[arg(long)]
        fragment: String,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, env = "HIGHLIGHTER_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
    #[arg(long, env = "HIGHLIGHTER_DB", default_value = "highlights.db")]
    db: PathBuf,
    #[arg(long, env = "HIGHLIGHTER_PDF_DIR", default_value = "pdf")]
    pdf_dir: PathBuf,
    #[arg(long, env = "HIGHLIGHTER_CORS_ORIGIN", default_value = highlight_server::config::DEFAULT_CORS_ORIGIN)]
    cors_origin: String,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(value_name = "DOCUMENT")]
    document: String,
    /// Selected text; makes a text highlight.
    #[arg(long, conflicts_with = "image", required_unless_present = "image")]
    text: Option<String>,
    /// Screenshot data URL; makes an area highlight.
    #[arg(long)]
    image: Option<String>,
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Selected region as `x1,y1,x2,y2` in page coordinates.
    #[arg(long, value_parser = parse_rect)]
    rect: [f64; 4],
    /// Page size the region was measured against, as `width,height`.
    #[arg(long, default_value = "612,792", value_parser = parse_size)]
    page_size: [f64; 2],
    #[arg(long, default_value = "")]
    comment: String,
    #[arg(long, default_value = "")]
    emoji: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(&LogConfig::from_verbosity(cli.verbose)).context("failed to initialize logging")?;

    let gateway_config = GatewayConfig::default()
        .with_base_url(&cli.server)
        .with_timeout(Duration::from_secs(cli.timeout));

    match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Documents => run_documents(&HttpGateway::new(gateway_config)),
        Commands::List { document, json } => run_list(&HttpGateway::new(gateway_config), &document, json),
        Commands::Add(args) => run_add(gateway_config, args),
        Commands::Delete { id } => run_delete(&HttpGateway::new(gateway_config), &id),
        Commands::Open { document, fragment } => run_open(gateway_config, &document, &fragment),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::default()
        .with_bind(args.bind)
        .with_database(&args.db)
        .with_pdf_dir(&args.pdf_dir)
        .with_cors_origin(args.cors_origin);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    eprintln!("serving highlights on http://{}", config.bind);
    runtime.block_on(highlight_server::serve(config)).context("highlight server failed")
}

fn run_documents(gateway: &HttpGateway) -> Result<()> {
    let documents = gateway.list_documents().context("failed to list documents")?;
    for document in documents {
        println!("{document}");
    }
    Ok(())
}

fn run_list(gateway: &HttpGateway, document: &str, json: bool) -> Result<()> {
    let document = document_ref(gateway, document);
    let highlights = gateway
        .list_for_document(&document)
        .with_context(|| format!("failed to list highlights of {document}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&highlights)?);
        return Ok(());
    }

    for highlight in &highlights {
        println!("{}", summary_line(highlight));
    }
    Ok(())
}

fn run_add(config: GatewayConfig, args: AddArgs) -> Result<()> {
    let wait = config.timeout * 2;
    let gateway = HttpGateway::new(config);
    let document = document_ref(&gateway, &args.document);

    let [x1, y1, x2, y2] = args.rect;
    let [width, height] = args.page_size;
    let rect = ScaledRect { x1, y1, x2, y2, width, height };
    let content = match (args.text, args.image) {
        (Some(text), _) => Content::text(text),
        (None, Some(image)) => Content::image(image),
        (None, None) => bail!("either --text or --image is required"),
    };

    let mut session = HighlightSession::new(Dispatcher::spawn(gateway)?);
    session.set_active_document(document);
    if !session.wait_idle(wait) {
        bail!("timed out loading highlights");
    }

    let id = session.add_highlight(NewHighlight {
        position: Position { bounding_rect: rect, rects: vec![rect], page_number: args.page },
        content,
        comment: Comment::new(args.comment, args.emoji),
    })?;
    if !session.wait_idle(wait) {
        bail!("timed out saving highlight {id}");
    }

    match session.store().get(&id).map(|entry| entry.status()) {
        Some(SyncStatus::Confirmed) => {
            println!("{id}");
            Ok(())
        }
        _ => bail!("server did not store highlight {id}"),
    }
}

fn run_delete(gateway: &HttpGateway, id: &str) -> Result<()> {
    let success = gateway
        .delete(&HighlightId::new(id))
        .with_context(|| format!("failed to delete highlight {id}"))?;
    if !success {
        bail!("server did not confirm deleting {id}");
    }

    println!("deleted {id}");
    Ok(())
}

fn run_open(config: GatewayConfig, document: &str, fragment: &str) -> Result<()> {
    let wait = config.timeout * 2;
    let gateway = HttpGateway::new(config);
    let document = document_ref(&gateway, document);

    let scrolled: Rc<RefCell<Option<Highlight>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&scrolled);

    let mut session = HighlightSession::new(Dispatcher::spawn(gateway)?);
    session.register_scroll(move |highlight: &Highlight| {
        *sink.borrow_mut() = Some(highlight.clone());
    });
    session.set_active_document(document.clone());
    session.on_fragment_changed(fragment);

    if !session.wait_idle(wait) {
        bail!("timed out loading highlights of {document}");
    }

    let Some(highlight) = scrolled.borrow_mut().take() else {
        bail!("no highlight matches fragment {fragment:?} in {document}");
    };

    println!("{}", session.fragment());
    println!("{}", summary_line(&highlight));
    Ok(())
}

/// A bare file name refers to the server's document directory.
fn document_ref(gateway: &HttpGateway, document: &str) -> DocumentRef {
    if document.contains("://") {
        DocumentRef::new(document)
    } else {
        gateway.document_ref(document)
    }
}

fn summary_line(highlight: &Highlight) -> String {
    let kind = highlight.kind().map(|kind| kind.to_string()).unwrap_or_else(|_| "?".to_owned());
    let mut line =
        format!("{}\tp{}\t{kind}\t{}", highlight.id(), highlight.page_number(), highlight.preview());
    if !highlight.comment().is_empty() {
        line.push('\t');
        line.push_str(&highlight.comment().to_string());
    }
    line
}

fn parse_floats<const N: usize>(value: &str) -> Result<[f64; N], String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|err| format!("{part:?}: {err}")))
        .collect::<Result<_, _>>()?;

    parts.try_into().map_err(|parts: Vec<f64>| format!("expected {N} numbers, got {}", parts.len()))
}

fn parse_rect(value: &str) -> Result<[f64; 4], String> {
    parse_floats(value)
}

fn parse_size(value: &str) -> Result<[f64; 2], String> {
    parse_floats(value)
}
