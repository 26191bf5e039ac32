use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;

use chunked_mt::chunker::PartitionStrategy;
use chunked_mt::pipeline::{init_default_config, ConfigOverrides, PipelineConfig, TranslatorPipeline};
use chunked_mt::progress::ConsoleProgress;
use chunked_mt::textutil::word_count;

#[derive(Parser, Debug)]
#[command(name = "chunked-mt")]
#[command(about = "Translate long documents with Qwen-MT, split into token-bounded chunks", long_about = None)]
struct Args {
    /// Text to translate (default: read --file, else stdin)
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// Input text file
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Write the translation here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file (default: $CHUNKED_MT_CONFIG, else chunked-mt.toml searched upwards)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API key (default: config, else $ALIYUN_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Source language (e.g. zh, ja)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language (e.g. en)
    #[arg(long)]
    target_lang: Option<String>,

    /// Domain description sent with every request
    #[arg(long)]
    domains: Option<String>,

    /// Model name (e.g. qwen-mt-plus, qwen-mt-turbo)
    #[arg(long)]
    model: Option<String>,

    /// Soft token target per chunk
    #[arg(long, value_name = "N")]
    chunk_tokens: Option<usize>,

    /// Partition strategy: greedy or dp
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<PartitionStrategy>,

    /// Chunks translated concurrently
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Verbose logging and token usage report
    #[arg(long)]
    debug: bool,

    /// Print the chunk plan as JSON and exit (no API calls)
    #[arg(long)]
    chunk_info: bool,

    /// Write a default chunked-mt.toml into the current directory, then exit
    #[arg(long)]
    init_config: bool,

    /// Overwrite an existing config when used with --init-config
    #[arg(long)]
    force: bool,
}

fn parse_strategy(s: &str) -> Result<PartitionStrategy, String> {
    s.parse()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let text = read_input(&args)?;

    let cfg = PipelineConfig::from_args(ConfigOverrides {
        config_path: args.config.clone(),
        api_key: args.api_key.clone(),
        model: args.model.clone(),
        source_lang: args.source_lang.clone(),
        target_lang: args.target_lang.clone(),
        domains: args.domains.clone(),
        target_tokens: args.chunk_tokens,
        strategy: args.strategy,
        workers: args.workers,
    })
    .context("build config")?;
    let chunker = cfg.build_chunker()?;

    if args.chunk_info {
        let info = chunker.get_chunk_info(&text);
        println!("{}", serde_json::to_string_pretty(&info).context("serialize chunk info")?);
        return Ok(());
    }

    let progress = ConsoleProgress::new(args.debug);
    progress.info(format!(
        "Language: {} -> {}, model {}, {} words",
        cfg.source_lang,
        cfg.target_lang,
        cfg.model,
        word_count(&text)
    ));

    let client = cfg.build_client()?;
    let pipeline =
        TranslatorPipeline::new(&cfg, chunker, client)?.with_progress(Box::new(progress));
    let out = pipeline.translate_text(&text)?;

    match args.output.as_ref() {
        Some(path) => {
            std::fs::write(path, &out.text)
                .with_context(|| format!("write output: {}", path.display()))?;
            eprintln!("Translation written to {}", path.display());
        }
        None => println!("{}", out.text),
    }

    if args.debug {
        eprintln!(
            "Token usage: input {}, output {}, total {}",
            out.usage.input_tokens, out.usage.output_tokens, out.usage.total_tokens
        );
    }
    Ok(())
}

fn read_input(args: &Args) -> anyhow::Result<String> {
    if let Some(path) = args.file.as_ref() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("read input: {}", path.display()));
    }
    if let Some(text) = args.text.as_ref() {
        return Ok(text.clone());
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("read stdin")?;
    if buf.trim().is_empty() {
        return Err(anyhow!("no input: pass TEXT, --file, or pipe text on stdin"));
    }
    Ok(buf)
}
