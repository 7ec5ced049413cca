use campuslink::cli::{Args, build_config, init_logging, load_fallback_tokens, open_session, run_command};
use clap::Parser;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(fallbacks) = load_fallback_tokens(args.fallback_tokens_file.as_deref()) else {
        std::process::exit(1);
    };

    let config = build_config(&args, fallbacks);

    let Some(session) = open_session(config).await else {
        std::process::exit(1);
    };

    if !run_command(&session, args.command).await {
        std::process::exit(1);
    }
}
