use clap::Parser;
use restrict_check::utils::error::ErrorSeverity;
use restrict_check::utils::{logger, validation::Validate};
use restrict_check::{
    CliCommand, CliConfig, Command, ProbeConfig, Runtime, WriterChannel,
};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    // 載入 TOML 配置; a missing default file means built-in defaults
    let config = if Path::new(&cli.config).exists() {
        match ProbeConfig::from_file(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!("No config file at {}, using defaults", cli.config);
        ProbeConfig::default()
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let (owner, command) = match cli.command {
        CliCommand::Validate => {
            println!("✅ Configuration is valid");
            println!("   probe url:        {}", config.probe.url_template);
            println!("   phrases:          {:?}", config.probe.positive_phrases);
            println!("   max concurrency:  {}", config.probe.max_concurrency);
            println!("   timeout:          {}s", config.probe.timeout_seconds);
            println!(
                "   retries:          {} on {:?}",
                config.retry.max_retries, config.retry.retry_statuses
            );
            println!(
                "   cache:            {} (ttl {}s)",
                config.cache.enabled, config.cache.ttl_seconds
            );
            println!(
                "   store:            {} (max {} per owner)",
                config.store.path, config.store.max_per_owner
            );
            return Ok(());
        }
        CliCommand::Add { owner, numbers } => (owner, Command::Add(numbers.join("\n"))),
        CliCommand::List { owner } => (owner, Command::List),
        CliCommand::Clear { owner } => (owner, Command::Clear),
        CliCommand::Check { owner } => (owner, Command::Check),
        CliCommand::Inline { owner, query } => (owner, Command::Inline(query.join(" "))),
    };

    let runtime = Runtime::from_config(&config).await?;
    let channel = WriterChannel::stdout();

    match runtime.handler.handle(owner, command, &channel).await {
        Ok(Some(report)) => {
            if let Some(warning) = &report.warning {
                tracing::warn!("⚠️ {}", warning);
                eprintln!("⚠️ {}", warning);
            }
            if report.chunks_failed > 0 {
                eprintln!("⚠️ {} result chunks could not be delivered", report.chunks_failed);
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
