use clap::Parser;
use policy_scout::config::AssistantConfig;
use policy_scout::contexts::{AnalyzeOutcome, PageSnapshot};
use policy_scout::utils::has_restricted_scheme;
use policy_scout::{AssistantError, PolicyAssistant, webdriver};
use std::path::Path;
use url::Url;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), AssistantError> {
    let config = match &args.config {
        Some(path) => AssistantConfig::from_file(path)?,
        None => AssistantConfig::default(),
    }
    .with_env_overrides();

    match args.command {
        Command::Analyze {
            url,
            html_file,
            preinstalled,
        } => analyze(config, &url, html_file.as_deref(), preinstalled).await,
        Command::Show => {
            let assistant = PolicyAssistant::new().with_config(config).start()?;
            let mut popup = assistant.popup();
            popup.load_summary().await;
            println!("{}", popup.display());
            Ok(())
        }
    }
}

async fn analyze(
    config: AssistantConfig,
    url: &str,
    html_file: Option<&Path>,
    preinstalled: bool,
) -> Result<(), AssistantError> {
    ::log::info!("Analyzing page: {}", url);

    let (page_url, html) = if has_restricted_scheme(url, &config.restricted_schemes) {
        // internal pages cannot be loaded; the popup rejects them
        (url.to_string(), String::new())
    } else if let Some(path) = html_file {
        let html = tokio::fs::read_to_string(path)
            .await
            .map_err(AssistantError::PageSource)?;
        (url.to_string(), html)
    } else {
        println!("Note: loading pages requires a WebDriver server (e.g., ChromeDriver).");
        println!(
            "Set WEBDRIVER_URL environment variable if not using the default {}",
            config.webdriver_url
        );
        let page = webdriver::fetch_page(&config.webdriver_url, url).await?;
        if let Some(title) = &page.title {
            ::log::info!("Loaded \"{}\"", title);
        }
        (page.url, page.html)
    };

    let page_url = Url::parse(&page_url).map_err(|_| AssistantError::PageUrl(page_url.clone()))?;

    let assistant = PolicyAssistant::new().with_config(config).start()?;
    assistant
        .browser()
        .open_tab(page_url, PageSnapshot::complete(html), preinstalled)
        .await;

    let start_time = std::time::Instant::now();
    let mut popup = assistant.popup();
    let outcome = popup.analyze().await;
    ::log::debug!("Analyze finished with {:?}", outcome);

    let policies = popup.detected_policies().await?;
    assistant.shutdown().await?;

    // show the settled result, not whatever was stored when the delay expired
    if outcome == AnalyzeOutcome::Reloaded {
        popup.load_summary().await;
    }

    if !policies.is_empty() {
        println!("Detected policies:");
        for (i, policy) in policies.iter().enumerate() {
            println!("  {}. {}", i + 1, policy);
        }
        println!();
    }
    println!("{}", popup.display());

    ::log::info!(
        "Analysis complete in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
