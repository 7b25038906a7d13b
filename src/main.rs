use clap::Parser;
use funnel_checkout::core::checkout_url::build_checkout_url;
use funnel_checkout::domain::model::Child;
use funnel_checkout::utils::error::ErrorSeverity;
use funnel_checkout::utils::{logger, validation::Validate};
use funnel_checkout::{
    AddOnSelection, AttributionSnapshot, CheckoutError, CheckoutHandoff, CliConfig, Command,
    CommerceConfig, FileStorage, PricingEngine, RecordingNavigator, RegionRouter, Result,
    SelectionDelta, SelectionStore, WebhookSubmissionClient,
};
use std::sync::Arc;

const DEFAULT_SESSION_PATH: &str = "./.funnel-session.json";

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 4,      // 輸入錯誤
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 儲存失敗
            ErrorSeverity::Critical => 3, // 設定或系統錯誤
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    if let Command::Quote {
        recipients,
        add_ons,
        photos,
        locale,
    } = &cli.command
    {
        let selection = AddOnSelection::parse(add_ons)?;
        let pricing = PricingEngine::new(&config).compute_price(*recipients, &selection, *photos, locale)?;
        return print_json(&pricing);
    }

    let session_path = cli
        .session
        .clone()
        .or_else(|| config.store_path().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_SESSION_PATH.to_string());
    let storage = FileStorage::open(&session_path)?;
    tracing::debug!("📁 Using session file {}", storage.path().display());
    let store = SelectionStore::new(storage, Arc::new(config));

    match cli.command {
        Command::Quote { .. } => Ok(()),
        Command::Save {
            recipients,
            add_ons,
            photos,
            locale,
            name,
            email,
            phone,
            tax_id,
            children,
            message,
            landing_url,
            step,
        } => {
            if let Some(raw) = landing_url {
                let url = url::Url::parse(&raw).map_err(|e| CheckoutError::ValidationError {
                    field: "landing_url".to_string(),
                    message: e.to_string(),
                })?;
                store.capture_attribution(&AttributionSnapshot::capture_from_url(&url))?;
            }

            let delta = SelectionDelta {
                recipient_count: recipients,
                add_on_ids: add_ons.map(|ids| ids.into_iter().filter(|id| !id.trim().is_empty()).collect()),
                photo_count: photos,
                name,
                email,
                phone,
                tax_id,
                region: locale,
                children: children.map(|names| names.into_iter().map(Child::new).collect()),
                message,
                photo: None,
            };
            let pricing = store.save(delta)?;

            if let Some(step) = step {
                store.set_current_step(step)?;
            }
            print_json(&pricing)
        }
        Command::Show => {
            let summary = serde_json::json!({
                "selection": store.selection(),
                "pricing": store.current_pricing(),
                "currentStep": store.current_step(),
                "attribution": store.attribution(),
            });
            print_json(&summary)
        }
        Command::Clear => {
            store.clear()?;
            println!("🧹 Session cleared");
            Ok(())
        }
        Command::CheckoutUrl => {
            let selection = store.selection();
            let route = RegionRouter::new(store.config()).route(&selection.region)?;
            let url = build_checkout_url(store.config(), &route, &selection, &store.attribution())?;
            println!("{}", url);
            Ok(())
        }
        Command::Handoff => {
            let client = WebhookSubmissionClient::from_config(store.config())?;
            let handoff = CheckoutHandoff::from_config(client, RecordingNavigator::new(), store.config());
            let url = handoff.complete(&store).await?;
            println!("✅ Order submitted");
            println!("🔗 {}", url);
            Ok(())
        }
    }
}

fn load_config(path: Option<&str>) -> Result<CommerceConfig> {
    let config = match path {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            CommerceConfig::from_file(path)?
        }
        None => CommerceConfig::builtin()?,
    };

    // 驗證配置
    config.validate()?;
    tracing::debug!("✅ Configuration loaded and validated");
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
