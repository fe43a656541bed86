//! Memobot 入口
//!
//! 初始化日志、加载配置与密钥、装配 MessageHandler，然后连接 Discord Gateway 直到 Ctrl+C。
//!
//! 环境变量:
//! - DISCORD_TOKEN: Discord Bot Token
//! - GEMINI_API_KEY（provider=gemini）或 OPENAI_API_KEY（provider=openai）
//! - MEMOBOT__*: 覆盖 config/default.toml 中的任意键

#[cfg(feature = "discord")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use memobot::app::{create_handler, create_llm_from_config};
    use memobot::config::{load_config, Secrets};
    use memobot::core::ShutdownManager;
    use memobot::integrations::discord::DiscordBot;

    memobot::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let secrets = Secrets::from_env(&cfg.llm.provider).context("Missing startup secret")?;

    let llm = create_llm_from_config(&cfg.llm, &secrets.model_api_key);
    let handler = Arc::new(create_handler(&cfg, llm));

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    let bot = DiscordBot::new(secrets.discord_token, handler);
    bot.run(shutdown.token())
        .await
        .context("Discord gateway stopped")?;

    Ok(())
}

#[cfg(not(feature = "discord"))]
fn main() {
    eprintln!("请使用 --features discord 编译: cargo run --features discord");
    std::process::exit(1);
}
