mod askpass;
mod brew;
mod brewfile;
mod config;
mod engine;
mod tui;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 加载配置
    let config = config::Config::load_or_default()?;

    // 检测 brew 并套用配置中的特殊包名单
    let brew = brew::BrewClient::detect()?.with_special_packages(
        config.special_packages.clone(),
        config.special_timeout_secs,
    );

    // 启动 TUI 前完成 sudo 鉴权，relay 存活期间子进程可走 askpass 取密码
    let _relay = askpass::authenticate()?;

    let brewfile = brewfile::Brewfile::new(config.brewfile_path.clone());
    let engine = engine::Engine::new(brew, brewfile);

    tui::run(config, engine).await?;

    Ok(())
}
