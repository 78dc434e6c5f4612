use mesh_destruction::config::DemoConfig;
use mesh_destruction::core::{Engine, EngineResult};
use std::path::Path;

/// 第一个命令行参数可指定配置文件（.toml 或 .json）
fn load_config() -> EngineResult<DemoConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(arg) => {
            let path = Path::new(&arg);
            if path.extension().is_some_and(|ext| ext == "json") {
                DemoConfig::from_json_file(path)?
            } else {
                DemoConfig::from_toml_file(path)?
            }
        }
        None => DemoConfig::load_or_default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn main() {
    let result = load_config().and_then(Engine::run);
    if let Err(e) = result {
        eprintln!("Demo failed: {}", e);
        std::process::exit(1);
    }
}
